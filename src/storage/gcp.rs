use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;

use super::{check_upload, ObjectStorage};
use crate::config::EnvVars;
use crate::error::Result;

const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Google Cloud Storage through the JSON API media upload, OAuth bearer token.
pub struct GcpBucketClient {
    client: Client,
    base_url: String,
    bucket: String,
    access_token: String,
}

impl GcpBucketClient {
    pub fn new(base_url: String, bucket: String, access_token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            bucket,
            access_token,
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self::new(
            GCS_BASE_URL.to_string(),
            env.require("GCP_BUCKET_NAME")?,
            env.require("GCP_ACCESS_TOKEN")?,
        ))
    }
}

#[async_trait]
impl ObjectStorage for GcpBucketClient {
    async fn upload_file(&self, local_path: &Path, object_name: &str) -> Result<()> {
        let body = tokio::fs::read(local_path).await?;
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base_url.trim_end_matches('/'),
            self.bucket
        );
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object_name)])
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .await?;
        check_upload(self.provider_name(), response).await
    }

    fn public_url(&self, object_name: &str) -> String {
        format!("{}/{}/{}", GCS_BASE_URL, self.bucket, object_name)
    }

    fn provider_name(&self) -> &'static str {
        "gcp"
    }
}
