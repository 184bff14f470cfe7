use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;

use super::{check_upload, ObjectStorage};
use crate::config::EnvVars;
use crate::error::Result;

/// OCI Object Storage. Uploads go through a pre-authenticated request (PAR)
/// prefix so no request signing is needed.
pub struct OciBucketClient {
    client: Client,
    par_url: String,
    namespace: String,
    bucket: String,
    region: String,
}

impl OciBucketClient {
    pub fn new(par_url: String, namespace: String, bucket: String, region: String) -> Self {
        Self {
            client: Client::new(),
            par_url,
            namespace,
            bucket,
            region,
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self::new(
            env.require("OCI_PAR_URL")?,
            env.require("OCI_NAMESPACE")?,
            env.require("OCI_BUCKET_NAME")?,
            env.require("OCI_REGION")?,
        ))
    }
}

#[async_trait]
impl ObjectStorage for OciBucketClient {
    async fn upload_file(&self, local_path: &Path, object_name: &str) -> Result<()> {
        let body = tokio::fs::read(local_path).await?;
        let url = format!("{}/{}", self.par_url.trim_end_matches('/'), object_name);
        let response = self.client.put(&url).body(body).send().await?;
        check_upload(self.provider_name(), response).await
    }

    fn public_url(&self, object_name: &str) -> String {
        format!(
            "https://objectstorage.{}.oraclecloud.com/n/{}/b/{}/o/{}",
            self.region, self.namespace, self.bucket, object_name
        )
    }

    fn provider_name(&self) -> &'static str {
        "oci"
    }
}
