use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};

use super::sigv4::{self, Credentials};
use super::{check_upload, ObjectStorage};
use crate::config::EnvVars;
use crate::error::{Error, Result};

/// S3 bucket addressed virtual-host style.
pub struct AwsS3BucketClient {
    client: Client,
    bucket_url: String,
    region: String,
    credentials: Credentials,
}

impl AwsS3BucketClient {
    pub fn new(bucket_url: String, region: String, access_key_id: String, secret_access_key: String) -> Self {
        Self {
            client: Client::new(),
            bucket_url,
            region,
            credentials: Credentials {
                access_key_id,
                secret_access_key,
                session_token: None,
            },
        }
    }

    pub fn from_env(env: &EnvVars) -> Result<Self> {
        let bucket = env.require("AWS_S3_BUCKET_NAME")?;
        let region = env.require("AWS_REGION")?;
        let mut client = Self::new(
            format!("https://{}.s3.{}.amazonaws.com", bucket, region),
            region,
            env.require("AWS_ACCESS_KEY_ID")?,
            env.require("AWS_SECRET_ACCESS_KEY")?,
        );
        client.credentials.session_token = env.get("AWS_SESSION_TOKEN").map(str::to_string);
        Ok(client)
    }

    fn object_url(&self, object_name: &str) -> String {
        format!(
            "{}{}",
            self.bucket_url.trim_end_matches('/'),
            sigv4::uri_encode_path(&format!("/{}", object_name.trim_start_matches('/')))
        )
    }
}

#[async_trait]
impl ObjectStorage for AwsS3BucketClient {
    async fn upload_file(&self, local_path: &Path, object_name: &str) -> Result<()> {
        let body = tokio::fs::read(local_path).await?;
        let url = Url::parse(&self.object_url(object_name))
            .map_err(|e| Error::config(format!("Invalid S3 object URL: {}", e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(Error::config("S3 bucket URL has no host")),
        };

        let signed = sigv4::sign_put(&self.credentials, &self.region, &host, url.path(), &body, Utc::now())?;
        let mut request = self.client.put(url.clone());
        for (name, value) in signed.headers {
            request = request.header(name, value);
        }

        tracing::debug!("Uploading {} to {}", local_path.display(), url);
        let response = request.body(body).send().await?;
        check_upload(self.provider_name(), response).await
    }

    fn public_url(&self, object_name: &str) -> String {
        self.object_url(object_name)
    }

    fn provider_name(&self) -> &'static str {
        "aws"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::put;
    use axum::Router;
    use std::io::Write;

    #[test]
    fn test_public_url_encodes_key() {
        let env = EnvVars::from_pairs([
            ("AWS_S3_BUCKET_NAME", "docs"),
            ("AWS_REGION", "eu-west-1"),
            ("AWS_ACCESS_KEY_ID", "a"),
            ("AWS_SECRET_ACCESS_KEY", "s"),
        ]);
        let client = AwsS3BucketClient::from_env(&env).unwrap();
        assert_eq!(
            client.public_url("reports/q1 summary.pdf"),
            "https://docs.s3.eu-west-1.amazonaws.com/reports/q1%20summary.pdf"
        );
    }

    #[test]
    fn test_from_env_requires_credentials() {
        let env = EnvVars::from_pairs([("AWS_S3_BUCKET_NAME", "docs"), ("AWS_REGION", "eu-west-1")]);
        assert!(AwsS3BucketClient::from_env(&env).is_err());
    }

    #[tokio::test]
    async fn test_upload_is_signed() {
        let app = Router::new().route(
            "/uploads/file.txt",
            put(|headers: HeaderMap, body: Bytes| async move {
                let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default();
                let hash = headers
                    .get("x-amz-content-sha256")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth.starts_with("AWS4-HMAC-SHA256 Credential=AKID/") && hash == sigv4::sha256_hex(&body) {
                    StatusCode::OK
                } else {
                    StatusCode::FORBIDDEN
                }
            }),
        );
        let base = serve(app).await;
        let client = AwsS3BucketClient::new(base, "us-east-1".to_string(), "AKID".to_string(), "secret".to_string());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello bucket").unwrap();
        client.upload_file(file.path(), "uploads/file.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_upload_is_storage_error() {
        let app = Router::new().route("/x", put(|| async { StatusCode::FORBIDDEN }));
        let base = serve(app).await;
        let client = AwsS3BucketClient::new(base, "us-east-1".to_string(), "AKID".to_string(), "secret".to_string());

        let file = tempfile::NamedTempFile::new().unwrap();
        let err = client.upload_file(file.path(), "x").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
