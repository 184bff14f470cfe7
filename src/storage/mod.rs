pub mod aws;
pub mod gcp;
pub mod oci;
mod sigv4;

use std::path::Path;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub use aws::AwsS3BucketClient;
pub use gcp::GcpBucketClient;
pub use oci::OciBucketClient;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload_file(&self, local_path: &Path, object_name: &str) -> Result<()>;

    /// URL under which an uploaded object is publicly reachable.
    fn public_url(&self, object_name: &str) -> String;

    fn provider_name(&self) -> &'static str;
}

async fn check_upload(provider: &str, response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Storage(format!(
        "{} upload failed: {} - {}",
        provider, status, body
    )))
}
