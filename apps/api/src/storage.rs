//! Image attachments on blob storage.
//!
//! Signals and trends may carry one image each, submitted as a base64
//! payload and stored as a public object. Callers treat these operations as
//! best-effort secondary effects: an upload failure must not fail the
//! primary entity mutation.

use anyhow::{anyhow, Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::info;

/// Storage folder per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFolder {
    Signals,
    Trends,
}

impl ImageFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFolder::Signals => "signals",
            ImageFolder::Trends => "trends",
        }
    }
}

/// Blob-storage client for entity image attachments.
#[derive(Clone)]
pub struct Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, endpoint: String) -> Self {
        Storage {
            client,
            bucket,
            public_base: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn object_key(folder: ImageFolder, entity_id: i32) -> String {
        format!("{}/{}.jpeg", folder.as_str(), entity_id)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket, key)
    }

    /// Uploads a base64-encoded image and returns its public URL.
    /// Accepts raw base64 or a `data:...;base64,` payload.
    pub async fn upload_image(
        &self,
        entity_id: i32,
        folder: ImageFolder,
        image_string: &str,
    ) -> Result<String> {
        let payload = image_string
            .split_once(',')
            .map_or(image_string, |(_, data)| data);
        let data = BASE64
            .decode(payload.trim())
            .context("attachment is not valid base64")?;

        let key = Self::object_key(folder, entity_id);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type("image/jpeg")
            .send()
            .await
            .map_err(|e| anyhow!("blob upload failed: {e}"))?;

        info!("Uploaded attachment for {} {entity_id}", folder.as_str());
        Ok(self.public_url(&key))
    }

    /// Deletes an entity's image. Returns true unless the request itself
    /// fails; deleting an absent object is not an error.
    pub async fn delete_image(&self, entity_id: i32, folder: ImageFolder) -> Result<bool> {
        let key = Self::object_key(folder, entity_id);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| anyhow!("blob delete failed: {e}"))?;
        Ok(true)
    }

    /// Reconciles an entity's stored image with an updated attachment value:
    /// `None` clears it, an http(s) URL is kept as-is, anything else is
    /// treated as a fresh base64 payload and uploaded.
    pub async fn update_image(
        &self,
        entity_id: i32,
        folder: ImageFolder,
        attachment: Option<&str>,
    ) -> Result<Option<String>> {
        match attachment {
            None => {
                self.delete_image(entity_id, folder).await?;
                Ok(None)
            }
            Some(value) if value.starts_with("http") => Ok(Some(value.to_string())),
            Some(value) => Ok(Some(self.upload_image(entity_id, folder, value).await?)),
        }
    }
}
