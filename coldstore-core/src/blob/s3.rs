/*!
Amazon S3 blob store.

Objects are addressed as `{key}` within a single bucket; the bucket plays the
role of the blob container. Tier discovery maps the object's storage class
onto [`StorageTier`], and thaw requests issue a non-blocking
`RestoreObject` call for Glacier-class objects.
*/

use super::BlobStore;
use crate::model::StorageTier;
use crate::{RetainError, Result};
use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{GlacierJobParameters, RestoreRequest, StorageClass, Tier};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Blob store backed by an S3 bucket.
///
/// Uses the standard AWS credential provider chain (environment, profile,
/// instance roles).
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    /// Connect using the default AWS configuration from the environment.
    pub async fn new(bucket: impl Into<String>) -> Result<Self> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        if sdk_config.credentials_provider().is_none() {
            return Err(RetainError::storage(
                "AWS credentials not found; set AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and AWS_REGION",
            ));
        }
        let bucket = bucket.into();
        info!(bucket = %bucket, "Initialized S3 blob store");
        Ok(Self {
            client: S3Client::new(&sdk_config),
            bucket,
        })
    }

    /// Connect with an explicit SDK configuration.
    pub fn with_config(bucket: impl Into<String>, config: &aws_config::SdkConfig) -> Self {
        Self {
            client: S3Client::new(config),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, _container: &str, path: &str, data: Bytes) -> Result<String> {
        debug!(bucket = %self.bucket, key = %path, size = data.len(), "S3 put_object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_s3_error("put_object", &e, path))?;
        Ok(format!("s3://{}/{path}", self.bucket))
    }

    async fn fetch(&self, path: &str) -> Result<Bytes> {
        debug!(bucket = %self.bucket, key = %path, "S3 get_object");
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| map_s3_error("get_object", &e, path))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| RetainError::storage(format!("failed to read S3 object stream: {e}")))?;
        Ok(data.into_bytes())
    }

    async fn location_tier(&self, path: &str) -> Result<StorageTier> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| map_s3_error("head_object", &e, path))?;
        Ok(tier_from_storage_class(head.storage_class()))
    }

    async fn request_thaw(&self, path: &str) -> Result<()> {
        info!(bucket = %self.bucket, key = %path, "S3 restore_object (thaw)");
        let restore = RestoreRequest::builder()
            .days(1)
            .glacier_job_parameters(GlacierJobParameters::builder().tier(Tier::Standard).build())
            .build();
        self.client
            .restore_object()
            .bucket(&self.bucket)
            .key(path)
            .restore_request(restore)
            .send()
            .await
            .map_err(|e| map_s3_error("restore_object", &e, path))?;
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_at: DateTime<Utc>) -> Result<String> {
        let ttl = (expires_at - Utc::now())
            .to_std()
            .map_err(|_| RetainError::validation("signed URL expiry is in the past"))?;
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| RetainError::storage(format!("invalid presigning expiry: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| map_s3_error("presign_get_object", &e, path))?;
        Ok(presigned.uri().to_string())
    }
}

/// Map an S3 storage class onto the engine's tier model.
fn tier_from_storage_class(class: Option<&StorageClass>) -> StorageTier {
    match class {
        Some(StorageClass::StandardIa) | Some(StorageClass::OnezoneIa) => StorageTier::Cool,
        Some(StorageClass::GlacierIr) => StorageTier::Cold,
        Some(StorageClass::Glacier) | Some(StorageClass::DeepArchive) => StorageTier::Archive,
        // STANDARD, INTELLIGENT_TIERING and anything unrecognized count as hot.
        _ => StorageTier::Hot,
    }
}

/// Map AWS SDK errors to RetainError with operation context.
fn map_s3_error<E>(op: &str, error: &aws_sdk_s3::error::SdkError<E>, key: &str) -> RetainError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    use aws_sdk_s3::error::SdkError;

    match error {
        SdkError::TimeoutError(_) => {
            RetainError::storage(format!("S3 {op} request timed out (key: {key})"))
        }
        SdkError::DispatchFailure(err) => {
            RetainError::storage(format!("S3 {op} request failed to dispatch: {err:?}"))
        }
        SdkError::ServiceError(service_err) => match service_err.err().code() {
            Some("NoSuchBucket") => RetainError::storage("S3 bucket not found".to_string()),
            Some("NoSuchKey") => RetainError::storage(format!("S3 object '{key}' not found")),
            Some("AccessDenied") | Some("Forbidden") => RetainError::storage(
                "access denied to S3 (check credentials and permissions)".to_string(),
            ),
            Some(code) => RetainError::storage(format!(
                "S3 {op} service error ({code}): {}",
                service_err.err().message().unwrap_or("unknown error")
            )),
            None => RetainError::storage(format!("S3 {op} service error: {service_err:?}")),
        },
        other => RetainError::storage(format!("S3 {op} error: {other:?}")),
    }
}
