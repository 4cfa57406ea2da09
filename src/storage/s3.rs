//! S3-compatible object store client.
//!
//! Talks to AWS S3, MinIO or any S3-compatible service through the AWS SDK.
//! All objects live in the single configured bucket; keys are passed
//! through unchanged (tenant prefixes are already part of them).
//!
//! Credentials are either the static pair from the configuration or, when
//! none is configured, the standard AWS credential chain (env vars,
//! `~/.aws/credentials`, IAM role, etc.).

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, info, warn};

use super::client::{ClientFuture, ObjectStat, ObjectStoreClient, PutObject};
use crate::config::StoreConfig;
use crate::errors::{ClientError, DeleteFailure};

/// S3 DeleteObjects accepts at most 1000 keys per call.
const MAX_DELETE_BATCH: usize = 1000;

/// Characters left unescaped in a copy source (`/` separates key segments).
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Object store client backed by the AWS SDK.
pub struct S3ObjectClient {
    /// AWS S3 SDK client.
    client: Client,
    /// The bucket holding every object.
    bucket: String,
    /// Payloads above this size are uploaded in parts of this size.
    part_size: u64,
}

impl S3ObjectClient {
    /// Build a client from the store configuration.
    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region()))
            .endpoint_url(config.endpoint_url());

        if let Some((ak, sk)) = config.static_credentials() {
            let creds = aws_sdk_s3::config::Credentials::new(
                ak,
                sk,
                None, // session_token
                None, // expiry
                "tenantfs-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        if config.has_transport_overrides() {
            warn!(
                "Proxy and TLS certificate settings are not applied by the S3 client; \
                 configure them at the system level"
            );
        }

        let sdk_config = config_loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(!config.vhost)
            .build();

        info!(
            "S3 client initialized: endpoint={} bucket={} vhost={}",
            config.endpoint_url(),
            config.bucket,
            config.vhost
        );

        Ok(Self::from_client(
            Client::from_conf(s3_config),
            config.bucket.clone(),
            config.part_size.value(),
        ))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client, bucket: String, part_size: u64) -> Self {
        Self {
            client,
            bucket,
            part_size,
        }
    }

    /// Map an AWS SDK error to a client error with context.
    fn map_sdk_error(context: &str, err: impl std::error::Error) -> ClientError {
        ClientError::Other(anyhow::anyhow!(
            "S3 {context}: {}",
            DisplayErrorContext(err)
        ))
    }

    /// Encode a copy source as `bucket/key`.
    fn copy_source(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, utf8_percent_encode(key, COPY_SOURCE))
    }

    /// Upload `request` in `part_size` chunks, aborting the upload on failure.
    async fn put_multipart(&self, request: PutObject) -> Result<(), ClientError> {
        let create_resp = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&request.key)
            .set_metadata(request.metadata)
            .set_content_type(request.content_type)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("create_multipart_upload", e))?;

        let upload_id = create_resp
            .upload_id()
            .ok_or_else(|| ClientError::Other(anyhow::anyhow!("S3 did not return upload ID")))?
            .to_string();

        match self
            .upload_parts(&request.key, &upload_id, &request.data)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Aborting multipart upload {} due to error: {}", upload_id, e);
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(&request.key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        "Failed to abort multipart upload: {}",
                        DisplayErrorContext(abort_err)
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(&self, key: &str, upload_id: &str, data: &Bytes) -> Result<(), ClientError> {
        let part_size = self.part_size.max(1) as usize;
        let mut completed_parts = Vec::new();

        for (idx, offset) in (0..data.len()).step_by(part_size).enumerate() {
            let part_number = (idx + 1) as i32;
            let end = (offset + part_size).min(data.len());

            debug!(
                "S3 upload_part: key={} upload_id={} part={} bytes={}",
                key,
                upload_id,
                part_number,
                end - offset
            );

            let resp = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data.slice(offset..end)))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("upload_part", e))?;

            completed_parts.push(
                CompletedPart::builder()
                    .set_e_tag(resp.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }

        let completed_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_upload)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("complete_multipart_upload", e))?;

        Ok(())
    }
}

impl ObjectStoreClient for S3ObjectClient {
    fn get_object(&self, key: &str) -> ClientFuture<'_, Bytes> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 get_object: bucket={} key={}", self.bucket, key);

            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        ClientError::NoSuchKey { key: key.clone() }
                    } else {
                        Self::map_sdk_error("get_object", service_err)
                    }
                })?;

            let data = resp
                .body
                .collect()
                .await
                .map_err(|e| Self::map_sdk_error("get_object body", e))?
                .into_bytes();

            Ok(data)
        })
    }

    fn stat_object(&self, key: &str) -> ClientFuture<'_, ObjectStat> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 head_object: bucket={} key={}", self.bucket, key);

            let resp = self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.is_not_found() {
                        ClientError::NoSuchKey { key: key.clone() }
                    } else {
                        Self::map_sdk_error("head_object", service_err)
                    }
                })?;

            let last_modified = resp
                .last_modified()
                .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                .unwrap_or_default();

            Ok(ObjectStat {
                size: resp.content_length().unwrap_or(0).max(0) as u64,
                last_modified,
                metadata: resp.metadata().cloned().unwrap_or_default(),
                content_type: resp.content_type().map(str::to_string),
            })
        })
    }

    fn put_object(&self, request: PutObject) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            let size = request.data.len() as u64;
            if size > self.part_size {
                debug!(
                    "S3 multipart put: bucket={} key={} size={}",
                    self.bucket, request.key, size
                );
                return self.put_multipart(request).await;
            }

            debug!("S3 put_object: bucket={} key={} size={}", self.bucket, request.key, size);

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&request.key)
                .content_length(size as i64)
                .set_metadata(request.metadata)
                .set_content_type(request.content_type)
                .body(ByteStream::from(request.data))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e))?;

            Ok(())
        })
    }

    fn remove_object(&self, key: &str) -> ClientFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 delete_object: bucket={} key={}", self.bucket, key);

            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e))?;

            Ok(())
        })
    }

    fn remove_objects(&self, keys: Vec<String>) -> ClientFuture<'_, Vec<DeleteFailure>> {
        Box::pin(async move {
            let mut failures = Vec::new();

            for batch in keys.chunks(MAX_DELETE_BATCH) {
                debug!(
                    "S3 delete_objects: bucket={} keys={}",
                    self.bucket,
                    batch.len()
                );

                let objects = batch
                    .iter()
                    .map(|k| ObjectIdentifier::builder().key(k).build())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| Self::map_sdk_error("delete_objects build", e))?;

                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(true)
                    .build()
                    .map_err(|e| Self::map_sdk_error("delete_objects build", e))?;

                let resp = self
                    .client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error("delete_objects", e))?;

                failures.extend(resp.errors().iter().map(|err| DeleteFailure {
                    key: err.key().unwrap_or_default().to_string(),
                    code: err.code().unwrap_or_default().to_string(),
                    message: err.message().unwrap_or_default().to_string(),
                }));
            }

            Ok(failures)
        })
    }

    fn list_objects(&self, prefix: &str, recursive: bool) -> ClientFuture<'_, Vec<String>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            debug!(
                "S3 list_objects_v2: bucket={} prefix={} recursive={}",
                self.bucket, prefix, recursive
            );

            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let mut req = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(&prefix);

                if !recursive {
                    req = req.delimiter("/");
                }
                if let Some(ref token) = continuation_token {
                    req = req.continuation_token(token);
                }

                let resp = req
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;

                keys.extend(
                    resp.contents()
                        .iter()
                        .filter_map(|obj| obj.key().map(str::to_string)),
                );
                keys.extend(
                    resp.common_prefixes()
                        .iter()
                        .filter_map(|p| p.prefix().map(str::to_string)),
                );

                if resp.is_truncated() == Some(true) {
                    continuation_token = resp.next_continuation_token().map(|s| s.to_string());
                } else {
                    break;
                }
            }

            // Contents and common prefixes arrive as two sorted runs.
            keys.sort();
            Ok(keys)
        })
    }

    fn copy_object(&self, source: &str, dest: &str) -> ClientFuture<'_, ()> {
        let copy_source = self.copy_source(source);
        let source = source.to_string();
        let dest = dest.to_string();
        Box::pin(async move {
            debug!(
                "S3 copy_object: bucket={} src={} dst={}",
                self.bucket, source, dest
            );

            self.client
                .copy_object()
                .bucket(&self.bucket)
                .key(&dest)
                .copy_source(&copy_source)
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.code() == Some("NoSuchKey") {
                        ClientError::NoSuchKey {
                            key: source.clone(),
                        }
                    } else {
                        Self::map_sdk_error("copy_object", service_err)
                    }
                })?;

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client(part_size: u64) -> S3ObjectClient {
        // Never sends a request; only used for pure helpers.
        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        S3ObjectClient::from_client(Client::from_conf(conf), "unittest".to_string(), part_size)
    }

    #[test]
    fn test_copy_source_plain_key() {
        let client = offline_client(1024);
        assert_eq!(
            client.copy_source("tenant/file/storage/get.yml"),
            "unittest/tenant/file/storage/get.yml"
        );
    }

    #[test]
    fn test_copy_source_escapes_special_chars() {
        let client = offline_client(1024);
        assert_eq!(
            client.copy_source("t/key with spaces+plus.txt"),
            "unittest/t/key%20with%20spaces%2Bplus.txt"
        );
    }

    #[test]
    fn test_copy_source_keeps_directory_marker_slash() {
        let client = offline_client(1024);
        assert_eq!(client.copy_source("t/dir/"), "unittest/t/dir/");
    }

    #[test]
    fn test_map_sdk_error_is_transport() {
        let err = S3ObjectClient::map_sdk_error(
            "put_object",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(!err.is_no_such_key());
        assert!(err.to_string().contains("S3 put_object"));
    }
}
