//! Publishing finished digests to S3 (or an S3-compatible store).

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::{Credentials, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{error, info};

use crate::config::PublishSettings;
use crate::contract::Publisher;
use crate::error::PublishError;

pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// `digests/<slug>/<uuid>.txt`, with `local` standing in for an empty slug.
pub fn object_key(slug: &str) -> String {
    let slug = if slug.trim().is_empty() { "local" } else { slug };
    format!("digests/{slug}/{}.txt", uuid::Uuid::new_v4())
}

/// Public virtual-hosted URL of an object. `us-east-1` has no region in the host.
pub fn object_url(bucket: &str, region: &str, key: &str) -> String {
    if region == "us-east-1" {
        format!("https://{bucket}.s3.amazonaws.com/{key}")
    } else {
        format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
    }
}

/// Uploads through the S3 `PutObject` API.
pub struct S3Publisher {
    client: Client,
    region: String,
    endpoint: Option<String>,
}

impl S3Publisher {
    /// Builds a client from an already loaded AWS configuration.
    pub fn new(settings: &PublishSettings, sdk_config: &SdkConfig) -> Self {
        Self::from_builder(settings, aws_sdk_s3::config::Builder::from(sdk_config))
    }

    /// Credentials and the rest of the AWS configuration come from the default
    /// provider chain (`AWS_*` variables, profiles, instance metadata).
    pub async fn from_env(settings: &PublishSettings) -> Self {
        dotenvy::dotenv().ok();
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;
        Self::new(settings, &sdk_config)
    }

    /// Fixed credentials, for stores outside the default provider chain.
    pub fn with_static_credentials(
        settings: &PublishSettings,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: Option<String>,
    ) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            session_token,
            None,
            "repo-digest",
        );
        let builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials);
        Self::from_builder(settings, builder)
    }

    fn from_builder(settings: &PublishSettings, builder: aws_sdk_s3::config::Builder) -> Self {
        let endpoint = settings
            .endpoint
            .as_ref()
            .map(|e| e.trim_end_matches('/').to_string());
        let mut builder = builder
            .region(Region::new(settings.region.clone()))
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired);
        // Custom endpoints are addressed path-style.
        if let Some(endpoint) = &endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self {
            client: Client::from_conf(builder.build()),
            region: settings.region.clone(),
            endpoint,
        }
    }

    /// Where an uploaded object can be fetched from.
    fn location(&self, bucket: &str, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{endpoint}/{bucket}/{key}"),
            None => object_url(bucket, &self.region, key),
        }
    }
}

/// A response from the store is a rejection; anything short of one is transport.
fn classify(key: &str, err: SdkError<PutObjectError>) -> PublishError {
    match err.raw_response().map(|raw| raw.status().as_u16()) {
        Some(status) => {
            let body = match err.as_service_error() {
                Some(service) => format!(
                    "{}: {}",
                    service.code().unwrap_or("Unknown"),
                    service.message().unwrap_or_default()
                ),
                None => DisplayErrorContext(&err).to_string(),
            };
            PublishError::Rejected {
                key: key.to_string(),
                status,
                body,
            }
        }
        None => PublishError::Transport {
            key: key.to_string(),
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

#[async_trait]
impl Publisher for S3Publisher {
    async fn publish(
        &self,
        content: &str,
        destination: &str,
        object_key: &str,
    ) -> Result<String, PublishError> {
        info!(bucket = destination, key = object_key, bytes = content.len(), "[PUBLISH] Uploading digest");

        self.client
            .put_object()
            .bucket(destination)
            .key(object_key)
            .content_type(CONTENT_TYPE)
            .body(ByteStream::from(content.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|e| {
                let err = classify(object_key, e);
                error!(key = object_key, error = %err, "[PUBLISH] Upload failed");
                err
            })?;

        let location = self.location(destination, object_key);
        info!(key = object_key, location = %location, "[PUBLISH] Digest uploaded");
        Ok(location)
    }
}
