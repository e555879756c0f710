use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Image types accepted when `ALLOWED_IMAGE_TYPES` is not set.
pub const DEFAULT_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/heic",
    "image/heif",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub uploads: UploadLimits,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket that photo objects live in. For the local backend this is a
    /// directory under `local_storage_path`.
    pub bucket: String,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// Prefix for public URLs handed out by the local backend
    pub public_base_url: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
}

/// Size and type limits applied during ingestion.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub allowed_types: Vec<String>,
    /// Maximum size of a single guest photo in bytes
    pub max_guest_upload_size: u64,
    /// Maximum size of an event cover image in bytes
    pub max_cover_image_size: u64,
    /// Maximum number of files accepted by one batch request
    pub max_batch_files: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "event-photos".to_string(),
            local_storage_path: "./files".to_string(),
            public_base_url: String::new(),
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            allowed_types: DEFAULT_IMAGE_TYPES.iter().map(|t| t.to_string()).collect(),
            max_guest_upload_size: 10 * 1024 * 1024, // 10MB
            max_cover_image_size: 5 * 1024 * 1024,   // 5MB
            max_batch_files: 20,
        }
    }
}

impl UploadLimits {
    pub fn is_allowed_type(&self, mime_type: &str) -> bool {
        self.allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(mime_type))
    }

    /// Request body limit for the batch route: every file at full size plus
    /// headroom for multipart framing and text fields.
    pub fn batch_body_limit(&self) -> usize {
        (self.max_guest_upload_size as usize)
            .saturating_mul(self.max_batch_files)
            .saturating_add(1024 * 1024)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let defaults = UploadLimits::default();

        let max_guest_upload_size = std::env::var("MAX_GUEST_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_guest_upload_size);

        let max_cover_image_size = std::env::var("MAX_COVER_IMAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_cover_image_size);

        let max_batch_files = std::env::var("MAX_BATCH_FILES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_batch_files);

        let allowed_types: Vec<String> = std::env::var("ALLOWED_IMAGE_TYPES")
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_types);

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            _ => StorageBackend::Local,
        };

        let bucket = std::env::var("BUCKET").unwrap_or_else(|_| "event-photos".to_string());
        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_default();

        let gcs_bucket = std::env::var("GCS_BUCKET").ok();
        let gcs_credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                bucket,
                local_storage_path,
                public_base_url,
                gcs_bucket,
                gcs_credentials_file,
            },
            uploads: UploadLimits {
                allowed_types,
                max_guest_upload_size,
                max_cover_image_size,
                max_batch_files,
            },
            test_mode,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, StorageBackend::Gcs) && self.storage.gcs_bucket.is_none()
        {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        if self.storage.bucket.is_empty()
            || self.storage.bucket.contains('/')
            || self.storage.bucket.contains("..")
        {
            return Err(ConfigError::ValidationError(
                "BUCKET must be a single non-empty path segment".to_string(),
            ));
        }

        if self.uploads.max_guest_upload_size == 0 || self.uploads.max_cover_image_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload size limits must be greater than 0".to_string(),
            ));
        }

        if self.uploads.max_batch_files == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_BATCH_FILES must be greater than 0".to_string(),
            ));
        }

        if self.uploads.allowed_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "ALLOWED_IMAGE_TYPES cannot be empty".to_string(),
            ));
        }

        if let Some(bad) = self
            .uploads
            .allowed_types
            .iter()
            .find(|t| !t.starts_with("image/"))
        {
            return Err(ConfigError::ValidationError(format!(
                "ALLOWED_IMAGE_TYPES may only list image types, got '{bad}'"
            )));
        }

        if self.uploads.max_cover_image_size > self.uploads.max_guest_upload_size {
            tracing::warn!(
                "Cover image limit ({} bytes) exceeds the guest upload limit ({} bytes)",
                self.uploads.max_cover_image_size,
                self.uploads.max_guest_upload_size
            );
        }

        Ok(())
    }
}
