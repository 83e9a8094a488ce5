use std::env;
use std::path::PathBuf;

/// Runtime configuration for the submission portal
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// TCP port the server binds to (default: 3000)
    pub port: u16,

    /// Directory holding the sheet, the status file and the blob store
    /// (default: "data")
    pub data_dir: PathBuf,

    /// Plaintext admin secret the dashboard endpoints are gated on
    pub admin_password: String,

    /// Maximum accepted upload size in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Age in hours after which abandoned staging files are swept
    /// (default: 24)
    pub staging_max_age_hours: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            data_dir: PathBuf::from("data"),
            admin_password: "changeme".to_string(),
            max_file_size: 50 * 1024 * 1024, // 50 MB
            staging_max_age_hours: 24,
        }
    }
}

impl PortalConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.data_dir),

            admin_password: env::var("ADMIN_PASSWORD").unwrap_or(default.admin_password),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            staging_max_age_hours: env::var("STAGING_MAX_AGE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.staging_max_age_hours),
        }
    }

    /// Create config for development (relaxed limits, well-known secret)
    pub fn development() -> Self {
        Self {
            port: 3000,
            data_dir: PathBuf::from("data"),
            admin_password: "changeme".to_string(),
            max_file_size: 50 * 1024 * 1024,
            staging_max_age_hours: 24,
        }
    }

    /// Create config for production (admin secret must come from the environment)
    pub fn production() -> Self {
        let default = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.data_dir),
            admin_password: env::var("ADMIN_PASSWORD")
                .expect("CRITICAL: ADMIN_PASSWORD must be set"),
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),
            staging_max_age_hours: env::var("STAGING_MAX_AGE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
        }
    }
}
