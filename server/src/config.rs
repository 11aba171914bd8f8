//! Server configuration
//!
//! Configuration is loaded from environment variables. See `.env.example` for documentation.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::segmentation::FallbackParams;
use crate::session::SessionConfig;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Root of per-session workspaces (staged uploads, outputs)
    pub data_dir: PathBuf,

    /// Session lifecycle configuration
    pub session: SessionLifecycleConfig,

    /// Upload configuration
    pub upload: UploadConfig,

    /// Threshold fallback parameters
    pub fallback: FallbackParams,

    /// Static file serving configuration
    pub static_files: StaticFilesConfig,
}

/// Session lifecycle configuration
#[derive(Debug, Clone)]
pub struct SessionLifecycleConfig {
    /// Inactivity after which a session is swept
    pub timeout: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum upload size in bytes
    pub max_upload_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StaticFilesConfig {
    /// Directory with the built frontend (SPA), if any
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: env::temp_dir().join("seedseg"),
            session: SessionLifecycleConfig::default(),
            upload: UploadConfig::default(),
            fallback: FallbackParams::default(),
            static_files: StaticFilesConfig::default(),
        }
    }
}

impl Default for SessionLifecycleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 500 * 1024 * 1024, // 500 MB
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }
        if let Ok(dir) = env::var("DATA_DIR")
            && !dir.is_empty()
        {
            config.data_dir = PathBuf::from(dir);
        }

        // Session config
        if let Ok(val) = env::var("SESSION_TIMEOUT_HOURS")
            && let Ok(hours) = val.parse::<u64>()
        {
            config.session.timeout = Duration::from_secs(hours * 60 * 60);
        }
        if let Ok(val) = env::var("SESSION_SWEEP_INTERVAL_SECS")
            && let Ok(secs) = val.parse::<u64>()
            && secs > 0
        {
            config.session.sweep_interval = Duration::from_secs(secs);
        }

        // Upload config
        if let Ok(val) = env::var("MAX_UPLOAD_SIZE_MB")
            && let Ok(mb) = val.parse::<usize>()
        {
            config.upload.max_upload_size = mb * 1024 * 1024;
        }

        // Fallback segmentation
        if let Ok(val) = env::var("FALLBACK_RADIUS")
            && let Ok(radius) = val.parse()
        {
            config.fallback.radius = radius;
        }
        if let Ok(val) = env::var("FALLBACK_MIN_THRESHOLD")
            && let Ok(threshold) = val.parse()
        {
            config.fallback.min_threshold = threshold;
        }
        if let Ok(val) = env::var("FALLBACK_SEED_RATIO")
            && let Ok(ratio) = val.parse()
        {
            config.fallback.seed_ratio = ratio;
        }

        // Static files
        if let Ok(dir) = env::var("STATIC_FILES_DIR")
            && !dir.is_empty()
        {
            config.static_files.dir = Some(PathBuf::from(dir));
        }

        config
    }

    /// Settings for the session store
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: self.session.timeout,
            data_dir: self.data_dir.clone(),
        }
    }
}
