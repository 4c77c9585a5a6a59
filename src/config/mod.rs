use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<usize>,
    pub max_nested_depth: usize,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    /// Directory holding `<namespace>.yaml` schema documents
    pub schema_dir: PathBuf,
    /// None waits on the collection lock indefinitely
    pub lock_timeout_ms: Option<u64>,
    pub lock_retry_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Guard verdict when no access rule decides
    pub guard_default_allow: bool,
    pub enable_audit_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub redact_write_results: bool,
    pub not_found_is_error: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Filter overrides
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_MAX_NESTED_DEPTH") {
            self.filter.max_nested_depth = v.parse().unwrap_or(self.filter.max_nested_depth);
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // Store overrides
        if let Ok(v) = env::var("STORE_DATA_DIR") {
            self.store.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("STORE_SCHEMA_DIR") {
            self.store.schema_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("STORE_LOCK_TIMEOUT_MS") {
            self.store.lock_timeout_ms = v.parse().ok();
        }
        if let Ok(v) = env::var("STORE_LOCK_RETRY_INTERVAL_MS") {
            self.store.lock_retry_interval_ms = v.parse().unwrap_or(self.store.lock_retry_interval_ms);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_GUARD_DEFAULT_ALLOW") {
            self.security.guard_default_allow = v.parse().unwrap_or(self.security.guard_default_allow);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }

        // Pipeline overrides
        if let Ok(v) = env::var("PIPELINE_REDACT_WRITE_RESULTS") {
            self.pipeline.redact_write_results = v.parse().unwrap_or(self.pipeline.redact_write_results);
        }
        if let Ok(v) = env::var("PIPELINE_NOT_FOUND_IS_ERROR") {
            self.pipeline.not_found_is_error = v.parse().unwrap_or(self.pipeline.not_found_is_error);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig {
                max_limit: Some(1000),
                max_nested_depth: 10,
                debug_logging: true,
            },
            store: StoreConfig {
                data_dir: PathBuf::from("data"),
                schema_dir: PathBuf::from("schemas"),
                lock_timeout_ms: None,
                lock_retry_interval_ms: 25,
            },
            security: SecurityConfig {
                guard_default_allow: true,
                enable_audit_logging: false,
            },
            pipeline: PipelineConfig {
                redact_write_results: true,
                not_found_is_error: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig {
                max_limit: Some(500),
                max_nested_depth: 5,
                debug_logging: false,
            },
            store: StoreConfig {
                data_dir: PathBuf::from("/var/lib/monk-data"),
                schema_dir: PathBuf::from("/etc/monk-data/schemas"),
                lock_timeout_ms: Some(10_000),
                lock_retry_interval_ms: 50,
            },
            security: SecurityConfig {
                guard_default_allow: false,
                enable_audit_logging: true,
            },
            pipeline: PipelineConfig {
                redact_write_results: true,
                not_found_is_error: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                max_limit: Some(100),
                max_nested_depth: 3,
                debug_logging: false,
            },
            store: StoreConfig {
                data_dir: PathBuf::from("/var/lib/monk-data"),
                schema_dir: PathBuf::from("/etc/monk-data/schemas"),
                lock_timeout_ms: Some(5_000),
                lock_retry_interval_ms: 50,
            },
            security: SecurityConfig {
                guard_default_allow: false,
                enable_audit_logging: true,
            },
            pipeline: PipelineConfig {
                redact_write_results: true,
                not_found_is_error: true,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

// Helper macro for common checks
#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}
