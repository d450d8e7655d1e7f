//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/prepaid-billing").
    pub data_dir: String,

    /// Admin API key; admin routes reject every request when unset.
    pub admin_api_key: Option<String>,

    /// HS256 secret for account tokens; account routes reject every request when unset.
    pub jwt_secret: Option<String>,

    /// Expected JWT audience (default: "prepaid-billing").
    pub jwt_audience: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Secrets file structure.
#[derive(Debug, Deserialize)]
struct BillingSecrets {
    #[serde(default)]
    admin_api_key: Option<String>,
    #[serde(default)]
    jwt_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and the secrets file.
    #[must_use]
    pub fn from_env() -> Self {
        let (admin_api_key, jwt_secret) = load_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/prepaid-billing".into()),
            admin_api_key,
            jwt_secret,
            jwt_audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "prepaid-billing".into()),
            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()),
            ),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/prepaid-billing".into(),
            admin_api_key: None,
            jwt_secret: None,
            jwt_audience: "prepaid-billing".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Load secrets from file, falling back to the environment per value.
fn load_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/billing.json",
        "prepaid-billing/.secrets/billing.json",
        "../.secrets/billing.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<BillingSecrets>(path) {
            tracing::info!(path = %path, "Loaded billing secrets from file");
            return (
                secrets
                    .admin_api_key
                    .or_else(|| std::env::var("ADMIN_API_KEY").ok()),
                secrets.jwt_secret.or_else(|| std::env::var("JWT_SECRET").ok()),
            );
        }
    }

    tracing::debug!("Billing secrets file not found, using environment variables");
    (
        std::env::var("ADMIN_API_KEY").ok(),
        std::env::var("JWT_SECRET").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
