// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

/// Number of leading single-answer questions in a simulation test.
pub const SIMULATION_SINGLE_COUNT: i64 = 50;

/// Number of trailing multiple-answer questions in a simulation test.
pub const SIMULATION_MULTIPLE_COUNT: i64 = 10;

/// Flags shown per page in the moderation list.
pub const FLAGS_PER_PAGE: i64 = 30;

/// Size of the public leaderboard.
pub const LEADERBOARD_SIZE: i64 = 50;

/// Where converted documents are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    S3 { bucket: String, region: String },
    Local { dir: PathBuf },
    Memory,
}

#[derive(Debug, Clone, Default)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    /// Public base URL of this service; callbacks land on
    /// `{redirect_base}/api/auth/oauth/{provider}/callback`.
    pub redirect_base: String,
    pub google: Option<OAuthClient>,
    pub facebook: Option<OAuthClient>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Session token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub storage: StorageBackend,
    pub soffice_bin: String,
    pub timer_seconds_per_question: i64,
    pub simulation_duration: i64,
    pub oauth: OAuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: String::new(),
            jwt_expiration: 30 * 24 * 60 * 60,
            rust_log: "info".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            admin_username: None,
            admin_password: None,
            storage: StorageBackend::Memory,
            soffice_bin: "soffice".to_string(),
            timer_seconds_per_question: 60,
            simulation_duration: 2 * 60 * 60,
            oauth: OAuthConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();
        let default = Self::default();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let storage = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("s3") => StorageBackend::S3 {
                bucket: env::var("STORAGE_BUCKET")
                    .expect("STORAGE_BUCKET must be set for the s3 backend"),
                region: env::var("STORAGE_REGION").unwrap_or_else(|_| "eu-north-1".to_string()),
            },
            Ok("local") => StorageBackend::Local {
                dir: env::var("STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("storage")),
            },
            _ => StorageBackend::Memory,
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parsed_var("JWT_EXPIRATION").unwrap_or(default.jwt_expiration),
            rust_log: env::var("RUST_LOG").unwrap_or(default.rust_log),
            bind_addr: env::var("BIND_ADDR").unwrap_or(default.bind_addr),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            storage,
            soffice_bin: env::var("SOFFICE_BIN").unwrap_or(default.soffice_bin),
            timer_seconds_per_question: parsed_var("TIMER_SECONDS_PER_QUESTION")
                .unwrap_or(default.timer_seconds_per_question),
            simulation_duration: parsed_var("SIMULATION_DURATION")
                .unwrap_or(default.simulation_duration),
            oauth: OAuthConfig {
                redirect_base: env::var("OAUTH_REDIRECT_BASE")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                google: oauth_client("GOOGLE"),
                facebook: oauth_client("FACEBOOK"),
            },
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// A provider is enabled only when both its id and secret are present.
fn oauth_client(prefix: &str) -> Option<OAuthClient> {
    let client_id = env::var(format!("{prefix}_CLIENT_ID")).ok()?;
    let client_secret = env::var(format!("{prefix}_CLIENT_SECRET")).ok()?;
    Some(OAuthClient {
        client_id,
        client_secret,
    })
}
