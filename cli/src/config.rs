use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Local tier database. Always present; signed-out and anonymous users
    /// keep their watchlist here.
    pub database_url: String,

    /// Remote tier database. `None` runs local-only: no identity provider is
    /// configured and sign-in reports "not initialized".
    pub remote_database_url: Option<String>,

    /// Namespace of the remote documents (`artifacts/{app_id}/users/...`).
    pub app_id: String,

    /// User key the identity provider signs in as.
    pub app_user: String,

    // =========================
    // Runtime
    // =========================
    /// Cadence of the steady quote refresh.
    pub refresh_interval: Duration,

    /// Bound of the push-notification queue between the remote tier and the
    /// engine. A subscriber that falls further behind gets a sync error.
    pub remote_event_capacity: usize,

    /// Optional JSON catalog replacing the built-in reference set.
    pub catalog_path: Option<PathBuf>,

    /// Structured JSON logs (`APP_ENV=production`).
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            database_url: non_empty("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://watchlist_local.db".to_string()),
            remote_database_url: non_empty("REMOTE_DATABASE_URL"),
            app_id: non_empty("APP_ID").unwrap_or_else(|| "default-app-id".to_string()),
            app_user: non_empty("APP_USER").unwrap_or_else(|| "demo-user".to_string()),

            refresh_interval: Duration::from_secs(
                parsed(non_empty("REFRESH_INTERVAL_SECS"), 15u64).max(1),
            ),
            remote_event_capacity: parsed(non_empty("REMOTE_EVENT_CAPACITY"), 64usize).max(1),
            catalog_path: non_empty("CATALOG_PATH").map(PathBuf::from),
            json_logs: lookup("APP_ENV").as_deref() == Some("production"),
        }
    }
}

fn parsed<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
