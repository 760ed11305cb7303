/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Broker credentials
    pub broker_api_key: String,
    pub broker_secret: String,
    pub broker_base_url: String,
    pub broker_stream_url: String,

    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,

    // Database
    pub database_url: String,

    // Watchlist config file path
    pub watchlist_path: String,

    // Refresh cadence
    pub history_refresh_secs: u64,
    pub position_refresh_secs: u64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            broker_api_key: required_env("BROKER_API_KEY"),
            broker_secret: required_env("BROKER_SECRET"),
            broker_base_url: optional_env("BROKER_BASE_URL")
                .unwrap_or_else(|| "https://api.broker.example.com".to_string()),
            broker_stream_url: optional_env("BROKER_STREAM_URL")
                .unwrap_or_else(|| "wss://stream.broker.example.com".to_string()),
            dashboard_token: required_env("DASHBOARD_TOKEN"),
            dashboard_port: optional_env("DASHBOARD_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            database_url: required_env("DATABASE_URL"),
            watchlist_path: optional_env("WATCHLIST_PATH")
                .unwrap_or_else(|| "config/watchlist.toml".to_string()),
            history_refresh_secs: optional_env("HISTORY_REFRESH_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            position_refresh_secs: optional_env("POSITION_REFRESH_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
