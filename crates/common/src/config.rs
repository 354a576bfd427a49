use std::time::Duration;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Market data credentials
    pub twelvedata_api_key: Option<String>,

    // Narrative summaries
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,

    // Series cache persistence
    pub database_url: String,
    pub cache_ttl: Duration,

    // Scheduling
    pub provider_min_spacing: Duration,
    pub scan_batch_size: usize,
    pub scan_batch_pause: Duration,

    // Universe / parameter file path
    pub universe_config_path: String,
}

impl Config {
    const MIN_TTL_MINUTES: u64 = 30;
    const MAX_TTL_MINUTES: u64 = 60;

    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let ttl_minutes = optional_env("CACHE_TTL_MINUTES")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(Self::MIN_TTL_MINUTES)
            .clamp(Self::MIN_TTL_MINUTES, Self::MAX_TTL_MINUTES);

        Config {
            twelvedata_api_key: optional_env("TWELVEDATA_API_KEY").filter(|k| !k.is_empty()),
            openai_api_key: optional_env("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            openai_model: optional_env("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            dashboard_token: required_env("DASHBOARD_TOKEN"),
            dashboard_port: optional_env("DASHBOARD_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            database_url: optional_env("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://swingscan-cache.db?mode=rwc".to_string()),
            cache_ttl: Duration::from_secs(ttl_minutes * 60),
            provider_min_spacing: Duration::from_millis(
                optional_env("PROVIDER_MIN_SPACING_MS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(8_000),
            ),
            scan_batch_size: optional_env("SCAN_BATCH_SIZE")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(5),
            scan_batch_pause: Duration::from_millis(
                optional_env("SCAN_BATCH_PAUSE_MS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5_000),
            ),
            universe_config_path: optional_env("UNIVERSE_CONFIG_PATH")
                .unwrap_or_else(|| "config/universe.toml".to_string()),
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
