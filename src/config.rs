use std::env;

/// Relay configuration, read once at boot from environment variables with sensible defaults.
///
/// Environment variables:
/// - `DATABASE_PATH` — sqlite file path (default: `data/relay.db`)
/// - `CALLBACK_TTL_SECONDS` — how long a KakaoTalk callback URL remains usable (default: 55)
/// - `SESSION_PAIRING_TTL_SECONDS` — how long a plugin-initiated session stays `pending_pairing` (default: 300)
/// - `KAKAO_SIGNATURE_SECRET` — optional HMAC secret used to verify inbound webhook signatures
/// - `SSE_QUEUE_CAPACITY` — per-subscriber buffered event capacity before it is dropped as slow (default: 64)
/// - `HEARTBEAT_INTERVAL_SECONDS` — SSE keep-alive comment interval (default: 15)
/// - `RATE_LIMIT_PAIRING` — max pairing-code generation attempts per window per conversation (default: 3)
/// - `RATE_LIMIT_PAIRING_WINDOW_SECONDS` — window for the above (default: 300)
/// - `PORT` / `ROCKET_PORT` — listen port (default: 8080)
/// - `LOG_LEVEL` — set to `debug` to enable per-request detail logging (see `debug_logging_enabled`);
///   read directly at its call sites rather than stored here, since it gates logging, not behavior
pub struct RelayConfig {
    pub database_path: String,
    pub callback_ttl_secs: i64,
    pub session_pairing_ttl_secs: i64,
    pub kakao_signature_secret: Option<String>,
    pub sse_queue_capacity: usize,
    pub heartbeat_interval_secs: u64,
    pub pairing_rate_limit_max: usize,
    pub pairing_rate_limit_window_secs: u64,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            database_path: "data/relay.db".to_string(),
            callback_ttl_secs: 55,
            session_pairing_ttl_secs: 300,
            kakao_signature_secret: None,
            sse_queue_capacity: 64,
            heartbeat_interval_secs: 15,
            pairing_rate_limit_max: 3,
            pairing_rate_limit_window_secs: 300,
            port: 8080,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("DATABASE_PATH") {
            config.database_path = val;
        }
        if let Ok(val) = env::var("CALLBACK_TTL_SECONDS")
            && let Ok(n) = val.parse::<i64>()
        {
            config.callback_ttl_secs = n;
        }
        if let Ok(val) = env::var("SESSION_PAIRING_TTL_SECONDS")
            && let Ok(n) = val.parse::<i64>()
        {
            config.session_pairing_ttl_secs = n;
        }
        if let Ok(val) = env::var("KAKAO_SIGNATURE_SECRET") {
            config.kakao_signature_secret = Some(val);
        }
        if let Ok(val) = env::var("SSE_QUEUE_CAPACITY")
            && let Ok(n) = val.parse::<usize>()
        {
            config.sse_queue_capacity = n;
        }
        if let Ok(val) = env::var("HEARTBEAT_INTERVAL_SECONDS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.heartbeat_interval_secs = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_PAIRING")
            && let Ok(n) = val.parse::<usize>()
        {
            config.pairing_rate_limit_max = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_PAIRING_WINDOW_SECONDS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.pairing_rate_limit_window_secs = n;
        }
        if let Ok(val) = env::var("PORT").or_else(|_| env::var("ROCKET_PORT"))
            && let Ok(n) = val.parse::<u16>()
        {
            config.port = n;
        }

        config
    }
}
