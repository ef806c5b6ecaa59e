/// Signal API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Allowed CORS origin. `None` allows any origin.
    pub cors_origin: Option<String>,
    /// Interval between server pings; a connection silent for a whole
    /// interval is closed.
    pub heartbeat_interval_ms: u64,
    /// Joining a room leaves whatever room the connection was in before.
    pub enforce_single_room: bool,
    /// Bearer token required by the project publish endpoint, if set.
    pub publish_token: Option<String>,
}

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 25_000;

impl Config {
    /// Load configuration from environment variables. Every variable is
    /// optional; unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            port: var("PORT").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_PORT),
            cors_origin: var("CORS_ORIGIN").filter(|v| v != "*"),
            heartbeat_interval_ms: var("HEARTBEAT_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS),
            enforce_single_room: var("ENFORCE_SINGLE_ROOM")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),
            publish_token: var("PUBLISH_TOKEN"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
