use std::net::SocketAddr;
use std::str::FromStr;
use tracing::{info, warn};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_GAME_TYPE: &str = "trivia";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// When absent the in-memory store is used
    pub database_url: Option<String>,
    /// Randomize question display order when a round starts playing
    pub shuffle_question_order: bool,
    pub default_game_type: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            shuffle_question_order: true,
            default_game_type: DEFAULT_GAME_TYPE.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        info!(
            bind_addr = %config.bind_addr,
            postgres = config.database_url.is_some(),
            shuffle_question_order = config.shuffle_question_order,
            default_game_type = %config.default_game_type,
            "Configuration loaded"
        );
        config
    }

    /// Builds the config from any key lookup. Malformed values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: parse_or("BIND_ADDR", lookup("BIND_ADDR"), defaults.bind_addr),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            shuffle_question_order: parse_or(
                "SHUFFLE_QUESTION_ORDER",
                lookup("SHUFFLE_QUESTION_ORDER"),
                defaults.shuffle_question_order,
            ),
            default_game_type: lookup("DEFAULT_GAME_TYPE")
                .map(|slug| slug.trim().to_string())
                .filter(|slug| !slug.is_empty())
                .unwrap_or(defaults.default_game_type),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = %key, value = %raw, "Invalid config value, using default");
                default
            }
        },
    }
}
