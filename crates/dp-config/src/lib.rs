//! Environment-driven startup configuration.
//!
//! All values default to the spec's reference constants when unset, and
//! are read once at process start.

use std::net::SocketAddr;
use std::str::FromStr;

use dp_breaker::BreakerConfig;
use dp_canary::CanaryThresholds;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn breaker_config_from_env() -> BreakerConfig {
    let defaults = BreakerConfig::default();
    BreakerConfig {
        max_locks_in_window: env_or("DP_BREAKER_MAX_LOCKS_IN_WINDOW", defaults.max_locks_in_window),
        window_seconds: env_or("DP_BREAKER_WINDOW_SECONDS", defaults.window_seconds),
        cooldown_seconds: env_or("DP_BREAKER_COOLDOWN_SECONDS", defaults.cooldown_seconds),
    }
}

pub fn canary_thresholds_from_env() -> CanaryThresholds {
    let defaults = CanaryThresholds::default();
    CanaryThresholds {
        error_rate_threshold: env_or("DP_CANARY_ERROR_RATE_THRESHOLD", defaults.error_rate_threshold),
        heartbeat_loss_threshold: env_or(
            "DP_CANARY_HEARTBEAT_LOSS_THRESHOLD",
            defaults.heartbeat_loss_threshold,
        ),
    }
}

pub fn bind_addr_from_env() -> SocketAddr {
    std::env::var("DP_BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)))
}

/// CORS allow-list. Defaults to localhost dev origins; overridable with a
/// comma-separated `DP_CORS_ORIGINS`.
pub fn cors_allowed_origins_from_env() -> Vec<String> {
    match std::env::var("DP_CORS_ORIGINS") {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.split(',').map(|s| s.trim().to_string()).collect()
        }
        _ => vec![
            "http://localhost".to_string(),
            "http://127.0.0.1".to_string(),
            "http://localhost:3000".to_string(),
            "http://127.0.0.1:3000".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // serialize tests that mutate process env
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn breaker_config_defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DP_BREAKER_MAX_LOCKS_IN_WINDOW");
        let cfg = breaker_config_from_env();
        assert_eq!(cfg.max_locks_in_window, 50);
        assert_eq!(cfg.window_seconds, 300);
        assert_eq!(cfg.cooldown_seconds, 600);
    }

    #[test]
    fn breaker_config_honors_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DP_BREAKER_MAX_LOCKS_IN_WINDOW", "7");
        let cfg = breaker_config_from_env();
        assert_eq!(cfg.max_locks_in_window, 7);
        std::env::remove_var("DP_BREAKER_MAX_LOCKS_IN_WINDOW");
    }

    #[test]
    fn bind_addr_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DP_BIND_ADDR");
        assert_eq!(bind_addr_from_env(), SocketAddr::from(([0, 0, 0, 0], 8080)));
    }

    #[test]
    fn cors_origins_parses_comma_separated_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DP_CORS_ORIGINS", "https://a.example, https://b.example");
        let origins = cors_allowed_origins_from_env();
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
        std::env::remove_var("DP_CORS_ORIGINS");
    }
}
