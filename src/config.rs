use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub bind_addr: SocketAddr,
    pub user_name: String,
    pub user_id: i64,
    pub daily_limit_hours: f64,
    pub status_grace: Duration,
    pub reconcile_delay: Duration,
    pub refresh_interval: Option<Duration>,
    pub demo_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            user_name: "Alex Johnson".to_string(),
            user_id: 1,
            daily_limit_hours: 6.0,
            status_grace: Duration::from_millis(1000),
            reconcile_delay: Duration::from_millis(3000),
            refresh_interval: None,
            demo_mode: false,
        }
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = get("PLANNER_API_URL")
            .map(|url| normalize_api_base(&url))
            .unwrap_or(defaults.api_base_url);

        let request_timeout = parse_var::<u64>(&get, "PLANNER_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let bind_addr = parse_var(&get, "PLANNER_BIND")?.unwrap_or(defaults.bind_addr);
        let user_name = get("PLANNER_USER_NAME").unwrap_or(defaults.user_name);
        let user_id = parse_var(&get, "PLANNER_USER_ID")?.unwrap_or(defaults.user_id);

        let daily_limit_hours: f64 =
            parse_var(&get, "PLANNER_DAILY_LIMIT")?.unwrap_or(defaults.daily_limit_hours);
        if !daily_limit_hours.is_finite() || daily_limit_hours < 0.0 {
            return Err(AppError::Config(
                "PLANNER_DAILY_LIMIT must be a non-negative number".to_string(),
            ));
        }

        let status_grace = parse_var::<u64>(&get, "PLANNER_STATUS_GRACE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.status_grace);
        let reconcile_delay = parse_var::<u64>(&get, "PLANNER_RECONCILE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.reconcile_delay);
        let refresh_interval = parse_var::<u64>(&get, "PLANNER_REFRESH_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let demo_mode = match get("PLANNER_DEMO").as_deref() {
            None => defaults.demo_mode,
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => {
                return Err(AppError::Config(format!("PLANNER_DEMO has invalid value '{}'", other)));
            }
        };

        Ok(Self {
            api_base_url,
            request_timeout,
            bind_addr,
            user_name,
            user_id,
            daily_limit_hours,
            status_grace,
            reconcile_delay,
            refresh_interval,
            demo_mode,
        })
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has invalid value '{}'", key, raw))),
    }
}

/// The backend mounts every resource under `/api`; accept base URLs with or
/// without it.
pub fn normalize_api_base(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with("/api") {
        trimmed.to_string()
    } else {
        format!("{}/api", trimmed)
    }
}
