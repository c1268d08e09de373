use crate::error::{Error, Result};
use crate::models::interview::InterviewMode;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub api_rps: u32,
    pub meeting_base_url: String,
    pub slot_provider_url: Option<String>,
    pub notification_webhook_url: Option<String>,
    pub notification_secret: String,
    pub start_early_minutes: i64,
    pub start_grace_minutes: i64,
    pub workday_start_hour: u32,
    pub workday_end_hour: u32,
    pub confirmation_required_modes: Vec<InterviewMode>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:8080"),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            jwt_secret: get_env("JWT_SECRET")?,
            api_rps: get_env_parse_or("API_RPS", 100)?,
            meeting_base_url: get_env_or("MEETING_BASE_URL", "https://meet.example.com"),
            slot_provider_url: env::var("SLOT_PROVIDER_URL").ok().filter(|v| !v.is_empty()),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            notification_secret: get_env_or("NOTIFICATION_SECRET", ""),
            start_early_minutes: get_env_parse_or("START_EARLY_MINUTES", 15)?,
            start_grace_minutes: get_env_parse_or("START_GRACE_MINUTES", 60)?,
            workday_start_hour: get_env_parse_or("WORKDAY_START_HOUR", 9)?,
            workday_end_hour: get_env_parse_or("WORKDAY_END_HOUR", 17)?,
            confirmation_required_modes: parse_modes(&get_env_or(
                "CONFIRMATION_REQUIRED_MODES",
                "",
            ))?,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.workday_start_hour >= self.workday_end_hour || self.workday_end_hour > 24 {
            return Err(Error::Config(format!(
                "Invalid working day {}..{}",
                self.workday_start_hour, self.workday_end_hour
            )));
        }
        if self.start_early_minutes < 0 || self.start_grace_minutes < 0 {
            return Err(Error::Config(
                "Start window offsets must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for running against the in-memory ledger with no outbound calls.
    pub fn local(jwt_secret: &str) -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            api_rps: 1000,
            meeting_base_url: "https://meet.example.com".to_string(),
            slot_provider_url: None,
            notification_webhook_url: None,
            notification_secret: String::new(),
            start_early_minutes: 15,
            start_grace_minutes: 60,
            workday_start_hour: 9,
            workday_end_hour: 17,
            confirmation_required_modes: Vec::new(),
        }
    }
}

fn parse_modes(raw: &str) -> Result<Vec<InterviewMode>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|code| {
            code.parse::<InterviewMode>().map_err(|_| {
                Error::Config(format!(
                    "Invalid value for CONFIRMATION_REQUIRED_MODES: {}",
                    code
                ))
            })
        })
        .collect()
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_confirmation_modes() {
        let modes = parse_modes("HR, HM").unwrap();
        assert_eq!(modes, vec![InterviewMode::Hr, InterviewMode::HiringManager]);
        assert!(parse_modes("").unwrap().is_empty());
        assert!(parse_modes("XX").is_err());
    }

    #[test]
    fn rejects_inverted_working_day() {
        let mut config = Config::local("secret");
        config.workday_start_hour = 18;
        assert!(config.check().is_err());
    }
}
