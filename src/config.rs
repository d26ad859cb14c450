use crate::domain::{Decimal, ReferralSettings};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Remote plan service; plans come from the local database when unset.
    pub plan_service_url: Option<String>,
    /// Seed for the referral program settings on first start.
    pub referral_enabled: bool,
    pub referral_percentages: Vec<Decimal>,
    pub min_withdrawal: Decimal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let plan_service_url = env_map
            .get("PLAN_SERVICE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let referral_enabled = match env_map
            .get("REFERRAL_ENABLED")
            .map(|s| s.as_str())
            .unwrap_or("true")
        {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "REFERRAL_ENABLED".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let referral_percentages = ReferralSettings::parse_percentages(
            env_map
                .get("REFERRAL_PERCENTAGES")
                .map(|s| s.as_str())
                .unwrap_or("10,5,3,2,1"),
        )
        .map_err(|reason| ConfigError::InvalidValue("REFERRAL_PERCENTAGES".to_string(), reason))?;

        let min_withdrawal = Decimal::from_str(
            env_map
                .get("MIN_WITHDRAWAL")
                .map(|s| s.as_str())
                .unwrap_or("10"),
        )
        .ok()
        .filter(|d| !d.is_negative())
        .ok_or_else(|| {
            ConfigError::InvalidValue(
                "MIN_WITHDRAWAL".to_string(),
                "must be a non-negative decimal".to_string(),
            )
        })?;

        Ok(Config {
            port,
            database_path,
            plan_service_url,
            referral_enabled,
            referral_percentages,
            min_withdrawal,
        })
    }

    /// Referral settings seeded into the database on first start.
    pub fn referral_settings(&self) -> ReferralSettings {
        ReferralSettings {
            enabled: self.referral_enabled,
            percentages: self.referral_percentages.clone(),
        }
    }

    /// Configuration for tests and embedding: defaults plus a database path.
    pub fn for_database(database_path: impl Into<String>) -> Self {
        Config {
            port: 0,
            database_path: database_path.into(),
            plan_service_url: None,
            referral_enabled: true,
            referral_percentages: ReferralSettings::parse_percentages("10,5,3,2,1")
                .unwrap_or_default(),
            min_withdrawal: Decimal::from_i64(10),
        }
    }
}
