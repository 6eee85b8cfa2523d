use std::{env, fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::info;

const MAX_DELIVERY_LEAD_DAYS: i64 = 3650;

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Postgres connection string; the in-memory store is used without one
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub delivery_lead_days: i64,
    pub image_public_url: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if database_url.is_none() {
            info!("DATABASE_URL not set, using the in-memory store");
        }

        let delivery_lead_days: i64 = try_load(&lookup, "DELIVERY_LEAD_DAYS", "30")?;
        if !(0..=MAX_DELIVERY_LEAD_DAYS).contains(&delivery_lead_days) {
            anyhow::bail!(
                "DELIVERY_LEAD_DAYS must be between 0 and {MAX_DELIVERY_LEAD_DAYS}, got {delivery_lead_days}"
            );
        }

        Ok(Self {
            database_url,
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            delivery_lead_days,
            image_public_url: try_load(&lookup, "IMAGE_PUBLIC_URL", "http://localhost:9000/images")?,
        })
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e: T::Err| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.delivery_lead_days, 30);
        assert_eq!(config.image_public_url, "http://localhost:9000/images");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/drones"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("DELIVERY_LEAD_DAYS", " 14 "),
        ]))
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/drones"));
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.delivery_lead_days, 14);
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        let err = Config::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "many")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));

        assert!(Config::from_lookup(lookup(&[("DELIVERY_LEAD_DAYS", "-1")])).is_err());
    }
}
