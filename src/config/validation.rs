use crate::config::types::{Config, SteamConfig, StoreConfig};
use crate::storage::StoreKind;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if let Some(steam) = &config.seeker.steam {
        validate_steam_config(steam)?;
    }
    validate_store_config(&config.store)?;
    Ok(())
}

/// Validates the steam seeker section
fn validate_steam_config(config: &SteamConfig) -> Result<(), ConfigError> {
    validate_http_url("seeker.steam.portal", &config.portal)?;
    validate_http_url("seeker.steam.store_portal", &config.store_portal)?;

    if config.key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "seeker.steam.key cannot be empty".to_string(),
        ));
    }

    if config.worker < 1 || config.worker > 256 {
        return Err(ConfigError::Validation(format!(
            "seeker.steam.worker must be between 1 and 256, got {}",
            config.worker
        )));
    }

    if config.retry_interval.is_zero() {
        return Err(ConfigError::Validation(
            "seeker.steam.retry_interval must be greater than zero".to_string(),
        ));
    }

    if config.grace_period.is_zero() {
        return Err(ConfigError::Validation(
            "seeker.steam.grace_period must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Validates the store section
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    let kind = StoreKind::from_config_str(&config.kind).ok_or_else(|| {
        ConfigError::Validation(format!("Unknown store.type '{}'", config.kind))
    })?;

    if kind == StoreKind::Embedded && config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store.path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}
