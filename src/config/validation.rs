use crate::config::types::{
    Config, DelayConfig, DelayMethod, OutputConfig, ScraperConfig, SessionConfig, VpnConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_delay_config(&config.delay)?;
    validate_session_config(&config.session)?;
    validate_vpn_config(&config.vpn)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates scraper configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if config.attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "attempts must be >= 1, got {}",
            config.attempts
        )));
    }

    if config.limit == Some(0) {
        return Err(ConfigError::Validation(
            "limit must be >= 1 when set".to_string(),
        ));
    }

    if let Some(referer) = &config.referer {
        Url::parse(referer)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid referer: {}", e)))?;
    }

    Ok(())
}

/// Validates delay configuration
fn validate_delay_config(config: &DelayConfig) -> Result<(), ConfigError> {
    match config.method {
        DelayMethod::Fixed => {
            let wait = config.wait_secs.ok_or_else(|| {
                ConfigError::Validation("fixed delay requires wait-secs".to_string())
            })?;
            check_seconds("wait-secs", wait)?;
        }
        DelayMethod::Random => {
            let (min, max) = match (config.min_secs, config.max_secs) {
                (Some(min), Some(max)) => (min, max),
                _ => {
                    return Err(ConfigError::Validation(
                        "random delay requires min-secs and max-secs".to_string(),
                    ))
                }
            };
            check_seconds("min-secs", min)?;
            check_seconds("max-secs", max)?;

            if min > max {
                return Err(ConfigError::Validation(format!(
                    "min-secs ({}) must not exceed max-secs ({})",
                    min, max
                )));
            }
        }
    }

    Ok(())
}

fn check_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validates session configuration
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "session timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user-agents must contain at least one entry".to_string(),
        ));
    }

    if config.user_agents.iter().any(|agent| agent.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agents cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates VPN configuration
///
/// Commands are only required once rotation is enabled.
fn validate_vpn_config(config: &VpnConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.connect.is_empty() {
        return Err(ConfigError::Validation(
            "vpn.connect command is required when vpn is enabled".to_string(),
        ));
    }

    if config.disconnect.is_empty() {
        return Err(ConfigError::Validation(
            "vpn.disconnect command is required when vpn is enabled".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "vpn timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.export_dir.is_empty() {
        return Err(ConfigError::Validation(
            "export-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}
