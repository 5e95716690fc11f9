use crate::config::types::{
    Config, CrawlerConfig, LoggingConfig, OutputConfig, SiteConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

const MAX_WORKERS: usize = 256;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    validate_logging_config(&config.logging)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if let Some(count) = config.worker_count {
        if count < 1 || count > MAX_WORKERS {
            return Err(ConfigError::Validation(format!(
                "worker_count must be between 1 and {}, got {}",
                MAX_WORKERS, count
            )));
        }
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.base_url, "site base_url")
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    let level = config.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::Validation(format!(
            "log level must be one of {:?}, got '{}'",
            LOG_LEVELS, config.level
        )));
    }

    if let Some(destination) = &config.destination {
        if destination.trim().is_empty() {
            return Err(ConfigError::Validation(
                "log destination cannot be blank".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates seed URLs
///
/// An empty seed list is allowed: the pool starts and stops immediately.
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        validate_http_url(seed, "seed URL")?;
    }
    Ok(())
}

fn validate_http_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, raw, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, raw
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_worker_count() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.worker_count = Some(0);
        assert!(validate_crawler_config(&config).is_err());

        config.worker_count = Some(MAX_WORKERS + 1);
        assert!(validate_crawler_config(&config).is_err());

        config.worker_count = Some(8);
        assert!(validate_crawler_config(&config).is_ok());
    }

    #[test]
    fn test_validate_max_attempts() {
        let config = CrawlerConfig {
            max_attempts: 0,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_validate_crawler_name() {
        let mut ua = UserAgentConfig::default();
        assert!(validate_user_agent_config(&ua).is_ok());

        ua.crawler_name = "Geo Harvest".to_string();
        assert!(validate_user_agent_config(&ua).is_err());

        ua.crawler_name = String::new();
        assert!(validate_user_agent_config(&ua).is_err());
    }

    #[test]
    fn test_validate_seeds() {
        assert!(validate_seeds(&[]).is_ok());
        assert!(validate_seeds(&["https://www.flickr.com/search/?text=paris".to_string()]).is_ok());
        assert!(validate_seeds(&["http://127.0.0.1:8080/search".to_string()]).is_ok());

        assert!(matches!(
            validate_seeds(&["not a url".to_string()]),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_seeds(&["ftp://example.com/list".to_string()]),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_log_level() {
        let mut logging = LoggingConfig::default();
        assert!(validate_logging_config(&logging).is_ok());

        logging.level = "WARN".to_string();
        assert!(validate_logging_config(&logging).is_ok());

        logging.level = "verbose".to_string();
        assert!(validate_logging_config(&logging).is_err());

        logging.level = "info".to_string();
        logging.destination = Some("  ".to_string());
        assert!(validate_logging_config(&logging).is_err());
    }
}
