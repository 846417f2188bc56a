use crate::config::types::{Config, CrawlerConfig, DirectoryConfig, GatewayEntry, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Smallest accepted chunk width
pub const MIN_CONCURRENCY: usize = 1;

/// Largest accepted chunk width
pub const MAX_CONCURRENCY: usize = 50;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_directory_config(&config.directory)?;
    validate_output_config(&config.output)?;
    validate_gateways(&config.gateways)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between {} and {}, got {}",
            MIN_CONCURRENCY, MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if config.politeness_min_ms > config.politeness_max_ms {
        return Err(ConfigError::Validation(format!(
            "politeness_min_ms ({}) cannot exceed politeness_max_ms ({})",
            config.politeness_min_ms, config.politeness_max_ms
        )));
    }

    if let Some(entry) = &config.entry_url {
        validate_http_url(entry)?;
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

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the record path prefix
fn validate_directory_config(config: &DirectoryConfig) -> Result<(), ConfigError> {
    let prefix = &config.record_path_prefix;
    if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "record_path_prefix must start and end with '/', got '{}'",
            prefix
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("database_path", &config.database_path),
        ("json_path", &config.json_path),
        ("csv_path", &config.csv_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }
    Ok(())
}

/// Validates gateway templates
fn validate_gateways(gateways: &[GatewayEntry]) -> Result<(), ConfigError> {
    if gateways.is_empty() {
        return Err(ConfigError::InvalidGateway(
            "at least one gateway is required".to_string(),
        ));
    }

    for entry in gateways {
        let placeholders = entry.template.matches("{url}").count()
            + entry.template.matches("{raw}").count();
        if placeholders != 1 {
            return Err(ConfigError::InvalidGateway(format!(
                "template '{}' must contain exactly one {{url}} or {{raw}} placeholder",
                entry.template
            )));
        }

        // A bare "{raw}" template is a direct fetch, anything else must be a URL
        if entry.template != "{raw}" {
            let sample = entry
                .template
                .replace("{url}", "sample")
                .replace("{raw}", "https://example.com/");
            validate_http_url(&sample).map_err(|_| {
                ConfigError::InvalidGateway(format!(
                    "template '{}' does not form an http(s) URL",
                    entry.template
                ))
            })?;
        }
    }

    Ok(())
}

/// Validates that a string is an absolute http or https URL
fn validate_http_url(value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' must use http or https",
            value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
