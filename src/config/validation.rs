use crate::config::types::{ClientConfig, Config, SourceConfig, SourceKind, StoreConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_client_config(&config.client)?;
    validate_store_config(&config.store)?;

    if config.sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for source in &config.sources {
        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }
        validate_source_config(source)?;
    }

    Ok(())
}

fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if matches!(config.export_path.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "export-path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates one source entry
fn validate_source_config(source: &SourceConfig) -> Result<(), ConfigError> {
    if source.name.is_empty()
        || !source
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "source name must be non-empty and contain only alphanumerics, '-' or '_', got '{}'",
            source.name
        )));
    }

    let url = Url::parse(&source.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", source.base_url, e))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            source.base_url
        )));
    }

    if source.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "source '{}': max-pages must be >= 1",
            source.name
        )));
    }

    if source.page_size == Some(0) {
        return Err(ConfigError::Validation(format!(
            "source '{}': page-size must be >= 1 when set",
            source.name
        )));
    }

    if source.delay_min_ms > source.delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "source '{}': delay-min-ms ({}) exceeds delay-max-ms ({})",
            source.name, source.delay_min_ms, source.delay_max_ms
        )));
    }

    if source.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "source '{}': max-attempts must be >= 1",
            source.name
        )));
    }

    if let Some(rating) = source.min_rating {
        if rating > 100 {
            return Err(ConfigError::Validation(format!(
                "source '{}': min-rating must be a percentage, got {}",
                source.name, rating
            )));
        }
    }

    if matches!(source.api_key_env.as_deref(), Some("")) {
        return Err(ConfigError::Validation(format!(
            "source '{}': api-key-env cannot be empty when set",
            source.name
        )));
    }

    if source.kind == SourceKind::BattlemetricsApi && source.api_key_env.is_none() {
        return Err(ConfigError::Validation(format!(
            "source '{}': battlemetrics-api sources need api-key-env",
            source.name
        )));
    }

    if source.kind == SourceKind::BattlemetricsBrowser
        && source.browser_binary.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConfigError::Validation(format!(
            "source '{}': browser sources need browser-binary",
            source.name
        )));
    }

    if let Some(selector) = &source.entry_selector {
        Selector::parse(selector).map_err(|e| {
            ConfigError::Validation(format!(
                "source '{}': invalid entry-selector '{}': {:?}",
                source.name, selector, e
            ))
        })?;
    }

    Ok(())
}
