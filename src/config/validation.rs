use crate::config::types::{
    Config, CrawlerConfig, FetcherConfig, OutputConfig, SiteConfig, UserAgentConfig,
};
use crate::extract::compile_selector;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_site_config(&config.site)?;
    Ok(())
}

/// Validates crawl scope and scheduling limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if let Some(search_url) = &config.search_url {
        validate_search_url(search_url)?;
    }

    if config.page_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page_param cannot be empty".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    if config.fallback_page_count < 1 {
        return Err(ConfigError::Validation(format!(
            "fallback_page_count must be >= 1, got {}",
            config.fallback_page_count
        )));
    }

    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if !config.delay_seconds.is_finite() || config.delay_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay_seconds must be a finite value >= 0, got {}",
            config.delay_seconds
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint_interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    Ok(())
}

/// Validates the search URL template by rendering page 1
fn validate_search_url(template: &str) -> Result<(), ConfigError> {
    let rendered = template.replace("{page}", "1");
    let url = Url::parse(&rendered)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search_url '{}': {}", template, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "search_url '{}' must use http or https",
            template
        )));
    }

    Ok(())
}

/// Validates fetch timeouts and retry policy
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "timeout_seconds must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_seconds must be >= 1".to_string(),
        ));
    }

    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_base_ms ({}) cannot exceed backoff_max_ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    if config.rate_limit_multiplier < 1 {
        return Err(ConfigError::Validation(
            "rate_limit_multiplier must be >= 1".to_string(),
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

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("csv_path", &config.csv_path),
        ("xlsx_path", &config.xlsx_path),
        ("checkpoint_path", &config.checkpoint_path),
        ("log_path", &config.log_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.checkpoint_path == config.csv_path {
        return Err(ConfigError::Validation(
            "checkpoint_path must differ from csv_path".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every configured selector parses
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.listing_link_selector,
        &config.pagination_selector,
        &config.title_selector,
        &config.price_selector,
        &config.address_selector,
        &config.description_selector,
        &config.phone_selector,
        &config.owner_selector,
        &config.attribute_row_selector,
        &config.meta_selector,
    ] {
        compile_selector(selector)?;
    }

    if config.listing_path_markers.is_empty() {
        return Err(ConfigError::Validation(
            "listing_path_markers must contain at least one marker".to_string(),
        ));
    }

    if config.national_number_length < 6 {
        return Err(ConfigError::Validation(format!(
            "national_number_length must be >= 6, got {}",
            config.national_number_length
        )));
    }

    if !config.phone_country_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "phone_country_code must be digits only, got '{}'",
            config.phone_country_code
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

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
