//! Generator factory.
//!
//! Builds an [`OpenAiCompatGenerator`] from configuration settings,
//! resolving the API key from the environment or the config file.

use super::{OpenAiCompatGenerator, ProviderError};
use crate::config::Config;
use crate::transport::ReqwestTransport;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "RELAY_API_KEY";

/// Create a generator from configuration.
///
/// # Errors
///
/// - [`ProviderError::MissingApiKey`] if no API key is found
///
/// # Examples
///
/// ```no_run
/// use relay_core::config::Config;
/// use relay_core::provider::create_generator;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::load()?;
/// let generator = create_generator(&config)?;
/// # Ok(())
/// # }
/// ```
pub fn create_generator(
    config: &Config,
) -> Result<OpenAiCompatGenerator<ReqwestTransport>, ProviderError> {
    let api_key = get_api_key(config)?;
    tracing::debug!(
        base_url = %config.base_url,
        model = %config.model,
        "factory: creating generator"
    );

    Ok(OpenAiCompatGenerator::new(
        ReqwestTransport::new(),
        &config.base_url,
        api_key,
        &config.model,
    )
    .with_identity(&config.referer, &config.title))
}

/// Retrieve API key from environment variable or config file.
///
/// Priority: `RELAY_API_KEY` > config.api_key
///
/// # Errors
///
/// [`ProviderError::MissingApiKey`] if neither source has a non-empty key.
pub fn get_api_key(config: &Config) -> Result<String, ProviderError> {
    resolve_api_key(config, std::env::var(API_KEY_ENV).ok())
}

fn resolve_api_key(config: &Config, env_key: Option<String>) -> Result<String, ProviderError> {
    // Check environment variable first
    if let Some(key) = env_key
        && !key.is_empty()
    {
        return Ok(key);
    }

    // Fall back to config file
    config
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ProviderError::MissingApiKey(format!(
                "Set {} environment variable or add api_key to config.toml",
                API_KEY_ENV
            ))
        })
}
