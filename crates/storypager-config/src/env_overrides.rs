use crate::{LogFormat, PagerConfig};
use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "STORYPAGER_";

/// Abstraction over environment-variable lookups so tests (and embedders)
/// can supply their own source of overrides.
pub trait EnvSource {
    /// Look up `key` with the STORYPAGER_ prefix applied.
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut PagerConfig, env: &E) -> Result<()> {
    // Listing
    if let Some(endpoint) = get_env_string(env, "ENDPOINT") {
        config.listing.endpoint = endpoint;
    }
    if let Some(val) = get_env_parsed::<E, u32>(env, "BATCH_SIZE")? {
        config.listing.batch_size = val;
    }
    if let Some(val) = get_env_parsed::<E, u32>(env, "PAGE_SIZE")? {
        config.listing.page_size = val;
    }
    if let Some(val) = get_env_parsed::<E, u32>(env, "PREFETCH_THRESHOLD")? {
        config.listing.prefetch_threshold = val;
    }

    // HTTP
    if let Some(val) = get_env_parsed::<E, u64>(env, "HTTP_TIMEOUT_SECS")? {
        config.http.timeout_secs = val;
    }
    if let Some(agent) = get_env_string(env, "USER_AGENT") {
        config.http.user_agent = Some(agent);
    }

    // Auth
    if let Some(token) = get_env_string(env, "TOKEN") {
        config.auth.bearer_token = Some(token);
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.log.format = format
            .parse::<LogFormat>()
            .with_context(|| format!("Invalid {}LOG_FORMAT value", ENV_PREFIX))?;
    }

    Ok(())
}

/// Empty values are treated as unset.
fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key).filter(|val| !val.trim().is_empty())
}

fn get_env_parsed<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvSource,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
