// Configuration source loading.
//
// Priority order:
// 1. Environment variables (STORYPAGER_* prefix)
// 2. Config file path from STORYPAGER_CONFIG
// 3. Inline config content from STORYPAGER_CONFIG_CONTENT
// 4. Default config file (./storypager.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::PagerConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "./storypager.toml";

pub fn load_config() -> Result<PagerConfig> {
    let mut config = load_from_file(&StdEnvSource)?.unwrap_or_default();
    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<PagerConfig> {
    let path = path.as_ref();
    let mut config = read_file(path)?;
    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

pub(crate) fn parse_toml(content: &str, origin: &str) -> Result<PagerConfig> {
    toml::from_str(content).with_context(|| format!("Failed to parse {}", origin))
}

fn load_from_file<E: EnvSource>(env: &E) -> Result<Option<PagerConfig>> {
    if let Some(path) = env.get("CONFIG") {
        return read_file(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config = parse_toml(
            &content,
            &format!("inline config from {}CONFIG_CONTENT", ENV_PREFIX),
        )?;
        return Ok(Some(config));
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return read_file(default_path).map(Some);
    }

    Ok(None)
}

fn read_file(path: &Path) -> Result<PagerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_toml(&content, &format!("config file: {}", path.display()))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }
}
