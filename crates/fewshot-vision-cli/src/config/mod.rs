//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use fewshot_vision::SessionConfig;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "FEWSHOT_CONFIG";

/// Config file looked up in the working directory.
const CWD_CONFIG: &str = ".fewshot/config.json";

/// Resolve the config file path, if any applies.
///
/// Order: explicit flag, `FEWSHOT_CONFIG`, `./.fewshot/config.json`.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_config = PathBuf::from(CWD_CONFIG);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    None
}

/// Load the session config, falling back to defaults when no file applies.
/// `model` overrides the file's `model_path`.
pub fn load_config(explicit: Option<&str>, model: Option<&str>) -> anyhow::Result<SessionConfig> {
    let mut config = match resolve_config_path(explicit) {
        Some(path) => read_config(&path)?,
        None => {
            tracing::debug!("No config file found, using defaults");
            SessionConfig::default()
        }
    };

    if let Some(model) = model {
        config.model_path = Some(PathBuf::from(model));
    }

    Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<SessionConfig> {
    tracing::info!("Loading config from {}", path.display());
    SessionConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))
}
