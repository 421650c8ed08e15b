//! `adaptest.toml` configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::{ContentArea, EngineConfig};

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptestConfig {
    /// Item bank file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<PathBuf>,
    /// Directory of the JSON session store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Areas used when a start request names none.
    #[serde(default = "default_areas")]
    pub default_areas: Vec<ContentArea>,
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./adaptest-sessions")
}

fn default_areas() -> Vec<ContentArea> {
    ContentArea::ALL.to_vec()
}

impl Default for AdaptestConfig {
    fn default() -> Self {
        Self {
            bank: None,
            store_dir: default_store_dir(),
            default_areas: default_areas(),
            engine: EngineConfig::default(),
        }
    }
}

impl AdaptestConfig {
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment variable overrides: `ADAPTEST_TARGET_SE`,
/// `ADAPTEST_STORE_DIR`, `ADAPTEST_BANK`.
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("adaptest.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AdaptestConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptestConfig::default(),
    };

    apply_env_overrides(&mut config)?;

    config.store_dir = resolve_path(&config.store_dir);
    config.bank = config.bank.as_deref().map(resolve_path);

    config
        .engine
        .validate()
        .with_context(|| match &config_path {
            Some(path) => format!("invalid engine settings in {}", path.display()),
            None => "invalid engine settings".to_string(),
        })?;

    Ok(config)
}

fn apply_env_overrides(config: &mut AdaptestConfig) -> Result<()> {
    if let Ok(value) = std::env::var("ADAPTEST_TARGET_SE") {
        config.engine.target_se = value
            .trim()
            .parse()
            .with_context(|| format!("ADAPTEST_TARGET_SE is not a number: {value:?}"))?;
    }
    if let Ok(dir) = std::env::var("ADAPTEST_STORE_DIR") {
        config.store_dir = PathBuf::from(dir);
    }
    if let Ok(bank) = std::env::var("ADAPTEST_BANK") {
        config.bank = Some(PathBuf::from(bank));
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_ADAPTEST_TEST_VAR", "data");
        assert_eq!(resolve_env_vars("${_ADAPTEST_TEST_VAR}"), "data");
        assert_eq!(
            resolve_env_vars("/srv/${_ADAPTEST_TEST_VAR}/sessions"),
            "/srv/data/sessions"
        );
        assert_eq!(resolve_env_vars("no-vars"), "no-vars");
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_ADAPTEST_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = AdaptestConfig::default();
        assert_eq!(config.default_areas.len(), 5);
        assert_eq!(config.engine.quadrature_points, 81);
        assert!(config.bank.is_none());
    }

    #[test]
    fn parse_config_file() {
        let toml_str = r#"
bank = "banks/enamed.toml"
store_dir = "/tmp/sessions"
default_areas = ["clinica_medica", "pediatria"]

[engine]
min_items = 45
max_items = 75
target_se = 0.3
max_exposure_rate = 0.25

[engine.area_minimums]
pediatria = 12
"#;
        let config: AdaptestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bank, Some(PathBuf::from("banks/enamed.toml")));
        assert_eq!(
            config.default_areas,
            vec![ContentArea::ClinicaMedica, ContentArea::Pediatria]
        );
        assert_eq!(config.engine.min_items, 45);
        assert_eq!(config.engine.max_exposure_rate, Some(0.25));
        assert_eq!(
            config.engine.area_minimums.get(&ContentArea::Pediatria),
            Some(&12)
        );
        assert_eq!(config.engine.quadrature_points, 81);
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adaptest.toml");
        std::fs::write(&path, "[engine]\nmin_items = 10\nmax_items = 20\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.engine.min_items, 10);
        assert_eq!(config.engine.max_items, 20);
    }

    #[test]
    fn load_rejects_invalid_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adaptest.toml");
        std::fs::write(&path, "[engine]\nmin_items = 50\nmax_items = 20\n").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("min_items"));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        assert!(load_config_from(Some(Path::new("/nonexistent/adaptest.toml"))).is_err());
    }

    #[test]
    fn default_config_round_trips() {
        let config = AdaptestConfig::default();
        let text = config.to_toml().unwrap();
        let back: AdaptestConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.store_dir, config.store_dir);
        assert_eq!(back.engine.max_items, config.engine.max_items);
    }
}
