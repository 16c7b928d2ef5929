use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Overrides the base directory (`~/.quickproxy`) when set and non-empty.
pub const HOME_ENV: &str = "QUICKPROXY_HOME";

const CONFIG_FILE: &str = "config.toml";
const STORE_FILE: &str = "settings.json";
const LIVE_FILE: &str = "live.json";
const LOG_DIR: &str = "logs";

#[derive(Debug, Default, Deserialize)]
pub struct QuickProxyConfig {
    pub app: Option<AppConfig>,
    pub store: Option<StoreConfig>,
    pub live: Option<LiveConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"debug"`.
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Location of the persisted settings record.
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveConfig {
    /// Location of the file-backed live proxy document.
    pub path: Option<String>,
}

/// Expand `${VAR}` references from the environment.
///
/// Unset variables and `${}` expand to nothing; an unclosed `${` is kept as is.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Resolve a configured path: expand variables and `~/`, then anchor
/// relative paths at `base`.
pub fn resolve_path(raw: &str, base: &Path) -> PathBuf {
    let expanded = expand_env_vars(raw);
    if let Some(rest) = expanded.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

impl QuickProxyConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        Self::parse(&content).map(Some).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn log_level(&self) -> Option<String> {
        self.app
            .as_ref()
            .and_then(|app| app.log_level.as_deref())
            .map(expand_env_vars)
            .filter(|level| !level.trim().is_empty())
    }

    #[must_use]
    pub fn store_path(&self, base: &Path) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|store| store.path.as_deref())
            .map_or_else(|| base.join(STORE_FILE), |raw| resolve_path(raw, base))
    }

    #[must_use]
    pub fn live_path(&self, base: &Path) -> PathBuf {
        self.live
            .as_ref()
            .and_then(|live| live.path.as_deref())
            .map_or_else(|| base.join(LIVE_FILE), |raw| resolve_path(raw, base))
    }
}

/// `$QUICKPROXY_HOME`, else `~/.quickproxy`, else `./.quickproxy`.
#[must_use]
pub fn base_dir() -> PathBuf {
    if let Some(home) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir().map_or_else(
        || PathBuf::from(".quickproxy"),
        |home| home.join(".quickproxy"),
    )
}

#[must_use]
pub fn config_path() -> PathBuf {
    base_dir().join(CONFIG_FILE)
}

#[must_use]
pub fn log_dir(base: &Path) -> PathBuf {
    base.join(LOG_DIR)
}
