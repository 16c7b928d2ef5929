//! Proxy configuration blob as exchanged with the browser proxy subsystem.
//!
//! The reconciler treats [`ProxyConfig`] as opaque: it is read from the live
//! subsystem, persisted, and written back exactly as received. The typed
//! accessors only serve validation and section visibility for the options
//! editor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::passthrough::{PassthroughError, PassthroughList};

const PROXY_TYPE: &str = "proxyType";
const HTTP: &str = "http";
const SSL: &str = "ssl";
const SOCKS: &str = "socks";
const HTTP_PROXY_ALL: &str = "httpProxyAll";
const SOCKS_VERSION: &str = "socksVersion";
const AUTO_CONFIG_URL: &str = "autoConfigUrl";
const PASSTHROUGH: &str = "passthrough";
const AUTO_LOGIN: &str = "autoLogin";
const PROXY_DNS: &str = "proxyDNS";

/// How the browser should route traffic.
///
/// Types this crate does not know are kept in [`ProxyType::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProxyType {
    None,
    AutoDetect,
    #[default]
    System,
    Manual,
    AutoConfig,
    Other(String),
}

impl ProxyType {
    pub const ALL: [ProxyType; 5] = [
        ProxyType::None,
        ProxyType::AutoDetect,
        ProxyType::System,
        ProxyType::Manual,
        ProxyType::AutoConfig,
    ];

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::AutoDetect => "autoDetect",
            Self::System => "system",
            Self::Manual => "manual",
            Self::AutoConfig => "autoConfig",
            Self::Other(raw) => raw,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::None => "No proxy",
            Self::AutoDetect => "Auto-detect proxy settings for this network",
            Self::System => "Use system proxy settings",
            Self::Manual => "Manual proxy configuration",
            Self::AutoConfig => "Automatic proxy configuration URL",
            Self::Other(raw) => raw,
        }
    }
}

impl From<&str> for ProxyType {
    fn from(value: &str) -> Self {
        match value {
            "none" => Self::None,
            "autoDetect" => Self::AutoDetect,
            "system" => Self::System,
            "manual" => Self::Manual,
            "autoConfig" => Self::AutoConfig,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ProxyType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ProxyType> for String {
    fn from(value: ProxyType) -> Self {
        value.as_str().to_string()
    }
}

/// SOCKS protocol version. Stored as the bare integer `4` or `5`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SocksVersion {
    V4,
    #[default]
    V5,
}

#[derive(Debug, Clone, Error)]
#[error("unsupported SOCKS version {0}, expected 4 or 5")]
pub struct UnsupportedSocksVersion(String);

impl TryFrom<u8> for SocksVersion {
    type Error = UnsupportedSocksVersion;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::V4),
            5 => Ok(Self::V5),
            other => Err(UnsupportedSocksVersion(other.to_string())),
        }
    }
}

impl From<SocksVersion> for u8 {
    fn from(value: SocksVersion) -> Self {
        match value {
            SocksVersion::V4 => 4,
            SocksVersion::V5 => 5,
        }
    }
}

/// Groups of options that are only meaningful for some proxy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsSection {
    /// HTTP/SSL/SOCKS addresses and SOCKS version.
    Manual,
    /// PAC file URL.
    AutoConfig,
    /// Passthrough list, auto-login and proxy DNS.
    NotNone,
}

#[derive(Debug, Error)]
pub enum ProxyConfigError {
    #[error("manual proxy configuration needs at least one of http, ssl or socks")]
    MissingManualProxy,
    #[error(transparent)]
    SocksVersion(#[from] UnsupportedSocksVersion),
    #[error("automatic proxy configuration needs an autoConfigUrl")]
    MissingAutoConfigUrl,
    #[error("invalid autoConfigUrl '{url}': {source}")]
    InvalidAutoConfigUrl {
        url: String,
        source: url::ParseError,
    },
    #[error(transparent)]
    Passthrough(#[from] PassthroughError),
}

/// A named proxy configuration (the `value` of the browser proxy setting).
///
/// Holds the JSON object as received. Absent fields stay absent and unknown
/// fields or values are written back untouched; readers fall back to the
/// browser defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyConfig(Map<String, Value>);

impl ProxyConfig {
    #[must_use]
    pub fn with_type(proxy_type: ProxyType) -> Self {
        Self::default().with(PROXY_TYPE, String::from(proxy_type))
    }

    /// Set `key` to `value`, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn bool_field(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or_default()
    }

    /// Browsers treat a missing `proxyType` as "system".
    #[must_use]
    pub fn proxy_type(&self) -> ProxyType {
        match self.0.get(PROXY_TYPE) {
            None | Some(Value::Null) => ProxyType::System,
            Some(Value::String(raw)) => ProxyType::from(raw.as_str()),
            Some(other) => ProxyType::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn http(&self) -> &str {
        self.str_field(HTTP)
    }

    #[must_use]
    pub fn ssl(&self) -> &str {
        self.str_field(SSL)
    }

    #[must_use]
    pub fn socks(&self) -> &str {
        self.str_field(SOCKS)
    }

    #[must_use]
    pub fn http_proxy_all(&self) -> bool {
        self.bool_field(HTTP_PROXY_ALL)
    }

    pub fn socks_version(&self) -> Result<SocksVersion, UnsupportedSocksVersion> {
        match self.0.get(SOCKS_VERSION) {
            None | Some(Value::Null) => Ok(SocksVersion::default()),
            Some(value) => value
                .as_u64()
                .and_then(|v| u8::try_from(v).ok())
                .map_or_else(
                    || Err(UnsupportedSocksVersion(value.to_string())),
                    SocksVersion::try_from,
                ),
        }
    }

    #[must_use]
    pub fn auto_config_url(&self) -> &str {
        self.str_field(AUTO_CONFIG_URL)
    }

    #[must_use]
    pub fn passthrough(&self) -> &str {
        self.str_field(PASSTHROUGH)
    }

    #[must_use]
    pub fn auto_login(&self) -> bool {
        self.bool_field(AUTO_LOGIN)
    }

    /// Unset means "browser default", see [`ProxyConfig::effective_proxy_dns`].
    #[must_use]
    pub fn proxy_dns(&self) -> Option<bool> {
        self.0.get(PROXY_DNS).and_then(Value::as_bool)
    }

    /// Whether DNS lookups go through the SOCKS proxy.
    ///
    /// Browsers default to proxying DNS for SOCKS5 and not for SOCKS4.
    #[must_use]
    pub fn effective_proxy_dns(&self) -> bool {
        self.proxy_dns()
            .unwrap_or_else(|| matches!(self.socks_version(), Ok(SocksVersion::V5)))
    }

    /// Sections of the options form that apply to this configuration.
    #[must_use]
    pub fn visible_sections(&self) -> Vec<SettingsSection> {
        match self.proxy_type() {
            ProxyType::None => Vec::new(),
            ProxyType::Manual => vec![SettingsSection::Manual, SettingsSection::NotNone],
            ProxyType::AutoConfig => vec![SettingsSection::AutoConfig, SettingsSection::NotNone],
            ProxyType::AutoDetect | ProxyType::System | ProxyType::Other(_) => {
                vec![SettingsSection::NotNone]
            }
        }
    }

    pub fn passthrough_list(&self) -> Result<PassthroughList, PassthroughError> {
        PassthroughList::parse(self.passthrough())
    }

    /// Check the fields required by the selected proxy type.
    pub fn validate(&self) -> Result<(), ProxyConfigError> {
        match self.proxy_type() {
            ProxyType::Manual => {
                if [self.http(), self.ssl(), self.socks()]
                    .iter()
                    .all(|addr| addr.trim().is_empty())
                {
                    return Err(ProxyConfigError::MissingManualProxy);
                }
                self.socks_version()?;
            }
            ProxyType::AutoConfig => {
                let url = self.auto_config_url().trim();
                if url.is_empty() {
                    return Err(ProxyConfigError::MissingAutoConfigUrl);
                }
                if let Err(source) = url::Url::parse(url) {
                    return Err(ProxyConfigError::InvalidAutoConfigUrl {
                        url: url.to_string(),
                        source,
                    });
                }
            }
            ProxyType::None | ProxyType::AutoDetect | ProxyType::System | ProxyType::Other(_) => {}
        }
        self.passthrough_list()?;
        Ok(())
    }
}
