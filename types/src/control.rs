//! Browser report of who owns the live proxy settings.

use serde::{Deserialize, Serialize};

use crate::proxy::ProxyConfig;

/// Which agent is authoritative over the proxy setting.
///
/// Values the browser may add in the future are kept in [`LevelOfControl::Other`]
/// and treated as "cannot control".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LevelOfControl {
    NotControllable,
    ControlledByOtherExtensions,
    ControllableByThisExtension,
    ControlledByThisExtension,
    Other(String),
}

impl LevelOfControl {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotControllable => "not_controllable",
            Self::ControlledByOtherExtensions => "controlled_by_other_extensions",
            Self::ControllableByThisExtension => "controllable_by_this_extension",
            Self::ControlledByThisExtension => "controlled_by_this_extension",
            Self::Other(raw) => raw,
        }
    }

    /// Whether this extension may set the proxy configuration.
    #[must_use]
    pub fn can_control(&self) -> bool {
        matches!(
            self,
            Self::ControllableByThisExtension | Self::ControlledByThisExtension
        )
    }
}

impl From<String> for LevelOfControl {
    fn from(value: String) -> Self {
        match value.as_str() {
            "not_controllable" => Self::NotControllable,
            "controlled_by_other_extensions" => Self::ControlledByOtherExtensions,
            "controllable_by_this_extension" => Self::ControllableByThisExtension,
            "controlled_by_this_extension" => Self::ControlledByThisExtension,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for LevelOfControl {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<LevelOfControl> for String {
    fn from(value: LevelOfControl) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for LevelOfControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reading the live proxy setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveProxySettings {
    pub value: ProxyConfig,
    pub level_of_control: LevelOfControl,
}
