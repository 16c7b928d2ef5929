//! Action button presentation as a pure function of reconciler state.

use crate::state::ReconcilerState;

pub const TITLE_PRIVATE_WINDOWS: &str =
    "QuickProxy is not allowed to run in private windows, click to open settings";
pub const TITLE_NO_CONTROL: &str =
    "Quick proxy is disabled because another extension controls proxy settings";
pub const TITLE_ACTIVE: &str = "QuickProxy active (using QuickProxy proxy configuration)";
pub const TITLE_INACTIVE: &str = "QuickProxy inactive (using Default proxy configuration)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorIcon {
    /// The extension's default icon.
    Default,
    Active,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorView {
    pub icon: IndicatorIcon,
    pub title: &'static str,
    /// Whether clicking the button does anything.
    pub enabled: bool,
}

impl IndicatorView {
    /// Compute the view for `state`.
    ///
    /// Missing private-window access keeps the button clickable: the click
    /// opens the settings page instead of toggling.
    #[must_use]
    pub fn for_state(state: &ReconcilerState) -> Self {
        if !state.is_allowed_in_private_windows {
            return Self {
                icon: IndicatorIcon::Error,
                title: TITLE_PRIVATE_WINDOWS,
                enabled: true,
            };
        }

        if !state.has_control {
            return Self {
                icon: IndicatorIcon::Default,
                title: TITLE_NO_CONTROL,
                enabled: false,
            };
        }

        if state.quick_proxy_active() {
            Self {
                icon: IndicatorIcon::Active,
                title: TITLE_ACTIVE,
                enabled: true,
            }
        } else {
            Self {
                icon: IndicatorIcon::Default,
                title: TITLE_INACTIVE,
                enabled: true,
            }
        }
    }
}
