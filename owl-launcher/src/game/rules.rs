//! OS and feature rules attached to libraries and launch arguments.
//!
//! A rule list is evaluated top to bottom; the last rule that matches the
//! host decides. An empty list always allows.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Feature flag enabled when a window size is configured.
pub const FEATURE_CUSTOM_RESOLUTION: &str = "has_custom_resolution";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Regular expression matched against the OS version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

/// The host description rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleContext {
    /// `windows`, `linux` or `osx`.
    pub os_name: String,
    /// `x86`, `x64` or `arm64`.
    pub arch: String,
    pub os_version: Option<String>,
    pub features: BTreeMap<String, bool>,
}

impl RuleContext {
    /// Context for the machine we are running on, with every feature off.
    pub fn host() -> Self {
        Self {
            os_name: host_os_name().to_string(),
            arch: host_arch().to_string(),
            os_version: None,
            features: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.features.insert(name.into(), enabled);
        self
    }

    pub fn with_custom_resolution(self, enabled: bool) -> Self {
        self.with_feature(FEATURE_CUSTOM_RESOLUTION, enabled)
    }

    fn feature(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }

    /// Key into a library's `natives` map for this host.
    pub fn natives_key(&self) -> &str {
        &self.os_name
    }

    /// Value substituted for `${arch}` in native classifiers.
    pub fn arch_bits(&self) -> &'static str {
        if self.arch == "x86" {
            "32"
        } else {
            "64"
        }
    }

    fn matches(&self, rule: &Rule) -> bool {
        if let Some(os) = &rule.os {
            if os.name.as_deref().is_some_and(|name| name != self.os_name) {
                return false;
            }
            if os.arch.as_deref().is_some_and(|arch| arch != self.arch) {
                return false;
            }
            if let (Some(pattern), Some(version)) = (&os.version, &self.os_version) {
                // An unparseable pattern never matches.
                match Regex::new(pattern) {
                    Ok(re) if re.is_match(version) => {}
                    _ => return false,
                }
            }
        }
        if let Some(features) = &rule.features {
            if features
                .iter()
                .any(|(name, wanted)| self.feature(name) != *wanted)
            {
                return false;
            }
        }
        true
    }
}

/// Whether a rule list admits its item on this host.
pub fn rules_allow(rules: &[Rule], ctx: &RuleContext) -> bool {
    if rules.is_empty() {
        return true;
    }
    rules
        .iter()
        .filter(|rule| ctx.matches(rule))
        .last()
        .is_some_and(|rule| rule.action == RuleAction::Allow)
}

pub fn host_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

pub fn host_arch() -> &'static str {
    if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x64"
    }
}
