//! Configuration store and host options.
//!
//! The host persists presets and options in a grouped key/value store. Groups
//! are `/`-separated paths; an effect owns everything under its descriptor
//! path:
//!
//! ```text
//! <effect-path>/UserPresets/<name>   Data=<base64 blob>
//! <effect-path>/FactoryDefaults      Data=..., Initialized=1
//! <effect-path>/CurrentSettings      Data=...
//! Options                            UseLatency, UIType, RefreshLatencyOnChange
//! ```

use crate::{Error, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Group holding host-wide options.
pub const OPTIONS_GROUP: &str = "Options";
pub const USER_PRESETS_GROUP: &str = "UserPresets";
pub const FACTORY_DEFAULTS_GROUP: &str = "FactoryDefaults";
pub const CURRENT_SETTINGS_GROUP: &str = "CurrentSettings";

pub fn user_presets_group(effect_path: &str) -> String {
    format!("{}/{}", effect_path, USER_PRESETS_GROUP)
}

pub fn user_preset_group(effect_path: &str, name: &str) -> String {
    format!("{}/{}/{}", effect_path, USER_PRESETS_GROUP, name)
}

pub fn factory_defaults_group(effect_path: &str) -> String {
    format!("{}/{}", effect_path, FACTORY_DEFAULTS_GROUP)
}

pub fn current_settings_group(effect_path: &str) -> String {
    format!("{}/{}", effect_path, CURRENT_SETTINGS_GROUP)
}

/// Grouped string key/value store.
pub trait ConfigStore {
    fn get(&self, group: &str, key: &str) -> Option<String>;

    /// Returns false when the value could not be stored.
    fn set(&mut self, group: &str, key: &str, value: &str) -> bool;

    /// Returns true when the key existed.
    fn remove(&mut self, group: &str, key: &str) -> bool;

    /// Remove a group with all its keys and subgroups.
    fn remove_group(&mut self, group: &str) -> bool;

    /// Names of the direct children of `group`.
    fn subgroups(&self, group: &str) -> Vec<String>;

    fn has_group(&self, group: &str) -> bool;

    fn get_or(&self, group: &str, key: &str, default: &str) -> String {
        self.get(group, key).unwrap_or_else(|| default.to_string())
    }

    /// Booleans are stored as `1`/`0`; `true`/`false` are accepted on read.
    fn get_bool(&self, group: &str, key: &str, default: bool) -> bool {
        match self.get(group, key).as_deref().map(str::trim) {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            _ => default,
        }
    }

    fn set_bool(&mut self, group: &str, key: &str, value: bool) -> bool {
        self.set(group, key, if value { "1" } else { "0" })
    }
}

/// In-memory store with optional JSON persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    groups: BTreeMap<String, BTreeMap<String, String>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn normalize(group: &str) -> &str {
        group.trim_matches('/')
    }
}

impl ConfigStore for MemoryConfig {
    fn get(&self, group: &str, key: &str) -> Option<String> {
        self.groups
            .get(Self::normalize(group))
            .and_then(|keys| keys.get(key))
            .cloned()
    }

    fn set(&mut self, group: &str, key: &str, value: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        self.groups
            .entry(Self::normalize(group).to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&mut self, group: &str, key: &str) -> bool {
        let group = Self::normalize(group);
        let Some(keys) = self.groups.get_mut(group) else {
            return false;
        };
        let removed = keys.remove(key).is_some();
        if keys.is_empty() {
            self.groups.remove(group);
        }
        removed
    }

    fn remove_group(&mut self, group: &str) -> bool {
        let group = Self::normalize(group);
        let prefix = format!("{}/", group);
        let before = self.groups.len();
        self.groups
            .retain(|name, _| name != group && !name.starts_with(&prefix));
        self.groups.len() != before
    }

    fn subgroups(&self, group: &str) -> Vec<String> {
        let prefix = format!("{}/", Self::normalize(group));
        let mut names: Vec<String> = self
            .groups
            .keys()
            .filter_map(|name| name.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|child| !child.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn has_group(&self, group: &str) -> bool {
        let group = Self::normalize(group);
        let prefix = format!("{}/", group);
        self.groups
            .keys()
            .any(|name| name == group || name.starts_with(&prefix))
    }
}

/// Which editor the UI layer should present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UiType {
    #[default]
    Full,
    Generic,
    Basic,
}

impl fmt::Display for UiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UiType::Full => "Full",
            UiType::Generic => "Generic",
            UiType::Basic => "Basic",
        })
    }
}

impl FromStr for UiType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Full" => Ok(UiType::Full),
            "Generic" => Ok(UiType::Generic),
            "Basic" => Ok(UiType::Basic),
            other => Err(Error::InvalidOption {
                key: "UIType".into(),
                value: other.into(),
            }),
        }
    }
}

/// What happens to a cached latency when the unit reports a latency change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LatencyPolicy {
    /// The value cached for the session stays until re-initialization.
    #[default]
    KeepCached,
    /// A latency property change drops the cached value.
    RefreshOnChange,
}

/// Host-wide options consumed by instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostOptions {
    pub use_latency: bool,
    pub ui_type: UiType,
    pub latency_policy: LatencyPolicy,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            use_latency: true,
            ui_type: UiType::Full,
            latency_policy: LatencyPolicy::KeepCached,
        }
    }
}

impl HostOptions {
    pub const USE_LATENCY_KEY: &'static str = "UseLatency";
    pub const UI_TYPE_KEY: &'static str = "UIType";
    pub const REFRESH_LATENCY_KEY: &'static str = "RefreshLatencyOnChange";

    /// Read options from the store, falling back to defaults per key.
    ///
    /// An unrecognized `UIType` falls back to `Full` with a warning.
    pub fn load(store: &dyn ConfigStore) -> Self {
        let defaults = Self::default();
        let ui_type = match store.get(OPTIONS_GROUP, Self::UI_TYPE_KEY) {
            Some(text) => text.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, using {}", e, defaults.ui_type);
                defaults.ui_type
            }),
            None => defaults.ui_type,
        };
        let refresh = store.get_bool(
            OPTIONS_GROUP,
            Self::REFRESH_LATENCY_KEY,
            defaults.latency_policy == LatencyPolicy::RefreshOnChange,
        );

        Self {
            use_latency: store.get_bool(OPTIONS_GROUP, Self::USE_LATENCY_KEY, defaults.use_latency),
            ui_type,
            latency_policy: if refresh {
                LatencyPolicy::RefreshOnChange
            } else {
                LatencyPolicy::KeepCached
            },
        }
    }

    pub fn save(&self, store: &mut dyn ConfigStore) -> Result<()> {
        let refresh = self.latency_policy == LatencyPolicy::RefreshOnChange;
        let ok = store.set_bool(OPTIONS_GROUP, Self::USE_LATENCY_KEY, self.use_latency)
            && store.set(OPTIONS_GROUP, Self::UI_TYPE_KEY, &self.ui_type.to_string())
            && store.set_bool(OPTIONS_GROUP, Self::REFRESH_LATENCY_KEY, refresh);
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "failed to write group '{}'",
                OPTIONS_GROUP
            )))
        }
    }
}

/// Options shared between the control thread and running instances.
pub type SharedOptions = Arc<ArcSwap<HostOptions>>;

pub fn shared_options(options: HostOptions) -> SharedOptions {
    Arc::new(ArcSwap::from_pointee(options))
}
