//! Preset storage, legacy migration and preset files.
//!
//! A stored preset is one config group holding the unit's class state,
//! serialized and base64 encoded under [`PRESET_KEY`]. Older entries keep a
//! flat `name=value` list under [`LEGACY_KEY`] instead; those are upgraded
//! the first time they are loaded.

use crate::abi::PresetId;
use crate::error::{HostError, Result};
use crate::instance::EffectInstance;
use crate::legacy;
use crate::state::{convert, detect_format, ClassState, StateFormat};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fxhost_core::config::{user_preset_group, user_presets_group};
use fxhost_core::{AutomationParameters, ConfigStore, EffectDescriptor};
use std::path::{Path, PathBuf};

pub const PRESET_KEY: &str = "Data";
pub const LEGACY_KEY: &str = "Parameters";
pub const PRESET_EXTENSION: &str = "fxpreset";

/// Something whose full state can be saved and restored as a preset.
pub trait PresetTarget {
    fn descriptor(&self) -> &EffectDescriptor;

    /// Tag the unit's current preset as `name`, then read its class state.
    fn capture_state(&mut self, name: &str) -> Result<ClassState>;

    /// Replace the class state and resynchronize cached parameter values.
    fn restore_state(&mut self, state: &ClassState) -> Result<()>;

    /// Apply values by synthesized parameter name. Returns how many applied.
    fn apply_automation(&mut self, params: &AutomationParameters) -> usize;
}

impl PresetTarget for EffectInstance {
    fn descriptor(&self) -> &EffectDescriptor {
        EffectInstance::descriptor(self)
    }

    fn capture_state(&mut self, name: &str) -> Result<ClassState> {
        self.set_present_preset(&PresetId::user(name))?;
        self.class_state()
    }

    fn restore_state(&mut self, state: &ClassState) -> Result<()> {
        self.set_class_state(state)
    }

    fn apply_automation(&mut self, params: &AutomationParameters) -> usize {
        self.set_automation_parameters(params)
    }
}

/// Converts class state to and from its stored string form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresetCodec {
    pub format: StateFormat,
}

impl PresetCodec {
    pub fn new(format: StateFormat) -> Self {
        Self { format }
    }

    pub fn encode<T: PresetTarget + ?Sized>(
        &self,
        target: &mut T,
        preset: &str,
    ) -> Result<String> {
        let state = target.capture_state(preset)?;
        self.encode_state(preset, &state)
    }

    pub fn encode_state(&self, preset: &str, state: &ClassState) -> Result<String> {
        if state.is_empty() {
            return Err(HostError::PresetEmpty {
                preset: preset.to_string(),
            });
        }
        let bytes = state
            .to_bytes(self.format)
            .map_err(|e| HostError::PresetEncodeFailed {
                preset: preset.to_string(),
                reason: e.to_string(),
            })?;
        Ok(STANDARD.encode(bytes))
    }

    /// Accepts either serialization regardless of `self.format`.
    pub fn decode_state(&self, preset: &str, text: &str) -> Result<ClassState> {
        let failed = |reason: String| HostError::PresetDecodeFailed {
            preset: preset.to_string(),
            reason,
        };
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| failed(e.to_string()))?;
        if bytes.is_empty() {
            return Err(HostError::PresetEmpty {
                preset: preset.to_string(),
            });
        }
        ClassState::from_bytes(&bytes).map_err(|e| failed(e.to_string()))
    }

    pub fn decode<T: PresetTarget + ?Sized>(
        &self,
        target: &mut T,
        preset: &str,
        text: &str,
    ) -> Result<()> {
        let state = self.decode_state(preset, text)?;
        target.restore_state(&state)
    }
}

/// Last path component of a preset group.
pub fn preset_name(group: &str) -> &str {
    group.trim_end_matches('/').rsplit('/').next().unwrap_or(group)
}

/// Capture the target's state and store it under `group`.
pub fn save_preset<T: PresetTarget + ?Sized>(
    store: &mut dyn ConfigStore,
    target: &mut T,
    group: &str,
    codec: &PresetCodec,
) -> Result<()> {
    let text = codec.encode(target, preset_name(group))?;
    if !store.set(group, PRESET_KEY, &text) {
        return Err(HostError::ConfigWriteFailed {
            group: group.to_string(),
            key: PRESET_KEY.to_string(),
        });
    }
    tracing::debug!("Saved preset {} ({} bytes encoded)", group, text.len());
    Ok(())
}

/// Restore the preset stored under `group`.
///
/// A legacy parameter list is applied, saved back in the current form and
/// removed.
pub fn load_preset<T: PresetTarget + ?Sized>(
    store: &mut dyn ConfigStore,
    target: &mut T,
    group: &str,
    codec: &PresetCodec,
) -> Result<()> {
    let name = preset_name(group);

    if let Some(text) = store.get(group, LEGACY_KEY) {
        return migrate_legacy(store, target, group, &text, codec);
    }

    let text = store
        .get(group, PRESET_KEY)
        .ok_or_else(|| HostError::PresetNotFound {
            preset: group.to_string(),
        })?;

    codec.decode(target, name, &text).inspect_err(|e| {
        tracing::error!("{}", e);
    })
}

fn migrate_legacy<T: PresetTarget + ?Sized>(
    store: &mut dyn ConfigStore,
    target: &mut T,
    group: &str,
    text: &str,
    codec: &PresetCodec,
) -> Result<()> {
    let params = legacy::parse(text).ok_or_else(|| HostError::PresetDecodeFailed {
        preset: preset_name(group).to_string(),
        reason: "malformed parameter list".to_string(),
    })?;
    let applied = target.apply_automation(&params);

    match save_preset(store, target, group, codec) {
        Ok(()) => {
            store.remove(group, LEGACY_KEY);
            tracing::info!(
                "Migrated legacy preset {} ({} of {} parameters)",
                group,
                applied,
                params.len()
            );
        }
        Err(e) => tracing::warn!("Legacy preset {} could not be re-saved: {}", group, e),
    }
    Ok(())
}

/// Names of the stored user presets for `descriptor`, sorted.
pub fn user_presets(store: &dyn ConfigStore, descriptor: &EffectDescriptor) -> Vec<String> {
    let mut names = store.subgroups(&user_presets_group(&descriptor.path()));
    names.sort();
    names
}

pub fn delete_user_preset(
    store: &mut dyn ConfigStore,
    descriptor: &EffectDescriptor,
    name: &str,
) -> bool {
    store.remove_group(&user_preset_group(&descriptor.path(), name))
}

/// Directories searched for preset files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetRoots {
    /// Shared presets installed for every user.
    pub local: PathBuf,
    /// The current user's presets; exports go here.
    pub user: PathBuf,
}

impl PresetRoots {
    pub fn new(local: impl Into<PathBuf>, user: impl Into<PathBuf>) -> Self {
        Self {
            local: local.into(),
            user: user.into(),
        }
    }

    /// Platform default locations.
    pub fn from_env() -> Self {
        let home = std::env::var("HOME").unwrap_or_default();

        #[cfg(target_os = "macos")]
        {
            Self::new(
                "/Library/Audio/Presets",
                format!("{}/Library/Audio/Presets", home),
            )
        }

        #[cfg(not(target_os = "macos"))]
        {
            Self::new(
                "/usr/share/fxhost/presets",
                format!("{}/.local/share/fxhost/presets", home),
            )
        }
    }
}

/// `<root>/<vendor>/<effect>`
pub fn preset_dir(root: &Path, descriptor: &EffectDescriptor) -> PathBuf {
    root.join(descriptor.vendor()).join(descriptor.effect_name())
}

/// Write one stored user preset to `<dir>/<name>.fxpreset`.
///
/// With `as_text` a binary blob is converted to the editable text form; the
/// stored entry is not changed.
pub fn export_preset(
    store: &dyn ConfigStore,
    descriptor: &EffectDescriptor,
    name: &str,
    dir: &Path,
    as_text: bool,
) -> Result<PathBuf> {
    let group = user_preset_group(&descriptor.path(), name);
    let text = store
        .get(&group, PRESET_KEY)
        .ok_or_else(|| HostError::PresetNotFound {
            preset: name.to_string(),
        })?;

    let failed = |reason: String| HostError::PresetDecodeFailed {
        preset: name.to_string(),
        reason,
    };
    let mut bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| failed(e.to_string()))?;
    if as_text && !bytes.is_empty() {
        bytes = convert(&bytes, StateFormat::Text).map_err(|e| failed(e.to_string()))?;
    }
    if bytes.is_empty() {
        return Err(HostError::PresetEmpty {
            preset: name.to_string(),
        });
    }

    std::fs::create_dir_all(dir).map_err(|e| HostError::file(dir, e))?;
    let path = dir.join(format!("{}.{}", name, PRESET_EXTENSION));
    std::fs::write(&path, &bytes).map_err(|e| HostError::file(&path, e))?;

    tracing::info!("Exported preset {} to {}", name, path.display());
    Ok(path)
}

/// Export `names` into the user preset directory, stopping at the first
/// failure.
pub fn export_presets(
    store: &dyn ConfigStore,
    descriptor: &EffectDescriptor,
    names: &[String],
    roots: &PresetRoots,
    as_text: bool,
) -> Result<Vec<PathBuf>> {
    let dir = preset_dir(&roots.user, descriptor);
    names
        .iter()
        .map(|name| export_preset(store, descriptor, name, &dir, as_text))
        .collect()
}

/// Every preset file for `descriptor` under both roots, sorted.
pub fn find_preset_files(roots: &PresetRoots, descriptor: &EffectDescriptor) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in [&roots.local, &roots.user] {
        collect_preset_files(&preset_dir(root, descriptor), &mut files);
    }
    files.sort();
    files.dedup();
    files
}

fn collect_preset_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Skipping {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_preset_files(&path, files);
        } else if path.extension().and_then(|ext| ext.to_str()) == Some(PRESET_EXTENSION) {
            files.push(path);
        }
    }
}

/// Store a preset file as a user preset named after the file.
pub fn import_preset(
    store: &mut dyn ConfigStore,
    descriptor: &EffectDescriptor,
    path: &Path,
) -> Result<String> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| HostError::PresetDecodeFailed {
            preset: path.display().to_string(),
            reason: "file has no usable name".to_string(),
        })?
        .to_string();

    let bytes = std::fs::read(path).map_err(|e| HostError::file(path, e))?;
    if bytes.is_empty() {
        return Err(HostError::PresetEmpty { preset: name });
    }
    detect_format(&bytes).map_err(|e| HostError::PresetDecodeFailed {
        preset: name.clone(),
        reason: e.to_string(),
    })?;

    let group = user_preset_group(&descriptor.path(), &name);
    if !store.set(&group, PRESET_KEY, &STANDARD.encode(&bytes)) {
        return Err(HostError::ConfigWriteFailed {
            group,
            key: PRESET_KEY.to_string(),
        });
    }

    tracing::info!("Imported preset {} from {}", name, path.display());
    Ok(name)
}

/// Import every preset file found for `descriptor`, stopping at the first
/// failure.
pub fn import_presets(
    store: &mut dyn ConfigStore,
    descriptor: &EffectDescriptor,
    roots: &PresetRoots,
) -> Result<Vec<String>> {
    find_preset_files(roots, descriptor)
        .iter()
        .map(|path| import_preset(store, descriptor, path))
        .collect()
}
