//! FxHost wires the registry, the configuration store and host options
//! together and owns the per-effect preset conventions.

use crate::builder::FxHostBuilder;
use crate::Result;
use fxhost_core::config::{current_settings_group, factory_defaults_group, user_preset_group};
use fxhost_core::{shared_options, ConfigStore, EffectDescriptor, HostOptions, SharedOptions};
use fxhost_plugin::preset::{self, PresetTarget};
use fxhost_plugin::{
    ComponentRegistry, EffectInstance, HostError, MasterSlaveGroup, PresetCodec, PresetRoots,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Marks a `FactoryDefaults` group that has been written.
pub const INITIALIZED_KEY: &str = "Initialized";

/// Host for native effect units.
///
/// # Example
///
/// ```ignore
/// use fxhost::prelude::*;
///
/// let host = FxHost::builder().registry(registry).sample_rate(48000.0).build()?;
/// let mut delay = host.open("appl/aufx/dely/Apple: AUDelay")?;
///
/// host.save_user_preset(&mut delay, "Slapback")?;
/// host.load_user_preset(&mut delay, "Slapback")?;
///
/// let mut group = host.start_realtime(delay, &[2, 2])?;
/// ```
pub struct FxHost {
    registry: ComponentRegistry,
    store: Mutex<Box<dyn ConfigStore + Send>>,
    options: SharedOptions,
    sample_rate: f64,
    codec: PresetCodec,
    preset_roots: PresetRoots,
}

impl FxHost {
    pub fn builder() -> FxHostBuilder {
        FxHostBuilder::default()
    }

    pub(crate) fn from_parts(
        registry: ComponentRegistry,
        store: Box<dyn ConfigStore + Send>,
        options: HostOptions,
        sample_rate: f64,
        codec: PresetCodec,
        preset_roots: PresetRoots,
    ) -> Self {
        Self {
            registry,
            store: Mutex::new(store),
            options: shared_options(options),
            sample_rate,
            codec,
            preset_roots,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn codec(&self) -> &PresetCodec {
        &self.codec
    }

    pub fn preset_roots(&self) -> &PresetRoots {
        &self.preset_roots
    }

    /// Run `f` with exclusive access to the configuration store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut dyn ConfigStore) -> R) -> R {
        let mut store = self.store.lock();
        f(&mut **store)
    }

    // ---- options ----

    pub fn options(&self) -> HostOptions {
        let current = self.options.load();
        HostOptions::clone(&current)
    }

    /// Shared options handle; running instances read through it.
    pub fn shared_options(&self) -> &SharedOptions {
        &self.options
    }

    /// Persist `options` and publish them to every instance.
    pub fn set_options(&self, options: HostOptions) -> Result<()> {
        self.with_store(|store| options.save(store))?;
        tracing::info!("Host options updated: {:?}", options);
        self.options.store(Arc::new(options));
        Ok(())
    }

    /// Re-read options from the store, e.g. after another process edited it.
    pub fn reload_options(&self) -> HostOptions {
        let options = self.with_store(|store| HostOptions::load(store));
        self.options.store(Arc::new(options.clone()));
        options
    }

    // ---- instances ----

    pub fn is_valid(&self, path: &str, fast: bool) -> bool {
        self.registry.is_valid(path, fast)
    }

    /// Every registered component of a hosted type, sorted by path.
    pub fn effect_paths(&self) -> Vec<String> {
        self.registry.paths()
    }

    /// Resolve, configure and initialize an effect, then restore its
    /// settings.
    ///
    /// The first time an effect is opened its state is saved as the factory
    /// defaults. Stored current settings are loaded when present. Failures
    /// in either step are logged and the instance is still returned.
    pub fn open(&self, path: &str) -> Result<EffectInstance> {
        let component = self.registry.resolve(path)?;
        let mut instance = EffectInstance::new(component, Arc::clone(&self.options))?;
        let channels = instance.negotiated_channels();
        instance.configure(self.sample_rate, channels)?;
        instance.initialize()?;
        self.bootstrap(&mut instance);
        Ok(instance)
    }

    fn bootstrap(&self, instance: &mut EffectInstance) {
        let path = instance.descriptor().path();
        let defaults = factory_defaults_group(&path);
        let mut store = self.store.lock();

        if !store.get_bool(&defaults, INITIALIZED_KEY, false) {
            match preset::save_preset(&mut **store, instance, &defaults, &self.codec) {
                Ok(()) => {
                    store.set_bool(&defaults, INITIALIZED_KEY, true);
                }
                Err(e) => tracing::warn!("No factory defaults for {}: {}", path, e),
            }
        }

        let current = current_settings_group(&path);
        match preset::load_preset(&mut **store, instance, &current, &self.codec) {
            Ok(()) | Err(HostError::PresetNotFound { .. }) => {}
            Err(e) => tracing::warn!("Ignoring stored settings for {}: {}", path, e),
        }
    }

    /// Put `instance` into realtime mode with one processor per entry of
    /// `channel_groups`.
    ///
    /// On failure the instance is returned inside [`Error::Realtime`](crate::Error::Realtime).
    pub fn start_realtime(
        &self,
        instance: EffectInstance,
        channel_groups: &[u32],
    ) -> Result<MasterSlaveGroup> {
        Ok(MasterSlaveGroup::start(instance, channel_groups, self.sample_rate)?)
    }

    // ---- presets ----

    pub fn save_user_preset<T: PresetTarget + ?Sized>(
        &self,
        target: &mut T,
        name: &str,
    ) -> Result<()> {
        let group = user_preset_group(&target.descriptor().path(), name);
        self.save_group(target, &group)
    }

    pub fn load_user_preset<T: PresetTarget + ?Sized>(
        &self,
        target: &mut T,
        name: &str,
    ) -> Result<()> {
        let group = user_preset_group(&target.descriptor().path(), name);
        self.load_group(target, &group)
    }

    pub fn load_factory_defaults<T: PresetTarget + ?Sized>(&self, target: &mut T) -> Result<()> {
        let group = factory_defaults_group(&target.descriptor().path());
        self.load_group(target, &group)
    }

    /// Remember the current state so the next `open` restores it.
    pub fn save_current_settings<T: PresetTarget + ?Sized>(&self, target: &mut T) -> Result<()> {
        let group = current_settings_group(&target.descriptor().path());
        self.save_group(target, &group)
    }

    fn save_group<T: PresetTarget + ?Sized>(&self, target: &mut T, group: &str) -> Result<()> {
        let mut store = self.store.lock();
        Ok(preset::save_preset(&mut **store, target, group, &self.codec)?)
    }

    fn load_group<T: PresetTarget + ?Sized>(&self, target: &mut T, group: &str) -> Result<()> {
        let mut store = self.store.lock();
        Ok(preset::load_preset(&mut **store, target, group, &self.codec)?)
    }

    pub fn user_presets(&self, descriptor: &EffectDescriptor) -> Vec<String> {
        self.with_store(|store| preset::user_presets(store, descriptor))
    }

    pub fn delete_user_preset(&self, descriptor: &EffectDescriptor, name: &str) -> bool {
        self.with_store(|store| preset::delete_user_preset(store, descriptor, name))
    }

    /// Write the named user presets into the user preset directory.
    pub fn export_presets(
        &self,
        descriptor: &EffectDescriptor,
        names: &[String],
        as_text: bool,
    ) -> Result<Vec<PathBuf>> {
        let roots = &self.preset_roots;
        Ok(self.with_store(|store| {
            preset::export_presets(store, descriptor, names, roots, as_text)
        })?)
    }

    /// Store every preset file found for `descriptor` as a user preset.
    pub fn import_presets(&self, descriptor: &EffectDescriptor) -> Result<Vec<String>> {
        let roots = &self.preset_roots;
        Ok(self.with_store(|store| preset::import_presets(store, descriptor, roots))?)
    }
}

impl std::fmt::Debug for FxHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FxHost")
            .field("components", &self.registry.len())
            .field("sample_rate", &self.sample_rate)
            .field("codec", &self.codec)
            .field("preset_roots", &self.preset_roots)
            .finish_non_exhaustive()
    }
}
