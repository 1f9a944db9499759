//! Builder for configuring and constructing an `FxHost`.

use crate::{FxHost, Result};
use fxhost_core::{ConfigStore, HostOptions, MemoryConfig};
use fxhost_plugin::{ComponentRegistry, PresetCodec, PresetRoots, StateFormat};

/// Everything has a default: an empty registry, an in-memory config store,
/// 44.1 kHz, binary preset blobs and the platform preset directories.
///
/// # Example
///
/// ```ignore
/// use fxhost::prelude::*;
///
/// let host = FxHost::builder()
///     .registry(registry)
///     .config_store(MemoryConfig::load("fxhost.json")?)
///     .sample_rate(48000.0)
///     .build()?;
///
/// let mut delay = host.open("appl/aufx/dely/Apple: AUDelay")?;
/// ```
pub struct FxHostBuilder {
    registry: Option<ComponentRegistry>,
    store: Option<Box<dyn ConfigStore + Send>>,
    sample_rate: f64,
    state_format: StateFormat,
    preset_roots: Option<PresetRoots>,
}

impl Default for FxHostBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            store: None,
            sample_rate: 44100.0,
            state_format: StateFormat::Binary,
            preset_roots: None,
        }
    }
}

impl FxHostBuilder {
    pub fn registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Store for options and presets. Host options are read from it at build.
    pub fn config_store(mut self, store: impl ConfigStore + Send + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Serialization used for newly stored presets. Default: binary
    pub fn state_format(mut self, format: StateFormat) -> Self {
        self.state_format = format;
        self
    }

    pub fn preset_roots(mut self, roots: PresetRoots) -> Self {
        self.preset_roots = Some(roots);
        self
    }

    pub fn build(self) -> Result<FxHost> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(fxhost_core::Error::InvalidConfig(format!(
                "sample rate {} must be positive",
                self.sample_rate
            ))
            .into());
        }

        let store = self
            .store
            .unwrap_or_else(|| Box::new(MemoryConfig::new()));
        let options = HostOptions::load(store.as_ref());
        tracing::debug!("Host options: {:?}", options);

        Ok(FxHost::from_parts(
            self.registry.unwrap_or_default(),
            store,
            options,
            self.sample_rate,
            PresetCodec::new(self.state_format),
            self.preset_roots.unwrap_or_else(PresetRoots::from_env),
        ))
    }
}
