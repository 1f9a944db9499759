//! # fxhost - Realtime Native Effect Host
//!
//! Hosts third-party audio effect units behind a capability-query protocol.
//!
//! ## Architecture
//!
//! fxhost is an umbrella crate that coordinates:
//! - **fxhost-core** - Descriptors, channel negotiation, parameter cache, config store,
//!   lock-free hand-off
//! - **fxhost-plugin** - Unit ABI, registry, instance lifecycle, presets, realtime
//!   master/slave groups
//!
//! ## Quick Start
//!
//! ```ignore
//! use fxhost::prelude::*;
//!
//! let registry = ComponentRegistry::new();
//! registry.register(EffectDescriptor::parse("appl/aufx/dely/Apple: AUDelay")?, 0x10000, || {
//!     Ok(Box::new(MockUnit::effect()) as Box<dyn NativeUnit>)
//! });
//!
//! let host = FxHost::builder().registry(registry).sample_rate(48000.0).build()?;
//! let delay = host.open("appl/aufx/dely/Apple: AUDelay")?;
//!
//! let mut group = host.start_realtime(delay, &[2])?;
//! let control = group.control();
//! control.set_parameter(0, 0.5);
//!
//! // audio thread
//! group.realtime_process_start();
//! group.realtime_process(0, &inputs, &mut outputs, frames);
//! group.realtime_process_end();
//! ```

/// Re-export of fxhost-core for direct access
pub use fxhost_core as core;

/// Re-export of fxhost-plugin for direct access
pub use fxhost_plugin as plugin;

// Core types
pub use fxhost_core::{
    negotiate, AutomationParameters, ChannelConfig, ChannelInfo, ConfigStore, EffectDescriptor,
    EffectType, FourCc, HostOptions, LatencyPolicy, MemoryConfig, ParameterInfo, ParameterTable,
    SettingsCache, SharedOptions, UiType,
};

// Hosting
pub use fxhost_plugin::{
    ClassState, ComponentRegistry, EffectInstance, FormatStage, GroupControl, HostError,
    InstanceState, MasterSlaveGroup, NativeUnit, PresetCodec, PresetRoots, PresetTarget,
    StartError, StateFormat, Status,
};

mod builder;
mod error;
mod host;

pub use builder::FxHostBuilder;
pub use error::{Error, Result};
pub use host::{FxHost, INITIALIZED_KEY};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Error, FxHost, FxHostBuilder, Result};

    pub use fxhost_core::{
        ChannelConfig, ChannelInfo, ConfigStore, EffectDescriptor, HostOptions, LatencyPolicy,
        MemoryConfig, UiType,
    };

    pub use fxhost_plugin::mock::{MockHandle, MockParameter, MockUnit};
    pub use fxhost_plugin::{
        ComponentRegistry, EffectInstance, GroupControl, InstanceState, MasterSlaveGroup,
        NativeUnit, PresetCodec, PresetRoots, PresetTarget, StateFormat,
    };
}
