//! Core types for hosting native audio effect units.
//!
//! - [`EffectDescriptor`] / [`FourCc`]: component identity and its persisted text form
//! - [`negotiate`]: channel-count negotiation
//! - [`ParameterTable`] / [`SettingsCache`]: parameter metadata and value snapshots
//! - [`ConfigStore`] / [`HostOptions`]: grouped settings storage and host options
//! - [`param_queue`]: lock-free control-to-audio hand-off

pub mod error;
pub use error::{Error, Result};

pub mod descriptor;
pub use descriptor::{component_types, format_version, ComponentKey, EffectDescriptor, FourCc};

pub mod channels;
pub use channels::{negotiate, ChannelConfig, ChannelInfo, EffectType};

pub mod parameter;
pub use parameter::{
    synthesize_name, AutomationParameters, ParameterInfo, ParameterTable, SettingsCache,
};

pub mod config;
pub use config::{
    shared_options, ConfigStore, HostOptions, LatencyPolicy, MemoryConfig, SharedOptions, UiType,
};

pub mod lockfree;
pub use lockfree::{
    param_queue, AtomicCounter, AtomicFlag, ChangeTarget, ParamReceiver, ParamSender,
    PendingChange, PARAM_QUEUE_SIZE,
};
