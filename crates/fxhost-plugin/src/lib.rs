//! Native effect unit hosting for fxhost
//!
//! Drives third-party effect units through a capability-query protocol
//! ([`NativeUnit`]): property get/set, parameter get/set, render.
//!
//! - [`ComponentRegistry`]: resolves descriptor paths to unit factories
//! - [`EffectInstance`]: one unit and its lifecycle
//! - [`MasterSlaveGroup`]: multichannel realtime processing
//! - [`PresetCodec`]: class-state presets, legacy migration, preset files
//!
//! ## Usage
//!
//! ```ignore
//! use fxhost_plugin::{ComponentRegistry, EffectInstance, MasterSlaveGroup};
//!
//! let component = registry.resolve("appl/aufx/dely/Apple: AUDelay")?;
//! let mut fx = EffectInstance::new(component, options)?;
//! fx.configure(48000.0, fx.negotiated_channels())?;
//!
//! let mut group = MasterSlaveGroup::new(fx)?;
//! group.add_processor(2, 48000.0)?;
//!
//! // audio thread, once per cycle
//! group.realtime_process_start();
//! group.realtime_process(0, &inputs, &mut outputs, frames);
//! group.realtime_process_end();
//! ```

pub mod error;
pub use error::{FormatStage, HostError, Result, Status};

pub mod abi;
pub use abi::{
    property, NativeUnit, NativeUnitExt, PresetId, Property, PropertyId, RenderContext, Scope,
    StreamFormat, UnitParameterInfo,
};

pub mod events;
pub use events::{EventBridge, EventSink, UnitEvent};

pub mod state;
pub use state::{ClassState, StateError, StateFormat, StateValue};

pub mod legacy;

mod registry;
pub use registry::{ComponentFactory, ComponentRegistry, ResolvedComponent};

mod instance;
pub use instance::{EffectInstance, GroupId, GroupMember, InstanceState, DEFAULT_BLOCK_SIZE};

pub mod preset;
pub use preset::{PresetCodec, PresetRoots, PresetTarget};

mod group;
pub use group::{GroupControl, MasterSlaveGroup, StartError};

pub mod mock;
