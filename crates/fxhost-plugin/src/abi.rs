//! Capability-query interface to a native effect unit.
//!
//! The host never depends on a concrete native type. An adapter per native
//! plugin family implements [`NativeUnit`]; properties travel as byte
//! payloads and are decoded through the typed markers in [`property`].

use crate::error::{HostError, Result, Status};
use crate::events::EventSink;
use crate::state::ClassState;
use fxhost_core::ChannelInfo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Property selectors understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyId {
    ClassInfo,
    SampleRate,
    StreamFormat,
    MaximumFramesPerSlice,
    SupportedNumChannels,
    ParameterList,
    ParameterInfo,
    ParameterClumpName,
    PresentPreset,
    FactoryPresets,
    Latency,
    TailTime,
    SetRenderCallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    Float32,
}

/// Linear PCM stream description for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub channels: u32,
    pub format: SampleFormat,
    pub interleaved: bool,
}

impl StreamFormat {
    /// Non-interleaved native-endian f32, one buffer per channel.
    pub fn planar_f32(sample_rate: f64, channels: u32) -> Self {
        Self {
            sample_rate,
            channels,
            format: SampleFormat::Float32,
            interleaved: false,
        }
    }
}

/// Parameter metadata as the unit reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitParameterInfo {
    pub name: String,
    pub clump_id: Option<u32>,
    pub writable: bool,
}

/// Preset identity. Negative numbers denote user presets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetId {
    pub number: i32,
    pub name: String,
}

impl PresetId {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            number: -1,
            name: name.into(),
        }
    }
}

/// Timing passed to each render call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderContext {
    /// Frames rendered since the last `process_initialize`.
    pub sample_time: f64,
    pub frames: usize,
}

/// One live native unit.
///
/// Methods mirror the native capability protocol: fallible calls return the
/// unit's raw [`Status`] and never panic across the boundary.
pub trait NativeUnit: Send {
    fn get_property(
        &self,
        id: PropertyId,
        scope: Scope,
        element: u32,
    ) -> std::result::Result<Vec<u8>, Status>;

    fn set_property(
        &mut self,
        id: PropertyId,
        scope: Scope,
        element: u32,
        data: &[u8],
    ) -> std::result::Result<(), Status>;

    fn get_parameter(&self, id: u32) -> std::result::Result<f32, Status>;

    fn set_parameter(&mut self, id: u32, value: f32) -> std::result::Result<(), Status>;

    fn initialize(&mut self) -> std::result::Result<(), Status>;

    fn uninitialize(&mut self);

    /// Clear internal processing state (delay lines, filters).
    fn reset(&mut self) -> std::result::Result<(), Status>;

    fn render(
        &mut self,
        context: &RenderContext,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
    ) -> std::result::Result<(), Status>;

    /// Subscribe to parameter and property change events.
    fn add_listener(&mut self, sink: EventSink) -> std::result::Result<(), Status>;

    /// Tell listeners a parameter changed; `None` means every parameter.
    fn notify_parameter_change(&mut self, id: Option<u32>);
}

/// A property selector paired with its payload type.
pub trait Property {
    const ID: PropertyId;
    type Value: Serialize + DeserializeOwned;
}

/// Typed property markers.
pub mod property {
    use super::*;

    macro_rules! property {
        ($name:ident, $value:ty) => {
            pub struct $name;

            impl Property for $name {
                const ID: PropertyId = PropertyId::$name;
                type Value = $value;
            }
        };
    }

    property!(ClassInfo, ClassState);
    property!(SampleRate, f64);
    property!(StreamFormat, super::StreamFormat);
    property!(MaximumFramesPerSlice, u32);
    property!(SupportedNumChannels, Vec<ChannelInfo>);
    property!(ParameterList, Vec<u32>);
    property!(ParameterInfo, UnitParameterInfo);
    property!(ParameterClumpName, String);
    property!(PresentPreset, PresetId);
    property!(FactoryPresets, Vec<PresetId>);
    property!(Latency, f64);
    property!(TailTime, f64);
    property!(SetRenderCallback, bool);
}

pub fn encode_value<P: Property>(value: &P::Value) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|source| HostError::PropertyCodec {
        property: P::ID,
        source,
    })
}

pub fn decode_value<P: Property>(data: &[u8]) -> Result<P::Value> {
    bincode::deserialize(data).map_err(|source| HostError::PropertyCodec {
        property: P::ID,
        source,
    })
}

/// Typed property access on any unit.
pub trait NativeUnitExt {
    fn get_value<P: Property>(&self, scope: Scope, element: u32) -> Result<P::Value>;

    fn set_value<P: Property>(
        &mut self,
        scope: Scope,
        element: u32,
        value: &P::Value,
    ) -> Result<()>;

    fn global<P: Property>(&self) -> Result<P::Value> {
        self.get_value::<P>(Scope::Global, 0)
    }

    fn set_global<P: Property>(&mut self, value: &P::Value) -> Result<()> {
        self.set_value::<P>(Scope::Global, 0, value)
    }
}

impl<U: NativeUnit + ?Sized> NativeUnitExt for U {
    fn get_value<P: Property>(&self, scope: Scope, element: u32) -> Result<P::Value> {
        let data = self
            .get_property(P::ID, scope, element)
            .map_err(|status| HostError::Property {
                property: P::ID,
                status,
            })?;
        decode_value::<P>(&data)
    }

    fn set_value<P: Property>(
        &mut self,
        scope: Scope,
        element: u32,
        value: &P::Value,
    ) -> Result<()> {
        let data = encode_value::<P>(value)?;
        self.set_property(P::ID, scope, element, &data)
            .map_err(|status| HostError::Property {
                property: P::ID,
                status,
            })
    }
}
