//! Deterministic native unit for tests and examples.
//!
//! [`MockUnit`] implements the full capability protocol in memory. Its state
//! lives behind a shared lock so a [`MockHandle`] kept by the test can play
//! the part of the unit's own UI (moving knobs, changing latency) and inspect
//! what the host did.

use crate::abi::{
    decode_value, encode_value, property, NativeUnit, PresetId, PropertyId, RenderContext, Scope,
    StreamFormat, UnitParameterInfo,
};
use crate::error::Status;
use crate::events::{EventSink, UnitEvent};
use crate::state::{ClassState, StateValue};
use fxhost_core::ChannelInfo;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

type NativeResult<T> = std::result::Result<T, Status>;

/// One parameter of a mock unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MockParameter {
    pub id: u32,
    pub name: String,
    pub clump: Option<(u32, Option<String>)>,
    pub writable: bool,
    pub value: f32,
    /// Get and set report an invalid parameter.
    pub fails: bool,
    /// The info query fails, so the host cannot name it.
    pub hidden: bool,
}

impl MockParameter {
    pub fn new(id: u32, name: impl Into<String>, value: f32) -> Self {
        Self {
            id,
            name: name.into(),
            clump: None,
            writable: true,
            value,
            fails: false,
            hidden: false,
        }
    }

    pub fn clump(mut self, id: u32, name: Option<&str>) -> Self {
        self.clump = Some((id, name.map(str::to_string)));
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Debug)]
struct MockState {
    channels: Option<Vec<ChannelInfo>>,
    params: Vec<MockParameter>,
    internal: Vec<u8>,
    empty_state: bool,
    preset: PresetId,
    factory_presets: Vec<(String, Vec<(u32, f32)>)>,
    latency: f64,
    tail: f64,
    max_frames: Option<u32>,
    reject: Option<(PropertyId, Scope)>,
    reject_initialize: bool,
    sample_rates: BTreeMap<u8, f64>,
    formats: BTreeMap<u8, StreamFormat>,
    render_callback: bool,
    initialized: bool,
    gain: f32,
    reset_count: usize,
    render_count: usize,
    last_inputs: Vec<Vec<f32>>,
    listeners: Vec<EventSink>,
}

fn scope_key(scope: Scope) -> u8 {
    match scope {
        Scope::Global => 0,
        Scope::Input => 1,
        Scope::Output => 2,
    }
}

impl MockState {
    fn param(&self, id: u32) -> NativeResult<&MockParameter> {
        self.params
            .iter()
            .find(|p| p.id == id && !p.fails)
            .ok_or(Status::INVALID_PARAMETER)
    }

    fn param_mut(&mut self, id: u32) -> NativeResult<&mut MockParameter> {
        self.params
            .iter_mut()
            .find(|p| p.id == id && !p.fails)
            .ok_or(Status::INVALID_PARAMETER)
    }

    fn notify(&mut self, event: UnitEvent) {
        self.listeners.retain(|sink| sink.send(event).is_ok());
    }

    fn class_state(&self) -> ClassState {
        let mut state = ClassState::new();
        if self.empty_state {
            return state;
        }
        state.insert("version", StateValue::Int(1));
        state.insert("name", StateValue::Text(self.preset.name.clone()));
        state.insert("preset-number", StateValue::Int(self.preset.number as i64));
        state.insert("data", StateValue::Data(self.internal.clone()));
        let params = self
            .params
            .iter()
            .map(|p| (p.id.to_string(), StateValue::Real(p.value as f64)))
            .collect();
        state.insert("parameters", StateValue::Dict(params));
        state
    }

    fn restore(&mut self, state: &ClassState) -> NativeResult<()> {
        if state.get("version").is_none() {
            return Err(Status::INVALID_PROPERTY_VALUE);
        }
        if let Some(StateValue::Text(name)) = state.get("name") {
            self.preset.name = name.clone();
        }
        if let Some(StateValue::Int(number)) = state.get("preset-number") {
            self.preset.number = *number as i32;
        }
        if let Some(StateValue::Data(data)) = state.get("data") {
            self.internal = data.clone();
        }
        if let Some(StateValue::Dict(values)) = state.get("parameters") {
            for p in &mut self.params {
                if let Some(StateValue::Real(v)) = values.get(&p.id.to_string()) {
                    p.value = *v as f32;
                }
            }
        }
        Ok(())
    }
}

/// In-memory native unit.
pub struct MockUnit {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockUnit {
    fn default() -> Self {
        Self::effect()
    }
}

impl MockUnit {
    /// A stereo effect with no parameters.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                channels: Some(vec![ChannelInfo::new(2, 2)]),
                params: Vec::new(),
                internal: Vec::new(),
                empty_state: false,
                preset: PresetId {
                    number: 0,
                    name: "Untitled".into(),
                },
                factory_presets: Vec::new(),
                latency: 0.0,
                tail: 0.0,
                max_frames: None,
                reject: None,
                reject_initialize: false,
                sample_rates: BTreeMap::new(),
                formats: BTreeMap::new(),
                render_callback: false,
                initialized: false,
                gain: 1.0,
                reset_count: 0,
                render_count: 0,
                last_inputs: Vec::new(),
                listeners: Vec::new(),
            })),
        }
    }

    /// A stereo delay-like effect with three parameters, internal data and
    /// two factory presets.
    pub fn effect() -> Self {
        Self::new()
            .with_parameter(MockParameter::new(0, "Delay Time", 0.25))
            .with_parameter(MockParameter::new(1, "Feedback", 0.5).clump(1, Some("Loop")))
            .with_parameter(MockParameter::new(2, "Output Level", 0.0).read_only())
            .with_internal(b"delay-line-v1".to_vec())
            .with_factory_preset("Short", &[(0, 0.05), (1, 0.1)])
            .with_factory_preset("Long", &[(0, 1.5), (1, 0.8)])
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn with_channels(self, channels: Option<Vec<ChannelInfo>>) -> Self {
        self.state.lock().channels = channels;
        self
    }

    pub fn with_parameter(self, param: MockParameter) -> Self {
        self.state.lock().params.push(param);
        self
    }

    pub fn with_internal(self, data: Vec<u8>) -> Self {
        self.state.lock().internal = data;
        self
    }

    pub fn with_factory_preset(self, name: &str, values: &[(u32, f32)]) -> Self {
        self.state
            .lock()
            .factory_presets
            .push((name.to_string(), values.to_vec()));
        self
    }

    pub fn with_latency(self, seconds: f64) -> Self {
        self.state.lock().latency = seconds;
        self
    }

    pub fn with_tail(self, seconds: f64) -> Self {
        self.state.lock().tail = seconds;
        self
    }

    pub fn with_max_frames(self, frames: Option<u32>) -> Self {
        self.state.lock().max_frames = frames;
        self
    }

    pub fn with_gain(self, gain: f32) -> Self {
        self.state.lock().gain = gain;
        self
    }

    /// Report an empty class state.
    pub fn with_empty_state(self) -> Self {
        self.state.lock().empty_state = true;
        self
    }

    /// Reject `property` on `scope` with a format error.
    pub fn rejecting(self, property: PropertyId, scope: Scope) -> Self {
        self.state.lock().reject = Some((property, scope));
        self
    }

    pub fn rejecting_initialize(self) -> Self {
        self.state.lock().reject_initialize = true;
        self
    }
}

impl NativeUnit for MockUnit {
    fn get_property(&self, id: PropertyId, scope: Scope, element: u32) -> NativeResult<Vec<u8>> {
        let state = self.state.lock();
        let encoded = match id {
            PropertyId::ClassInfo => encode_value::<property::ClassInfo>(&state.class_state()),
            PropertyId::SampleRate => {
                let rate = state
                    .sample_rates
                    .get(&scope_key(scope))
                    .copied()
                    .unwrap_or(44100.0);
                encode_value::<property::SampleRate>(&rate)
            }
            PropertyId::StreamFormat => {
                let format = state
                    .formats
                    .get(&scope_key(scope))
                    .copied()
                    .ok_or(Status::INVALID_SCOPE)?;
                encode_value::<property::StreamFormat>(&format)
            }
            PropertyId::MaximumFramesPerSlice => {
                let frames = state.max_frames.ok_or(Status::INVALID_PROPERTY)?;
                encode_value::<property::MaximumFramesPerSlice>(&frames)
            }
            PropertyId::SupportedNumChannels => {
                let channels = state.channels.as_ref().ok_or(Status::INVALID_PROPERTY)?;
                encode_value::<property::SupportedNumChannels>(channels)
            }
            PropertyId::ParameterList => {
                let ids: Vec<u32> = state.params.iter().map(|p| p.id).collect();
                encode_value::<property::ParameterList>(&ids)
            }
            PropertyId::ParameterInfo => {
                let param = state
                    .params
                    .iter()
                    .find(|p| p.id == element && !p.hidden)
                    .ok_or(Status::INVALID_PARAMETER)?;
                encode_value::<property::ParameterInfo>(&UnitParameterInfo {
                    name: param.name.clone(),
                    clump_id: param.clump.as_ref().map(|(id, _)| *id),
                    writable: param.writable,
                })
            }
            PropertyId::ParameterClumpName => {
                let name = state
                    .params
                    .iter()
                    .filter_map(|p| p.clump.as_ref())
                    .find(|(id, _)| *id == element)
                    .and_then(|(_, name)| name.clone())
                    .ok_or(Status::INVALID_PROPERTY_VALUE)?;
                encode_value::<property::ParameterClumpName>(&name)
            }
            PropertyId::PresentPreset => encode_value::<property::PresentPreset>(&state.preset),
            PropertyId::FactoryPresets => {
                let presets: Vec<PresetId> = state
                    .factory_presets
                    .iter()
                    .enumerate()
                    .map(|(i, (name, _))| PresetId {
                        number: i as i32,
                        name: name.clone(),
                    })
                    .collect();
                encode_value::<property::FactoryPresets>(&presets)
            }
            PropertyId::Latency => encode_value::<property::Latency>(&state.latency),
            PropertyId::TailTime => encode_value::<property::TailTime>(&state.tail),
            PropertyId::SetRenderCallback => {
                encode_value::<property::SetRenderCallback>(&state.render_callback)
            }
        };
        encoded.map_err(|_| Status::INVALID_PROPERTY_VALUE)
    }

    fn set_property(
        &mut self,
        id: PropertyId,
        scope: Scope,
        _element: u32,
        data: &[u8],
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.reject == Some((id, scope)) {
            return Err(Status::FORMAT_NOT_SUPPORTED);
        }
        let bad = |_| Status::INVALID_PROPERTY_VALUE;
        match id {
            PropertyId::ClassInfo => {
                let class = decode_value::<property::ClassInfo>(data).map_err(bad)?;
                state.restore(&class)
            }
            PropertyId::SampleRate => {
                let rate = decode_value::<property::SampleRate>(data).map_err(bad)?;
                state.sample_rates.insert(scope_key(scope), rate);
                Ok(())
            }
            PropertyId::StreamFormat => {
                let format = decode_value::<property::StreamFormat>(data).map_err(bad)?;
                state.formats.insert(scope_key(scope), format);
                Ok(())
            }
            PropertyId::MaximumFramesPerSlice => {
                let frames = decode_value::<property::MaximumFramesPerSlice>(data).map_err(bad)?;
                state.max_frames = Some(frames);
                Ok(())
            }
            PropertyId::PresentPreset => {
                let preset = decode_value::<property::PresentPreset>(data).map_err(bad)?;
                if preset.number >= 0 {
                    let (_, values) = state
                        .factory_presets
                        .get(preset.number as usize)
                        .cloned()
                        .ok_or(Status::INVALID_PROPERTY_VALUE)?;
                    for (id, value) in values {
                        if let Ok(p) = state.param_mut(id) {
                            p.value = value;
                        }
                    }
                }
                state.preset = preset;
                Ok(())
            }
            PropertyId::SetRenderCallback => {
                state.render_callback =
                    decode_value::<property::SetRenderCallback>(data).map_err(bad)?;
                Ok(())
            }
            _ => Err(Status::INVALID_PROPERTY),
        }
    }

    fn get_parameter(&self, id: u32) -> NativeResult<f32> {
        self.state.lock().param(id).map(|p| p.value)
    }

    fn set_parameter(&mut self, id: u32, value: f32) -> NativeResult<()> {
        self.state.lock().param_mut(id)?.value = value;
        Ok(())
    }

    fn initialize(&mut self) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.reject_initialize {
            return Err(Status::FAILED_INITIALIZATION);
        }
        state.initialized = true;
        Ok(())
    }

    fn uninitialize(&mut self) {
        self.state.lock().initialized = false;
    }

    fn reset(&mut self) -> NativeResult<()> {
        self.state.lock().reset_count += 1;
        Ok(())
    }

    fn render(
        &mut self,
        context: &RenderContext,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(Status::UNINITIALIZED);
        }
        if let Some(max) = state.max_frames {
            if context.frames > max as usize {
                return Err(Status::TOO_MANY_FRAMES);
            }
        }
        state.last_inputs = inputs.iter().map(|ch| ch[..context.frames].to_vec()).collect();
        state.render_count += 1;

        let gain = state.gain;
        for (c, out) in outputs.iter_mut().enumerate() {
            match inputs.get(c) {
                Some(input) => {
                    for (o, i) in out[..context.frames].iter_mut().zip(input.iter()) {
                        *o = i * gain;
                    }
                }
                None => out[..context.frames].fill(0.0),
            }
        }
        Ok(())
    }

    fn add_listener(&mut self, sink: EventSink) -> NativeResult<()> {
        self.state.lock().listeners.push(sink);
        Ok(())
    }

    fn notify_parameter_change(&mut self, id: Option<u32>) {
        let mut state = self.state.lock();
        let event = match id {
            Some(id) => match state.param(id) {
                Ok(p) => UnitEvent::ParameterChanged { id, value: p.value },
                Err(_) => return,
            },
            None => UnitEvent::AllParametersChanged,
        };
        state.notify(event);
    }
}

/// Test-side view of a [`MockUnit`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Move a knob as the unit's own UI would, notifying listeners.
    pub fn twiddle(&self, id: u32, value: f32) {
        let mut state = self.state.lock();
        if let Ok(p) = state.param_mut(id) {
            p.value = value;
            state.notify(UnitEvent::ParameterChanged { id, value });
        }
    }

    /// Change the reported latency and raise a property change.
    pub fn set_latency(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.latency = seconds;
        state.notify(UnitEvent::PropertyChanged {
            property: PropertyId::Latency,
            scope: Scope::Global,
            element: 0,
        });
    }

    pub fn set_tail(&self, seconds: f64) {
        self.state.lock().tail = seconds;
    }

    /// Change a value without notifying anyone.
    pub fn set_parameter(&self, id: u32, value: f32) {
        if let Ok(p) = self.state.lock().param_mut(id) {
            p.value = value;
        }
    }

    pub fn parameter(&self, id: u32) -> Option<f32> {
        self.state.lock().params.iter().find(|p| p.id == id).map(|p| p.value)
    }

    pub fn internal(&self) -> Vec<u8> {
        self.state.lock().internal.clone()
    }

    pub fn set_internal(&self, data: &[u8]) {
        self.state.lock().internal = data.to_vec();
    }

    pub fn preset_name(&self) -> String {
        self.state.lock().preset.name.clone()
    }

    pub fn sample_rate(&self, scope: Scope) -> Option<f64> {
        self.state.lock().sample_rates.get(&scope_key(scope)).copied()
    }

    pub fn stream_format(&self, scope: Scope) -> Option<StreamFormat> {
        self.state.lock().formats.get(&scope_key(scope)).copied()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn has_render_callback(&self) -> bool {
        self.state.lock().render_callback
    }

    pub fn reset_count(&self) -> usize {
        self.state.lock().reset_count
    }

    pub fn render_count(&self) -> usize {
        self.state.lock().render_count
    }

    /// Inputs seen by the last render call, truncated to its frame count.
    pub fn last_inputs(&self) -> Vec<Vec<f32>> {
        self.state.lock().last_inputs.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }
}
