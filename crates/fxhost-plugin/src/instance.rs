//! One hosted effect unit and its lifecycle.
//!
//! ```text
//! Unconfigured -> Configured -> Initialized -> Ready -> Finalized
//!                     ^                                    |
//!                     +------------- configure ------------+
//! ```
//!
//! `process_block` is the only realtime entry point. It never allocates,
//! never logs, and reports failure as zero frames.

use crate::abi::{
    property, NativeUnit, NativeUnitExt, PresetId, Property, RenderContext, Scope, StreamFormat,
};
use crate::error::{FormatStage, HostError, Result};
use crate::events::{mark_latency, EventBridge, UnitEvent};
use crate::registry::ResolvedComponent;
use crate::state::ClassState;
use fxhost_core::{
    negotiate, param_queue, AtomicFlag, AutomationParameters, ChannelConfig, EffectDescriptor,
    EffectType, ParamReceiver, ParamSender, ParameterInfo, ParameterTable, PendingChange,
    SettingsCache, SharedOptions, PARAM_QUEUE_SIZE,
};
use smallvec::SmallVec;
use std::sync::Arc;

/// Block size used when the unit does not report one.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Channel pointer lists up to this size stay on the stack.
const INLINE_CHANNELS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Unconfigured,
    Configured,
    Initialized,
    Ready,
    Finalized,
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Unconfigured => write!(f, "unconfigured"),
            InstanceState::Configured => write!(f, "configured"),
            InstanceState::Initialized => write!(f, "initialized"),
            InstanceState::Ready => write!(f, "ready"),
            InstanceState::Finalized => write!(f, "finalized"),
        }
    }
}

/// Identifies a realtime group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u64);

/// Back-reference from a slave to the group that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupMember {
    pub group: GroupId,
    pub index: usize,
}

pub struct EffectInstance {
    component: ResolvedComponent,
    unit: Box<dyn NativeUnit>,
    state: InstanceState,
    unit_initialized: bool,

    sample_rate: f64,
    negotiated: ChannelConfig,
    channels: ChannelConfig,
    group_channels: Option<u32>,
    block_size: usize,

    parameters: ParameterTable,
    settings: SettingsCache,
    options: SharedOptions,

    events: EventBridge,
    listening: bool,
    member: Option<GroupMember>,
    param_tx: ParamSender,
    param_rx: ParamReceiver,

    in_buffers: Vec<Vec<f32>>,
    out_buffers: Vec<Vec<f32>>,
    sample_time: f64,

    latency_samples: u64,
    latency_valid: bool,
    latency_stale: Arc<AtomicFlag>,
}

impl EffectInstance {
    /// Instantiate a component and query its parameters and channel table.
    pub fn new(component: ResolvedComponent, options: SharedOptions) -> Result<Self> {
        Self::create(component, options, None)
    }

    /// Slaves do not listen for events; the master forwards changes to them.
    pub(crate) fn new_slave(
        component: ResolvedComponent,
        options: SharedOptions,
        member: GroupMember,
    ) -> Result<Self> {
        Self::create(component, options, Some(member))
    }

    fn create(
        component: ResolvedComponent,
        options: SharedOptions,
        member: Option<GroupMember>,
    ) -> Result<Self> {
        let mut unit = component.instantiate()?;

        let parameters = query_parameters(unit.as_ref());
        let negotiated = negotiate(unit.global::<property::SupportedNumChannels>().ok().as_deref());
        let block_size = unit
            .global::<property::MaximumFramesPerSlice>()
            .map(|frames| frames as usize)
            .unwrap_or(DEFAULT_BLOCK_SIZE);

        let events = EventBridge::new();
        let listening = member.is_none()
            && match unit.add_listener(events.sink()) {
                Ok(()) => true,
                Err(status) => {
                    tracing::warn!(
                        "Could not listen to {}: status {}",
                        component.descriptor,
                        status
                    );
                    false
                }
            };

        tracing::info!(
            "Created instance of {} ({} parameters, {}/{} channels, block {})",
            component.descriptor,
            parameters.len(),
            negotiated.inputs,
            negotiated.outputs,
            block_size
        );

        let settings = SettingsCache::for_table(&parameters);
        let (param_tx, param_rx) = param_queue(PARAM_QUEUE_SIZE);

        Ok(Self {
            component,
            unit,
            state: InstanceState::Unconfigured,
            unit_initialized: false,
            sample_rate: 44100.0,
            negotiated,
            channels: negotiated,
            group_channels: None,
            block_size,
            parameters,
            settings,
            options,
            events,
            listening,
            member,
            param_tx,
            param_rx,
            in_buffers: Vec::new(),
            out_buffers: Vec::new(),
            sample_time: 0.0,
            latency_samples: 0,
            latency_valid: false,
            latency_stale: Arc::new(AtomicFlag::new(false)),
        })
    }

    // ---- metadata ----

    pub fn descriptor(&self) -> &EffectDescriptor {
        &self.component.descriptor
    }

    pub fn component(&self) -> &ResolvedComponent {
        &self.component
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Channel counts chosen from the unit's declared table.
    pub fn negotiated_channels(&self) -> ChannelConfig {
        self.negotiated
    }

    /// Channel counts currently configured.
    pub fn channels(&self) -> ChannelConfig {
        self.channels
    }

    pub fn audio_in_count(&self) -> u32 {
        self.channels.inputs
    }

    pub fn audio_out_count(&self) -> u32 {
        self.channels.outputs
    }

    /// Channel count of the realtime group this instance serves.
    pub fn channel_count(&self) -> u32 {
        self.group_channels.unwrap_or(self.channels.inputs)
    }

    pub(crate) fn set_group_channels(&mut self, channels: u32) {
        self.group_channels = Some(channels);
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn effect_type(&self) -> EffectType {
        self.channels.effect_type()
    }

    pub fn supports_realtime(&self) -> bool {
        self.effect_type() == EffectType::Process
    }

    pub fn supports_automation(&self) -> bool {
        self.parameters.has_writable()
    }

    pub fn is_interactive(&self) -> bool {
        !self.parameters.is_empty()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn member(&self) -> Option<GroupMember> {
        self.member
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub fn settings(&self) -> &SettingsCache {
        &self.settings
    }

    pub fn options(&self) -> &SharedOptions {
        &self.options
    }

    /// Queue for parameter edits applied at the start of the next block.
    pub fn parameter_sender(&self) -> ParamSender {
        self.param_tx.clone()
    }

    pub fn events(&self) -> &EventBridge {
        &self.events
    }

    pub(crate) fn latency_stale(&self) -> Arc<AtomicFlag> {
        Arc::clone(&self.latency_stale)
    }

    // ---- lifecycle ----

    /// Accept a sample rate and channel counts.
    ///
    /// On an initialized instance this is a [`reconfigure`](Self::reconfigure).
    pub fn configure(&mut self, sample_rate: f64, channels: ChannelConfig) -> Result<()> {
        validate_rate(sample_rate)?;
        match self.state {
            InstanceState::Initialized | InstanceState::Ready => {
                self.reconfigure(sample_rate, channels)
            }
            _ => {
                self.sample_rate = sample_rate;
                self.channels = channels;
                self.state = InstanceState::Configured;
                tracing::debug!(
                    "{} configured at {} Hz, {}/{} channels",
                    self.component.descriptor,
                    sample_rate,
                    channels.inputs,
                    channels.outputs
                );
                Ok(())
            }
        }
    }

    /// Push the stream format to every active scope and initialize the unit.
    ///
    /// Any rejection leaves the unit uninitialized and the instance
    /// `Configured`.
    pub fn initialize(&mut self) -> Result<()> {
        match self.state {
            InstanceState::Configured => {}
            InstanceState::Initialized | InstanceState::Ready => return Ok(()),
            state => {
                return Err(HostError::InvalidState {
                    operation: "initialize",
                    state,
                })
            }
        }

        if let Err(e) = self.apply_stream_format() {
            self.unit.uninitialize();
            self.unit_initialized = false;
            tracing::warn!("{}: {}", self.component.descriptor, e);
            return Err(e);
        }

        self.unit_initialized = true;
        self.latency_valid = false;
        self.latency_stale.set(false);
        self.state = InstanceState::Initialized;
        tracing::debug!("{} initialized", self.component.descriptor);
        Ok(())
    }

    fn apply_stream_format(&mut self) -> Result<()> {
        self.release_unit();

        let rate = self.sample_rate;
        self.set_format::<property::SampleRate>(
            Scope::Global,
            &rate,
            FormatStage::GlobalSampleRate,
        )?;

        if self.channels.inputs > 0 {
            let format = StreamFormat::planar_f32(rate, self.channels.inputs);
            self.set_format::<property::SampleRate>(
                Scope::Input,
                &rate,
                FormatStage::InputSampleRate,
            )?;
            self.set_format::<property::StreamFormat>(
                Scope::Input,
                &format,
                FormatStage::InputStreamFormat,
            )?;
        }

        if self.channels.outputs > 0 {
            let format = StreamFormat::planar_f32(rate, self.channels.outputs);
            self.set_format::<property::SampleRate>(
                Scope::Output,
                &rate,
                FormatStage::OutputSampleRate,
            )?;
            self.set_format::<property::StreamFormat>(
                Scope::Output,
                &format,
                FormatStage::OutputStreamFormat,
            )?;
        }

        self.unit
            .initialize()
            .map_err(|status| HostError::StreamFormatRejected {
                stage: FormatStage::Initialize,
                status,
            })
    }

    fn set_format<P: Property>(
        &mut self,
        scope: Scope,
        value: &P::Value,
        stage: FormatStage,
    ) -> Result<()> {
        self.unit
            .set_value::<P>(scope, 0, value)
            .map_err(|e| match e {
                HostError::Property { status, .. } => {
                    HostError::StreamFormatRejected { stage, status }
                }
                other => other,
            })
    }

    fn release_unit(&mut self) {
        if self.unit_initialized {
            self.unit.uninitialize();
            self.unit_initialized = false;
        }
    }

    /// Allocate block buffers, register for input and start a fresh session.
    pub fn process_initialize(&mut self) -> Result<()> {
        if self.state == InstanceState::Configured {
            self.initialize()?;
        }
        if !matches!(self.state, InstanceState::Initialized | InstanceState::Ready) {
            return Err(HostError::InvalidState {
                operation: "start processing",
                state: self.state,
            });
        }

        self.in_buffers = vec![vec![0.0; self.block_size]; self.channels.inputs as usize];
        self.out_buffers = vec![vec![0.0; self.block_size]; self.channels.outputs as usize];

        self.unit
            .set_value::<property::SetRenderCallback>(Scope::Input, 0, &true)?;
        self.unit
            .reset()
            .map_err(|status| HostError::NativeCall {
                operation: "reset",
                status,
            })?;

        self.sample_time = 0.0;
        self.latency_valid = false;
        self.latency_stale.set(false);
        self.state = InstanceState::Ready;
        tracing::debug!("{} ready", self.component.descriptor);
        Ok(())
    }

    /// Render one block. Returns the frames produced, 0 on any failure.
    ///
    /// Missing input channels are rendered as silence; extra output slices
    /// are zeroed.
    pub fn process_block(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frames: usize,
    ) -> usize {
        if self.state != InstanceState::Ready || frames == 0 || frames > self.block_size {
            return 0;
        }

        self.apply_pending();

        for (c, buf) in self.in_buffers.iter_mut().enumerate() {
            let copied = match inputs.get(c) {
                Some(src) => {
                    let n = frames.min(src.len());
                    buf[..n].copy_from_slice(&src[..n]);
                    n
                }
                None => 0,
            };
            buf[copied..frames].fill(0.0);
        }

        let context = RenderContext {
            sample_time: self.sample_time,
            frames,
        };
        // the pointer lists borrow the block buffers until they drop
        let rendered = {
            let ins: SmallVec<[&[f32]; INLINE_CHANNELS]> =
                self.in_buffers.iter().map(|b| &b[..frames]).collect();
            let mut outs: SmallVec<[&mut [f32]; INLINE_CHANNELS]> =
                self.out_buffers.iter_mut().map(|b| &mut b[..frames]).collect();
            self.unit.render(&context, &ins, &mut outs)
        };
        if rendered.is_err() {
            return 0;
        }

        for (c, dst) in outputs.iter_mut().enumerate() {
            let n = frames.min(dst.len());
            match self.out_buffers.get(c) {
                Some(src) => dst[..n].copy_from_slice(&src[..n]),
                None => dst[..n].fill(0.0),
            }
        }

        self.sample_time += frames as f64;
        frames
    }

    fn apply_pending(&mut self) {
        let Self {
            unit,
            settings,
            param_rx,
            ..
        } = self;
        param_rx.drain(|change| {
            if let PendingChange::Parameter { id, value, .. } = change {
                if unit.set_parameter(id, value).is_ok() {
                    settings.set(id, value);
                }
            }
        });
    }

    /// Release block buffers.
    pub fn process_finalize(&mut self) -> bool {
        match self.state {
            InstanceState::Ready | InstanceState::Initialized => {
                self.in_buffers = Vec::new();
                self.out_buffers = Vec::new();
                self.state = InstanceState::Finalized;
                tracing::debug!("{} finalized", self.component.descriptor);
                true
            }
            _ => false,
        }
    }

    /// Change rate or channels, tearing down and rebuilding as needed.
    ///
    /// Either the instance returns to its previous stage with the new
    /// settings, or it is left `Configured` with the unit uninitialized.
    pub fn reconfigure(&mut self, sample_rate: f64, channels: ChannelConfig) -> Result<()> {
        validate_rate(sample_rate)?;
        let previous = self.state;

        self.release_unit();
        self.in_buffers = Vec::new();
        self.out_buffers = Vec::new();
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.state = InstanceState::Configured;

        let result = match previous {
            InstanceState::Initialized => self.initialize(),
            InstanceState::Ready => self.process_initialize(),
            _ => Ok(()),
        };

        if result.is_err() {
            self.release_unit();
            self.in_buffers = Vec::new();
            self.out_buffers = Vec::new();
            self.state = InstanceState::Configured;
        }
        result
    }

    /// Soft stop. Buffers and registration stay in place.
    pub fn suspend(&mut self) -> bool {
        true
    }

    /// Clear the unit's processing state.
    pub fn resume(&mut self) -> bool {
        self.unit.reset().is_ok()
    }

    // ---- parameters ----

    /// Zero the cache, then read every named parameter from the unit.
    ///
    /// Parameters that fail to read keep the zero default.
    pub fn fetch_settings(&mut self) -> &SettingsCache {
        self.settings.reset_values();
        let mut skipped = 0;
        for info in self.parameters.known() {
            match self.unit.get_parameter(info.id) {
                Ok(value) => {
                    self.settings.set(info.id, value);
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(
                "{}: {} parameters could not be read",
                self.component.descriptor,
                skipped
            );
        }
        &self.settings
    }

    /// Push every value present in `cache` to the unit.
    ///
    /// Parameters absent from `cache` are left untouched. Returns the number
    /// of values applied.
    pub fn store_settings(&mut self, cache: &SettingsCache) -> usize {
        let mut applied = 0;
        for info in self.parameters.known() {
            let Some(value) = cache.get(info.id) else {
                continue;
            };
            match self.unit.set_parameter(info.id, value) {
                Ok(()) => {
                    self.settings.set(info.id, value);
                    applied += 1;
                }
                Err(status) => tracing::debug!(
                    "{}",
                    HostError::ParameterSetFailed {
                        id: info.id,
                        status
                    }
                ),
            }
        }
        applied
    }

    pub fn parameter(&self, id: u32) -> Result<f32> {
        self.unit
            .get_parameter(id)
            .map_err(|status| HostError::ParameterQueryFailed { id, status })
    }

    /// Set a parameter directly on the unit (control thread, not running).
    pub fn set_parameter(&mut self, id: u32, value: f32) -> Result<()> {
        self.unit
            .set_parameter(id, value)
            .map_err(|status| HostError::ParameterSetFailed { id, status })?;
        self.settings.set(id, value);
        Ok(())
    }

    /// Realtime-safe parameter write used by groups.
    pub(crate) fn apply_parameter(&mut self, id: u32, value: f32) {
        if self.unit.set_parameter(id, value).is_ok() {
            self.settings.set(id, value);
        }
    }

    /// Record a value the unit already holds.
    pub(crate) fn note_parameter(&mut self, id: u32, value: f32) {
        self.settings.set(id, value);
    }

    pub(crate) fn read_parameter(&self, id: u32) -> Option<f32> {
        self.unit.get_parameter(id).ok()
    }

    /// Current values keyed by synthesized name.
    pub fn automation_parameters(&self) -> AutomationParameters {
        self.parameters
            .known()
            .filter_map(|info| {
                self.unit
                    .get_parameter(info.id)
                    .ok()
                    .map(|value| (info.name.clone(), value as f64))
            })
            .collect()
    }

    /// Apply values by synthesized name and notify listeners of each change.
    /// Unknown names are ignored.
    pub fn set_automation_parameters(&mut self, params: &AutomationParameters) -> usize {
        let mut partial = SettingsCache::for_table(&self.parameters);
        for &id in self.parameters.ids() {
            let value = self
                .parameters
                .info(id)
                .and_then(|info| params.get(&info.name));
            match value {
                Some(&v) => {
                    partial.set(id, v as f32);
                }
                None => {
                    partial.remove(id);
                }
            }
        }

        let applied = self.store_settings(&partial);
        for (id, _) in partial.iter() {
            self.unit.notify_parameter_change(Some(id));
        }
        applied
    }

    /// Handle pending unit notifications on the control thread.
    ///
    /// While this instance is the master of a running group, drain through
    /// [`GroupControl::pump_events`](crate::GroupControl::pump_events)
    /// instead; events taken here never reach the slaves.
    pub fn pump_events(&mut self) -> usize {
        let policy = self.options.load().latency_policy;
        let mut resync = false;
        let settings = &mut self.settings;
        let stale = &self.latency_stale;
        let count = self.events.pump(|event| match event {
            UnitEvent::ParameterChanged { id, value } => {
                settings.set(id, value);
            }
            UnitEvent::AllParametersChanged => resync = true,
            UnitEvent::PropertyChanged { property, .. } => {
                mark_latency(property, stale, policy);
            }
        });
        if resync {
            self.fetch_settings();
        }
        count
    }

    // ---- state and presets ----

    pub fn class_state(&self) -> Result<ClassState> {
        self.unit.global::<property::ClassInfo>()
    }

    /// Replace the unit's full state and resynchronize the cache.
    pub fn set_class_state(&mut self, state: &ClassState) -> Result<()> {
        self.unit.set_global::<property::ClassInfo>(state)?;
        self.unit.notify_parameter_change(None);
        self.fetch_settings();
        Ok(())
    }

    /// Seed `other` with this unit's complete state.
    pub fn copy_state_to(&self, other: &mut EffectInstance) -> Result<()> {
        let state = self.class_state()?;
        other.set_class_state(&state)
    }

    pub fn set_present_preset(&mut self, preset: &PresetId) -> Result<()> {
        self.unit.set_global::<property::PresentPreset>(preset)
    }

    pub fn present_preset(&self) -> Result<PresetId> {
        self.unit.global::<property::PresentPreset>()
    }

    /// Names of the unit's built-in presets; empty when it has none.
    pub fn factory_presets(&self) -> Vec<String> {
        self.unit
            .global::<property::FactoryPresets>()
            .map(|presets| presets.into_iter().map(|p| p.name).collect())
            .unwrap_or_default()
    }

    pub fn load_factory_preset(&mut self, index: usize) -> Result<()> {
        let presets = self.unit.global::<property::FactoryPresets>()?;
        let preset = presets
            .get(index)
            .ok_or_else(|| HostError::PresetNotFound {
                preset: format!("factory preset #{}", index),
            })?;
        self.unit.set_global::<property::PresentPreset>(preset)?;
        self.unit.notify_parameter_change(None);
        self.fetch_settings();
        Ok(())
    }

    // ---- latency and tail ----

    /// Processing delay in samples, read once per session.
    ///
    /// Zero when latency reporting is disabled in the host options.
    pub fn latency(&mut self) -> u64 {
        if !self.options.load().use_latency {
            return 0;
        }
        if self.latency_stale.swap(false) {
            self.latency_valid = false;
        }
        if !self.latency_valid {
            let seconds = self.unit.global::<property::Latency>().unwrap_or(0.0);
            self.latency_samples = seconds_to_samples(seconds, self.sample_rate);
            self.latency_valid = true;
        }
        self.latency_samples
    }

    /// Trailing decay in samples, queried on every call.
    pub fn tail_size(&self) -> u64 {
        let seconds = self.unit.global::<property::TailTime>().unwrap_or(0.0);
        seconds_to_samples(seconds, self.sample_rate)
    }
}

impl Drop for EffectInstance {
    fn drop(&mut self) {
        self.release_unit();
    }
}

impl std::fmt::Debug for EffectInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectInstance")
            .field("descriptor", &self.component.descriptor.path())
            .field("state", &self.state)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("member", &self.member)
            .finish_non_exhaustive()
    }
}

fn validate_rate(sample_rate: f64) -> Result<()> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(fxhost_core::Error::InvalidConfig(format!(
            "sample rate {} must be positive",
            sample_rate
        ))
        .into());
    }
    Ok(())
}

fn seconds_to_samples(seconds: f64, sample_rate: f64) -> u64 {
    (seconds * sample_rate).round().max(0.0) as u64
}

fn query_parameters(unit: &dyn NativeUnit) -> ParameterTable {
    let mut table = ParameterTable::new();
    let ids = match unit.global::<property::ParameterList>() {
        Ok(ids) => ids,
        Err(e) => {
            tracing::debug!("No parameter list: {}", e);
            return table;
        }
    };

    for id in ids {
        let info = unit
            .get_value::<property::ParameterInfo>(Scope::Global, id)
            .ok()
            .map(|raw| {
                let mut info = ParameterInfo::new(id, raw.name);
                if let Some(clump_id) = raw.clump_id {
                    let clump_name = unit
                        .get_value::<property::ParameterClumpName>(Scope::Global, clump_id)
                        .ok();
                    info = info.with_clump(clump_id, clump_name);
                }
                if !raw.writable {
                    info = info.read_only();
                }
                info
            });
        table.insert(id, info);
    }
    table
}
