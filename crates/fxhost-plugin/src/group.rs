//! Realtime master/slave groups.
//!
//! The group owns one master [`EffectInstance`] and one slave per channel
//! group being rendered. Slaves do the audible processing; the master runs
//! once per cycle over the sum of every slave's input for monitoring.
//!
//! ```text
//! realtime_process_start   drain queued changes, clear sums
//! realtime_process(i, ..)  add input to sums, render slave i
//! realtime_process_end     render master over the sums
//! ```
//!
//! Control-thread edits reach the audio thread only through the group's
//! parameter queue ([`GroupControl`]).

use crate::error::{HostError, Result};
use crate::events::EventBridge;
use crate::instance::{EffectInstance, GroupId, GroupMember, InstanceState};
use crate::preset::PresetTarget;
use crate::state::ClassState;
use fxhost_core::{
    param_queue, AtomicFlag, AutomationParameters, ChangeTarget, EffectDescriptor, ParamReceiver,
    ParamSender, PendingChange, SharedOptions, PARAM_QUEUE_SIZE,
};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

/// A group that could not start. Carries the master back to the caller.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct StartError {
    pub error: HostError,
    pub master: EffectInstance,
}

impl From<StartError> for HostError {
    fn from(e: StartError) -> Self {
        e.error
    }
}

// Fields drop in declaration order: slaves, then sums, then the master.
pub struct MasterSlaveGroup {
    slaves: Vec<EffectInstance>,
    sum_in: Vec<Vec<f32>>,
    sum_out: Vec<Vec<f32>>,
    master: EffectInstance,

    id: GroupId,
    max_frames: usize,
    suspended: bool,
    finalized: bool,
    param_tx: ParamSender,
    param_rx: ParamReceiver,
    latency_stale: Arc<AtomicFlag>,
    options: SharedOptions,
}

impl MasterSlaveGroup {
    /// Put `master` into realtime mode.
    ///
    /// A finalized master is reconfigured with its previous settings first.
    /// On failure the master comes back inside the error.
    pub fn new(mut master: EffectInstance) -> std::result::Result<Self, StartError> {
        if let Err(error) = Self::prepare_master(&mut master) {
            return Err(StartError { error, master });
        }

        let block = master.block_size();
        let sum_in = vec![vec![0.0; block]; master.audio_in_count() as usize];
        let sum_out = vec![vec![0.0; block]; master.audio_out_count() as usize];
        let (param_tx, param_rx) = param_queue(PARAM_QUEUE_SIZE);
        let id = GroupId(NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed));

        tracing::info!(
            "Realtime group {} started for {} (block {})",
            id.0,
            master.descriptor(),
            block
        );

        Ok(Self {
            slaves: Vec::new(),
            sum_in,
            sum_out,
            latency_stale: master.latency_stale(),
            options: Arc::clone(master.options()),
            master,
            id,
            max_frames: 0,
            suspended: false,
            finalized: false,
            param_tx,
            param_rx,
        })
    }

    /// Start a group with one processor per entry of `channel_groups`.
    ///
    /// If a processor cannot be added the partial group is finalized and
    /// the master is returned in the error.
    pub fn start(
        master: EffectInstance,
        channel_groups: &[u32],
        sample_rate: f64,
    ) -> std::result::Result<Self, StartError> {
        let mut group = Self::new(master)?;
        for &channels in channel_groups {
            if let Err(error) = group.add_processor(channels, sample_rate) {
                return Err(StartError {
                    error,
                    master: group.into_master(),
                });
            }
        }
        Ok(group)
    }

    fn prepare_master(master: &mut EffectInstance) -> Result<()> {
        match master.state() {
            InstanceState::Unconfigured => {
                return Err(HostError::InvalidState {
                    operation: "start realtime processing",
                    state: InstanceState::Unconfigured,
                })
            }
            InstanceState::Finalized => {
                let (rate, channels) = (master.sample_rate(), master.channels());
                master.configure(rate, channels)?;
            }
            _ => {}
        }
        master.process_initialize()
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Control-thread handle for parameter edits and event forwarding.
    pub fn control(&self) -> GroupControl {
        GroupControl {
            params: self.param_tx.clone(),
            events: self.master.events().clone(),
            latency_stale: Arc::clone(&self.latency_stale),
            options: Arc::clone(&self.options),
        }
    }

    /// Create a slave for one channel group and seed it with the master's
    /// complete state. Returns the slave's index.
    pub fn add_processor(&mut self, channels: u32, sample_rate: f64) -> Result<usize> {
        if self.finalized {
            return Err(HostError::InvalidState {
                operation: "add a processor",
                state: InstanceState::Finalized,
            });
        }

        let index = self.slaves.len();
        let member = GroupMember {
            group: self.id,
            index,
        };
        let mut slave = EffectInstance::new_slave(
            self.master.component().clone(),
            Arc::clone(&self.options),
            member,
        )?;

        let layout = slave.negotiated_channels();
        slave.configure(sample_rate, layout)?;
        slave.set_group_channels(channels);
        self.master.copy_state_to(&mut slave)?;
        slave.process_initialize()?;

        tracing::debug!(
            "Group {} added processor {} ({} channels)",
            self.id.0,
            index,
            channels
        );
        self.slaves.push(slave);
        Ok(index)
    }

    /// Apply queued changes and clear the summing buffers.
    pub fn realtime_process_start(&mut self) -> bool {
        if self.finalized {
            return false;
        }

        let Self {
            slaves,
            master,
            param_rx,
            ..
        } = self;
        param_rx.drain(|change| match change {
            PendingChange::Parameter { id, value, target } => {
                match target {
                    ChangeTarget::All => master.apply_parameter(id, value),
                    // the master's unit raised this change itself
                    ChangeTarget::SlavesOnly => master.note_parameter(id, value),
                }
                for slave in slaves.iter_mut() {
                    slave.apply_parameter(id, value);
                }
            }
            PendingChange::ResyncAll => {
                for index in 0..master.parameters().len() {
                    let id = master.parameters().ids()[index];
                    if let Some(value) = master.read_parameter(id) {
                        master.note_parameter(id, value);
                        for slave in slaves.iter_mut() {
                            slave.apply_parameter(id, value);
                        }
                    }
                }
            }
        });

        for buf in self.sum_in.iter_mut().chain(self.sum_out.iter_mut()) {
            buf.fill(0.0);
        }
        self.max_frames = 0;
        true
    }

    /// Add `inputs` to the sums and render them through slave `group`.
    ///
    /// Input channels beyond the master's input count are not summed.
    /// Returns the frames the slave produced.
    pub fn realtime_process(
        &mut self,
        group: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frames: usize,
    ) -> usize {
        if self.finalized || frames == 0 || frames > self.master.block_size() {
            return 0;
        }
        let Some(slave) = self.slaves.get_mut(group) else {
            return 0;
        };

        for (sum, input) in self.sum_in.iter_mut().zip(inputs) {
            let n = frames.min(input.len());
            for (s, x) in sum[..n].iter_mut().zip(&input[..n]) {
                *s += x;
            }
        }
        self.max_frames = self.max_frames.max(frames);

        slave.process_block(inputs, outputs, frames)
    }

    /// Run the master over this cycle's summed input.
    pub fn realtime_process_end(&mut self) -> usize {
        if self.finalized || self.max_frames == 0 {
            return 0;
        }
        let frames = self.max_frames;
        let ins: SmallVec<[&[f32]; 8]> = self.sum_in.iter().map(|b| &b[..frames]).collect();
        let mut outs: SmallVec<[&mut [f32]; 8]> =
            self.sum_out.iter_mut().map(|b| &mut b[..frames]).collect();
        self.master.process_block(&ins, &mut outs, frames)
    }

    /// Transport stopped. Buffers and slaves stay in place.
    pub fn realtime_suspend(&mut self) -> bool {
        self.suspended = true;
        true
    }

    /// Transport restarted. Clears every unit's processing state.
    pub fn realtime_resume(&mut self) -> bool {
        self.suspended = false;
        let mut ok = self.master.resume();
        for slave in &mut self.slaves {
            ok &= slave.resume();
        }
        ok
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Tear down slaves, then the sums, then the master. Returns false when
    /// already finalized.
    pub fn realtime_finalize(&mut self) -> bool {
        if self.finalized {
            return false;
        }
        for slave in &mut self.slaves {
            slave.process_finalize();
        }
        self.slaves.clear();
        self.sum_in = Vec::new();
        self.sum_out = Vec::new();
        self.master.process_finalize();
        self.finalized = true;

        tracing::info!("Realtime group {} finalized", self.id.0);
        true
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Finalize and hand the master back.
    pub fn into_master(mut self) -> EffectInstance {
        self.realtime_finalize();
        let Self { master, .. } = self;
        master
    }

    /// Set the class state on the master and every slave.
    ///
    /// Slave failures are logged; the master's result is returned.
    pub fn load_class_state(&mut self, state: &ClassState) -> Result<()> {
        self.master.set_class_state(state)?;
        for (index, slave) in self.slaves.iter_mut().enumerate() {
            if let Err(e) = slave.set_class_state(state) {
                tracing::warn!("Group {} processor {}: {}", self.id.0, index, e);
            }
        }
        Ok(())
    }

    pub fn master(&self) -> &EffectInstance {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut EffectInstance {
        &mut self.master
    }

    pub fn slave(&self, index: usize) -> Option<&EffectInstance> {
        self.slaves.get(index)
    }

    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    /// Summed input of the last cycle.
    pub fn summing_input(&self) -> &[Vec<f32>] {
        &self.sum_in
    }

    pub fn summing_output(&self) -> &[Vec<f32>] {
        &self.sum_out
    }
}

impl PresetTarget for MasterSlaveGroup {
    fn descriptor(&self) -> &EffectDescriptor {
        self.master.descriptor()
    }

    fn capture_state(&mut self, name: &str) -> Result<ClassState> {
        self.master.capture_state(name)
    }

    fn restore_state(&mut self, state: &ClassState) -> Result<()> {
        self.load_class_state(state)
    }

    fn apply_automation(&mut self, params: &AutomationParameters) -> usize {
        let applied = self.master.set_automation_parameters(params);
        for slave in &mut self.slaves {
            slave.set_automation_parameters(params);
        }
        applied
    }
}

impl std::fmt::Debug for MasterSlaveGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSlaveGroup")
            .field("id", &self.id)
            .field("master", &self.master)
            .field("slaves", &self.slaves.len())
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

/// Control-thread side of a running group. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GroupControl {
    params: ParamSender,
    events: EventBridge,
    latency_stale: Arc<AtomicFlag>,
    options: SharedOptions,
}

impl GroupControl {
    /// Queue a parameter edit for the master and every slave.
    pub fn set_parameter(&self, id: u32, value: f32) -> bool {
        let queued = self.params.push(PendingChange::Parameter {
            id,
            value,
            target: ChangeTarget::All,
        });
        if !queued {
            tracing::warn!("Parameter queue full, dropped change to {:#x}", id);
        }
        queued
    }

    /// Queue a copy of every master value into the slaves.
    pub fn resync(&self) -> bool {
        self.params.push(PendingChange::ResyncAll)
    }

    /// Forward the master's pending notifications to the audio thread,
    /// where they update the slaves and the master's cache.
    ///
    /// Only one consumer may drain the master's events while the group
    /// runs; do not also call the master's own `pump_events`.
    pub fn pump_events(&self) -> usize {
        let policy = self.options.load().latency_policy;
        self.events
            .forward(&self.params, &self.latency_stale, policy)
    }
}
