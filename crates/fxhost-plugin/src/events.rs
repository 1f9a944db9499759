//! Change notifications from native units.
//!
//! A unit pushes [`UnitEvent`]s into the [`EventSink`] it was given when the
//! instance registered as a listener. The control thread drains them through
//! [`EventBridge::pump`] once per tick, so delivery never depends on the
//! native threading model.

use crate::abi::{PropertyId, Scope};
use crossbeam_channel::{Receiver, Sender};
use fxhost_core::{AtomicFlag, ChangeTarget, LatencyPolicy, ParamSender, PendingChange};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitEvent {
    ParameterChanged { id: u32, value: f32 },
    /// Raised after preset loads and other bulk changes.
    AllParametersChanged,
    PropertyChanged {
        property: PropertyId,
        scope: Scope,
        element: u32,
    },
}

pub type EventSink = Sender<UnitEvent>;

/// Receiving end of one unit's notifications. Clones share the same stream,
/// so each event reaches only one of them: drain a bridge from one place.
#[derive(Debug, Clone)]
pub struct EventBridge {
    sender: Sender<UnitEvent>,
    receiver: Receiver<UnitEvent>,
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBridge {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Sink handed to the native unit.
    pub fn sink(&self) -> EventSink {
        self.sender.clone()
    }

    /// Deliver pending events in the order they were raised.
    pub fn pump(&self, mut handler: impl FnMut(UnitEvent)) -> usize {
        let mut count = 0;
        for event in self.receiver.try_iter() {
            handler(event);
            count += 1;
        }
        count
    }

    /// Forward master notifications to a running group.
    ///
    /// Parameter changes go to slaves only; the master already holds the
    /// value. A latency change marks `latency_stale` only under
    /// [`LatencyPolicy::RefreshOnChange`].
    pub fn forward(
        &self,
        slaves: &ParamSender,
        latency_stale: &AtomicFlag,
        policy: LatencyPolicy,
    ) -> usize {
        self.pump(|event| match event {
            UnitEvent::ParameterChanged { id, value } => {
                let change = PendingChange::Parameter {
                    id,
                    value,
                    target: ChangeTarget::SlavesOnly,
                };
                if !slaves.push(change) {
                    tracing::warn!("Parameter queue full, dropped change to {:#x}", id);
                }
            }
            UnitEvent::AllParametersChanged => {
                if !slaves.push(PendingChange::ResyncAll) {
                    tracing::warn!("Parameter queue full, dropped resync");
                }
            }
            UnitEvent::PropertyChanged { property, .. } => {
                mark_latency(property, latency_stale, policy);
            }
        })
    }
}

pub(crate) fn mark_latency(
    property: PropertyId,
    latency_stale: &AtomicFlag,
    policy: LatencyPolicy,
) {
    if property == PropertyId::Latency {
        match policy {
            LatencyPolicy::RefreshOnChange => latency_stale.set(true),
            LatencyPolicy::KeepCached => {
                tracing::debug!("Latency changed, keeping cached value for this session")
            }
        }
    }
}
