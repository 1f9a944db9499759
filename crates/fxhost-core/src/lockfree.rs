//! Lock-free primitives shared between the control and audio threads.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Capacity of the parameter hand-off queue.
pub const PARAM_QUEUE_SIZE: usize = 256;

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Clone for AtomicFlag {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Cache-line aligned counter.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Which instances of a group a parameter change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTarget {
    /// Master and every slave (a control-thread edit).
    All,
    /// Slaves only; the master already holds the value (a UI knob change).
    SlavesOnly,
}

/// A change waiting to be applied on the audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingChange {
    Parameter {
        id: u32,
        value: f32,
        target: ChangeTarget,
    },
    /// Copy every master parameter into every slave.
    ResyncAll,
}

/// Create a bounded single-consumer hand-off queue.
pub fn param_queue(capacity: usize) -> (ParamSender, ParamReceiver) {
    let queue = Arc::new(ArrayQueue::new(capacity.max(1)));
    let dropped = Arc::new(AtomicCounter::default());
    (
        ParamSender {
            queue: Arc::clone(&queue),
            dropped: Arc::clone(&dropped),
        },
        ParamReceiver { queue, dropped },
    )
}

/// Producer side. Cheap to clone; never blocks.
#[derive(Debug, Clone)]
pub struct ParamSender {
    queue: Arc<ArrayQueue<PendingChange>>,
    dropped: Arc<AtomicCounter>,
}

impl ParamSender {
    /// Queue a change. Returns false when the queue is full and the change
    /// was dropped.
    pub fn push(&self, change: PendingChange) -> bool {
        match self.queue.push(change) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.increment();
                false
            }
        }
    }

    pub fn set_parameter(&self, id: u32, value: f32) -> bool {
        self.push(PendingChange::Parameter {
            id,
            value,
            target: ChangeTarget::All,
        })
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Consumer side, owned by whoever drives the audio thread.
#[derive(Debug)]
pub struct ParamReceiver {
    queue: Arc<ArrayQueue<PendingChange>>,
    dropped: Arc<AtomicCounter>,
}

impl ParamReceiver {
    /// Apply every queued change in arrival order. Does not allocate.
    #[inline]
    pub fn drain(&self, mut apply: impl FnMut(PendingChange)) -> usize {
        let mut count = 0;
        while let Some(change) = self.queue.pop() {
            apply(change);
            count += 1;
        }
        count
    }

    pub fn pop(&self) -> Option<PendingChange> {
        self.queue.pop()
    }

    /// Number of changes lost to a full queue so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
