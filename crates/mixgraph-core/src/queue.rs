//! Serialization of graph mutations onto the audio execution context.
//!
//! [`CommandQueue`] is the only way graph state changes. A caller already
//! running on the bound audio thread has its action executed inline; anyone
//! else gets the action appended to a pending list that the audio thread
//! drains once per tick via [`CommandQueue::tick`].
//!
//! # Thread Safety
//!
//! - **Pending actions**: `Mutex<VecDeque>`. Any thread locks to push, the
//!   audio thread swaps the whole deque out to drain.
//! - **Audio thread identity**: `RwLock<Option<ThreadId>>`, written on bind,
//!   read on every schedule.
//! - **Counters**: atomics, readable from anywhere without locking.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::{Mutex, RwLock};

use crate::error::MixerError;

/// A deferred graph mutation.
pub type Command = Box<dyn FnOnce() -> Result<(), MixerError> + Send>;

struct QueueInner {
    pending: Mutex<VecDeque<Command>>,
    audio_thread: RwLock<Option<ThreadId>>,
    executed: AtomicU64,
    failed: AtomicU64,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

/// Single-consumer work queue bound to one audio thread.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct CommandQueue {
    inner: Arc<QueueInner>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    /// Creates an unbound queue. Until a thread is bound every action is
    /// deferred.
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(VecDeque::new()),
                audio_thread: RwLock::new(None),
                executed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// Makes the calling thread the audio execution context.
    ///
    /// Rebinding replaces the previous thread; the old thread's subsequent
    /// schedules are deferred like any other caller's.
    pub fn bind_current_thread(&self) {
        *self.inner.audio_thread.write() = Some(thread::current().id());
    }

    /// Forgets the bound thread, if any.
    pub fn unbind(&self) {
        *self.inner.audio_thread.write() = None;
    }

    /// Whether the calling thread is the bound audio thread.
    pub fn is_audio_thread(&self) -> bool {
        *self.inner.audio_thread.read() == Some(thread::current().id())
    }

    /// Runs `action` now if called on the audio thread, otherwise queues it
    /// for the next tick.
    ///
    /// Actions accepted from different threads run one at a time in the
    /// order they were accepted. A failing action is logged and does not
    /// prevent later actions from running.
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce() -> Result<(), MixerError> + Send + 'static,
    {
        if self.is_audio_thread() {
            self.run(Box::new(action));
            return;
        }
        self.inner.pending.lock().push_back(Box::new(action));
        // A full wake channel already has a wake-up pending.
        let _ = self.inner.wake_tx.try_send(());
    }

    /// Drains and runs every pending action. Returns how many ran.
    ///
    /// Must be called on the audio thread. Actions scheduled by the drained
    /// actions themselves run inline, since they are scheduled from the audio
    /// thread.
    pub fn tick(&self) -> usize {
        debug_assert!(
            self.is_audio_thread(),
            "CommandQueue::tick called off the audio thread"
        );
        let batch = std::mem::take(&mut *self.inner.pending.lock());
        let count = batch.len();
        for action in batch {
            self.run(action);
        }
        count
    }

    fn run(&self, action: Command) {
        self.inner.executed.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = action() {
            self.inner.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %err, "queued mixer action failed");
        }
    }

    /// Number of actions waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Total actions run, inline or deferred.
    pub fn executed(&self) -> u64 {
        self.inner.executed.load(Ordering::Relaxed)
    }

    /// Total actions that returned an error.
    pub fn failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// Receiver signalled whenever an action is deferred. Used by the audio
    /// worker to wake before its tick interval elapses.
    pub(crate) fn wake_receiver(&self) -> Receiver<()> {
        self.inner.wake_rx.clone()
    }

    pub(crate) fn wake(&self) {
        let _ = self.inner.wake_tx.try_send(());
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.pending())
            .field("executed", &self.executed())
            .field("failed", &self.failed())
            .finish()
    }
}
