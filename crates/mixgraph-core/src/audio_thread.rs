//! The worker thread that owns a [`CommandQueue`]'s execution context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::queue::CommandQueue;

/// Default interval between queue drains.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// A named OS thread bound as the audio execution context.
///
/// The thread drains the queue once per tick interval, and early whenever an
/// action is deferred onto it. Stopping (or dropping) the worker drains the
/// queue one final time, unbinds it, and joins the thread.
pub struct AudioThread {
    queue: CommandQueue,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AudioThread {
    /// Spawns the worker and binds it to `queue`.
    pub fn spawn(queue: CommandQueue, tick: Duration) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let worker_queue = queue.clone();
        let worker_running = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name("mixgraph-audio".into())
            .spawn(move || run_loop(&worker_queue, &worker_running, tick))?;
        tracing::debug!(tick_ms = tick.as_millis() as u64, "audio thread started");
        Ok(Self {
            queue,
            running,
            handle: Some(handle),
        })
    }

    /// The queue this worker drains.
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Whether the worker loop is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops the worker after a final drain and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        self.queue.wake();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("audio thread panicked");
        }
    }
}

impl Drop for AudioThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(queue: &CommandQueue, running: &AtomicBool, tick: Duration) {
    queue.bind_current_thread();
    let wake = queue.wake_receiver();
    while running.load(Ordering::Acquire) {
        queue.tick();
        match wake.recv_timeout(tick) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let drained = queue.tick();
    queue.unbind();
    tracing::debug!(drained, "audio thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn worker_runs_deferred_actions() {
        let queue = CommandQueue::new();
        let worker = AudioThread::spawn(queue.clone(), Duration::from_millis(1)).unwrap();
        assert!(worker.is_running());
        let (tx, rx) = crossbeam_channel::bounded(1);
        queue.schedule(move || {
            tx.send(std::thread::current().name().map(str::to_owned))
                .ok();
            Ok(())
        });
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("mixgraph-audio"));
        worker.stop();
    }

    #[test]
    fn stop_drains_remaining_actions() {
        let queue = CommandQueue::new();
        let worker = AudioThread::spawn(queue.clone(), Duration::from_secs(60)).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let h = Arc::clone(&hits);
            queue.schedule(move || {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        worker.stop();
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert!(!queue.is_audio_thread());
    }

    #[test]
    fn concurrent_producers_never_interleave() {
        let queue = CommandQueue::new();
        let worker = AudioThread::spawn(queue.clone(), Duration::from_millis(1)).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = queue.clone();
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let log = Arc::clone(&log);
                        q.schedule(move || {
                            // Two steps per action; a concurrent action would
                            // land between them.
                            log.lock().push((p, i, 0));
                            log.lock().push((p, i, 1));
                            Ok(())
                        });
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        worker.stop();

        let log = log.lock();
        assert_eq!(log.len(), 400);
        for pair in log.chunks(2) {
            assert_eq!((pair[0].0, pair[0].1), (pair[1].0, pair[1].1));
            assert_eq!((pair[0].2, pair[1].2), (0, 1));
        }
        // Per-producer acceptance order is preserved.
        for p in 0..4 {
            let seq: Vec<_> = log
                .iter()
                .filter(|e| e.0 == p && e.2 == 0)
                .map(|e| e.1)
                .collect();
            assert_eq!(seq, (0..50).collect::<Vec<_>>());
        }
    }
}
