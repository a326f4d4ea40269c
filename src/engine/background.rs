//! Background flush and compaction
//!
//! One thread per engine. It wakes on a flush signal or every
//! `background_interval`, flushes memtables that reached their limit (or
//! are still waiting after an earlier failure), then compacts tables that
//! reached a trigger. A failed pass is retried with exponential backoff;
//! it never stops the engine.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::Result;

use super::EngineInner;

/// Messages to the background thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// A memtable reached its size limit
    Flush,
    /// Finish the current pass and exit
    Shutdown,
}

/// Exponential retry delay: initial, doubling, capped at max
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: None,
        }
    }

    /// Record a failure; returns how long to wait before the next attempt
    pub fn fail(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(delay) => (delay * 2).min(self.max),
        };
        self.current = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn is_backing_off(&self) -> bool {
        self.current.is_some()
    }
}

/// Handle to the background thread
pub(crate) struct BackgroundWorker {
    sender: Sender<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    pub fn spawn(
        inner: Arc<EngineInner>,
        sender: Sender<Signal>,
        receiver: Receiver<Signal>,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("cellstore-background".to_string())
            .spawn(move || run(inner, receiver))?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            // a disconnected channel means the thread already exited
            let _ = self.sender.send(Signal::Shutdown);
            if handle.join().is_err() {
                tracing::error!("Background thread panicked");
            }
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(inner: Arc<EngineInner>, receiver: Receiver<Signal>) {
    let interval = inner.config().background_interval;
    let mut backoff = Backoff::new(
        inner.config().retry_backoff_initial,
        inner.config().retry_backoff_max,
    );
    let mut next_attempt = Instant::now() + interval;

    tracing::debug!("Background worker started");
    loop {
        let wait = next_attempt.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(wait) {
            Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            // flush requests do not cut a retry delay short
            Ok(Signal::Flush) if backoff.is_backing_off() && Instant::now() < next_attempt => {
                continue;
            }
            Ok(Signal::Flush) | Err(RecvTimeoutError::Timeout) => {}
        }

        match inner.background_pass() {
            Ok(()) => {
                backoff.reset();
                next_attempt = Instant::now() + interval;
            }
            Err(e) => {
                let delay = backoff.fail();
                tracing::warn!(
                    "Background flush/compaction failed, retrying in {:?}: {}",
                    delay,
                    e
                );
                next_attempt = Instant::now() + delay;
            }
        }
    }
    tracing::debug!("Background worker stopped");
}
