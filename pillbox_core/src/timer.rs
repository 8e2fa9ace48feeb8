//! Cancellable repeating poll timer.
//!
//! The timer thread only emits [`Tick`] messages; the thread that owns the
//! [`crate::Reminder`] receives them and applies them, so reminder state is
//! never touched from two threads.

use chrono::{DateTime, Local};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// One firing of the poll timer
#[derive(Clone, Copy, Debug)]
pub struct Tick {
    pub at: DateTime<Local>,
}

/// Handle to a running poll timer
pub struct PollTimer {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PollTimer {
    /// Start firing every `interval`; the first tick arrives after one interval
    pub fn spawn(interval: Duration) -> (Self, Receiver<Tick>) {
        let (tick_tx, tick_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if tick_tx.send(Tick { at: Local::now() }).is_err() {
                        tracing::debug!("Tick receiver dropped, poll timer exiting");
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        tracing::debug!("Poll timer started ({:?} interval)", interval);
        (
            Self {
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            },
            tick_rx,
        )
    }

    /// Stop the timer and wait for its thread; calling it again is a no-op
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Poll timer thread panicked");
            }
            tracing::debug!("Poll timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
