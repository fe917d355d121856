//! Progress reporting and cancellation for long batches.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Keys processed so far out of the batch total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// Receives a report after every key.
///
/// Returning `false` means nobody is listening any more; the resolver stops
/// reporting but finishes the batch.
pub trait ProgressSink {
    fn report(&mut self, progress: Progress) -> bool;
}

impl<F> ProgressSink for F
where
    F: FnMut(Progress),
{
    fn report(&mut self, progress: Progress) -> bool {
        self(progress);
        true
    }
}

/// Discards every report.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: Progress) -> bool {
        true
    }
}

/// Forwards reports over a channel; detaches once the receiver is gone.
pub struct ChannelProgress(pub Sender<Progress>);

impl ProgressSink for ChannelProgress {
    fn report(&mut self, progress: Progress) -> bool {
        self.0.send(progress).is_ok()
    }
}

/// Cooperative cancellation, checked between keys.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancels the token when dropped, unless disarmed first.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

pub struct CancelOnDrop {
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
