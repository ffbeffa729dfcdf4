//! Serial context on which batch completion callbacks run

use std::panic::AssertUnwindSafe;

use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-consumer executor for completion callbacks
///
/// Jobs run one at a time, in dispatch order, on one Tokio task, so a
/// callback never races another callback. A panicking job is logged and the
/// context keeps running. Callbacks should be short: a blocking callback
/// holds up every later one.
#[derive(Clone)]
pub struct CallbackContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl CallbackContext {
    /// Start the context on the current Tokio runtime
    ///
    /// The worker exits once every clone of the context is dropped.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("Completion callback panicked");
                }
            }
            tracing::debug!("Callback context stopped");
        });
        Self { tx }
    }

    /// Queue a job; returns false if the context has stopped
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }
}
