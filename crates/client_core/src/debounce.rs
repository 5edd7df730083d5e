use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle};

/// Emits a value only after it has been stable for `delay`.
///
/// Each push aborts the timer of the previous value, so intermediate values
/// never reach the receiver. Dropping the debouncer aborts any pending timer.
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                pending: None,
                tx,
            },
            rx,
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn push(&mut self, value: T) {
        self.cancel();
        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(value);
        }));
    }

    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
