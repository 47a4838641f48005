//! Cooperative cancellation.
//!
//! A [`CancellationSource`] hands out cheap cloneable
//! [`CancellationToken`]s. Tokens are polled (`is_cancelled`) at the
//! defined check points of the walkers and awaited (`cancelled`) inside
//! the lock-wait races. Cancellation is one-way and sticky.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug)]
struct Shared {
    tx: watch::Sender<bool>,
}

/// Controller side: triggers cancellation for every token it handed out.
#[derive(Debug, Clone)]
pub struct CancellationSource {
    shared: Arc<Shared>,
}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shared: Arc::new(Shared { tx }),
        }
    }

    /// A token observing this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancel every token from this source. Idempotent.
    pub fn cancel(&self) {
        self.shared.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.shared.tx.borrow()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side: passed into cancellable operations.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

impl CancellationToken {
    /// A token that never fires, for callers that do not need
    /// cancellation.
    #[must_use]
    pub fn none() -> Self {
        CancellationSource::new().token()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.shared.tx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever on a token
    /// whose source never cancels.
    pub async fn cancelled(&self) {
        let mut rx = self.shared.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // The token keeps the sender alive, so `changed` only fails
            // when nothing can ever cancel us; pend in that case.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
