use tokio::sync::watch;

/// Caller side of a cancellation pair.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Idempotent. The consumer observes the request at its next read
    /// suspension point at the latest.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once `abort` has been called on any clone.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Consumer side of a cancellation pair.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Creates a linked abort handle and token.
    pub fn pair() -> (AbortHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (AbortHandle { tx }, CancelToken { rx })
    }

    /// A token that is never cancelled.
    pub fn never() -> CancelToken {
        let (_tx, rx) = watch::channel(false);
        CancelToken { rx }
    }

    /// Returns `true` once the paired handle has aborted.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested.
    ///
    /// Never resolves if every abort handle is dropped without aborting.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                if *self.rx.borrow() {
                    return;
                }
                std::future::pending::<()>().await;
            }
        }
    }
}
