//! Cancellation token for in-flight transfers.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

type CancelAction = Box<dyn FnOnce() + Send>;

/// A one-shot cancellation signal shared between the party that starts a
/// transfer and the executor running it.
///
/// Besides the flag, the token keeps a list of actions registered with
/// [`CancelToken::on_cancel`]; they run exactly once, on the first
/// [`CancelToken::cancel`] call.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    token: CancellationToken,
    actions: Mutex<Vec<CancelAction>>,
}

impl CancelToken {
    /// Create a fresh, un-signalled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    ///
    /// Returns `true` if this call flipped the token, `false` if it was
    /// already cancelled.
    pub fn cancel(&self) -> bool {
        let actions = {
            let mut actions = self
                .inner
                .actions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.inner.token.is_cancelled() {
                return false;
            }
            self.inner.token.cancel();
            std::mem::take(&mut *actions)
        };

        for action in actions {
            action();
        }
        true
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolve once cancellation is signalled.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Register an action to run on cancellation.
    ///
    /// Runs immediately if the token is already cancelled.
    pub fn on_cancel<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut actions = self
                .inner
                .actions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !self.inner.token.is_cancelled() {
                actions.push(Box::new(action));
                return;
            }
        }
        action();
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
