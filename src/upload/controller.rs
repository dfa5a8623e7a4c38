//! Upload session controller.
//!
//! Drives one upload at a time through
//! `NoFileSelected -> FileSelected -> Preparing -> Transferring -> NoFileSelected`
//! and keeps the registry snapshot the file list is rendered from.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::state::{SessionError, SessionState, UploadOutcome, UploadStatus};
use crate::client::{
    ApiClient, HttpBroker, ObjectRegistry, RegistryResult, SignedLocation, SignedUrlBroker,
};
use crate::config::ClientConfig;
use crate::file::FileObject;
use crate::notify::{Notification, Notifier};
use crate::session::SessionProvider;
use crate::transfer::{
    CancelToken, FileSource, HttpTransferExecutor, ProgressFn, TransferError, TransferExecutor,
};
use crate::{FileDeckError, Result};

/// State shared with the progress callback.
struct Shared {
    state: Mutex<SessionState>,
    status: watch::Sender<UploadStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the state and publish the new snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        self.status.send_replace(state.status());
        result
    }
}

/// Returns the session to `NoFileSelected` when a transfer settles, including
/// when the transfer future is dropped mid-flight or never polled.
struct SettleGuard {
    shared: Arc<Shared>,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.shared
            .update(|state| *state = SessionState::NoFileSelected);
    }
}

/// The file manager: one upload session plus the registry view.
pub struct UploadController {
    broker: Arc<dyn SignedUrlBroker>,
    executor: Arc<dyn TransferExecutor>,
    registry: ObjectRegistry,
    notifier: Arc<dyn Notifier>,
    shared: Arc<Shared>,
    files: Mutex<Vec<FileObject>>,
}

impl UploadController {
    pub fn new(
        broker: Arc<dyn SignedUrlBroker>,
        executor: Arc<dyn TransferExecutor>,
        registry: ObjectRegistry,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (status, _) = watch::channel(UploadStatus::NoFileSelected);
        Self {
            broker,
            executor,
            registry,
            notifier,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::NoFileSelected),
                status,
            }),
            files: Mutex::new(Vec::new()),
        }
    }

    /// Wire HTTP broker, executor and registry from configuration.
    pub fn from_config(
        config: &ClientConfig,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let api = ApiClient::new(config, session)?;
        let broker: Arc<dyn SignedUrlBroker> = Arc::new(HttpBroker::new(api.clone()));
        let executor = Arc::new(HttpTransferExecutor::new(config)?);
        let registry = ObjectRegistry::new(api, broker.clone());
        Ok(Self::new(broker, executor, registry, notifier))
    }

    /// Current session snapshot.
    pub fn status(&self) -> UploadStatus {
        self.shared.lock().status()
    }

    /// Current transfer progress (0 unless transferring).
    pub fn progress(&self) -> f64 {
        self.status().progress()
    }

    /// Subscribe to session snapshots, including every progress update.
    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.shared.status.subscribe()
    }

    /// Select the file to upload, replacing any previous selection.
    ///
    /// Rejected while a transfer is being prepared or running.
    pub fn select_file(&self, source: FileSource) -> std::result::Result<(), SessionError> {
        self.shared.update(|state| {
            if state.is_busy() {
                return Err(SessionError::TransferInProgress);
            }
            tracing::debug!(name = source.name(), bytes = source.len(), "File selected");
            *state = SessionState::FileSelected(source);
            Ok(())
        })
    }

    /// Drop the current selection.
    pub fn clear_selection(&self) -> std::result::Result<(), SessionError> {
        self.shared.update(|state| {
            if state.is_busy() {
                return Err(SessionError::TransferInProgress);
            }
            *state = SessionState::NoFileSelected;
            Ok(())
        })
    }

    /// Begin uploading the selected file.
    ///
    /// The session moves to `Preparing` and its cancellation token exists
    /// before this returns, so a `cancel_transfer()` issued any time after
    /// this call takes effect. Returns an error only when the call is not
    /// valid in the current state; in that case nothing changes and no
    /// notification is sent.
    ///
    /// The returned future drives the upload. On completion the outcome is
    /// notified once, the session returns to `NoFileSelected` and the file
    /// list is refreshed. Dropping it resets the session without notifying.
    pub fn start_transfer(
        &self,
    ) -> std::result::Result<impl Future<Output = UploadOutcome> + Send + '_, SessionError> {
        let (source, cancel, settle) = self.begin_transfer()?;
        Ok(self.complete_transfer(source, cancel, settle))
    }

    /// Like [`UploadController::start_transfer`], but runs the upload on a
    /// new task.
    pub fn spawn_transfer(
        self: &Arc<Self>,
    ) -> std::result::Result<JoinHandle<UploadOutcome>, SessionError> {
        let (source, cancel, settle) = self.begin_transfer()?;
        let controller = Arc::clone(self);
        Ok(tokio::spawn(async move {
            controller.complete_transfer(source, cancel, settle).await
        }))
    }

    fn begin_transfer(
        &self,
    ) -> std::result::Result<(FileSource, CancelToken, SettleGuard), SessionError> {
        let (source, cancel) = self.shared.update(|state| {
            match std::mem::replace(state, SessionState::NoFileSelected) {
                SessionState::FileSelected(source) => {
                    let cancel = CancelToken::new();
                    *state = SessionState::Preparing {
                        name: source.name().to_string(),
                        cancel: cancel.clone(),
                    };
                    Ok((source, cancel))
                }
                SessionState::NoFileSelected => Err(SessionError::NoFileSelected),
                busy => {
                    *state = busy;
                    Err(SessionError::TransferInProgress)
                }
            }
        })?;
        let settle = SettleGuard {
            shared: self.shared.clone(),
        };
        Ok((source, cancel, settle))
    }

    async fn complete_transfer(
        &self,
        source: FileSource,
        cancel: CancelToken,
        settle: SettleGuard,
    ) -> UploadOutcome {
        let outcome = {
            let _settle = settle;
            self.run_transfer(source, &cancel).await
        };

        match &outcome {
            UploadOutcome::Uploaded { name, size } => {
                tracing::info!(name = %name, bytes = size, "Upload completed");
            }
            UploadOutcome::Cancelled { name } => tracing::info!(name = %name, "Upload cancelled"),
            UploadOutcome::Failed { name, error } => {
                tracing::error!(name = %name, error = %error, "Upload failed");
            }
        }
        self.notifier.notify(notification_for(&outcome));
        self.refresh().await;

        outcome
    }

    async fn run_transfer(&self, source: FileSource, cancel: &CancelToken) -> UploadOutcome {
        let name = source.name().to_string();

        let location = tokio::select! {
            biased;
            _ = cancel.cancelled() => return UploadOutcome::Cancelled { name },
            result = self.broker.request_write_location(source.name(), source.mime_type()) => result,
        };
        let location: SignedLocation = match location {
            Ok(location) => location,
            Err(e) => {
                return UploadOutcome::Failed {
                    name,
                    error: e.into(),
                }
            }
        };

        self.shared.update(|state| {
            *state = SessionState::Transferring {
                name: name.clone(),
                progress: 0.0,
                cancel: cancel.clone(),
            }
        });

        let result = self
            .executor
            .execute(&source, location, self.progress_sink(), cancel)
            .await;

        match result {
            Ok(()) => UploadOutcome::Uploaded {
                name,
                size: source.len(),
            },
            Err(TransferError::Cancelled) => UploadOutcome::Cancelled { name },
            Err(e) => UploadOutcome::Failed {
                name,
                error: e.into(),
            },
        }
    }

    /// Progress callback that only ever raises the recorded fraction.
    fn progress_sink(&self) -> ProgressFn {
        let shared = self.shared.clone();
        Arc::new(move |fraction: f64| {
            let fraction = fraction.clamp(0.0, 100.0);
            shared.update(|state| {
                if let SessionState::Transferring { progress, .. } = state {
                    if fraction > *progress {
                        *progress = fraction;
                    }
                }
            });
        })
    }

    /// Abort the transfer being prepared or running.
    ///
    /// Returns `false` when there is nothing to cancel.
    pub fn cancel_transfer(&self) -> bool {
        let token = self.shared.lock().cancel_token().cloned();
        match token {
            Some(token) => {
                let cancelled = token.cancel();
                if cancelled {
                    tracing::info!("Cancelling upload");
                }
                cancelled
            }
            None => false,
        }
    }

    /// Last fetched file list.
    pub fn files(&self) -> Vec<FileObject> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-query the registry and replace the file list snapshot.
    pub async fn refresh(&self) -> Vec<FileObject> {
        let files = self.registry.list().await;
        tracing::debug!(count = files.len(), "File list refreshed");
        *self.files.lock().unwrap_or_else(PoisonError::into_inner) = files.clone();
        files
    }

    /// Obtain a download location for `key`, notifying on failure.
    pub async fn download_location(&self, key: &str) -> RegistryResult<SignedLocation> {
        let result = self.registry.resolve_download_location(key).await;
        if let Err(e) = &result {
            self.notifier.notify(Notification::DownloadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            });
        }
        result
    }

    /// Delete one object, notify the outcome and refresh on success.
    pub async fn delete_file(&self, key: &str) -> RegistryResult<()> {
        let result = self.registry.delete(key).await;
        self.notify_delete(key, &result);
        if result.is_ok() {
            self.refresh().await;
        }
        result
    }

    /// Delete several objects independently.
    ///
    /// Each key gets its own notification; the list is refreshed once at the
    /// end if anything was removed.
    pub async fn delete_files(&self, keys: &[String]) -> Vec<(String, RegistryResult<()>)> {
        let results = self.registry.delete_many(keys).await;
        for (key, result) in &results {
            self.notify_delete(key, result);
        }
        if results.iter().any(|(_, r)| r.is_ok()) {
            self.refresh().await;
        }
        results
    }

    fn notify_delete(&self, key: &str, result: &RegistryResult<()>) {
        let notification = match result {
            Ok(()) => Notification::Deleted {
                key: key.to_string(),
            },
            Err(e) => Notification::DeleteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            },
        };
        self.notifier.notify(notification);
    }
}

fn notification_for(outcome: &UploadOutcome) -> Notification {
    match outcome {
        UploadOutcome::Uploaded { name, .. } => Notification::Uploaded { name: name.clone() },
        UploadOutcome::Cancelled { name } => Notification::UploadCancelled { name: name.clone() },
        UploadOutcome::Failed { name, error } => Notification::UploadFailed {
            name: name.clone(),
            reason: reason(error),
        },
    }
}

fn reason(error: &FileDeckError) -> String {
    match error {
        FileDeckError::Broker(e) => e.to_string(),
        FileDeckError::Transfer(e) => e.to_string(),
        other => other.to_string(),
    }
}
