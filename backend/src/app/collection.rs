//! Collection loading as a cancellable background task.

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::reconciler::{ReconcileRequest, Reconciled, Reconciler};

#[derive(Debug, Clone)]
pub enum CollectionState {
    Idle,
    Fetching,
    Ready(Reconciled),
    Failed(String),
}

impl CollectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CollectionState::Ready(_) | CollectionState::Failed(_))
    }
}

/// One collection load. The state only moves forward:
/// `Idle -> Fetching -> Ready | Failed`.
pub struct CollectionTask {
    state: watch::Receiver<CollectionState>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CollectionTask {
    pub fn spawn(reconciler: Reconciler, owner: String, request: ReconcileRequest) -> Self {
        let (sender, state) = watch::channel(CollectionState::Idle);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            sender.send_replace(CollectionState::Fetching);
            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    debug!("collection load of {owner} cancelled");
                    CollectionState::Failed("cancelled".into())
                }
                result = reconciler.reconcile(&owner, request) => match result {
                    Ok(reconciled) => CollectionState::Ready(reconciled),
                    Err(err) => {
                        warn!("collection load of {owner} failed: {err:#}");
                        CollectionState::Failed(format!("{err:#}"))
                    }
                },
            };
            sender.send_replace(outcome);
        });
        Self {
            state,
            cancel,
            handle,
        }
    }

    pub fn state(&self) -> CollectionState {
        self.state.borrow().clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the terminal state.
    pub async fn join(mut self) -> CollectionState {
        let state = match self.state.wait_for(CollectionState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => CollectionState::Failed("collection task stopped".into()),
        };
        if let Err(err) = self.handle.await {
            warn!("collection task panicked: {err}");
        }
        state
    }
}
