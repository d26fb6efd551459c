use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use deckline_core::{EntityId, Handler, Invocation, InvocationContext};

use crate::held::HeldActionTracker;

/// One queued handler invocation, fully resolved by the dispatcher.
pub struct Job {
    pub handler: Arc<dyn Handler>,
    pub invocation: Invocation,
    /// Held-tracker entry to remove once the invocation finishes (hold-up
    /// events only).
    pub clear_held: Option<EntityId>,
}

/// Bounded worker pool that executes handler invocations off the read loop.
/// One worker means serial execution; N workers allow N handlers in flight.
/// Shutdown aborts workers without waiting for in-flight invocations.
pub struct InvocationPool {
    tx: mpsc::Sender<Job>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl InvocationPool {
    pub fn new(
        workers: usize,
        queue: usize,
        ctx: InvocationContext,
        held: Arc<HeldActionTracker>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&rx),
                    ctx.clone(),
                    Arc::clone(&held),
                    cancel.clone(),
                ))
            })
            .collect();

        Self {
            tx,
            workers: handles,
        }
    }

    /// Queue a job. The read loop must never block on handler execution, so
    /// a full queue drops the invocation with a warning instead of waiting.
    pub fn submit(&self, job: Job) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(
                    entity_id = %job.invocation.entity_id,
                    "Invocation queue full, dropping invocation"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Abort all workers. In-flight invocations are not waited for.
    pub fn shutdown(&self) {
        for handle in &self.workers {
            handle.abort();
        }
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    ctx: InvocationContext,
    held: Arc<HeldActionTracker>,
    cancel: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(job) = job else { break };

        let entity_id = job.invocation.entity_id.clone();
        if let Err(e) = job.handler.invoke(job.invocation, &ctx).await {
            tracing::error!(worker, entity_id = %entity_id, error = %e, "Handler invocation failed");
        }
        if let Some(id) = job.clear_held {
            held.clear(&id);
        }
    }
}
