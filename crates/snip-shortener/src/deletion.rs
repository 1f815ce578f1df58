use parking_lot::Mutex;
use snip_core::{Database, DeleteRequest, OwnerId, ShortCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, TypedBuilder)]
pub struct DeletionConfig {
    /// Buffered requests that trigger an immediate flush.
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// How long the first buffered request may wait before a flush.
    #[builder(default = DEFAULT_FLUSH_TIMEOUT)]
    pub flush_timeout: Duration,
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Background batching of soft deletes.
///
/// One worker task owns the buffer and the debounce deadline. It is the only
/// reader of a bounded channel, so producers wait for it when it falls behind.
/// The buffer is flushed once it holds `batch_size` requests or
/// `flush_timeout` after the first request arrived, whichever comes first.
/// Each flush runs on its own task; flushes may overlap and finish out of
/// order. A failed flush is logged and dropped.
pub struct DeletionPipeline {
    intake: Mutex<Option<mpsc::Sender<DeleteRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeletionPipeline {
    /// Spawns the worker onto the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn spawn<D: Database>(storage: Arc<D>, config: DeletionConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(storage, rx, config));

        Self {
            intake: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues one delete request per code and returns how many were accepted.
    ///
    /// Waits whenever the worker is busy. After [`DeletionPipeline::shutdown`]
    /// nothing is accepted.
    pub async fn submit(&self, owner: &OwnerId, shorts: Vec<ShortCode>) -> usize {
        let intake = self.intake.lock().clone();
        let Some(intake) = intake else {
            warn!(owner = %owner, count = shorts.len(), "deletion pipeline is shut down, dropping requests");
            return 0;
        };

        let mut accepted = 0;
        for short in shorts {
            let request = DeleteRequest {
                owner: owner.clone(),
                short,
            };
            if let Err(mpsc::error::SendError(request)) = intake.send(request).await {
                warn!(owner = %request.owner, code = %request.short, "deletion worker stopped, dropping request");
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Stops intake, flushes what is buffered and waits for every flush.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        drop(self.intake.lock().take());

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                error!(error = %err, "deletion worker terminated abnormally");
            }
        }
    }
}

async fn run_worker<D: Database>(
    storage: Arc<D>,
    mut intake: mpsc::Receiver<DeleteRequest>,
    config: DeletionConfig,
) {
    let batch_size = config.batch_size.max(1);
    let mut buffer: Vec<DeleteRequest> = Vec::with_capacity(batch_size);
    let mut deadline: Option<Instant> = None;
    let mut flushes = JoinSet::new();

    debug!(batch_size, flush_timeout = ?config.flush_timeout, "deletion worker started");

    loop {
        tokio::select! {
            received = intake.recv() => {
                let Some(request) = received else { break };
                trace!(owner = %request.owner, code = %request.short, "buffered delete request");

                deadline.get_or_insert_with(|| deadline_after(config.flush_timeout));
                buffer.push(request);

                if buffer.len() >= batch_size {
                    deadline = None;
                    flush(&storage, &mut buffer, &mut flushes);
                }
            }
            _ = wait_for(deadline) => {
                deadline = None;
                flush(&storage, &mut buffer, &mut flushes);
            }
            Some(joined) = flushes.join_next(), if !flushes.is_empty() => {
                log_join(joined);
            }
        }
    }

    flush(&storage, &mut buffer, &mut flushes);
    while let Some(joined) = flushes.join_next().await {
        log_join(joined);
    }

    info!("deletion worker stopped");
}

// Timeouts too large for `Instant` never fire on their own; shutdown or a
// full batch still flushes.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn flush<D: Database>(
    storage: &Arc<D>,
    buffer: &mut Vec<DeleteRequest>,
    flushes: &mut JoinSet<()>,
) {
    if buffer.is_empty() {
        return;
    }

    let batch = std::mem::take(buffer);
    let storage = Arc::clone(storage);
    flushes.spawn(async move {
        let size = batch.len();
        match storage.delete_batch(&batch).await {
            Ok(()) => debug!(size, "flushed delete batch"),
            Err(err) => error!(size, error = %err, "failed to flush delete batch"),
        }
    });
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "delete batch task failed");
    }
}
