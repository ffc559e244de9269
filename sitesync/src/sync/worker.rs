use std::sync::Arc;

use sitesync_core::SiteClient;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::content_type::resolve_content_type;
use super::error::SyncError;
use super::fingerprint::Fingerprint;
use super::remote_index::RemoteIndex;
use super::report::Reporter;
use super::transfer::{PutRequest, TransferPolicy, put_with_retry};
use super::walker::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Remote copy already identical.
    Unchanged,
    /// PUT issued, or announced in dry-run mode.
    Uploaded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: usize,
    pub skipped: usize,
}

impl UploadStats {
    fn record(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Unchanged => self.skipped += 1,
            UploadOutcome::Uploaded => self.uploaded += 1,
        }
    }

    fn merge(&mut self, other: UploadStats) {
        self.uploaded += other.uploaded;
        self.skipped += other.skipped;
    }
}

/// Fixed set of workers draining the candidate queue.
pub struct UploadPool {
    workers: usize,
    shared: WorkerShared,
}

#[derive(Clone)]
struct WorkerShared {
    client: SiteClient,
    index: Option<Arc<RemoteIndex>>,
    policy: TransferPolicy,
    reporter: Arc<Reporter>,
    force: bool,
    dry_run: bool,
}

impl UploadPool {
    pub fn new(
        client: SiteClient,
        index: Option<Arc<RemoteIndex>>,
        policy: TransferPolicy,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            workers: 1,
            shared: WorkerShared {
                client,
                index,
                policy,
                reporter,
                force: false,
                dry_run: false,
            },
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_modes(mut self, force: bool, dry_run: bool) -> Self {
        self.shared.force = force;
        self.shared.dry_run = dry_run;
        self
    }

    /// Runs until the queue closes or the run is cancelled. The first worker
    /// error cancels `cancel` and is returned once every worker has exited.
    pub async fn run(
        &self,
        rx: mpsc::Receiver<Candidate>,
        cancel: CancellationToken,
    ) -> Result<UploadStats, SyncError> {
        let rx = Arc::new(Mutex::new(rx));
        let shared = Arc::new(self.shared.clone());
        let mut tasks = JoinSet::new();
        for worker in 0..self.workers {
            let shared = Arc::clone(&shared);
            let rx = Arc::clone(&rx);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = shared.drain(worker, &rx, &cancel).await;
                if result.is_err() {
                    cancel.cancel();
                }
                result
            });
        }

        let mut stats = UploadStats::default();
        let mut failure: Option<SyncError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined.map_err(SyncError::from).and_then(|r| r) {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(err) => {
                    cancel.cancel();
                    failure = Some(match failure {
                        // a sibling's cancellation never hides the real cause
                        Some(SyncError::Cancelled) | None => err,
                        Some(first) => first,
                    });
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }
}

impl WorkerShared {
    async fn drain(
        &self,
        worker: usize,
        rx: &Mutex<mpsc::Receiver<Candidate>>,
        cancel: &CancellationToken,
    ) -> Result<UploadStats, SyncError> {
        let mut stats = UploadStats::default();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let next = {
                let mut rx = rx.lock().await;
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    candidate = rx.recv() => candidate,
                }
            };
            let Some(candidate) = next else {
                break;
            };
            stats.record(self.process(candidate, cancel).await?);
        }
        debug!(worker, ?stats, "upload worker finished");
        Ok(stats)
    }

    async fn process(
        &self,
        candidate: Candidate,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, SyncError> {
        let url = self.client.object_url(&candidate.remote_path)?;

        // Claimed even when forced, so the sweeper leaves the path alone.
        let claimed = self
            .index
            .as_ref()
            .and_then(|index| index.claim(&candidate.remote_path));
        if !self.force
            && let Some(record) = claimed
        {
            let local = Fingerprint::of_file(&candidate.local_path).await?;
            if local.matches(&record.etag) {
                debug!(path = %candidate.remote_path, "unchanged, skipping");
                return Ok(UploadOutcome::Unchanged);
            }
        }

        let content_type = resolve_content_type(&candidate.local_path).await?;
        self.reporter.progress("PUT", &url);
        if self.dry_run {
            return Ok(UploadOutcome::Uploaded);
        }

        let attempts = put_with_retry(
            &self.client,
            PutRequest {
                url: &url,
                source: &candidate.local_path,
                content_type,
                content_length: candidate.size(),
            },
            &self.policy,
            &self.reporter,
            cancel,
        )
        .await?;
        debug!(path = %candidate.remote_path, attempts, "uploaded");
        Ok(UploadOutcome::Uploaded)
    }
}
