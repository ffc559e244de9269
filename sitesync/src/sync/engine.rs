use std::path::PathBuf;
use std::sync::Arc;

use sitesync_core::SiteClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::SyncError;
use super::remote_index::{RemoteIndex, build_remote_index};
use super::report::Reporter;
use super::rewrite::RewritePolicy;
use super::sweeper::sweep_unclaimed;
use super::transfer::TransferPolicy;
use super::walker::spawn_walker;
use super::worker::UploadPool;

const DEFAULT_MAX_FILES: u32 = 1000;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub parallel: usize,
    pub dry_run: bool,
    pub force: bool,
    pub delete_others: bool,
    pub quiet: bool,
    /// Page size for the remote listing.
    pub max_files: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            parallel: 1,
            dry_run: false,
            force: false,
            delete_others: false,
            quiet: false,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub candidates: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub deleted: usize,
}

pub struct SyncEngine {
    client: SiteClient,
    root: PathBuf,
    rewrite: Arc<RewritePolicy>,
    transfer: TransferPolicy,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        client: SiteClient,
        root: PathBuf,
        rewrite: RewritePolicy,
        options: SyncOptions,
    ) -> Self {
        Self {
            client,
            root,
            rewrite: Arc::new(rewrite),
            transfer: TransferPolicy::default(),
            options,
        }
    }

    pub fn with_transfer_policy(mut self, transfer: TransferPolicy) -> Self {
        self.transfer = transfer;
        self
    }

    /// One full pass: index the remote side, upload changed files, then
    /// delete leftovers when asked to.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let reporter = Arc::new(Reporter::new(self.options.quiet));
        let index = self.load_index().await?;

        let parallel = self.options.parallel.max(1);
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(parallel);
        let walker = spawn_walker(
            self.root.clone(),
            Arc::clone(&self.rewrite),
            Arc::clone(&reporter),
            tx,
            cancel.clone(),
        );
        let pool = UploadPool::new(
            self.client.clone(),
            index.clone(),
            self.transfer.clone(),
            Arc::clone(&reporter),
        )
        .with_workers(parallel)
        .with_modes(self.options.force, self.options.dry_run);

        let uploads = pool.run(rx, cancel.clone()).await;
        let walked = walker.await?;
        let (candidates, stats) = match (uploads, walked) {
            (Err(SyncError::Cancelled), Err(walk_err)) => return Err(walk_err),
            (Err(err), _) | (Ok(_), Err(err)) => return Err(err),
            (Ok(stats), Ok(candidates)) => {
                debug!(candidates, ?stats, "upload phase drained");
                (candidates, stats)
            }
        };

        let mut report = SyncReport {
            candidates,
            uploaded: stats.uploaded,
            skipped: stats.skipped,
            deleted: 0,
        };
        if self.options.delete_others
            && let Some(index) = index.as_deref()
        {
            report.deleted =
                sweep_unclaimed(&self.client, index, self.options.dry_run, &reporter).await?;
        }
        info!(
            site = %self.client.base_url(),
            uploaded = report.uploaded,
            skipped = report.skipped,
            deleted = report.deleted,
            dry_run = self.options.dry_run,
            "sync finished"
        );
        Ok(report)
    }

    // Forced uploads compare nothing, so the listing is only needed when
    // deletions must be accounted for.
    async fn load_index(&self) -> Result<Option<Arc<RemoteIndex>>, SyncError> {
        if self.options.force && !self.options.delete_others {
            return Ok(None);
        }
        let index = build_remote_index(&self.client, self.options.max_files).await?;
        Ok(Some(Arc::new(index)))
    }
}
