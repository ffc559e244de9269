use std::ffi::OsStr;
use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use super::error::SyncError;
use super::report::Reporter;
use super::rewrite::RewritePolicy;

/// One regular file queued for upload consideration.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub local_path: PathBuf,
    /// Path relative to the sync root, `/`-separated.
    pub relative_path: String,
    /// Where the file lands remotely: the rewrite target or `relative_path`.
    pub remote_path: String,
    pub metadata: Metadata,
}

impl Candidate {
    pub fn size(&self) -> u64 {
        self.metadata.len()
    }
}

/// Walks `root` and hands every regular file to `emit`. Stops early, without
/// error, when `emit` returns false. Symlinks are not descended into; a link
/// to a regular file counts as that file.
pub fn walk_candidates<F>(
    root: &Path,
    policy: &RewritePolicy,
    reporter: &Reporter,
    mut emit: F,
) -> Result<usize, SyncError>
where
    F: FnMut(Candidate) -> bool,
{
    let mut emitted = 0usize;
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let metadata = if entry.file_type().is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(_) => continue,
            }
        } else {
            entry
                .metadata()
                .map_err(|err| SyncError::local_io(entry.path(), err.into()))?
        };
        if !metadata.is_file() {
            continue;
        }

        let relative_path = relative_remote_path(root, entry.path())?;
        let decision = policy.resolve(&relative_path);
        if let Some(warning) = decision.warning.as_deref() {
            reporter.rewrite_warning_once(warning);
        }
        let remote_path = decision
            .rewrite
            .filter(|target| !target.is_empty())
            .unwrap_or_else(|| relative_path.clone());

        let candidate = Candidate {
            local_path: entry.into_path(),
            relative_path,
            remote_path,
            metadata,
        };
        if !emit(candidate) {
            debug!(emitted, "walk stopped early");
            return Ok(emitted);
        }
        emitted += 1;
    }
    Ok(emitted)
}

/// Runs the walk on a blocking thread, feeding the bounded channel. The
/// send blocks while every worker is busy. A walk error cancels the run.
pub fn spawn_walker(
    root: PathBuf,
    policy: Arc<RewritePolicy>,
    reporter: Arc<Reporter>,
    tx: mpsc::Sender<Candidate>,
    cancel: CancellationToken,
) -> JoinHandle<Result<usize, SyncError>> {
    tokio::task::spawn_blocking(move || {
        let result = walk_candidates(&root, &policy, &reporter, |candidate| {
            !cancel.is_cancelled() && tx.blocking_send(candidate).is_ok()
        });
        if result.is_err() {
            cancel.cancel();
        }
        result
    })
}

/// Root-relative `/`-separated path. Names that are not valid UTF-8 are
/// rejected: a lossy conversion could map two files onto one remote path.
fn relative_remote_path(root: &Path, path: &Path) -> Result<String, SyncError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut segments = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            segments.push(utf8_name(path, part)?);
        }
    }
    if segments.is_empty() {
        // the root itself is a file
        return match path.file_name() {
            Some(name) => utf8_name(path, name).map(str::to_owned),
            None => Ok(String::new()),
        };
    }
    Ok(segments.join("/"))
}

fn utf8_name<'a>(path: &Path, name: &'a OsStr) -> Result<&'a str, SyncError> {
    name.to_str().ok_or_else(|| {
        SyncError::local_io(
            path,
            io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
        )
    })
}
