use sitesync_core::SiteClient;
use tracing::debug;

use super::error::SyncError;
use super::remote_index::RemoteIndex;
use super::report::Reporter;

/// Deletes every remote file no local candidate claimed. Must only run after
/// the upload phase has fully drained.
pub async fn sweep_unclaimed(
    client: &SiteClient,
    index: &RemoteIndex,
    dry_run: bool,
    reporter: &Reporter,
) -> Result<usize, SyncError> {
    if index.is_empty() {
        debug!("remote index empty, nothing to sweep");
        return Ok(0);
    }
    let mut deleted = 0usize;
    for record in index.unclaimed() {
        let url = client.object_url(&record.remote_path)?;
        reporter.progress("DELETE", &url);
        if dry_run {
            deleted += 1;
            continue;
        }
        client
            .delete_object(&url)
            .await
            .map_err(|err| SyncError::from_request("DELETE", &record.remote_path, err))?;
        debug!(path = %record.remote_path, "deleted");
        deleted += 1;
    }
    Ok(deleted)
}
