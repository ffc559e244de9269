use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use sitesync_core::{SiteClient, normalize_remote_path};
use tracing::{debug, warn};

use super::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub remote_path: String,
    pub etag: String,
    pub size: Option<u64>,
}

// A record that can be taken exactly once. An emptied cell marks the path as
// accounted for by the local pass.
#[derive(Debug)]
struct ClaimCell(Mutex<Option<RemoteRecord>>);

impl ClaimCell {
    fn new(record: RemoteRecord) -> Self {
        Self(Mutex::new(Some(record)))
    }

    fn take(&self) -> Option<RemoteRecord> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn peek(&self) -> Option<RemoteRecord> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Remote files keyed by normalized path. The key set is fixed once built;
/// workers only empty individual cells.
#[derive(Debug, Default)]
pub struct RemoteIndex {
    entries: HashMap<String, ClaimCell>,
}

impl RemoteIndex {
    pub fn insert(&mut self, record: RemoteRecord) {
        self.entries
            .insert(record.remote_path.clone(), ClaimCell::new(record));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, remote_path: &str) -> bool {
        normalize_remote_path(remote_path)
            .map(|key| self.entries.contains_key(&key))
            .unwrap_or(false)
    }

    /// Takes the record for `remote_path`, leaving the entry cleared. Returns
    /// `None` when there is no entry or it was already claimed.
    pub fn claim(&self, remote_path: &str) -> Option<RemoteRecord> {
        let key = normalize_remote_path(remote_path).ok()?;
        self.entries.get(&key)?.take()
    }

    /// Records never claimed by a local file, ordered by path.
    pub fn unclaimed(&self) -> Vec<RemoteRecord> {
        let mut records: Vec<_> = self.entries.values().filter_map(ClaimCell::peek).collect();
        records.sort_by(|a, b| a.remote_path.cmp(&b.remote_path));
        records
    }
}

/// Pages through the remote listing until the server stops returning a
/// continuation token. Any failed page aborts the build.
pub async fn build_remote_index(
    client: &SiteClient,
    max_files: u32,
) -> Result<RemoteIndex, SyncError> {
    let mut index = RemoteIndex::default();
    let mut token = String::new();
    let mut pages = 0u32;
    loop {
        let page = client
            .list_files(&token, max_files)
            .await
            .map_err(SyncError::Pagination)?;
        pages += 1;
        let next = page.continuation().map(str::to_owned);

        for (path, file) in page.files {
            let remote_path = match normalize_remote_path(&path) {
                Ok(remote_path) => remote_path,
                Err(err) => {
                    warn!(%err, "skipping unusable remote path");
                    continue;
                }
            };
            debug!(path = %remote_path, etag = %file.etag, "adding to remote index");
            index.insert(RemoteRecord {
                remote_path,
                etag: file.etag,
                size: file.size,
            });
        }

        match next {
            Some(next) => token = next,
            None => break,
        }
    }
    debug!(pages, files = index.len(), "remote index built");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> RemoteRecord {
        RemoteRecord {
            remote_path: path.to_string(),
            etag: "abc".to_string(),
            size: Some(3),
        }
    }

    #[test]
    fn claim_takes_record_once() {
        let mut index = RemoteIndex::default();
        index.insert(record("css/main.css"));

        assert_eq!(index.claim("/css/main.css"), Some(record("css/main.css")));
        assert_eq!(index.claim("css/main.css"), None);
        assert!(index.contains("css/main.css"));
        assert!(index.unclaimed().is_empty());
    }

    #[test]
    fn claim_of_unknown_path_is_none() {
        let index = RemoteIndex::default();
        assert_eq!(index.claim("nope.txt"), None);
        assert_eq!(index.claim("../escape"), None);
    }

    #[test]
    fn root_rewrite_claims_empty_key() {
        let mut index = RemoteIndex::default();
        index.insert(record(""));
        assert!(index.claim(".").is_some());
    }

    #[test]
    fn unclaimed_is_sorted_and_excludes_claimed() {
        let mut index = RemoteIndex::default();
        index.insert(record("b.txt"));
        index.insert(record("a.txt"));
        index.insert(record("c.txt"));
        index.claim("b.txt");

        let paths: Vec<_> = index
            .unclaimed()
            .into_iter()
            .map(|r| r.remote_path)
            .collect();
        assert_eq!(paths, vec!["a.txt", "c.txt"]);
    }
}
