use std::path::Path;

use futures_util::StreamExt;
use md5::{Context, Digest};
use tokio_util::io::ReaderStream;

use super::error::SyncError;

/// MD5 of a local file's contents, comparable against remote ETags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint(Digest);

impl Fingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(md5::compute(bytes))
    }

    pub async fn of_file(path: &Path) -> Result<Self, SyncError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|err| SyncError::local_io(path, err))?;
        let mut stream = ReaderStream::new(file);
        let mut ctx = Context::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| SyncError::local_io(path, err))?;
            ctx.consume(&chunk);
        }
        Ok(Self(ctx.compute()))
    }

    pub fn simple_etag(&self) -> String {
        format!("{:x}", self.0)
    }

    /// Multipart-style tag: the digest of the whole-file digest, suffixed
    /// with the part count. This does not reproduce a per-part multipart
    /// digest; the part count is echoed, not derived.
    pub fn multipart_etag(&self, parts: u32) -> String {
        format!("{:x}-{parts}", md5::compute(self.0.0))
    }

    /// True when the remote tag names identical content.
    pub fn matches(&self, remote_etag: &str) -> bool {
        let remote = remote_etag.trim().trim_matches('"');
        let local = match multipart_count(remote) {
            Some(parts) => self.multipart_etag(parts),
            None => self.simple_etag(),
        };
        local.eq_ignore_ascii_case(remote)
    }
}

/// Part count of a `<hex>-<N>` tag; `None` for simple tags.
pub fn multipart_count(etag: &str) -> Option<u32> {
    let mut pieces = etag.split('-');
    pieces.next()?;
    let parts = pieces.next()?.parse::<u32>().ok()?;
    (parts >= 1).then_some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    #[test]
    fn simple_tag_is_hex_md5() {
        let fp = Fingerprint::of_bytes(b"hello");
        assert_eq!(fp.simple_etag(), HELLO_MD5);
        assert!(fp.matches(HELLO_MD5));
        assert!(fp.matches(&HELLO_MD5.to_ascii_uppercase()));
        assert!(fp.matches(&format!("\"{HELLO_MD5}\"")));
        assert!(!fp.matches("d41d8cd98f00b204e9800998ecf8427e"));
    }

    #[test]
    fn multipart_tag_hashes_digest_again() {
        let fp = Fingerprint::of_bytes(b"hello");
        let inner = md5::compute(b"hello");
        let expected = format!("{:x}-3", md5::compute(inner.0));
        assert_eq!(fp.multipart_etag(3), expected);
        assert!(fp.matches(&expected));
        assert!(!fp.matches(&format!("{HELLO_MD5}-3")));
    }

    #[test]
    fn multipart_count_parses_suffix() {
        assert_eq!(multipart_count("abc-12"), Some(12));
        assert_eq!(multipart_count("abc"), None);
        assert_eq!(multipart_count("abc-0"), None);
        assert_eq!(multipart_count("abc-x"), None);
    }

    #[tokio::test]
    async fn file_digest_matches_in_memory_digest() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("hello.txt");
        std::fs::write(&file, b"hello").unwrap();

        let fp = Fingerprint::of_file(&file).await.unwrap();
        assert_eq!(fp, Fingerprint::of_bytes(b"hello"));
    }

    #[tokio::test]
    async fn missing_file_is_local_io_error() {
        let dir = tempdir().unwrap();
        let err = Fingerprint::of_file(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::LocalIo { .. }));
    }
}
