mod client;
mod paths;

pub use client::{FileListing, PutStatus, RemoteFile, SiteClient, SiteError};
pub use paths::normalize_remote_path;
