use std::path::{Component, Path};

use crate::client::SiteError;

/// Canonical form of a remote object path: no leading separator, no `.`
/// components, `/` between segments. The site root is the empty string.
pub fn normalize_remote_path(remote_path: &str) -> Result<String, SiteError> {
    let mut segments = Vec::new();
    for component in Path::new(remote_path).components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            Component::RootDir | Component::CurDir => continue,
            Component::ParentDir | Component::Prefix(_) => {
                return Err(SiteError::InvalidPath(remote_path.to_string()));
            }
        }
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_separator() {
        assert_eq!(normalize_remote_path("/css/main.css").unwrap(), "css/main.css");
        assert_eq!(normalize_remote_path("css/main.css").unwrap(), "css/main.css");
    }

    #[test]
    fn current_dir_maps_to_site_root() {
        assert_eq!(normalize_remote_path(".").unwrap(), "");
        assert_eq!(normalize_remote_path("./docs").unwrap(), "docs");
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(matches!(
            normalize_remote_path("../secret"),
            Err(SiteError::InvalidPath(_))
        ));
    }
}
