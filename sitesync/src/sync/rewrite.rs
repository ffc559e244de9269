use std::collections::HashSet;

/// Filenames that are usually directory indexes and therefore worth a hint
/// when the user has not said how to upload them.
pub const INDEX_CANDIDATES: [&str; 4] = ["index.html", "index.htm", "index.text", "index.txt"];

#[derive(Debug, Clone, Default)]
pub struct RewritePolicy {
    rewrite: HashSet<String>,
    no_rewrite: HashSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteDecision {
    /// Directory to upload the file as, when the file is flattened.
    pub rewrite: Option<String>,
    pub warning: Option<String>,
}

impl RewritePolicy {
    pub fn new<I, J, S, T>(rewrite: I, no_rewrite: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            rewrite: rewrite.into_iter().map(Into::into).collect(),
            no_rewrite: no_rewrite.into_iter().map(Into::into).collect(),
        }
    }

    /// Decides how a root-relative, `/`-separated path is uploaded.
    /// `no_rewrite` wins over `rewrite`.
    pub fn resolve(&self, relative_path: &str) -> RewriteDecision {
        let (dir, name) = match relative_path.rsplit_once('/') {
            Some((dir, name)) if !dir.is_empty() => (dir, name),
            Some((_, name)) => (".", name),
            None => (".", relative_path),
        };

        if self.no_rewrite.contains(name) {
            return RewriteDecision::default();
        }
        if self.rewrite.contains(name) {
            return RewriteDecision {
                rewrite: Some(dir.to_string()),
                warning: None,
            };
        }
        if INDEX_CANDIDATES.contains(&name) {
            return RewriteDecision {
                rewrite: None,
                warning: Some(advice(relative_path, dir, name)),
            };
        }
        RewriteDecision::default()
    }
}

fn advice(path: &str, dir: &str, name: &str) -> String {
    format!(
        "warning: {path:?} is a candidate for a directory index file\n\
         If you want to upload {path:?} as {dir:?}, add {name} to SITESYNC_REWRITE.\n\
         If you do not want to rewrite {path:?}, add {name} to SITESYNC_NO_REWRITE.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RewritePolicy {
        RewritePolicy::new(["index.html"], ["index.css"])
    }

    #[test]
    fn rewrites_root_index_to_current_dir() {
        let decision = policy().resolve("index.html");
        assert_eq!(decision.rewrite.as_deref(), Some("."));
        assert_eq!(decision.warning, None);
    }

    #[test]
    fn rewrites_nested_index_to_parent() {
        let decision = policy().resolve("foo/index.html");
        assert_eq!(decision.rewrite.as_deref(), Some("foo"));

        let decision = policy().resolve("a/b/index.html");
        assert_eq!(decision.rewrite.as_deref(), Some("a/b"));
    }

    #[test]
    fn no_rewrite_leaves_path_unchanged() {
        assert_eq!(policy().resolve("foo/index.css"), RewriteDecision::default());
    }

    #[test]
    fn no_rewrite_takes_precedence() {
        let policy = RewritePolicy::new(["index.html"], ["index.html"]);
        assert_eq!(policy.resolve("foo/index.html"), RewriteDecision::default());
    }

    #[test]
    fn unlisted_candidate_only_warns() {
        let decision = policy().resolve("foo/index.htm");
        assert_eq!(decision.rewrite, None);
        let warning = decision.warning.expect("warning for index candidate");
        assert!(warning.contains("\"foo/index.htm\""));
        assert!(warning.contains("index.htm"));
    }

    #[test]
    fn ordinary_files_are_untouched() {
        assert_eq!(policy().resolve("css/main.css"), RewriteDecision::default());
        assert_eq!(policy().resolve("index.html.bak"), RewriteDecision::default());
    }
}
