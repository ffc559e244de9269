use std::sync::Once;

use url::Url;

/// User-facing progress output. Quiet mode silences everything here;
/// errors are reported by the caller.
#[derive(Debug)]
pub struct Reporter {
    quiet: bool,
    rewrite_warning: Once,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            rewrite_warning: Once::new(),
        }
    }

    pub fn progress(&self, method: &str, url: &Url) {
        if !self.quiet {
            println!("{method} {url}");
        }
    }

    pub fn notice(&self, message: &str) {
        if !self.quiet {
            println!("{message}");
        }
    }

    /// Prints the first rewrite advisory of the run and drops the rest.
    /// Returns whether this call printed.
    pub fn rewrite_warning_once(&self, warning: &str) -> bool {
        if self.quiet {
            return false;
        }
        let mut printed = false;
        self.rewrite_warning.call_once(|| {
            println!("{warning}");
            printed = true;
        });
        printed
    }
}
