use std::path::{Path, PathBuf};

use anyhow::Context;
use sitesync_core::SiteClient;

use crate::sync::SyncOptions;
use crate::sync::rewrite::RewritePolicy;

const DEFAULT_ROOT: &str = ".";
const DEFAULT_MAX_FILES: u64 = 1000;
const DEFAULT_PARALLEL: u64 = 1;

/// Site settings normally written by `login`/`set`, read from the environment.
#[derive(Clone, Debug)]
pub struct SiteConfig {
    pub base_url: String,
    pub cookie: Option<String>,
    pub root_dir: PathBuf,
    pub rewrite: Vec<String>,
    pub no_rewrite: Vec<String>,
    pub max_files: u32,
    pub parallel: usize,
}

impl SiteConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("SITESYNC_URL").context("SITESYNC_URL is not set")?;
        let cookie = std::env::var("SITESYNC_COOKIE").ok();
        let root_dir = std::env::var("SITESYNC_ROOT").unwrap_or_else(|_| DEFAULT_ROOT.to_string());
        let root_dir = expand_home(&root_dir);
        let max_files = read_u64_env("SITESYNC_MAX_FILES", DEFAULT_MAX_FILES);

        Ok(Self {
            base_url,
            cookie,
            root_dir,
            rewrite: read_list_env("SITESYNC_REWRITE"),
            no_rewrite: read_list_env("SITESYNC_NO_REWRITE"),
            max_files: u32::try_from(max_files).unwrap_or(u32::MAX),
            parallel: read_u64_env("SITESYNC_PARALLEL", DEFAULT_PARALLEL) as usize,
        })
    }

    /// The authenticated client; fails when no session cookie is configured.
    pub fn client(&self) -> anyhow::Result<SiteClient> {
        SiteClient::new(&self.base_url, self.cookie.as_deref())
            .with_context(|| format!("cannot reach {}", self.base_url))
    }

    pub fn rewrite_policy(&self) -> RewritePolicy {
        RewritePolicy::new(self.rewrite.iter().cloned(), self.no_rewrite.iter().cloned())
    }

    pub fn sync_options(&self, args: &CliArgs) -> SyncOptions {
        SyncOptions {
            parallel: args.parallel.unwrap_or(self.parallel).max(1),
            dry_run: args.dry_run,
            force: args.force,
            delete_others: args.delete_others,
            quiet: args.quiet,
            max_files: args.max_files.unwrap_or(self.max_files).max(1),
        }
    }

    pub fn apply_root_override(&mut self, args: &CliArgs) {
        if let Some(root) = &args.root {
            self.root_dir = expand_home(root);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub parallel: Option<usize>,
    pub dry_run: bool,
    pub force: bool,
    pub delete_others: bool,
    pub quiet: bool,
    pub debug: bool,
    pub max_files: Option<u32>,
    pub root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliMode {
    Sync(CliArgs),
    Help,
}

pub const USAGE: &str = "\
Usage: sitesync [OPTIONS]
  -p, --parallel N      how many files to upload at once
  -n, --dry-run         show files that would be pushed without pushing them
  -f, --force           don't skip files even if unchanged
  -D, --delete-others   delete files on the server that are not in the local directory
  -q, --quiet           only report errors
  -d, --debug           verbose diagnostics
      --max-files N     page size when listing remote files
      --root DIR        local directory to sync
  -h, --help            show this help";

pub fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-p" | "--parallel" => {
                let value = args.next().context("--parallel needs a value")?;
                parsed.parallel = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid --parallel value: {value}"))?,
                );
            }
            "--max-files" => {
                let value = args.next().context("--max-files needs a value")?;
                parsed.max_files = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid --max-files value: {value}"))?,
                );
            }
            "--root" => {
                let value = args.next().context("--root needs a value")?;
                parsed.root = Some(value);
            }
            "-n" | "--dry-run" => parsed.dry_run = true,
            "-f" | "--force" => parsed.force = true,
            "-D" | "--delete-others" => parsed.delete_others = true,
            "-q" | "--quiet" => parsed.quiet = true,
            "-d" | "--debug" => parsed.debug = true,
            "-h" | "--help" => return Ok(CliMode::Help),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(CliMode::Sync(parsed))
}

fn expand_home(value: &str) -> PathBuf {
    match dirs::home_dir() {
        Some(home) => expand_with_home(value, &home),
        None => PathBuf::from(value),
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn read_list_env(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|value| parse_list(&value))
        .unwrap_or_default()
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
