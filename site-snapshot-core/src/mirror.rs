//! Mirror a live site into a local directory with an external crawler (wget).
//!
//! The crawler is an opaque external program. This module only builds its
//! arguments, prepares the export directory and interprets the exit status.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use url::Url;

/// wget exits with 8 when some pages returned server errors, which a Drupal
/// crawl always hits (404 links, access-denied pages).
pub const WGET_SERVER_ERROR_EXIT: i32 = 8;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("invalid site url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to prepare export directory {path}: {source}")]
    ExportDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("refusing to clean export directory {path}: {reason}")]
    UnsafeExportDir { path: PathBuf, reason: String },
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with status {code:?}")]
    ExitStatus { program: String, code: Option<i32> },
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub site_url: String,
    pub export_dir: PathBuf,
    /// Crawler executable, `wget` unless overridden.
    pub program: String,
    pub accepted_exit_codes: Vec<i32>,
}

impl MirrorConfig {
    pub fn new(site_url: &str, export_dir: impl Into<PathBuf>) -> Self {
        MirrorConfig {
            site_url: site_url.to_string(),
            export_dir: export_dir.into(),
            program: "wget".to_string(),
            accepted_exit_codes: vec![0, WGET_SERVER_ERROR_EXIT],
        }
    }

    pub fn parsed_url(&self) -> Result<Url, MirrorError> {
        Url::parse(&self.site_url).map_err(|e| MirrorError::InvalidUrl {
            url: self.site_url.clone(),
            reason: e.to_string(),
        })
    }

    /// Host the crawl is restricted to.
    pub fn domain(&self) -> Result<String, MirrorError> {
        let url = self.parsed_url()?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| MirrorError::InvalidUrl {
                url: self.site_url.clone(),
                reason: "no host".to_string(),
            })
    }

    /// Directory wget writes the site into (`host+port` when a port is
    /// present, because of `--restrict-file-names=windows`).
    pub fn site_dir(&self) -> Result<PathBuf, MirrorError> {
        let url = self.parsed_url()?;
        let host = self.domain()?;
        let name = match url.port() {
            Some(port) => format!("{host}+{port}"),
            None => host,
        };
        Ok(self.export_dir.join(name))
    }

    pub fn args(&self) -> Result<Vec<String>, MirrorError> {
        let domain = self.domain()?;
        Ok(vec![
            format!("--directory-prefix={}", self.export_dir.display()),
            "--mirror".to_string(),
            "--page-requisites".to_string(),
            "--convert-links".to_string(),
            "--adjust-extension".to_string(),
            "--span-hosts".to_string(),
            "--restrict-file-names=windows".to_string(),
            "--no-parent".to_string(),
            format!("--domains={domain}"),
            self.site_url.clone(),
        ])
    }
}

/// Directories `clean_dir` must never wipe: empty, `.`/`..` and the
/// filesystem root, plus the current working directory and its ancestors.
fn unsafe_export_dir(dir: &Path) -> Option<String> {
    let mut components = dir.components().peekable();
    if components.peek().is_none() {
        return Some("path is empty".to_string());
    }
    if components.all(|c| matches!(c, Component::CurDir | Component::ParentDir)) {
        return Some("path points at the working directory or a parent".to_string());
    }
    if dir.parent().is_none() {
        return Some("path is a filesystem root".to_string());
    }
    let resolved = fs::canonicalize(dir).ok()?;
    let cwd = std::env::current_dir().ok()?;
    if cwd.starts_with(&resolved) {
        return Some(format!("path contains the working directory {}", cwd.display()));
    }
    None
}

/// Remove and recreate the export directory so stale pages never survive.
pub fn clean_dir(dir: &Path) -> Result<(), MirrorError> {
    if let Some(reason) = unsafe_export_dir(dir) {
        tracing::error!(path = %dir.display(), reason = %reason, "Refusing to clean export directory");
        return Err(MirrorError::UnsafeExportDir {
            path: dir.to_path_buf(),
            reason,
        });
    }
    let to_err = |source| MirrorError::ExportDir {
        path: dir.to_path_buf(),
        source,
    };
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(to_err)?;
        tracing::debug!(path = %dir.display(), "Removed existing export directory");
    }
    fs::create_dir_all(dir).map_err(to_err)?;
    tracing::debug!(path = %dir.display(), "Created export directory");
    Ok(())
}

/// Run a shell command line such as `drush cr`. Any non-zero exit is fatal.
pub fn run_shell(command_line: &str) -> Result<(), MirrorError> {
    tracing::info!(command = %command_line, "Running shell command");
    let status = Command::new("sh")
        .arg("-c")
        .arg(command_line)
        .status()
        .map_err(|source| MirrorError::Launch {
            program: command_line.to_string(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        tracing::error!(command = %command_line, status = ?status, "Shell command failed");
        Err(MirrorError::ExitStatus {
            program: command_line.to_string(),
            code: status.code(),
        })
    }
}

/// Crawl the site into `config.export_dir`. Returns the exit code the crawler
/// finished with (0 or another accepted code).
pub fn mirror_site(config: &MirrorConfig) -> Result<i32, MirrorError> {
    let args = config.args()?;
    tracing::info!(
        program = %config.program,
        site_url = %config.site_url,
        export_dir = %config.export_dir.display(),
        "Mirroring site"
    );

    let status = Command::new(&config.program)
        .args(&args)
        .status()
        .map_err(|source| {
            tracing::error!(error = ?source, program = %config.program, "Failed to launch mirror process");
            MirrorError::Launch {
                program: config.program.clone(),
                source,
            }
        })?;

    match status.code() {
        Some(code) if config.accepted_exit_codes.contains(&code) => {
            if code != 0 {
                tracing::warn!(code, "Mirror finished with accepted non-zero exit code");
            } else {
                tracing::info!("Mirror finished");
            }
            Ok(code)
        }
        code => {
            tracing::error!(program = %config.program, code = ?code, "Mirror exited with unexpected status");
            Err(MirrorError::ExitStatus {
                program: config.program.clone(),
                code,
            })
        }
    }
}
