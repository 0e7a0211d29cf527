//! Literal string rewrites over a mirrored site export.
//!
//! A mirrored Drupal site needs a few text patches before it works when served
//! as static files:
//! - links to `/index.html` become directory links;
//! - the search widget's JS is told it runs in a static context;
//! - the widget is pointed at the snapshot index instead of the live one.
//!
//! Files that are not valid UTF-8 (images, fonts) are skipped. A file is only
//! written back when at least one rule changed it.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Replace every occurrence of `from` with `to` in files matching the filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub name: String,
    /// File extension without the dot, e.g. `html`.
    pub extension: String,
    /// Only rewrite files whose path (relative to the export root) contains this.
    pub path_contains: Option<String>,
    pub from: String,
    pub to: String,
}

impl RewriteRule {
    pub fn new(name: &str, extension: &str, from: &str, to: &str) -> Self {
        RewriteRule {
            name: name.to_string(),
            extension: extension.to_string(),
            path_contains: None,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn within(mut self, path_fragment: &str) -> Self {
        self.path_contains = Some(path_fragment.to_string());
        self
    }

    fn applies_to(&self, relative: &Path) -> bool {
        let ext_matches = relative
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false);
        if !ext_matches {
            return false;
        }
        match &self.path_contains {
            // Compare with forward slashes so fragments are portable.
            Some(fragment) => relative
                .to_string_lossy()
                .replace('\\', "/")
                .contains(fragment.as_str()),
            None => true,
        }
    }
}

/// `/index.html` → `/` in every HTML page.
pub fn strip_index_html() -> RewriteRule {
    RewriteRule::new("strip-index-html", "html", "/index.html", "/")
}

/// Flip the search widget into static mode in aggregated Drupal JS.
pub fn mark_static_context() -> RewriteRule {
    RewriteRule::new(
        "static-context",
        "js",
        "const isElmRunningInStaticContext = false;",
        "const isElmRunningInStaticContext = true;",
    )
    .within("sites/default/files/js")
}

/// Point the search widget at `to_index` instead of `from_index`.
pub fn retarget_search_index(from_index: &str, to_index: &str) -> RewriteRule {
    RewriteRule::new(
        "search-index-name",
        "js",
        &format!("const indexName = '{from_index}';"),
        &format!("const indexName = '{to_index}';"),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub files_scanned: usize,
    pub files_changed: usize,
    /// Files changed per rule, in rule order.
    pub changed_by_rule: Vec<(String, usize)>,
}

impl RewriteReport {
    pub fn changed_for(&self, rule_name: &str) -> usize {
        self.changed_by_rule
            .iter()
            .find(|(name, _)| name == rule_name)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Apply `rules` to every file under `root`.
pub fn rewrite_tree(root: &Path, rules: &[RewriteRule]) -> Result<RewriteReport, ExportError> {
    info!(root = %root.display(), rules = rules.len(), "Rewriting exported files");
    let mut report = RewriteReport {
        changed_by_rule: rules.iter().map(|r| (r.name.clone(), 0)).collect(),
        ..RewriteReport::default()
    };

    fn visit_dir(
        dir: &Path,
        root: &Path,
        rules: &[RewriteRule],
        report: &mut RewriteReport,
    ) -> Result<(), ExportError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ExportError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry_res in entries {
            let entry = entry_res.map_err(|source| ExportError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                visit_dir(&path, root, rules, report)?;
            } else if path.is_file() {
                report.files_scanned += 1;
                rewrite_file(&path, root, rules, report)?;
            }
        }
        Ok(())
    }

    visit_dir(root, root, rules, &mut report)?;

    info!(
        scanned = report.files_scanned,
        changed = report.files_changed,
        "Completed rewriting exported files"
    );
    Ok(report)
}

fn rewrite_file(
    path: &Path,
    root: &Path,
    rules: &[RewriteRule],
    report: &mut RewriteReport,
) -> Result<(), ExportError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let applicable: Vec<usize> = rules
        .iter()
        .enumerate()
        .filter(|(_, r)| r.applies_to(relative))
        .map(|(i, _)| i)
        .collect();
    if applicable.is_empty() {
        return Ok(());
    }

    let bytes = std::fs::read(path).map_err(|source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let original = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            debug!(path = %path.display(), "Skipping non UTF-8 file");
            return Ok(());
        }
    };

    let mut content = original.clone();
    for i in applicable {
        let rule = &rules[i];
        if rule.from.is_empty() || !content.contains(rule.from.as_str()) {
            continue;
        }
        content = content.replace(rule.from.as_str(), &rule.to);
        report.changed_by_rule[i].1 += 1;
        debug!(path = %relative.display(), rule = %rule.name, "Applied rewrite");
    }

    if content != original {
        std::fs::write(path, content).map_err(|source| {
            error!(error = %source, path = %path.display(), "Failed to write rewritten file");
            ExportError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
        report.files_changed += 1;
    }
    Ok(())
}
