//! Purpose: Provide a stable verification report model for archives.
//! Exports: `VerifyReport`, `VerifyStatus`, `VerifyIssue`.
//! Role: Shared contract for CLI diagnostics, API users, and bindings.
//! Invariants: Reports are additive-only in v0; decoded payloads are not embedded.
//! Invariants: A report is `Corrupt` exactly when it carries at least one issue.

use crate::core::error::Error;
use crate::core::scan::ScannedBundle;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerifyStatus {
    Ok,
    Corrupt,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifyIssue {
    pub code: String,
    pub message: String,
    pub entry: Option<String>,
    pub offset: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifyReport {
    pub archive: Option<String>,
    pub path: PathBuf,
    pub status: VerifyStatus,
    pub entries_total: usize,
    pub issues: Vec<VerifyIssue>,
    pub issue_count: usize,
    pub remediation_hints: Vec<String>,
}

impl VerifyReport {
    pub fn ok(path: PathBuf) -> Self {
        Self {
            archive: None,
            path,
            status: VerifyStatus::Ok,
            entries_total: 0,
            issues: Vec::new(),
            issue_count: 0,
            remediation_hints: Vec::new(),
        }
    }

    pub fn corrupt(path: PathBuf, issue: VerifyIssue) -> Self {
        let remediation_hints =
            vec!["Archive appears corrupt. Rebuild it from the original inputs.".to_string()];
        Self {
            archive: None,
            path,
            status: VerifyStatus::Corrupt,
            entries_total: 0,
            issues: vec![issue],
            issue_count: 1,
            remediation_hints,
        }
    }

    pub fn with_archive(mut self, archive: impl Into<String>) -> Self {
        self.archive = Some(archive.into());
        self
    }

    pub fn set_issues(mut self, issues: Vec<VerifyIssue>) -> Self {
        self.issue_count = issues.len();
        self.issues = issues;
        if self.issue_count == 0 {
            self.status = VerifyStatus::Ok;
            self.remediation_hints.clear();
        } else {
            self.status = VerifyStatus::Corrupt;
            if self.remediation_hints.is_empty() {
                self.remediation_hints = vec![
                    "Archive appears corrupt. Rebuild it from the original inputs.".to_string(),
                ];
            }
        }
        self
    }
}

pub(crate) fn report_from_scan(scanned: &ScannedBundle, path: &Path) -> VerifyReport {
    let issues = scanned
        .issues
        .iter()
        .map(|issue| VerifyIssue {
            code: issue.code.clone(),
            message: issue.message.clone(),
            entry: issue.entry.clone(),
            offset: issue.offset,
        })
        .collect();
    let mut report = VerifyReport::ok(path.to_path_buf()).set_issues(issues);
    report.entries_total = scanned.entries.len();
    report
}

pub(crate) fn report_from_error(err: &Error, path: &Path) -> VerifyReport {
    let mut report = VerifyReport::corrupt(
        path.to_path_buf(),
        VerifyIssue {
            code: "structure".to_string(),
            message: err.message().unwrap_or("archive is corrupt").to_string(),
            entry: err.entry().map(str::to_string),
            offset: err.offset(),
        },
    );
    if let Some(hint) = err.hint() {
        report.remediation_hints = vec![hint.to_string()];
    }
    report
}
