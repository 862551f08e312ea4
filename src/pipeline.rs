//! Batch driver
//!
//! Runs one pass over a list of template files, strictly one file at a time
//! in caller order. Each file is read, parsed, transformed and printed in
//! full before anything is written back, so a failing file is left exactly
//! as it was. A failure is recorded in the report and the batch moves on.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::ast::Template;
use crate::config::CodemodConfig;
use crate::error::{CodemodError, ErrorReport};
use crate::instrument::{instrument_template, strip_instrumentation};
use crate::parse::parse_template;
use crate::print::print_template;
use crate::rewrite::rewrite_template;
use crate::stub::{write_runtime_stub, StubOutcome};
use crate::telemetry::TelemetryAggregate;
use crate::visitor::PassOutput;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Pass {
    Instrument,
    Rewrite,
    Strip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "camelCase")]
pub enum FileStatus {
    Written,
    /// Output equals input and was not written back
    Unchanged,
    /// Not an eligible template
    Skipped,
    Failed(ErrorReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub identity: String,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Invocations wrapped, rewritten or unwrapped
    pub changes: usize,
    pub digest_before: Option<String>,
    pub digest_after: Option<String>,
}

impl FileReport {
    fn new(path: &Path, identity: String, status: FileStatus) -> Self {
        FileReport {
            path: path.to_path_buf(),
            identity,
            status,
            changes: 0,
            digest_before: None,
            digest_after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub pass: Pass,
    pub files: Vec<FileReport>,
    /// Set by the instrument pass once an eligible template was found
    pub stub: Option<StubOutcome>,
}

impl RunReport {
    fn new(pass: Pass) -> Self {
        RunReport {
            pass,
            files: Vec::new(),
            stub: None,
        }
    }

    fn count(&self, matches: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| matches(&f.status)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|s| *s == FileStatus::Written)
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| *s == FileStatus::Unchanged)
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| *s == FileStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn log_summary(&self) {
        info!(
            pass = ?self.pass,
            written = self.written(),
            unchanged = self.unchanged(),
            skipped = self.skipped(),
            failed = self.failed(),
            "pass finished"
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INPUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Directories become their eligible files in sorted order; files are kept
/// as given so ineligible ones show up as skipped.
pub fn expand_inputs(paths: &[PathBuf], config: &CodemodConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    let entry_path = entry.path();
                    if entry.file_type().is_file() && config.is_eligible(entry_path) {
                        files.push(entry_path.to_path_buf());
                    }
                }
                Err(e) => warn!(dir = %path.display(), error = %e, "skipping unreadable entry"),
            }
        }
    }

    files
}

// ═══════════════════════════════════════════════════════════════════════════════
// PER-FILE
// ═══════════════════════════════════════════════════════════════════════════════

fn failed(path: &Path, identity: String, error: &CodemodError) -> FileReport {
    error!(path = %path.display(), code = error.code(), "{}", error);
    FileReport::new(path, identity, FileStatus::Failed(ErrorReport::from(error)))
}

fn process_file(
    path: &Path,
    config: &CodemodConfig,
    transform: &dyn Fn(Template) -> PassOutput,
) -> FileReport {
    let identity = config.identity_for(path);

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => return failed(path, identity, &CodemodError::io(path, e)),
    };
    let digest_before = sha256_hex(source.as_bytes());

    let template = match parse_template(&source, &identity) {
        Ok(template) => template,
        Err(e) => return failed(path, identity, &e),
    };
    let output = transform(template);
    let code = match print_template(&output.template) {
        Ok(code) => code,
        Err(e) => return failed(path, identity, &e),
    };
    let digest_after = sha256_hex(code.as_bytes());

    let status = if code == source && !config.write_unchanged {
        FileStatus::Unchanged
    } else {
        if let Err(e) = fs::write(path, &code) {
            return failed(path, identity, &CodemodError::io(path, e));
        }
        FileStatus::Written
    };
    debug!(path = %path.display(), changes = output.changes, status = ?status, "processed template");

    FileReport {
        path: path.to_path_buf(),
        identity,
        status,
        changes: output.changes,
        digest_before: Some(digest_before),
        digest_after: Some(digest_after),
    }
}

fn skipped(path: &Path, config: &CodemodConfig) -> FileReport {
    debug!(path = %path.display(), "skipping ineligible file");
    FileReport::new(path, config.identity_for(path), FileStatus::Skipped)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PASSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Instrument every eligible template, writing the runtime stub once before
/// the first one.
pub fn instrument_files(paths: &[PathBuf], config: &CodemodConfig) -> RunReport {
    let mut report = RunReport::new(Pass::Instrument);
    let files = expand_inputs(paths, config);
    info!(files = files.len(), "instrumenting templates");

    let mut stub_error: Option<ErrorReport> = None;

    for path in &files {
        if !config.is_eligible(path) {
            report.files.push(skipped(path, config));
            continue;
        }

        if report.stub.is_none() && stub_error.is_none() {
            match write_runtime_stub(config) {
                Ok(outcome) => report.stub = Some(outcome),
                Err(e) => {
                    error!(code = e.code(), "{}", e);
                    stub_error = Some(ErrorReport::from(&e));
                }
            }
        }

        // no template is instrumented without its helper on disk
        if let Some(stub_error) = &stub_error {
            report.files.push(FileReport::new(
                path,
                config.identity_for(path),
                FileStatus::Failed(stub_error.clone()),
            ));
            continue;
        }

        report.files.push(process_file(path, config, &instrument_template));
    }

    report.log_summary();
    report
}

/// Rewrite every template named by the telemetry.
pub fn rewrite_files(aggregate: &TelemetryAggregate, config: &CodemodConfig) -> RunReport {
    let paths: Vec<PathBuf> = aggregate
        .identities()
        .map(|identity| config.resolve(identity))
        .collect();
    rewrite_selected(&paths, aggregate, config)
}

/// Rewrite the given templates; files the telemetry never mentions only have
/// their instrumentation removed.
pub fn rewrite_selected(
    paths: &[PathBuf],
    aggregate: &TelemetryAggregate,
    config: &CodemodConfig,
) -> RunReport {
    let mut report = RunReport::new(Pass::Rewrite);
    let files = expand_inputs(paths, config);
    info!(files = files.len(), templates = aggregate.len(), "rewriting templates");

    for path in &files {
        if !config.is_eligible(path) {
            report.files.push(skipped(path, config));
            continue;
        }

        let confirmed: &BTreeSet<String> = aggregate.confirmed_for(&config.identity_for(path));
        report.files.push(process_file(path, config, &|template: Template| {
            rewrite_template(template, confirmed)
        }));
    }

    report.log_summary();
    report
}

/// Remove probe conditionals, restoring the pre-instrumentation source.
pub fn strip_files(paths: &[PathBuf], config: &CodemodConfig) -> RunReport {
    let mut report = RunReport::new(Pass::Strip);
    let files = expand_inputs(paths, config);
    info!(files = files.len(), "stripping instrumentation");

    for path in &files {
        if !config.is_eligible(path) {
            report.files.push(skipped(path, config));
            continue;
        }
        report.files.push(process_file(path, config, &strip_instrumentation));
    }

    report.log_summary();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_failed_status_serializes_flat() {
        let report = FileReport::new(
            Path::new("a.hbs"),
            "a.hbs".to_string(),
            FileStatus::Failed(ErrorReport {
                code: "PARSE_ERROR".to_string(),
                message: "boom".to_string(),
                line: Some(1),
                column: Some(2),
                hint: None,
            }),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["code"], "PARSE_ERROR");
        assert_eq!(json["identity"], "a.hbs");

        let written = FileReport::new(Path::new("b.hbs"), "b.hbs".to_string(), FileStatus::Written);
        let json = serde_json::to_value(&written).unwrap();
        assert_eq!(json["status"], "written");
        assert!(json.get("error").is_none());
    }
}
