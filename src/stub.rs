//! Detection Runtime Stub
//!
//! The helper module that instrumented templates call. Its source is fixed:
//! it looks the name up in the owner's component registry and, when found,
//! adds the name to a process-wide `identity → names` map.

#[cfg(feature = "napi")]
use napi_derive::napi;
use oxc_allocator::Allocator;
use oxc_ast::ast::Statement;
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::CodemodConfig;
use crate::error::CodemodError;
use crate::pipeline::sha256_hex;

/// Helper module source. Usage accumulates in `globalThis.__componentProbeUsage__`.
pub const RUNTIME_STUB_SOURCE: &str = r#"import { getOwner } from '@ember/application';
import Helper from '@ember/component/helper';

const usage = (globalThis.__componentProbeUsage__ = globalThis.__componentProbeUsage__ || {});

export default Helper.extend({
  compute([name, identity]) {
    if (name && typeof name === 'object' && name.name) {
      name = name.name;
    }

    const isComponent = !!getOwner(this).lookup(`component:${name}`);

    if (isComponent) {
      const names = usage[identity] || (usage[identity] = []);
      if (!names.includes(name)) {
        names.push(name);
      }
    }

    return isComponent;
  },
});
"#;

/// Reject helper source that is not a module with a default export.
pub fn validate_stub_source(source: &str) -> Result<(), CodemodError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();

    if ret.panicked || !ret.errors.is_empty() {
        let detail = ret
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "parser gave up".to_string());
        return Err(CodemodError::Stub(format!("helper source does not parse: {}", detail)));
    }

    let has_default_export = ret
        .program
        .body
        .iter()
        .any(|stmt| matches!(stmt, Statement::ExportDefaultDeclaration(_)));
    if !has_default_export {
        return Err(CodemodError::Stub(
            "helper source has no default export".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StubStatus {
    Written,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubOutcome {
    pub path: PathBuf,
    pub status: StubStatus,
    pub digest: String,
}

/// Write the helper to the configured location.
///
/// The file is staged next to its destination and renamed into place, and
/// left alone when its content already matches.
pub fn write_runtime_stub(config: &CodemodConfig) -> Result<StubOutcome, CodemodError> {
    validate_stub_source(RUNTIME_STUB_SOURCE)?;

    let path = config.helper_file();
    let digest = sha256_hex(RUNTIME_STUB_SOURCE.as_bytes());

    if let Ok(existing) = fs::read(&path) {
        if sha256_hex(&existing) == digest {
            debug!(path = %path.display(), "runtime stub already current");
            return Ok(StubOutcome {
                path,
                status: StubStatus::Unchanged,
                digest,
            });
        }
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| CodemodError::io(dir, e))?;
    }
    let staged = staging_path(&path);
    fs::write(&staged, RUNTIME_STUB_SOURCE).map_err(|e| CodemodError::io(&staged, e))?;
    if let Err(e) = fs::rename(&staged, &path) {
        fs::remove_file(&staged).ok();
        return Err(CodemodError::io(&path, e));
    }

    info!(path = %path.display(), "wrote runtime stub");
    Ok(StubOutcome {
        path,
        status: StubStatus::Written,
        digest,
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}

#[cfg(feature = "napi")]
#[napi]
pub fn runtime_stub_source_native() -> String {
    RUNTIME_STUB_SOURCE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> CodemodConfig {
        CodemodConfig {
            project_root: dir.path().to_path_buf(),
            ..CodemodConfig::default()
        }
    }

    #[test]
    fn test_stub_source_is_valid_module() {
        validate_stub_source(RUNTIME_STUB_SOURCE).unwrap();
    }

    #[test]
    fn test_invalid_sources_are_rejected() {
        let err = validate_stub_source("export default {").unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_STUB);

        let err = validate_stub_source("export const x = 1;").unwrap_err();
        assert!(err.to_string().contains("default export"));
    }

    #[test]
    fn test_write_is_skipped_when_current() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let first = write_runtime_stub(&config).unwrap();
        assert_eq!(first.status, StubStatus::Written);
        assert_eq!(fs::read_to_string(&first.path).unwrap(), RUNTIME_STUB_SOURCE);
        assert!(first.path.ends_with("app/helpers/-probe-is-component.js"));

        let second = write_runtime_stub(&config).unwrap();
        assert_eq!(second.status, StubStatus::Unchanged);
        assert_eq!(second.digest, first.digest);
    }

    #[test]
    fn test_stale_stub_is_replaced() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let path = config.helper_file();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "// old").unwrap();

        let outcome = write_runtime_stub(&config).unwrap();
        assert_eq!(outcome.status, StubStatus::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), RUNTIME_STUB_SOURCE);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
