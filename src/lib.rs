//! # Component Invocation Codemod
//!
//! Curly-brace invocations such as `{{user-card}}` are ambiguous: the name
//! may resolve to a helper or to a component, and only the running
//! application can tell. The codemod settles this in two phases.
//!
//! 1. **Instrument** (`instrument`): every ambiguous invocation is wrapped in
//!    `{{#if (-probe-is-component "name" "identity")}}X{{else}}X{{/if}}` and
//!    the probe helper (`stub`) is written into the project. Rendering is
//!    unchanged; the helper records each name that resolved to a component.
//!
//! 2. **Rewrite** (`rewrite`): given the recorded usage (`telemetry`), each
//!    confirmed invocation with no positional arguments becomes a tag:
//!    `{{user-card title=t}}` → `<UserCard @title={{t}} />`.
//!
//! ## Invariants
//!
//! 1. Reserved builtins (`if`, `each`, `yield`, ...) are never wrapped or rewritten.
//! 2. Instrumenting already-instrumented source is byte-identical.
//! 3. A name absent from a template's telemetry is left as written.
//! 4. Source that no pass touched is printed back byte for byte.
//! 5. A file is only written after parse, transform and print all succeed.

pub mod ast;
mod classify;
mod config;
mod error;
mod instrument;
mod parse;
mod pipeline;
mod print;
mod rewrite;
mod runtime;
mod stub;
mod telemetry;
mod visitor;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod rewrite_tests;

pub use ast::{builders, NodeId, SourceLocation, Span, Statement, Template};
pub use classify::{classify, hash_to_arg_attributes, is_reserved, to_tag_name, Invocation, InvocationClass};
pub use config::{CodemodConfig, CONFIG_FILE};
pub use error::{CodemodError, ErrorReport};
pub use instrument::{
    instrument_template, is_probe_wrapper, probe_conditional, strip_instrumentation, PROBE_HELPER,
};
pub use parse::parse_template;
pub use pipeline::{
    expand_inputs, sha256_hex, instrument_files, rewrite_files, rewrite_selected, strip_files, FileReport,
    FileStatus, Pass, RunReport,
};
pub use print::print_template;
pub use rewrite::rewrite_template;
pub use runtime::{probe, ComponentRegistry, UsageRecorder};
pub use stub::{validate_stub_source, write_runtime_stub, StubOutcome, StubStatus, RUNTIME_STUB_SOURCE};
pub use telemetry::{normalize_identity, TelemetryAggregate};
pub use visitor::{BlockScopes, PassOutput, SeenSet, TemplateVisitor};

#[cfg(feature = "napi")]
pub use instrument::{instrument_template_native, strip_instrumentation_native, NativePassResult};
#[cfg(feature = "napi")]
pub use rewrite::apply_telemetry_native;
#[cfg(feature = "napi")]
pub use stub::runtime_stub_source_native;
