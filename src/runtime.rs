//! Rust model of the detection runtime.
//!
//! The generated JavaScript helper (see [`crate::stub`]) is what runs inside
//! the host application. These types state the same contract for hosts that
//! drive probes from Rust, with the usage map passed explicitly instead of
//! living in a global.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::telemetry::TelemetryAggregate;

/// The host's live name → component lookup.
pub trait ComponentRegistry {
    fn resolves_component(&self, name: &str) -> bool;
}

impl ComponentRegistry for HashSet<String> {
    fn resolves_component(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl ComponentRegistry for BTreeSet<String> {
    fn resolves_component(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Process-scoped usage map. Starts empty; entries are created on the first
/// confirmed name for a template and only ever grow until [`flush`].
///
/// [`flush`]: UsageRecorder::flush
#[derive(Debug, Default)]
pub struct UsageRecorder {
    usage: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl UsageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, BTreeSet<String>>> {
        self.usage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, identity: &str, name: &str) {
        self.lock()
            .entry(identity.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// Current usage without resetting it.
    pub fn snapshot(&self) -> TelemetryAggregate {
        let usage = self.lock();
        let mut aggregate = TelemetryAggregate::new();
        aggregate.merge_datalet(usage.iter().map(|(identity, names)| (identity.clone(), names.clone())));
        aggregate
    }

    /// Hand the collected usage to the caller and start over empty.
    pub fn flush(&self) -> TelemetryAggregate {
        let usage = std::mem::take(&mut *self.lock());
        let mut aggregate = TelemetryAggregate::new();
        aggregate.merge_datalet(usage);
        aggregate
    }
}

/// Answer whether `name` resolves to a component, recording it for
/// `identity` when it does.
pub fn probe(
    registry: &dyn ComponentRegistry,
    recorder: &UsageRecorder,
    name: &str,
    identity: &str,
) -> bool {
    let is_component = registry.resolves_component(name);
    if is_component {
        recorder.record(identity, name);
    }
    is_component
}
