//! Telemetry Aggregate
//!
//! Per-template sets of invocation names confirmed, by at least one observed
//! run, to resolve to components. Accepts either a single datalet
//! `{ "<identity>": ["name", ...] }` or an array of them; datalets merge by
//! set union.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::CodemodError;

lazy_static! {
    static ref NO_NAMES: BTreeSet<String> = BTreeSet::new();
}

/// Join-key form of a template identity: `./` prefixes dropped and
/// backslashes turned into forward slashes.
pub fn normalize_identity(identity: &str) -> String {
    let mut normalized = identity.replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TelemetryInput {
    Datalets(Vec<BTreeMap<String, Vec<String>>>),
    Datalet(BTreeMap<String, Vec<String>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryAggregate {
    confirmed: BTreeMap<String, BTreeSet<String>>,
}

impl TelemetryAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, CodemodError> {
        let input: TelemetryInput = serde_json::from_str(json).map_err(|e| {
            CodemodError::Telemetry(format!(
                "expected a datalet object or an array of datalets: {}",
                e
            ))
        })?;

        let mut aggregate = Self::new();
        match input {
            TelemetryInput::Datalets(datalets) => {
                for datalet in datalets {
                    aggregate.merge_datalet(datalet);
                }
            }
            TelemetryInput::Datalet(datalet) => aggregate.merge_datalet(datalet),
        }
        Ok(aggregate)
    }

    pub fn load(path: &Path) -> Result<Self, CodemodError> {
        let json = fs::read_to_string(path).map_err(|e| CodemodError::io(path, e))?;
        Self::from_json(&json)
    }

    pub fn merge_datalet<I>(&mut self, datalet: impl IntoIterator<Item = (String, I)>)
    where
        I: IntoIterator<Item = String>,
    {
        for (identity, names) in datalet {
            for name in names {
                self.record(&identity, &name);
            }
        }
    }

    /// Set semantics: recording a name twice is the same as once.
    pub fn record(&mut self, identity: &str, name: &str) {
        self.confirmed
            .entry(normalize_identity(identity))
            .or_default()
            .insert(name.to_string());
    }

    pub fn merge(&mut self, other: TelemetryAggregate) {
        for (identity, names) in other.confirmed {
            self.confirmed.entry(identity).or_default().extend(names);
        }
    }

    /// Names confirmed for `identity`; empty when the template never reported.
    pub fn confirmed_for(&self, identity: &str) -> &BTreeSet<String> {
        self.confirmed
            .get(&normalize_identity(identity))
            .unwrap_or(&NO_NAMES)
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.confirmed.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }
}
