//! Violation ledger: append-only, detection-ordered record of one interview session.

use crate::shared::{Violation, ViolationType};
use serde::Serialize;
use std::collections::BTreeMap;

/// Ordered sequence of violations. Only the session owning it may clear it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ViolationLedger {
    entries: Vec<Violation>,
}

impl ViolationLedger {
    /// Append a violation and return the new length. Never merges or dedupes.
    pub fn append(&mut self, violation: Violation) -> usize {
        self.entries.push(violation);
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry; drives the warning toast.
    pub fn last(&self) -> Option<&Violation> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[Violation] {
        &self.entries
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Occurrences per violation type, in type order.
pub fn count_by_type(violations: &[Violation]) -> BTreeMap<ViolationType, usize> {
    let mut counts = BTreeMap::new();
    for v in violations {
        *counts.entry(v.kind).or_insert(0) += 1;
    }
    counts
}
