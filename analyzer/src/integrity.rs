//! Structural and business-rule checks over a loaded snapshot.
//!
//! The report is total: every check is present for every snapshot, and a
//! check whose prerequisite collection is missing or malformed is `false`.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::ThresholdConfig;
use crate::snapshot::{Collection, CollectionKind, Keyed, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityCheck {
    pub name: String,
    pub passed: bool,
}

/// Ordered check results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    checks: Vec<IntegrityCheck>,
}

impl IntegrityReport {
    fn push(&mut self, name: impl Into<String>, passed: bool) {
        self.checks.push(IntegrityCheck {
            name: name.into(),
            passed,
        });
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.checks
            .iter()
            .find(|check| check.name == name)
            .map(|check| check.passed)
    }

    /// True when every check passed
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &IntegrityCheck> {
        self.checks.iter().filter(|check| !check.passed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntegrityCheck> {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Per-collection facts the report is assembled from.
struct CollectionFacts {
    exists: bool,
    /// `None` when the collection is missing or malformed
    len: Option<usize>,
    ids_unique: bool,
    names_unique: bool,
}

fn facts<T: Keyed>(collection: &Collection<T>) -> CollectionFacts {
    match collection {
        Collection::Missing => CollectionFacts {
            exists: false,
            len: None,
            ids_unique: false,
            names_unique: false,
        },
        Collection::Malformed { .. } => CollectionFacts {
            exists: true,
            len: None,
            ids_unique: false,
            names_unique: false,
        },
        Collection::Loaded(items) => CollectionFacts {
            exists: true,
            len: Some(items.len()),
            ids_unique: all_distinct(items.iter().map(Keyed::id)),
            names_unique: all_distinct(items.iter().map(Keyed::display_name)),
        },
    }
}

/// Absent values compare equal to each other. Empty input is vacuously distinct.
fn all_distinct<'a>(mut values: impl Iterator<Item = Option<&'a str>>) -> bool {
    let mut seen = HashSet::new();
    values.all(|value| seen.insert(value))
}

fn facts_for(snapshot: &Snapshot, kind: CollectionKind) -> CollectionFacts {
    match kind {
        CollectionKind::Users => facts(&snapshot.users),
        CollectionKind::Roles => facts(&snapshot.roles),
        CollectionKind::Applications => facts(&snapshot.applications),
        CollectionKind::Groups => facts(&snapshot.groups),
        CollectionKind::Resources => facts(&snapshot.resources),
    }
}

/// Run the full battery of checks. Does not touch the relational store.
pub fn run_integrity_checks(snapshot: &Snapshot, thresholds: &ThresholdConfig) -> IntegrityReport {
    let all: Vec<(CollectionKind, CollectionFacts)> = CollectionKind::ALL
        .into_iter()
        .map(|kind| (kind, facts_for(snapshot, kind)))
        .collect();

    let mut report = IntegrityReport::default();

    for (kind, f) in &all {
        report.push(format!("{} Table Exists", kind.key()), f.exists);
    }
    for (kind, f) in &all {
        report.push(
            format!("{} Table Not Empty", kind.key()),
            f.len.is_some_and(|n| n > 0),
        );
    }
    for (kind, f) in &all {
        report.push(format!("{} IDs Unique", kind.key()), f.ids_unique);
    }
    for (kind, f) in &all {
        if kind.name_field().is_some() {
            report.push(format!("{} Names Unique", kind.key()), f.names_unique);
        }
    }

    let at_least = |kind: CollectionKind, min: usize| snapshot.collection_len(kind) >= min;

    report.push(
        format!("Users Check (at least {})", thresholds.min_users),
        at_least(CollectionKind::Users, thresholds.min_users),
    );

    // Absent role names count as the empty string.
    let distinct_role_names: HashSet<&str> = snapshot
        .roles()
        .iter()
        .map(|role| role.role_name.as_deref().unwrap_or(""))
        .collect();
    report.push(
        format!(
            "Roles Check (at least {} different names)",
            thresholds.min_role_names
        ),
        distinct_role_names.len() >= thresholds.min_role_names,
    );

    report.push(
        format!("Applications Check (at least {})", thresholds.min_applications),
        at_least(CollectionKind::Applications, thresholds.min_applications),
    );
    report.push(
        format!("Groups Check (at least {})", thresholds.min_groups),
        at_least(CollectionKind::Groups, thresholds.min_groups),
    );
    report.push(
        format!("Resources Check (at least {})", thresholds.min_resources),
        at_least(CollectionKind::Resources, thresholds.min_resources),
    );

    let failed = report.failures().count();
    tracing::info!(checks = report.len(), failed, "Integrity checks complete");

    report
}
