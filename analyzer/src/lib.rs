//! IAM snapshot risk analyzer
//!
//! Loads an identity/access-management snapshot (users, roles, applications,
//! groups, resources) from a JSON document and provides:
//! - a fixed battery of integrity checks over the raw record
//! - an in-memory SQLite projection of the five collections
//! - a catalog of read-only "security risk" queries over that projection
//!
//! Everything is synchronous and process-local. Nothing is written back to
//! disk.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod catalog;
pub mod config;
pub mod errors;
pub mod integrity;
pub mod rowset;
pub mod snapshot;
pub mod store;

pub use catalog::RiskQuery;
pub use config::{AnalyzerConfig, MissingSnapshotPolicy, ThresholdConfig};
pub use errors::{AnalyzerError, ErrorCategory, Result};
pub use integrity::{IntegrityCheck, IntegrityReport, run_integrity_checks};
pub use rowset::{Cell, RowSet};
pub use snapshot::{Collection, CollectionKind, Snapshot};
pub use store::RelationalStore;

use chrono::NaiveDate;

/// Analyzer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Today's local date, the default anchor for windowed queries
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Integrity report and relational projection of one loaded snapshot
pub struct IamAnalyzer {
    report: IntegrityReport,
    store: RelationalStore,
}

impl IamAnalyzer {
    /// Load the configured snapshot, check it and project it.
    ///
    /// A missing snapshot either aborts or continues with an empty record,
    /// per `cfg.missing_snapshot`.
    pub fn load(cfg: &AnalyzerConfig) -> Result<Self> {
        let path = cfg.resolved_snapshot_path();

        let snapshot = match Snapshot::load(&path) {
            Ok(snapshot) => snapshot,
            Err(AnalyzerError::SnapshotNotFound { path })
                if cfg.missing_snapshot == MissingSnapshotPolicy::Empty =>
            {
                tracing::warn!(
                    path = %path.display(),
                    "Snapshot not found; continuing with an empty record"
                );
                Snapshot::empty()
            }
            Err(e) => return Err(e),
        };

        Self::with_thresholds(&snapshot, &cfg.thresholds)
    }

    /// Build an analyzer from an in-memory snapshot with default thresholds
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self> {
        Self::with_thresholds(snapshot, &ThresholdConfig::default())
    }

    pub fn with_thresholds(snapshot: &Snapshot, thresholds: &ThresholdConfig) -> Result<Self> {
        let report = run_integrity_checks(snapshot, thresholds);
        let store = RelationalStore::from_snapshot(snapshot)?;

        tracing::info!(
            version = VERSION,
            checks_passed = report.passed(),
            "Analyzer ready"
        );

        Ok(Self { report, store })
    }

    pub fn integrity_report(&self) -> &IntegrityReport {
        &self.report
    }

    /// Run one catalog query anchored at `as_of`
    pub fn run_risk(&self, query: RiskQuery, as_of: NaiveDate) -> Result<RowSet> {
        self.store.run_risk(query, as_of)
    }

    /// Run ad-hoc read-only SQL anchored at `as_of`
    pub fn run_sql(&self, sql: &str, as_of: NaiveDate) -> Result<RowSet> {
        self.store.execute(sql, as_of)
    }
}
