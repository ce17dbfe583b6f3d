//! In-memory relational store
//!
//! Holds one SQLite connection with a table per snapshot collection:
//! - `Users`, `Roles`, `Applications`, `Groups`, `Resources`
//! - every column is `TEXT`; absent values are stored as `NULL`
//! - `AssociatedUsers` is a JSON array string, unnested with `json_each`
//!
//! Queries are restricted to read-only statements.

use chrono::NaiveDate;
use rusqlite::{Connection, named_params, params_from_iter};

use crate::catalog::{AS_OF_PARAM, RiskQuery};
use crate::errors::{AnalyzerError, Result};
use crate::rowset::{Cell, RowSet};
use crate::snapshot::{CollectionKind, Snapshot};

type TextRow = Vec<Option<String>>;

/// Column layout of each relation, in declaration order.
fn table_columns(kind: CollectionKind) -> &'static [&'static str] {
    match kind {
        CollectionKind::Users => &[
            "UserID",
            "Name",
            "Email",
            "Status",
            "LastLogin",
            "MFAStatus",
            "MFAType",
            "Position",
            "EmploymentStartDate",
        ],
        CollectionKind::Roles => &["RoleID", "RoleName", "AssociatedUsers"],
        CollectionKind::Applications => &["ApplicationID", "ApplicationName", "AssociatedUsers"],
        CollectionKind::Groups => &["GroupID", "GroupName", "AssociatedUsers"],
        CollectionKind::Resources => &["ResourceID", "ResourceName"],
    }
}

fn members_json(members: &[String]) -> Result<Option<String>> {
    serde_json::to_string(members)
        .map(Some)
        .map_err(|e| AnalyzerError::store_with_source("failed to serialize AssociatedUsers", e))
}

/// Flatten one collection into rows matching `table_columns(kind)`.
fn table_rows(snapshot: &Snapshot, kind: CollectionKind) -> Result<Vec<TextRow>> {
    let rows = match kind {
        CollectionKind::Users => snapshot
            .users()
            .iter()
            .map(|u| {
                vec![
                    u.user_id.clone(),
                    u.name.clone(),
                    u.email.clone(),
                    u.status.clone(),
                    u.last_login.clone(),
                    u.mfa_status.clone(),
                    u.mfa_type.clone(),
                    u.position.clone(),
                    u.employment_start_date.clone(),
                ]
            })
            .collect(),
        CollectionKind::Roles => snapshot
            .roles()
            .iter()
            .map(|r| {
                Ok(vec![
                    r.role_id.clone(),
                    r.role_name.clone(),
                    members_json(&r.associated_users)?,
                ])
            })
            .collect::<Result<Vec<_>>>()?,
        CollectionKind::Applications => snapshot
            .applications()
            .iter()
            .map(|a| {
                Ok(vec![
                    a.application_id.clone(),
                    a.application_name.clone(),
                    members_json(&a.associated_users)?,
                ])
            })
            .collect::<Result<Vec<_>>>()?,
        CollectionKind::Groups => snapshot
            .groups()
            .iter()
            .map(|g| {
                Ok(vec![
                    g.group_id.clone(),
                    g.group_name.clone(),
                    members_json(&g.associated_users)?,
                ])
            })
            .collect::<Result<Vec<_>>>()?,
        CollectionKind::Resources => snapshot
            .resources()
            .iter()
            .map(|r| vec![r.resource_id.clone(), r.resource_name.clone()])
            .collect(),
    };
    Ok(rows)
}

const REFUSED_KEYWORDS: &[&str] = &[
    "ATTACH",
    "DETACH",
    "PRAGMA",
    "BEGIN",
    "COMMIT",
    "END",
    "ROLLBACK",
    "SAVEPOINT",
    "RELEASE",
    "VACUUM",
];

/// First keyword of `sql`, upper-cased, skipping whitespace and comments
fn leading_keyword(sql: &str) -> Option<String> {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }

    let keyword: String = rest
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    (!keyword.is_empty()).then(|| keyword.to_ascii_uppercase())
}

fn quoted(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

/// Owned in-memory relational store
pub struct RelationalStore {
    conn: Connection,
}

impl RelationalStore {
    /// Open an empty store with no relations
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AnalyzerError::store_with_source("failed to open in-memory db", e))?;
        Ok(Self { conn })
    }

    /// Open a store and project `snapshot` into it
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self> {
        let mut store = Self::open_in_memory()?;
        store.project(snapshot)?;
        Ok(store)
    }

    /// Drop and re-create all five relations from `snapshot`.
    ///
    /// Runs in one transaction, so a failure leaves the previous relations
    /// in place. Missing or malformed collections become empty tables.
    pub fn project(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.set_query_only(false)?;
        let projected = self.write_tables(snapshot);
        self.set_query_only(true)?;
        projected?;

        tracing::info!("Relational store projected");
        Ok(())
    }

    fn write_tables(&mut self, snapshot: &Snapshot) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| AnalyzerError::store_with_source("failed to begin projection", e))?;

        for kind in CollectionKind::ALL {
            let table = quoted(kind.key());
            let columns = table_columns(kind);
            let column_defs = columns
                .iter()
                .map(|c| format!("{} TEXT", quoted(c)))
                .collect::<Vec<_>>()
                .join(", ");

            tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({column_defs});"
            ))
            .map_err(|e| {
                AnalyzerError::store_with_source(format!("failed to create table {table}"), e)
            })?;

            let rows = table_rows(snapshot, kind)?;
            if rows.is_empty() {
                if !snapshot.is_loaded(kind) {
                    tracing::warn!(
                        table = kind.key(),
                        "Collection missing or malformed; projecting an empty table"
                    );
                }
                continue;
            }

            let placeholders = vec!["?"; columns.len()].join(", ");
            let insert_sql = format!("INSERT INTO {table} VALUES ({placeholders})");
            {
                let mut stmt = tx.prepare(&insert_sql).map_err(|e| {
                    AnalyzerError::store_with_source(
                        format!("failed to prepare insert for {table}"),
                        e,
                    )
                })?;
                for row in &rows {
                    stmt.execute(params_from_iter(row.iter())).map_err(|e| {
                        AnalyzerError::store_with_source(
                            format!("failed to insert into {table}"),
                            e,
                        )
                    })?;
                }
            }

            tracing::debug!(table = kind.key(), rows = rows.len(), "Projected table");
        }

        tx.commit()
            .map_err(|e| AnalyzerError::store_with_source("failed to commit projection", e))
    }

    /// Toggle SQLite's `query_only` guard; on between projections.
    fn set_query_only(&self, enabled: bool) -> Result<()> {
        self.conn
            .pragma_update(None, "query_only", enabled)
            .map_err(|e| AnalyzerError::store_with_source("failed to set query_only", e))
    }

    /// Number of rows in the relation for `kind`
    pub fn row_count(&self, kind: CollectionKind) -> Result<i64> {
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quoted(kind.key())),
                [],
                |row| row.get(0),
            )
            .map_err(|e| {
                AnalyzerError::query_with_source(format!("failed to count {}", kind.key()), e)
            })
    }

    /// Run a catalog query
    pub fn run_risk(&self, query: RiskQuery, as_of: NaiveDate) -> Result<RowSet> {
        tracing::debug!(query = query.slug(), %as_of, "Running risk query");
        self.execute(query.sql(), as_of)
    }

    /// Run arbitrary read-only query text.
    ///
    /// `:as_of` is bound to `as_of` (ISO date) when the statement declares it.
    /// Statements that could modify the store are refused before they run.
    pub fn execute(&self, sql: &str, as_of: NaiveDate) -> Result<RowSet> {
        if sql.trim().is_empty() {
            return Err(AnalyzerError::query("query text is empty"));
        }

        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| AnalyzerError::query_with_source("failed to prepare query", e))?;

        if !stmt.readonly() {
            return Err(AnalyzerError::query(
                "only read-only statements can be executed",
            ));
        }
        // Reported read-only by SQLite, but they attach files or change
        // connection state.
        if let Some(keyword) = leading_keyword(sql)
            && REFUSED_KEYWORDS.contains(&keyword.as_str())
        {
            return Err(AnalyzerError::query(format!(
                "{keyword} statements cannot be executed"
            )));
        }

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let binds_as_of = stmt
            .parameter_index(AS_OF_PARAM)
            .map_err(|e| AnalyzerError::query_with_source("failed to inspect parameters", e))?
            .is_some();
        let as_of_text = as_of.format("%Y-%m-%d").to_string();

        let mut rows = (if binds_as_of {
            stmt.query(named_params! { ":as_of": as_of_text })
        } else {
            stmt.query([])
        })
        .map_err(|e| AnalyzerError::query_with_source("failed to execute query", e))?;

        let mut result = RowSet::new(columns);
        while let Some(row) = rows
            .next()
            .map_err(|e| AnalyzerError::query_with_source("failed to read result row", e))?
        {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| AnalyzerError::query_with_source("failed to read column", e))?;
                cells.push(Cell::from(value));
            }
            result.push_row(cells);
        }

        tracing::debug!(rows = result.len(), "Query complete");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    fn store_for(doc: serde_json::Value) -> RelationalStore {
        RelationalStore::from_snapshot(&Snapshot::from_value(doc)).expect("project")
    }

    #[test]
    fn test_projects_all_tables() {
        let store = store_for(json!({
            "Users": [{"UserID": "u1"}, {"UserID": "u2"}],
            "Roles": [{"RoleID": "r1", "RoleName": "Admin", "AssociatedUsers": ["u1"]}]
        }));
        assert_eq!(store.row_count(CollectionKind::Users).expect("count"), 2);
        assert_eq!(store.row_count(CollectionKind::Roles).expect("count"), 1);
        // Missing collections still get an (empty) table
        assert_eq!(store.row_count(CollectionKind::Groups).expect("count"), 0);
        assert_eq!(store.row_count(CollectionKind::Resources).expect("count"), 0);
    }

    #[test]
    fn test_nulls_and_members_json() {
        let store = store_for(json!({
            "Users": [{"UserID": "u1", "LastLogin": null}],
            "Groups": [{"GroupID": "g1", "GroupName": "Eng", "AssociatedUsers": ["u1", "u2"]}]
        }));

        let users = store
            .execute("SELECT UserID, LastLogin, typeof(LastLogin) AS t FROM Users", as_of())
            .expect("query");
        assert_eq!(users.text(0, "UserID"), Some("u1"));
        assert!(users.value(0, "LastLogin").expect("cell").is_null());
        assert_eq!(users.text(0, "t"), Some("null"));

        let groups = store
            .execute("SELECT AssociatedUsers FROM \"Groups\"", as_of())
            .expect("query");
        assert_eq!(groups.text(0, "AssociatedUsers"), Some(r#"["u1","u2"]"#));
    }

    #[test]
    fn test_reprojection_replaces_tables() {
        let mut store = store_for(json!({"Users": [{"UserID": "u1"}, {"UserID": "u2"}]}));
        let next = Snapshot::from_value(json!({"Users": [{"UserID": "u9"}]}));

        store.project(&next).expect("project");
        store.project(&next).expect("project again");

        assert_eq!(store.row_count(CollectionKind::Users).expect("count"), 1);
        let rows = store
            .execute("SELECT UserID FROM Users", as_of())
            .expect("query");
        assert_eq!(rows.text(0, "UserID"), Some("u9"));
    }

    #[test]
    fn test_rejects_writes() {
        let store = store_for(json!({"Users": [{"UserID": "u1"}]}));

        for sql in [
            "DELETE FROM Users",
            "DROP TABLE Users",
            "INSERT INTO Users (UserID) VALUES ('x')",
            "UPDATE Users SET Name = 'x'",
        ] {
            let err = store.execute(sql, as_of()).expect_err("write must fail");
            assert!(
                matches!(err, AnalyzerError::QueryFailed { .. }),
                "{sql}: {err:?}"
            );
        }
        assert_eq!(store.row_count(CollectionKind::Users).expect("count"), 1);
    }

    #[test]
    fn test_refuses_connection_statements() {
        let store = store_for(json!({"Users": [{"UserID": "u1"}]}));

        for sql in [
            "ATTACH DATABASE ':memory:' AS other",
            "  attach database 'leak.db' as other",
            "/* hidden */ ATTACH DATABASE ':memory:' AS other",
            "-- note\nPRAGMA query_only = OFF",
            "BEGIN",
            "PRAGMA table_info(Users)",
        ] {
            let err = store.execute(sql, as_of()).expect_err("must be refused");
            assert!(
                matches!(err, AnalyzerError::QueryFailed { .. }),
                "{sql}: {err:?}"
            );
        }

        let rows = store
            .execute("-- leading comment\nSELECT UserID FROM Users", as_of())
            .expect("commented select runs");
        assert_eq!(rows.text(0, "UserID"), Some("u1"));
    }

    #[test]
    fn test_leading_keyword() {
        assert_eq!(leading_keyword("  select 1"), Some("SELECT".to_string()));
        assert_eq!(
            leading_keyword("/* a */ -- b\n attach x"),
            Some("ATTACH".to_string())
        );
        assert_eq!(leading_keyword("/* unterminated"), None);
        assert_eq!(leading_keyword(""), None);
    }

    #[test]
    fn test_connection_is_query_only_after_projection() {
        let mut store = store_for(json!({"Users": [{"UserID": "u1"}]}));
        assert!(store.conn.execute("DELETE FROM Users", []).is_err());

        store
            .project(&Snapshot::from_value(json!({"Users": [{"UserID": "u2"}]})))
            .expect("reprojection lifts the guard while writing");
        assert!(store.conn.execute("DELETE FROM Users", []).is_err());
        assert_eq!(store.row_count(CollectionKind::Users).expect("count"), 1);
    }

    #[test]
    fn test_every_catalog_query_prepares() {
        let store = store_for(json!({}));
        for query in RiskQuery::all() {
            let rows = store
                .run_risk(query, as_of())
                .unwrap_or_else(|e| panic!("{}: {}", query.slug(), e.detail()));
            assert!(rows.is_empty());
        }
    }

    #[test]
    fn test_query_errors() {
        let store = store_for(json!({"Users": []}));
        assert!(matches!(
            store.execute("SELECT Nope FROM Users", as_of()),
            Err(AnalyzerError::QueryFailed { .. })
        ));
        assert!(matches!(
            store.execute("   ", as_of()),
            Err(AnalyzerError::QueryFailed { .. })
        ));
        assert!(matches!(
            store.execute("SELECT 1; SELECT 2", as_of()),
            Err(AnalyzerError::QueryFailed { .. })
        ));
    }

    #[test]
    fn test_binds_as_of_only_when_declared() {
        let store = store_for(json!({}));
        let rows = store
            .execute("SELECT DATE(:as_of, '-2 months') AS cutoff", as_of())
            .expect("query");
        assert_eq!(rows.text(0, "cutoff"), Some("2024-04-01"));

        let rows = store.execute("SELECT 1 AS one", as_of()).expect("query");
        assert_eq!(rows.value(0, "one"), Some(&Cell::Integer(1)));
    }
}
