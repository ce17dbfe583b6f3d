//! Text rendering for reports, tables and the catalog listing.

use iamrisk_analyzer::{IntegrityReport, RiskQuery, RowSet};
use owo_colors::OwoColorize;
use unicode_width::UnicodeWidthStr;

/// Whether stdout is a terminal that understands ANSI color
pub fn stdout_supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// `Data Integrity Check Results:` followed by one line per check
pub fn integrity_report(report: &IntegrityReport, color: bool) -> String {
    let mut out = String::from("Data Integrity Check Results:\n");
    for check in report.iter() {
        let verdict = match (check.passed, color) {
            (true, true) => "PASSED".green().to_string(),
            (false, true) => "FAILED".red().to_string(),
            (true, false) => "PASSED".to_string(),
            (false, false) => "FAILED".to_string(),
        };
        out.push_str(&format!("- {}: {verdict}\n", check.name));
    }
    out
}

/// Column-aligned table: header line, then one line per row.
///
/// Null cells print as `NULL`. Widths are display widths, so wide glyphs
/// stay aligned.
pub fn table(rows: &RowSet) -> String {
    let body: Vec<Vec<String>> = rows
        .rows()
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = rows.columns().iter().map(|c| c.width()).collect();
    for row in &body {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(idx) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let mut out = String::new();
    push_line(&mut out, rows.columns(), &widths);
    for row in &body {
        push_line(&mut out, row, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        line.extend(std::iter::repeat_n(' ', width.saturating_sub(cell.width())));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// One line per catalog entry: slug, title, description.
///
/// Entries with a relative date window are marked with `[as-of]`.
pub fn catalog() -> String {
    let queries = RiskQuery::all();
    let slug_width = queries.iter().map(|q| q.slug().len()).max().unwrap_or(0);

    let mut out = String::new();
    for query in queries {
        let marker = if query.uses_as_of() { " [as-of]" } else { "" };
        out.push_str(&format!(
            "{:<slug_width$}  {}: {}{marker}\n",
            query.slug(),
            query.title(),
            query.description()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamrisk_analyzer::{IamAnalyzer, Snapshot, ThresholdConfig, run_integrity_checks};
    use pretty_assertions::assert_eq;

    fn rows_for(sql: &str) -> RowSet {
        let snapshot = Snapshot::from_json_str(
            r#"{"Users": [
                {"UserID": "u1", "Name": "Zoë", "Email": null},
                {"UserID": "u22", "Name": "Al", "Email": "al@example.com"}
            ]}"#,
        )
        .expect("snapshot");
        IamAnalyzer::from_snapshot(&snapshot)
            .expect("analyzer")
            .run_sql(sql, iamrisk_analyzer::today())
            .expect("query")
    }

    #[test]
    fn test_table_alignment_and_nulls() {
        let rendered = table(&rows_for("SELECT UserID, Name, Email FROM Users"));
        assert_eq!(
            rendered,
            "UserID  Name  Email\n\
             u1      Zoë   NULL\n\
             u22     Al    al@example.com\n"
        );
    }

    #[test]
    fn test_table_with_no_rows_prints_header() {
        let rendered = table(&rows_for("SELECT UserID FROM Users WHERE 0"));
        assert_eq!(rendered, "UserID\n");
    }

    #[test]
    fn test_integrity_report_plain() {
        let report = run_integrity_checks(&Snapshot::empty(), &ThresholdConfig::default());
        let rendered = integrity_report(&report, false);
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("Data Integrity Check Results:"));
        assert_eq!(lines.next(), Some("- Users Table Exists: FAILED"));
        assert_eq!(rendered.lines().count(), 25);
    }

    #[test]
    fn test_catalog_lists_every_query() {
        let rendered = catalog();
        assert_eq!(rendered.lines().count(), RiskQuery::all().len());
        assert!(rendered.starts_with("partially-offboarded-users  Partially Offboarded Users: "));
        let marked: Vec<&str> = rendered
            .lines()
            .filter(|line| line.ends_with(" [as-of]"))
            .filter_map(|line| line.split_whitespace().next())
            .collect();
        assert_eq!(marked, vec!["inactive-users", "recently-joined-users"]);
    }
}
