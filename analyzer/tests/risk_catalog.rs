#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Risk catalog behavior over a small, hand-built snapshot.

use chrono::NaiveDate;
use iamrisk_analyzer::{AnalyzerError, Cell, IamAnalyzer, RiskQuery, RowSet, Snapshot};
use pretty_assertions::assert_eq;
use serde_json::json;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

fn fixture() -> IamAnalyzer {
    let doc = json!({
        "Users": [
            {
                "UserID": "u1", "Name": "Ada", "Email": "ada@example.com",
                "Status": "Offboarded", "LastLogin": "2024-03-01",
                "MFAStatus": "Enabled", "MFAType": "SMS",
                "Position": "Engineer", "EmploymentStartDate": "2019-02-01"
            },
            {
                "UserID": "u2", "Name": "Grace", "Email": "grace@example.com",
                "Status": "Active", "LastLogin": "2024-05-20",
                "MFAStatus": "Enabled", "MFAType": "TOTP",
                "Position": "Manager", "EmploymentStartDate": "2024-04-15"
            },
            {
                "UserID": "u3", "Name": "build-bot", "Email": null,
                "Status": "Active", "LastLogin": null,
                "MFAStatus": "Disabled", "MFAType": null,
                "Position": "Service Account", "EmploymentStartDate": "2022-07-01"
            },
            {
                "UserID": "u4", "Name": "Linus", "Email": "linus@example.com",
                "Status": "Active", "LastLogin": "2024-05-30",
                "MFAType": "Security Key",
                "Position": "Engineer", "EmploymentStartDate": "2023-01-10"
            }
        ],
        "Roles": [
            {"RoleID": "r1", "RoleName": "Admin", "AssociatedUsers": ["u1", "u2"]},
            {"RoleID": "r2", "RoleName": "Reader", "AssociatedUsers": ["u2"]}
        ],
        "Applications": [
            {"ApplicationID": "a1", "ApplicationName": "Payroll", "AssociatedUsers": ["u1", "u99"]},
            {"ApplicationID": "a2", "ApplicationName": "Wiki", "AssociatedUsers": ["u2"]}
        ],
        "Groups": [
            {"GroupID": "g1", "GroupName": "Offboarded Users", "AssociatedUsers": ["u1"]},
            {"GroupID": "g2", "GroupName": "Engineering", "AssociatedUsers": ["u2", "u4"]}
        ],
        "Resources": [
            {"ResourceID": "res1", "ResourceName": "S3 bucket"}
        ]
    });
    IamAnalyzer::from_snapshot(&Snapshot::from_value(doc)).expect("analyzer")
}

fn user_ids(rows: &RowSet) -> Vec<&str> {
    rows.column_values("UserID")
        .into_iter()
        .filter_map(Cell::as_text)
        .collect()
}

fn run(query: RiskQuery) -> RowSet {
    fixture().run_risk(query, as_of()).expect("query runs")
}

#[test]
fn partially_offboarded_lists_leftover_grants() {
    let rows = run(RiskQuery::PartiallyOffboardedUsers);
    assert_eq!(
        rows.columns(),
        [
            "UserID",
            "Email",
            "Status",
            "RoleID",
            "RoleName",
            "ApplicationID",
            "ApplicationName",
            "GroupID",
            "GroupName",
        ]
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(user_ids(&rows), vec!["u1", "u1"]);

    let role_row = (0..rows.len())
        .find(|&i| rows.text(i, "RoleID").is_some())
        .expect("role grant row");
    assert_eq!(rows.text(role_row, "RoleName"), Some("Admin"));
    assert_eq!(rows.text(role_row, "Email"), Some("ada@example.com"));
    assert!(rows.value(role_row, "ApplicationID").expect("cell").is_null());

    let app_row = (0..rows.len())
        .find(|&i| rows.text(i, "ApplicationID").is_some())
        .expect("application grant row");
    assert_eq!(rows.text(app_row, "ApplicationName"), Some("Payroll"));

    // Membership in an "offboarded" group is expected and not reported
    assert!(rows.column_values("GroupID").iter().all(|c| c.is_null()));
}

#[test]
fn single_offboarded_role_member_yields_one_row() {
    let snapshot = Snapshot::from_value(json!({
        "Users": [{"UserID": "u1", "Status": "offboarded", "LastLogin": null}],
        "Roles": [{"RoleID": "r1", "RoleName": "Admin", "AssociatedUsers": ["u1"]}]
    }));
    let rows = IamAnalyzer::from_snapshot(&snapshot)
        .expect("analyzer")
        .run_risk(RiskQuery::PartiallyOffboardedUsers, as_of())
        .expect("query runs");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows.text(0, "UserID"), Some("u1"));
    assert_eq!(rows.text(0, "Status"), Some("offboarded"));
    assert_eq!(rows.text(0, "RoleID"), Some("r1"));
    assert_eq!(rows.text(0, "RoleName"), Some("Admin"));
    for column in ["Email", "ApplicationID", "ApplicationName", "GroupID", "GroupName"] {
        assert!(rows.value(0, column).expect("cell").is_null(), "{column}");
    }
}

#[test]
fn local_accounts_are_members_without_a_user_record() {
    let rows = run(RiskQuery::LocalAccounts);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.text(0, "UserID"), Some("u99"));
    assert_eq!(rows.text(0, "ApplicationID"), Some("a1"));
    assert!(rows.value(0, "Email").expect("cell").is_null());
    assert!(rows.value(0, "Status").expect("cell").is_null());
}

#[test]
fn never_logged_in_matches_null_last_login() {
    let rows = run(RiskQuery::NeverLoggedInUsers);
    assert_eq!(user_ids(&rows), vec!["u3"]);
}

#[test]
fn inactive_users_window_is_anchored_on_as_of() {
    let rows = run(RiskQuery::InactiveUsers);
    assert_eq!(user_ids(&rows), vec!["u1"]);

    let later = NaiveDate::from_ymd_opt(2024, 8, 1).expect("valid date");
    let rows = fixture()
        .run_risk(RiskQuery::InactiveUsers, later)
        .expect("query runs");
    assert_eq!(user_ids(&rows), vec!["u1", "u2", "u4"]);
}

#[test]
fn recently_joined_users_window_is_anchored_on_as_of() {
    let rows = run(RiskQuery::RecentlyJoinedUsers);
    assert_eq!(user_ids(&rows), vec!["u2"]);
    assert_eq!(rows.text(0, "EmploymentStartDate"), Some("2024-04-15"));
}

#[test]
fn no_mfa_includes_disabled_and_unset() {
    let rows = run(RiskQuery::NoMfa);
    assert_eq!(user_ids(&rows), vec!["u3", "u4"]);
}

#[test]
fn weak_mfa_excludes_totp_and_security_keys() {
    let rows = run(RiskQuery::WeakMfa);
    assert_eq!(user_ids(&rows), vec!["u1"]);
    assert_eq!(rows.text(0, "MFAType"), Some("SMS"));
}

#[test]
fn service_accounts_match_position() {
    let rows = run(RiskQuery::ServiceAccounts);
    assert_eq!(user_ids(&rows), vec!["u3"]);
    assert!(rows.value(0, "Email").expect("cell").is_null());
}

#[test]
fn every_catalog_query_runs_on_an_empty_record() {
    let analyzer = IamAnalyzer::from_snapshot(&Snapshot::empty()).expect("analyzer");
    for query in RiskQuery::all() {
        let rows = analyzer.run_risk(query, as_of()).expect("query runs");
        assert!(rows.is_empty(), "{} returned rows", query.slug());
    }
}

#[test]
fn failed_query_leaves_analyzer_usable() {
    let analyzer = fixture();
    let before = analyzer.integrity_report().clone();

    let err = analyzer
        .run_sql("SELECT NoSuchColumn FROM Users", as_of())
        .expect_err("bad column");
    assert!(matches!(err, AnalyzerError::QueryFailed { .. }));
    assert!(err.category().recoverable());

    let err = analyzer
        .run_sql("DELETE FROM Users", as_of())
        .expect_err("writes are refused");
    assert!(matches!(err, AnalyzerError::QueryFailed { .. }));

    assert_eq!(analyzer.integrity_report(), &before);
    let rows = analyzer
        .run_sql("SELECT COUNT(*) AS n FROM Users", as_of())
        .expect("store intact");
    assert_eq!(rows.value(0, "n"), Some(&Cell::Integer(4)));
}
