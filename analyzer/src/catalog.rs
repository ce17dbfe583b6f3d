//! The fixed security-risk query catalog.
//!
//! Each variant carries its own title, description and SQL. Relative date
//! windows are anchored on the `:as_of` parameter so a report can be
//! reproduced for any reference date.

use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Name of the reference-date parameter bound by the executor.
pub const AS_OF_PARAM: &str = ":as_of";

/// Risk reports, in menu order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum RiskQuery {
    // Enum order is presentation order in the menu.
    PartiallyOffboardedUsers,
    InactiveUsers,
    NeverLoggedInUsers,
    NoMfa,
    WeakMfa,
    ServiceAccounts,
    LocalAccounts,
    RecentlyJoinedUsers,
}

impl RiskQuery {
    /// All entries in menu order
    pub fn all() -> Vec<RiskQuery> {
        Self::iter().collect()
    }

    /// Stable identifier used on the command line
    pub fn slug(self) -> &'static str {
        self.into()
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::PartiallyOffboardedUsers => "Partially Offboarded Users",
            Self::InactiveUsers => "Inactive Users",
            Self::NeverLoggedInUsers => "Never Logged In Users",
            Self::NoMfa => "No MFA",
            Self::WeakMfa => "Weak MFA",
            Self::ServiceAccounts => "Service Accounts",
            Self::LocalAccounts => "Local Accounts",
            Self::RecentlyJoinedUsers => "Recently Joined Users",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::PartiallyOffboardedUsers => {
                "Users who have not been completely removed from all systems post-offboarding"
            }
            Self::InactiveUsers => {
                "Users who have not logged in for a significant period (2 months)"
            }
            Self::NeverLoggedInUsers => {
                "Users who have never logged into the system after being provisioned"
            }
            Self::NoMfa => "Users who do not have MFA enabled",
            Self::WeakMfa => "Users with MFA methods that are considered weak or less secure",
            Self::ServiceAccounts => "Non-human accounts used for application or service access",
            Self::LocalAccounts => {
                "Accounts that are local to a specific system or application, not managed centrally"
            }
            Self::RecentlyJoinedUsers => {
                "Users who have recently joined and may require additional monitoring (3 months)"
            }
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Self::PartiallyOffboardedUsers => PARTIALLY_OFFBOARDED_SQL,
            Self::InactiveUsers => {
                "SELECT UserID, Name, Email, LastLogin FROM Users \
                 WHERE LastLogin < DATE(:as_of, '-2 months')"
            }
            Self::NeverLoggedInUsers => {
                "SELECT UserID, Name, Email, LastLogin FROM Users WHERE LastLogin IS NULL"
            }
            Self::NoMfa => {
                "SELECT UserID, Name, Email, MFAStatus FROM Users \
                 WHERE MFAStatus LIKE '%Disabled%' OR MFAStatus IS NULL"
            }
            Self::WeakMfa => {
                "SELECT UserID, Name, Email, MFAStatus, MFAType FROM Users \
                 WHERE MFAStatus LIKE '%enabled%' \
                 AND MFAType NOT LIKE '%totp%' \
                 AND MFAType NOT LIKE '%security key%'"
            }
            Self::ServiceAccounts => {
                "SELECT UserID, Name, Email, Position FROM Users \
                 WHERE Position LIKE '%Service Account%'"
            }
            Self::LocalAccounts => LOCAL_ACCOUNTS_SQL,
            Self::RecentlyJoinedUsers => {
                "SELECT UserID, Name, Email, EmploymentStartDate FROM Users \
                 WHERE EmploymentStartDate > DATE(:as_of, '-3 months')"
            }
        }
    }

    /// Whether the query text references the reference date
    pub fn uses_as_of(self) -> bool {
        self.sql().contains(AS_OF_PARAM)
    }

    /// Look up an entry by its 1-based position in the catalog
    pub fn from_position(position: usize) -> Option<RiskQuery> {
        position.checked_sub(1).and_then(|i| Self::iter().nth(i))
    }
}

const PARTIALLY_OFFBOARDED_SQL: &str = r#"
WITH RolesAssociatedUsers AS (
  SELECT DISTINCT trim(value) AS UserID, R.RoleID, R.RoleName
  FROM Roles AS R, json_each(R.AssociatedUsers)
),
ApplicationsAssociatedUsers AS (
  SELECT DISTINCT trim(value) AS UserID, A.ApplicationID, A.ApplicationName
  FROM Applications AS A, json_each(A.AssociatedUsers)
),
GroupsAssociatedUsers AS (
  SELECT DISTINCT trim(value) AS UserID, G.GroupID, G.GroupName
  FROM "Groups" AS G, json_each(G.AssociatedUsers)
)
SELECT
  RAU.UserID AS UserID,
  Users.Email,
  Users.Status,
  RAU.RoleID,
  RAU.RoleName,
  NULL AS ApplicationID,
  NULL AS ApplicationName,
  NULL AS GroupID,
  NULL AS GroupName
FROM RolesAssociatedUsers AS RAU
LEFT JOIN Users ON RAU.UserID = Users.UserID
WHERE Users.Status LIKE '%offboarded%'

UNION ALL

SELECT
  AAU.UserID AS UserID,
  Users.Email,
  Users.Status,
  NULL AS RoleID,
  NULL AS RoleName,
  AAU.ApplicationID,
  AAU.ApplicationName,
  NULL AS GroupID,
  NULL AS GroupName
FROM ApplicationsAssociatedUsers AS AAU
LEFT JOIN Users ON AAU.UserID = Users.UserID
WHERE Users.Status LIKE '%offboarded%'

UNION ALL

SELECT
  GAU.UserID AS UserID,
  Users.Email,
  Users.Status,
  NULL AS RoleID,
  NULL AS RoleName,
  NULL AS ApplicationID,
  NULL AS ApplicationName,
  GAU.GroupID,
  GAU.GroupName
FROM GroupsAssociatedUsers AS GAU
LEFT JOIN Users ON GAU.UserID = Users.UserID
WHERE Users.Status LIKE '%offboarded%' AND NOT GAU.GroupName LIKE '%offboarded%'
ORDER BY UserID
"#;

const LOCAL_ACCOUNTS_SQL: &str = r#"
WITH ApplicationsAssociatedUsers AS (
  SELECT DISTINCT trim(value) AS UserID, A.ApplicationID, A.ApplicationName
  FROM Applications AS A, json_each(A.AssociatedUsers)
)
SELECT
  AAU.UserID,
  Users.Email,
  Users.Status,
  AAU.ApplicationID,
  AAU.ApplicationName
FROM ApplicationsAssociatedUsers AS AAU
LEFT JOIN Users ON AAU.UserID = Users.UserID
WHERE Users.UserID IS NULL
"#;
