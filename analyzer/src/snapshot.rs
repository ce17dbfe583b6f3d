//! Snapshot record model and loader
//!
//! A snapshot is a single JSON document with five top-level arrays. Each
//! collection is kept tri-state (`Missing`, `Malformed`, `Loaded`) so that a
//! structurally wrong document still produces a record the integrity checker
//! can report on.

use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::{AnalyzerError, Result};

/// The five entity collections of a snapshot, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Users,
    Roles,
    Applications,
    Groups,
    Resources,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 5] = [
        Self::Users,
        Self::Roles,
        Self::Applications,
        Self::Groups,
        Self::Resources,
    ];

    /// Top-level document key; also the relation name in the store
    pub fn key(self) -> &'static str {
        match self {
            Self::Users => "Users",
            Self::Roles => "Roles",
            Self::Applications => "Applications",
            Self::Groups => "Groups",
            Self::Resources => "Resources",
        }
    }

    pub fn id_field(self) -> &'static str {
        match self {
            Self::Users => "UserID",
            Self::Roles => "RoleID",
            Self::Applications => "ApplicationID",
            Self::Groups => "GroupID",
            Self::Resources => "ResourceID",
        }
    }

    /// Field whose values must be unique; users have none.
    pub fn name_field(self) -> Option<&'static str> {
        match self {
            Self::Users => None,
            Self::Roles => Some("RoleName"),
            Self::Applications => Some("ApplicationName"),
            Self::Groups => Some("GroupName"),
            Self::Resources => Some("ResourceName"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(rename = "UserID", default, deserialize_with = "lenient_text")]
    pub user_id: Option<String>,
    #[serde(rename = "Name", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(rename = "Email", default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(rename = "Status", default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(rename = "LastLogin", default, deserialize_with = "lenient_text")]
    pub last_login: Option<String>,
    #[serde(rename = "MFAStatus", default, deserialize_with = "lenient_text")]
    pub mfa_status: Option<String>,
    #[serde(rename = "MFAType", default, deserialize_with = "lenient_text")]
    pub mfa_type: Option<String>,
    #[serde(rename = "Position", default, deserialize_with = "lenient_text")]
    pub position: Option<String>,
    #[serde(
        rename = "EmploymentStartDate",
        default,
        deserialize_with = "lenient_text"
    )]
    pub employment_start_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Role {
    #[serde(rename = "RoleID", default, deserialize_with = "lenient_text")]
    pub role_id: Option<String>,
    #[serde(rename = "RoleName", default, deserialize_with = "lenient_text")]
    pub role_name: Option<String>,
    #[serde(rename = "AssociatedUsers", default, deserialize_with = "lenient_members")]
    pub associated_users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Application {
    #[serde(rename = "ApplicationID", default, deserialize_with = "lenient_text")]
    pub application_id: Option<String>,
    #[serde(rename = "ApplicationName", default, deserialize_with = "lenient_text")]
    pub application_name: Option<String>,
    #[serde(rename = "AssociatedUsers", default, deserialize_with = "lenient_members")]
    pub associated_users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Group {
    #[serde(rename = "GroupID", default, deserialize_with = "lenient_text")]
    pub group_id: Option<String>,
    #[serde(rename = "GroupName", default, deserialize_with = "lenient_text")]
    pub group_name: Option<String>,
    #[serde(rename = "AssociatedUsers", default, deserialize_with = "lenient_members")]
    pub associated_users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Resource {
    #[serde(rename = "ResourceID", default, deserialize_with = "lenient_text")]
    pub resource_id: Option<String>,
    #[serde(rename = "ResourceName", default, deserialize_with = "lenient_text")]
    pub resource_name: Option<String>,
}

/// Key and display name of a record, as seen by the uniqueness checks.
pub trait Keyed {
    fn id(&self) -> Option<&str>;

    fn display_name(&self) -> Option<&str> {
        None
    }
}

impl Keyed for User {
    fn id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

impl Keyed for Role {
    fn id(&self) -> Option<&str> {
        self.role_id.as_deref()
    }
    fn display_name(&self) -> Option<&str> {
        self.role_name.as_deref()
    }
}

impl Keyed for Application {
    fn id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }
    fn display_name(&self) -> Option<&str> {
        self.application_name.as_deref()
    }
}

impl Keyed for Group {
    fn id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }
    fn display_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }
}

impl Keyed for Resource {
    fn id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }
    fn display_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }
}

/// One top-level collection of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection<T> {
    /// Key absent from the document
    Missing,
    /// Key present but not an array of records
    Malformed { reason: String },
    Loaded(Vec<T>),
}

impl<T> Collection<T> {
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    /// Items when the collection loaded cleanly
    pub fn items(&self) -> Option<&[T]> {
        match self {
            Self::Loaded(items) => Some(items),
            _ => None,
        }
    }

    /// Number of loaded items; 0 for missing or malformed collections
    pub fn len(&self) -> usize {
        self.items().map_or(0, <[T]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::Missing
    }
}

/// The in-memory IAM record. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub users: Collection<User>,
    pub roles: Collection<Role>,
    pub applications: Collection<Application>,
    pub groups: Collection<Group>,
    pub resources: Collection<Resource>,
}

impl Snapshot {
    /// The empty-record sentinel: every collection missing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read and parse a snapshot document
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Snapshot file not found");
            return Err(AnalyzerError::SnapshotNotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|source| {
            AnalyzerError::SnapshotRead {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let snapshot = Self::from_json_str(&contents)?;

        tracing::info!(
            path = %path.display(),
            users = snapshot.users.len(),
            roles = snapshot.roles.len(),
            applications = snapshot.applications.len(),
            groups = snapshot.groups.len(),
            resources = snapshot.resources.len(),
            "Snapshot loaded"
        );

        Ok(snapshot)
    }

    /// Parse a snapshot from JSON text
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|source| AnalyzerError::SnapshotParse { source })?;
        Ok(Self::from_value(value))
    }

    /// Build a snapshot from an already-parsed document. Never fails: shape
    /// problems become `Missing`/`Malformed` collections.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut doc) = value else {
            tracing::warn!(
                "Snapshot root is not a JSON object; treating every collection as missing"
            );
            return Self::empty();
        };

        Self {
            users: take_collection(&mut doc, CollectionKind::Users),
            roles: take_collection(&mut doc, CollectionKind::Roles),
            applications: take_collection(&mut doc, CollectionKind::Applications),
            groups: take_collection(&mut doc, CollectionKind::Groups),
            resources: take_collection(&mut doc, CollectionKind::Resources),
        }
    }

    pub fn is_present(&self, kind: CollectionKind) -> bool {
        match kind {
            CollectionKind::Users => self.users.is_present(),
            CollectionKind::Roles => self.roles.is_present(),
            CollectionKind::Applications => self.applications.is_present(),
            CollectionKind::Groups => self.groups.is_present(),
            CollectionKind::Resources => self.resources.is_present(),
        }
    }

    /// True when the collection parsed into records (possibly zero of them)
    pub fn is_loaded(&self, kind: CollectionKind) -> bool {
        match kind {
            CollectionKind::Users => self.users.items().is_some(),
            CollectionKind::Roles => self.roles.items().is_some(),
            CollectionKind::Applications => self.applications.items().is_some(),
            CollectionKind::Groups => self.groups.items().is_some(),
            CollectionKind::Resources => self.resources.items().is_some(),
        }
    }

    pub fn collection_len(&self, kind: CollectionKind) -> usize {
        match kind {
            CollectionKind::Users => self.users.len(),
            CollectionKind::Roles => self.roles.len(),
            CollectionKind::Applications => self.applications.len(),
            CollectionKind::Groups => self.groups.len(),
            CollectionKind::Resources => self.resources.len(),
        }
    }

    pub fn users(&self) -> &[User] {
        self.users.items().unwrap_or_default()
    }

    pub fn roles(&self) -> &[Role] {
        self.roles.items().unwrap_or_default()
    }

    pub fn applications(&self) -> &[Application] {
        self.applications.items().unwrap_or_default()
    }

    pub fn groups(&self) -> &[Group] {
        self.groups.items().unwrap_or_default()
    }

    pub fn resources(&self) -> &[Resource] {
        self.resources.items().unwrap_or_default()
    }
}

fn take_collection<T>(
    doc: &mut serde_json::Map<String, Value>,
    kind: CollectionKind,
) -> Collection<T>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(raw) = doc.remove(kind.key()) else {
        return Collection::Missing;
    };

    match serde_json::from_value::<Vec<T>>(raw) {
        Ok(items) => Collection::Loaded(items),
        Err(e) => {
            tracing::warn!(collection = kind.key(), error = %e, "Malformed snapshot collection");
            Collection::Malformed {
                reason: e.to_string(),
            }
        }
    }
}

/// Scalars become text, `null` stays absent. Nested values keep their JSON text.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested @ (Value::Array(_) | Value::Object(_)) => Some(nested.to_string()),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_text))
}

fn lenient_members<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let members = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
    };
    Ok(members)
}
