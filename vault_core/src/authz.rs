use std::collections::{BTreeMap, HashSet};
use std::fmt;

use async_trait::async_trait;

use crate::meta::Asset;

/// Operation checked at an authorization checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    /// Verb understood by policy engines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "GET",
            Operation::Write => "POST",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record handed to the permission oracle, tagged with its object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub object_type: String,
    pub fields: BTreeMap<String, String>,
}

impl Subject {
    pub fn asset(asset: &Asset) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("databaseId".to_string(), asset.database_id.clone());
        fields.insert("assetId".to_string(), asset.asset_id.clone());
        for (name, value) in &asset.extra {
            if let Some(value) = value.as_str() {
                fields.insert(name.clone(), value.to_string());
            }
        }
        Self {
            object_type: "asset".to_string(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Policy engine consulted once per authorization checkpoint.
///
/// An oracle instance is bound to one caller (its claims and roles), so
/// only the subject and the operation are passed per call.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    async fn enforce(&self, subject: &Subject, operation: Operation) -> anyhow::Result<bool>;
}

/// Grants everything. Used for trusted, local tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionOracle for AllowAll {
    async fn enforce(&self, _subject: &Subject, _operation: Operation) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Explicit allow-list of `(databaseId, assetId, operation)` rules.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    rules: HashSet<(String, String, Operation)>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, database_id: &str, asset_id: &str, operation: Operation) -> Self {
        self.rules
            .insert((database_id.to_string(), asset_id.to_string(), operation));
        self
    }

    /// Grants both read and write on an asset.
    pub fn allow_all_on(self, database_id: &str, asset_id: &str) -> Self {
        self.allow(database_id, asset_id, Operation::Read)
            .allow(database_id, asset_id, Operation::Write)
    }
}

#[async_trait]
impl PermissionOracle for StaticPermissions {
    async fn enforce(&self, subject: &Subject, operation: Operation) -> anyhow::Result<bool> {
        if subject.object_type != "asset" {
            return Ok(false);
        }
        let (Some(database_id), Some(asset_id)) =
            (subject.field("databaseId"), subject.field("assetId"))
        else {
            return Ok(false);
        };
        Ok(self
            .rules
            .contains(&(database_id.to_string(), asset_id.to_string(), operation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_permissions_match_exact_rules() -> anyhow::Result<()> {
        let asset = Asset::new("db", "a1", "bucket", "a1/");
        let subject = Subject::asset(&asset);
        assert_eq!(subject.object_type, "asset");

        let perms = StaticPermissions::new().allow("db", "a1", Operation::Read);
        assert!(perms.enforce(&subject, Operation::Read).await?);
        assert!(!perms.enforce(&subject, Operation::Write).await?);

        let other = Subject::asset(&Asset::new("db", "a2", "bucket", "a2/"));
        assert!(!perms.enforce(&other, Operation::Read).await?);
        Ok(())
    }
}
