// 🔐 Permission checks
// Tri-state answers per (actor, action, resource); the most specific
// resource that has an opinion decides.

use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource<'a> {
    Instance,
    Database(&'a str),
    Table { database: &'a str, table: &'a str },
}

pub const VIEW_TABLE: &str = "view-table";
pub const VIEW_DATABASE: &str = "view-database";
pub const VIEW_INSTANCE: &str = "view-instance";

pub trait PermissionPolicy {
    /// `Some(true)` allow, `Some(false)` deny, `None` no opinion
    fn permission_allowed(&self, actor: Option<&str>, action: &str, resource: Resource<'_>) -> Option<bool>;
}

/// Allows everything. Used when no settings file restricts access.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionPolicy for AllowAll {
    fn permission_allowed(&self, _actor: Option<&str>, _action: &str, _resource: Resource<'_>) -> Option<bool> {
        Some(true)
    }
}

/// Check table, then database, then instance visibility
pub fn check_view_permissions<P: PermissionPolicy + ?Sized>(
    policy: &P,
    actor: Option<&str>,
    database: &str,
    table: &str,
) -> Result<()> {
    let checks = [
        (VIEW_TABLE, Resource::Table { database, table }),
        (VIEW_DATABASE, Resource::Database(database)),
        (VIEW_INSTANCE, Resource::Instance),
    ];

    for (action, resource) in checks {
        match policy.permission_allowed(actor, action, resource) {
            Some(true) => return Ok(()),
            Some(false) => {
                tracing::debug!(actor = ?actor, action, database, table, "permission denied");
                return Err(ReconcileError::Forbidden(action.to_string()));
            }
            None => continue,
        }
    }

    Ok(())
}

// ============================================================================
// ALLOW LISTS
// ============================================================================

/// Actor ids allowed at one level; `"*"` admits anyone, even anonymous
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList(pub Vec<String>);

impl AllowList {
    pub fn admits(&self, actor: Option<&str>) -> bool {
        self.0
            .iter()
            .any(|allowed| allowed == "*" || Some(allowed.as_str()) == actor)
    }
}

/// Answer for a level that may or may not carry an allow list
pub fn allow_list_answer(list: Option<&AllowList>, actor: Option<&str>) -> Option<bool> {
    list.map(|l| l.admits(actor))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed answers per action
    struct Fixed {
        table: Option<bool>,
        database: Option<bool>,
        instance: Option<bool>,
    }

    impl PermissionPolicy for Fixed {
        fn permission_allowed(&self, _actor: Option<&str>, action: &str, _resource: Resource<'_>) -> Option<bool> {
            match action {
                VIEW_TABLE => self.table,
                VIEW_DATABASE => self.database,
                _ => self.instance,
            }
        }
    }

    #[test]
    fn test_most_specific_answer_wins() {
        let table_allows = Fixed { table: Some(true), database: Some(false), instance: Some(false) };
        assert!(check_view_permissions(&table_allows, None, "db", "dogs").is_ok());

        let database_denies = Fixed { table: None, database: Some(false), instance: Some(true) };
        let err = check_view_permissions(&database_denies, None, "db", "dogs").unwrap_err();
        assert!(matches!(err, ReconcileError::Forbidden(ref a) if a == "view-database"));

        let instance_denies = Fixed { table: None, database: None, instance: Some(false) };
        let err = check_view_permissions(&instance_denies, None, "db", "dogs").unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_no_opinion_allows() {
        let silent = Fixed { table: None, database: None, instance: None };
        assert!(check_view_permissions(&silent, None, "db", "dogs").is_ok());
        assert!(check_view_permissions(&AllowAll, Some("root"), "db", "dogs").is_ok());
    }

    #[test]
    fn test_allow_list() {
        let list = AllowList(vec!["alice".into()]);
        assert!(list.admits(Some("alice")));
        assert!(!list.admits(Some("bob")));
        assert!(!list.admits(None));

        let anyone = AllowList(vec!["*".into()]);
        assert!(anyone.admits(None));

        assert_eq!(allow_list_answer(None, Some("alice")), None);
        assert_eq!(allow_list_answer(Some(&list), Some("bob")), Some(false));
    }
}
