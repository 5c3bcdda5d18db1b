// 🗂️ Host settings
// Loaded from a TOML file (or JSON when the name ends in .json): which
// databases are served, who may see them, and the reconciliation settings
// for each table.

use crate::error::{ReconcileError, Result};
use crate::permissions::{allow_list_answer, AllowList, PermissionPolicy, Resource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Mount point used when building absolute URLs
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token -> actor id
    #[serde(default)]
    pub actors: HashMap<String, String>,

    #[serde(default)]
    pub permissions: InstancePermissions,

    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstancePermissions {
    pub allow: Option<AllowList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub allow: Option<AllowList>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSettings {
    pub allow: Option<AllowList>,

    /// Everything else is handed to the configuration resolver untouched
    #[serde(flatten)]
    pub reconcile: Map<String, Value>,
}

fn default_base_url() -> String {
    "/".to_string()
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            base_url: default_base_url(),
            actors: HashMap::new(),
            permissions: InstancePermissions::default(),
            databases: BTreeMap::new(),
        }
    }
}

impl ServiceSettings {
    /// Load from disk. Relative database paths resolve against the
    /// settings file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ReconcileError::Settings(format!("cannot read {}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let mut settings = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_toml_str(&contents)?
        };

        if let Some(dir) = path.parent() {
            settings.resolve_paths(dir);
        }

        tracing::debug!(
            path = %path.display(),
            databases = settings.databases.len(),
            "loaded settings"
        );

        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ReconcileError::Settings(e.to_string()))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| ReconcileError::Settings(e.to_string()))
    }

    fn resolve_paths(&mut self, base: &Path) {
        for db in self.databases.values_mut() {
            if db.path.is_relative() {
                db.path = base.join(&db.path);
            }
        }
    }

    pub fn database(&self, name: &str) -> Result<&DatabaseSettings> {
        self.databases
            .get(name)
            .ok_or_else(|| ReconcileError::NotFound(format!("Database not found: {}", name)))
    }

    /// Raw reconciliation settings for a table; `None` when the table has
    /// no entry at all
    pub fn table_settings(&self, database: &str, table: &str) -> Result<Option<&Map<String, Value>>> {
        Ok(self
            .database(database)?
            .tables
            .get(table)
            .map(|t| &t.reconcile))
    }

    pub fn actor_for_token(&self, token: &str) -> Option<&str> {
        self.actors.get(token).map(String::as_str)
    }
}

impl PermissionPolicy for ServiceSettings {
    fn permission_allowed(&self, actor: Option<&str>, _action: &str, resource: Resource<'_>) -> Option<bool> {
        let list = match resource {
            Resource::Instance => self.permissions.allow.as_ref(),
            Resource::Database(database) => self
                .databases
                .get(database)
                .and_then(|db| db.allow.as_ref()),
            Resource::Table { database, table } => self
                .databases
                .get(database)
                .and_then(|db| db.tables.get(table))
                .and_then(|t| t.allow.as_ref()),
        };

        allow_list_answer(list, actor)
    }
}
