// 📌 Service-wide defaults

use crate::config::EntityType;

/// Default `max_limit`, and page size for suggest and property proposals
pub const DEFAULT_LIMIT: usize = 5;

pub const DEFAULT_TYPE_ID: &str = "object";
pub const DEFAULT_TYPE_NAME: &str = "Object";

pub const DEFAULT_IDENTIFIER_SPACE: &str = "http://rdf.freebase.com/ns/type.object.id";
pub const DEFAULT_SCHEMA_SPACE: &str = "http://rdf.freebase.com/ns/type.object.id";

pub const SUPPORTED_API_VERSIONS: [&str; 2] = ["0.1", "0.2"];

/// Type label given to properties derived from table columns
pub const DEFAULT_PROPERTY_TYPE: &str = "text";

/// SQLite releases before 3.30.0 break FTS queries when the table name
/// contains special characters
pub const FTS_VERSION_WARNING: i32 = 3_030_000;

pub fn default_type() -> EntityType {
    EntityType {
        id: DEFAULT_TYPE_ID.to_string(),
        name: DEFAULT_TYPE_NAME.to_string(),
    }
}
