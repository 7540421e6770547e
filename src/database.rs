//! Database handles.
//!
//! A [`Database`] is a thin handle over a shared [`Connection`] that scopes
//! requests under `/_db/{name}`. Handles are cheap to clone and share the
//! connection's pool.

use std::sync::Arc;

use http::Method;
use serde::Deserialize;

use crate::connection::{Connection, VersionInfo};
use crate::error::{codes, Result};
use crate::request::ArangoRequest;

/// Description of a database, from `GET /_api/database/current`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub name: String,
    pub id: String,
    pub is_system: bool,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultEnvelope<T> {
    result: T,
}

#[derive(Clone)]
pub struct Database {
    name: Arc<str>,
    connection: Connection,
}

impl Database {
    pub(crate) fn new(connection: Connection, name: Arc<str>) -> Self {
        Self { name, connection }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn base_path(&self) -> String {
        format!("/_db/{}", self.name)
    }

    /// Fetches this database's description.
    pub async fn info(&self) -> Result<DatabaseInfo> {
        let request =
            ArangoRequest::new(Method::GET, "/_api/database/current").with_base_path(self.base_path());
        let response = self.connection.request(request).await?;
        let envelope: ResultEnvelope<DatabaseInfo> = response.deserialize()?;
        Ok(envelope.result)
    }

    /// Whether this database exists on the server.
    pub async fn exists(&self) -> Result<bool> {
        match self.info().await {
            Ok(_) => Ok(true),
            Err(err) if err.is_arango_error(codes::ERROR_ARANGO_DATABASE_NOT_FOUND) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Server version, requested through this database's scope.
    pub async fn version(&self) -> Result<VersionInfo> {
        let request = ArangoRequest::new(Method::GET, "/_api/version").with_base_path(self.base_path());
        self.connection.request_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;

    fn connection() -> Connection {
        Connection::new(ConnectionConfig::new("http://127.0.0.1:1")).unwrap()
    }

    #[test]
    fn test_base_path_composition() {
        let db = connection().database("mydb");
        assert_eq!(db.name(), "mydb");
        assert_eq!(db.base_path(), "/_db/mydb");
    }

    #[test]
    fn test_handles_share_interned_name() {
        let conn = connection();
        let first = conn.database("products");
        let second = conn.database("products");
        assert!(Arc::ptr_eq(&first.name, &second.name));

        let other = conn.database("orders");
        assert!(!Arc::ptr_eq(&first.name, &other.name));
        assert_eq!(other.name(), "orders");
    }

    #[test]
    fn test_clone_shares_connection_and_name() {
        let db = connection().database("products");
        let cloned = db.clone();
        assert!(Arc::ptr_eq(&db.name, &cloned.name));
        assert_eq!(cloned.name(), "products");
    }

    #[test]
    fn test_database_info_deserializes_server_shape() {
        let info: DatabaseInfo = serde_json::from_str(
            r#"{"name":"mydb","id":"42","isSystem":false,"path":"/var/lib/databases/database-42"}"#,
        )
        .unwrap();
        assert_eq!(info.name, "mydb");
        assert_eq!(info.id, "42");
        assert!(!info.is_system);
        assert_eq!(info.path.as_deref(), Some("/var/lib/databases/database-42"));
    }

    #[test]
    fn test_database_info_path_is_optional() {
        let info: DatabaseInfo =
            serde_json::from_str(r#"{"name":"_system","id":"1","isSystem":true}"#).unwrap();
        assert!(info.is_system);
        assert!(info.path.is_none());
    }
}
