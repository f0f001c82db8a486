//! Data-source kinds and their resolution at render time
//!
//! A data source is stored as a `type` plus a JSON `configuration` blob:
//! inline records for `json`/`array`, connection parameters
//! (`driver, host, port, database, username, password`) for database kinds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ValidationError;

/// Kind of data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    Json,
    Array,
    Mysql,
    Pgsql,
    Sqlite,
    Sqlsrv,
    Oracle,
}

impl DataSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Array => "array",
            Self::Mysql => "mysql",
            Self::Pgsql => "pgsql",
            Self::Sqlite => "sqlite",
            Self::Sqlsrv => "sqlsrv",
            Self::Oracle => "oracle",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "array" => Ok(Self::Array),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "pgsql" | "postgres" | "postgresql" => Ok(Self::Pgsql),
            "sqlite" => Ok(Self::Sqlite),
            "sqlsrv" | "mssql" => Ok(Self::Sqlsrv),
            "oracle" => Ok(Self::Oracle),
            _ => Err(ValidationError::InvalidVariant {
                field: "type",
                value: s.to_owned(),
            }),
        }
    }

    /// Inline kinds carry their records in the configuration blob.
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Json | Self::Array)
    }
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters of a database data source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConnection {
    pub driver: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DbConnection {
    /// Read connection parameters from a configuration object.
    ///
    /// Every field is optional; `port` may be a number or a numeric string
    /// and `driver` defaults to the kind's name.
    pub fn from_configuration(kind: DataSourceKind, configuration: &Value) -> Self {
        let empty = Map::new();
        let obj = configuration.as_object().unwrap_or(&empty);

        let text = |key: &str| -> Option<String> {
            match obj.get(key)? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        let port = match obj.get("port") {
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        Self {
            driver: text("driver").unwrap_or_else(|| kind.as_str().to_owned()),
            host: text("host"),
            port,
            database: text("database"),
            username: text("username"),
            password: text("password"),
        }
    }
}

/// Data handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedData {
    /// Records supplied inline (JSON array or object)
    Inline(Value),
    /// Connection to a database; the query lives in the template
    Database(DbConnection),
}

impl ResolvedData {
    pub fn empty() -> Self {
        Self::Inline(Value::Array(Vec::new()))
    }
}

/// Check a configuration blob against its kind.
///
/// Inline kinds accept any array or object; database kinds need an object.
pub fn validate_configuration(kind: DataSourceKind, value: &Value) -> Result<(), ValidationError> {
    let ok = if kind.is_inline() {
        value.is_array() || value.is_object()
    } else {
        value.is_object()
    };

    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "configuration",
            reason: if kind.is_inline() {
                "must be a JSON array or object"
            } else {
                "must be an object with connection parameters"
            },
        })
    }
}

/// Check that request-supplied `json_data` is an array or object.
pub fn validate_json_data(value: &Value) -> Result<(), ValidationError> {
    if value.is_array() || value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "json_data",
            reason: "must be a JSON array or object",
        })
    }
}

/// Decide what data a render uses.
///
/// - stored inline source: request `json_data` overrides its configuration
/// - stored database source: connection parameters; `json_data` is ignored
/// - no stored source: `json_data` if given, otherwise an empty record set
pub fn resolve(stored: Option<(DataSourceKind, &Value)>, json_data: Option<Value>) -> ResolvedData {
    match stored {
        Some((kind, configuration)) if kind.is_inline() => {
            ResolvedData::Inline(json_data.unwrap_or_else(|| configuration.clone()))
        }
        Some((kind, configuration)) => {
            ResolvedData::Database(DbConnection::from_configuration(kind, configuration))
        }
        None => json_data.map(ResolvedData::Inline).unwrap_or_else(ResolvedData::empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_kinds_and_aliases() {
        assert_eq!(DataSourceKind::parse("json").unwrap(), DataSourceKind::Json);
        assert_eq!(DataSourceKind::parse("MariaDB").unwrap(), DataSourceKind::Mysql);
        assert_eq!(DataSourceKind::parse("postgres").unwrap(), DataSourceKind::Pgsql);
        assert!(DataSourceKind::parse("csv").is_err());
    }

    #[test]
    fn connection_from_configuration() {
        let config = json!({
            "driver": "mysql",
            "host": "db.internal",
            "port": "3306",
            "database": "sales",
            "username": "report",
            "password": "secret"
        });
        let conn = DbConnection::from_configuration(DataSourceKind::Mysql, &config);
        assert_eq!(conn.host.as_deref(), Some("db.internal"));
        assert_eq!(conn.port, Some(3306));
        assert_eq!(conn.password.as_deref(), Some("secret"));
    }

    #[test]
    fn driver_defaults_to_kind() {
        let conn = DbConnection::from_configuration(DataSourceKind::Pgsql, &json!({"port": 5432}));
        assert_eq!(conn.driver, "pgsql");
        assert_eq!(conn.port, Some(5432));
        assert!(conn.host.is_none());
    }

    #[test]
    fn configuration_shape_is_checked() {
        assert!(validate_configuration(DataSourceKind::Json, &json!([{"a": 1}])).is_ok());
        assert!(validate_configuration(DataSourceKind::Array, &json!({"rows": []})).is_ok());
        assert!(validate_configuration(DataSourceKind::Json, &json!("rows")).is_err());
        assert!(validate_configuration(DataSourceKind::Mysql, &json!([])).is_err());
        assert!(validate_configuration(DataSourceKind::Mysql, &json!({})).is_ok());
    }

    #[test]
    fn request_data_overrides_inline_source() {
        let stored = json!([{"n": 1}]);
        let request = json!([{"n": 2}]);
        let resolved = resolve(Some((DataSourceKind::Json, &stored)), Some(request.clone()));
        assert_eq!(resolved, ResolvedData::Inline(request));

        let resolved = resolve(Some((DataSourceKind::Array, &stored)), None);
        assert_eq!(resolved, ResolvedData::Inline(stored));
    }

    #[test]
    fn database_source_ignores_request_data() {
        let stored = json!({"host": "localhost", "database": "erp"});
        let resolved = resolve(Some((DataSourceKind::Sqlsrv, &stored)), Some(json!([1])));
        match resolved {
            ResolvedData::Database(conn) => {
                assert_eq!(conn.driver, "sqlsrv");
                assert_eq!(conn.database.as_deref(), Some("erp"));
            }
            other => panic!("expected database source, got {other:?}"),
        }
    }

    #[test]
    fn no_source_uses_request_data_or_empty() {
        assert_eq!(
            resolve(None, Some(json!({"k": "v"}))),
            ResolvedData::Inline(json!({"k": "v"}))
        );
        assert_eq!(resolve(None, None), ResolvedData::empty());
    }
}
