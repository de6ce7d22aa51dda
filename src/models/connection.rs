//! Connection-related data models.

use serde::{Deserialize, Deserializer, Serialize};

/// Supported SQL dialects.
///
/// Deserialization goes through [`Dialect::from_name`], so configuration may
/// spell a dialect in any case (`"PostgreSQL"`, `"MySQL"`, `"mariadb"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Includes MariaDB
    MySql,
    #[serde(rename = "postgresql")]
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Parse a dialect name as it appears in configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgresql" | "postgres" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Parse the dialect from a connection string scheme.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySql)
        } else if lower.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }

    /// URL scheme used when building a connection string.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySql => Some(3306),
            Self::Postgres => Some(5432),
            Self::Sqlite => None,
        }
    }

    /// Quote an identifier that has already been checked against the catalog.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Bind placeholder for the `position`-th parameter (1-based).
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Self::Postgres => format!("${}", position),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for Dialect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unknown dialect `{name}`, expected one of mysql, mariadb, postgresql, postgres, sqlite"
            ))
        })
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Summary of a registered logical database (no secrets).
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub name: String,
    pub dialect: Dialect,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_name() {
        assert_eq!(Dialect::from_name("MySQL"), Some(Dialect::MySql));
        assert_eq!(Dialect::from_name("postgresql"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_name("postgres"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_name("sqlite"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_name("oracle"), None);
    }

    #[test]
    fn test_dialect_from_connection_string() {
        assert_eq!(
            Dialect::from_connection_string("postgres://u:p@h/db"),
            Some(Dialect::Postgres)
        );
        assert_eq!(
            Dialect::from_connection_string("mariadb://u:p@h/db"),
            Some(Dialect::MySql)
        );
        assert_eq!(
            Dialect::from_connection_string("sqlite:data.db"),
            Some(Dialect::Sqlite)
        );
        assert_eq!(Dialect::from_connection_string("mssql://h/db"), None);
    }

    #[test]
    fn test_dialect_serde_names() {
        let d: Dialect = serde_json::from_str("\"postgresql\"").unwrap();
        assert_eq!(d, Dialect::Postgres);
        let d: Dialect = serde_json::from_str("\"mysql\"").unwrap();
        assert_eq!(d, Dialect::MySql);
        assert_eq!(serde_json::to_string(&Dialect::Postgres).unwrap(), "\"postgresql\"");

        let d: Dialect = serde_json::from_str("\"PostgreSQL\"").unwrap();
        assert_eq!(d, Dialect::Postgres);
        let d: Dialect = serde_json::from_str("\"MariaDB\"").unwrap();
        assert_eq!(d, Dialect::MySql);
        let err = serde_json::from_str::<Dialect>("\"Oracle\"").unwrap_err();
        assert!(err.to_string().contains("unknown dialect `Oracle`"));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(Dialect::MySql.quote_ident("na`me"), "`na``me`");
        assert_eq!(Dialect::Postgres.quote_ident("na\"me"), "\"na\"\"me\"");
        assert_eq!(Dialect::Sqlite.quote_ident("users"), "\"users\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::MySql.placeholder(3), "?");
        assert_eq!(Dialect::Sqlite.placeholder(1), "?");
    }
}
