//! SQL dialect strategies
//!
//! Queries are written once in a portable form: `?` placeholders and
//! double-quoted identifiers. Each dialect adapts that text to its engine
//! and supplies the statements that differ between engines (idempotent
//! insert, atomic slot claim).

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Engine-specific SQL shapes
pub trait SqlDialect: Send + Sync {
    /// Dialect name
    fn name(&self) -> &'static str;

    /// Adapt a portable query to this engine
    fn prepare(&self, query: &str) -> String {
        query.to_string()
    }

    /// Insert that silently skips rows violating a unique constraint
    fn insert_ignore(&self, table: &str, columns: &[&str]) -> String;

    /// Claim one unclaimed slot for (guid, type)
    fn claim_slot(&self) -> &'static str;
}

/// PostgreSQL
#[derive(Debug, Default, Clone, Copy)]
pub struct Postgres;

/// MySQL
#[derive(Debug, Default, Clone, Copy)]
pub struct MySql;

/// Embedded SQLite
#[derive(Debug, Default, Clone, Copy)]
pub struct Sqlite;

fn column_list(columns: &[&str]) -> (String, String) {
    let names = columns.join(", ");
    let marks = vec!["?"; columns.len()].join(", ");
    (names, marks)
}

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn prepare(&self, query: &str) -> String {
        let mut out = String::with_capacity(query.len() + 8);
        let mut n = 0;
        for c in query.chars() {
            if c == '?' {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            } else {
                out.push(c);
            }
        }
        out
    }

    fn insert_ignore(&self, table: &str, columns: &[&str]) -> String {
        let (names, marks) = column_list(columns);
        format!("INSERT INTO {table} ({names}) VALUES ({marks}) ON CONFLICT DO NOTHING")
    }

    fn claim_slot(&self) -> &'static str {
        // SKIP LOCKED keeps two claimers from picking the same free row.
        r#"UPDATE "groups" SET guid = ?, type = ?
           WHERE id = (
               SELECT id FROM "groups"
               WHERE guid IS NULL
               ORDER BY id
               LIMIT 1
               FOR UPDATE SKIP LOCKED
           )"#
    }
}

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn prepare(&self, query: &str) -> String {
        query.replace('"', "`")
    }

    fn insert_ignore(&self, table: &str, columns: &[&str]) -> String {
        let (names, marks) = column_list(columns);
        format!("INSERT IGNORE INTO {table} ({names}) VALUES ({marks})")
    }

    fn claim_slot(&self) -> &'static str {
        // MySQL cannot select from the table being updated.
        r#"UPDATE "groups" SET guid = ?, type = ?
           WHERE guid IS NULL
           ORDER BY id
           LIMIT 1"#
    }
}

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn insert_ignore(&self, table: &str, columns: &[&str]) -> String {
        let (names, marks) = column_list(columns);
        format!("INSERT OR IGNORE INTO {table} ({names}) VALUES ({marks})")
    }

    fn claim_slot(&self) -> &'static str {
        r#"UPDATE "groups" SET guid = ?, type = ?
           WHERE id = (
               SELECT id FROM "groups"
               WHERE guid IS NULL
               ORDER BY id
               LIMIT 1
           )"#
    }
}

/// Dialect selector used in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL
    Postgres,
    /// MySQL
    Mysql,
    /// Embedded SQLite (tests, local development)
    Sqlite,
}

impl Dialect {
    /// Strategy implementing this dialect
    pub fn sql(self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::Mysql => &MySql,
            Dialect::Sqlite => &Sqlite,
        }
    }

    /// Dialect name
    pub fn name(self) -> &'static str {
        self.sql().name()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(StoreError::Config(format!("unsupported sql dialect: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_postgres_numbers_placeholders() {
        let sql = Postgres.prepare("SELECT id FROM destinations WHERE group_id = ? AND protocol = ?");
        assert_eq!(
            sql,
            "SELECT id FROM destinations WHERE group_id = $1 AND protocol = $2"
        );
    }

    #[test]
    fn test_mysql_quotes_identifiers() {
        let sql = MySql.prepare(r#"SELECT id FROM "groups" WHERE guid = ?"#);
        assert_eq!(sql, "SELECT id FROM `groups` WHERE guid = ?");
    }

    #[test]
    fn test_insert_ignore_idioms() {
        let cols = ["group_id", "destination_id"];
        assert_eq!(
            Postgres.insert_ignore("policies", &cols),
            "INSERT INTO policies (group_id, destination_id) VALUES (?, ?) ON CONFLICT DO NOTHING"
        );
        assert_eq!(
            MySql.insert_ignore("policies", &cols),
            "INSERT IGNORE INTO policies (group_id, destination_id) VALUES (?, ?)"
        );
        assert_eq!(
            Sqlite.insert_ignore("policies", &cols),
            "INSERT OR IGNORE INTO policies (group_id, destination_id) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_parse_dialect() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::Mysql);
        assert!("oracle".parse::<Dialect>().is_err());
        assert_eq!(Dialect::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn test_serde_names() {
        let d: Dialect = serde_json::from_str("\"mysql\"").unwrap();
        assert_eq!(d, Dialect::Mysql);
    }

    proptest! {
        #[test]
        fn postgres_placeholder_count_preserved(n in 0usize..40) {
            let query = vec!["?"; n].join(", ");
            let prepared = Postgres.prepare(&query);
            prop_assert!(!prepared.contains('?'));
            prop_assert_eq!(prepared.matches('$').count(), n);
            if n > 0 {
                let last = format!("${}", n);
                prop_assert!(prepared.ends_with(&last));
            }
        }
    }
}
