//! Settings query functions.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Get a setting value by key.
pub fn get(conn: &Connection, key: &str) -> Result<String> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            DbError::NotFound(format!("setting '{key}'"))
        }
        other => DbError::Sqlite(other),
    })
}

/// Set a setting value.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Get a setting as u64, or `None` if it was never set.
pub fn get_u64_opt(conn: &Connection, key: &str) -> Result<Option<u64>> {
    match get(conn, key) {
        Ok(v) => v
            .parse()
            .map(Some)
            .map_err(|e: std::num::ParseIntError| DbError::Serialization(e.to_string())),
        Err(DbError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_default_intervention_state() {
        let conn = test_db();
        assert_eq!(get(&conn, "intervention_state").expect("get"), "active");
    }

    #[test]
    fn test_set_and_get() {
        let conn = test_db();
        set(&conn, "intervention_state", "halted").expect("set");
        assert_eq!(get(&conn, "intervention_state").expect("get"), "halted");
    }

    #[test]
    fn test_get_nonexistent() {
        let conn = test_db();
        let result = get(&conn, "nonexistent");
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_get_u64_opt() {
        let conn = test_db();
        assert_eq!(get_u64_opt(&conn, "last_epoch_time").expect("get"), None);

        set(&conn, "last_epoch_time", "1015").expect("set");
        assert_eq!(get_u64_opt(&conn, "last_epoch_time").expect("get"), Some(1015));

        set(&conn, "last_epoch_time", "soon").expect("set");
        assert!(matches!(
            get_u64_opt(&conn, "last_epoch_time"),
            Err(DbError::Serialization(_))
        ));
    }
}
