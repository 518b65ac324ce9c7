//! Seeder registry queries.

use rusqlite::Connection;
use wot_types::{Pubkey, Seeder};

use super::pubkey_at;
use crate::{is_constraint_violation, DbError, Result};

const SEEDER_COLUMNS: &str = "pubkey, region, label, added_by, created_at, updated_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Seeder> {
    Ok(Seeder {
        pubkey: pubkey_at(row, 0)?,
        region: row.get(1)?,
        label: row.get(2)?,
        added_by: pubkey_at(row, 3)?,
        created_at: row.get::<_, i64>(4)? as u64,
        updated_at: row.get::<_, i64>(5)? as u64,
    })
}

/// Insert a new seeder. Fails with `Constraint` if the pubkey is taken.
pub fn insert(conn: &Connection, seeder: &Seeder) -> Result<()> {
    conn.execute(
        "INSERT INTO seeders (pubkey, region, label, added_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            seeder.pubkey.as_str(),
            seeder.region,
            seeder.label,
            seeder.added_by.as_str(),
            seeder.created_at as i64,
            seeder.updated_at as i64,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            DbError::Constraint(format!("seeder {} already exists", seeder.pubkey))
        } else {
            DbError::Sqlite(e)
        }
    })?;
    Ok(())
}

/// Get a seeder by pubkey.
pub fn get(conn: &Connection, pubkey: &Pubkey) -> Result<Seeder> {
    conn.query_row(
        &format!("SELECT {SEEDER_COLUMNS} FROM seeders WHERE pubkey = ?1"),
        [pubkey.as_str()],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("seeder {pubkey}")),
        other => DbError::Sqlite(other),
    })
}

/// List seeders, optionally restricted to one region.
pub fn list(conn: &Connection, region: Option<&str>) -> Result<Vec<Seeder>> {
    let rows = match region {
        Some(region) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SEEDER_COLUMNS} FROM seeders WHERE region = ?1
                 ORDER BY pubkey"
            ))?;
            let rows = stmt
                .query_map([region], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SEEDER_COLUMNS} FROM seeders ORDER BY region, pubkey"
            ))?;
            let rows = stmt
                .query_map([], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

/// Overwrite region and label. Returns `NotFound` for unknown keys.
pub fn update(
    conn: &Connection,
    pubkey: &Pubkey,
    region: &str,
    label: Option<&str>,
    updated_at: u64,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE seeders SET region = ?2, label = ?3, updated_at = ?4 WHERE pubkey = ?1",
        rusqlite::params![pubkey.as_str(), region, label, updated_at as i64],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("seeder {pubkey}")));
    }
    Ok(())
}

/// Remove a seeder. Returns `NotFound` for unknown keys.
pub fn delete(conn: &Connection, pubkey: &Pubkey) -> Result<()> {
    let changed = conn.execute("DELETE FROM seeders WHERE pubkey = ?1", [pubkey.as_str()])?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("seeder {pubkey}")));
    }
    Ok(())
}

/// Number of registered seeders.
pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM seeders", [], |row| row.get(0))?;
    Ok(n as u64)
}

/// Seeder counts per region, ordered by region.
pub fn regions(conn: &Connection) -> Result<Vec<(String, u64)>> {
    let mut stmt =
        conn.prepare("SELECT region, COUNT(*) FROM seeders GROUP BY region ORDER BY region")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn seeder(byte: u8, region: &str) -> Seeder {
        Seeder {
            pubkey: Pubkey::from_bytes(&[byte; 32]),
            region: region.to_string(),
            label: None,
            added_by: Pubkey::from_bytes(&[0xAA; 32]),
            created_at: 100,
            updated_at: 100,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_db();
        let s = seeder(1, "europe");
        insert(&conn, &s).expect("insert");

        let got = get(&conn, &s.pubkey).expect("get");
        assert_eq!(got, s);
    }

    #[test]
    fn test_duplicate_insert() {
        let conn = test_db();
        let s = seeder(1, "europe");
        insert(&conn, &s).expect("insert");

        let result = insert(&conn, &s);
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_list_by_region() {
        let conn = test_db();
        insert(&conn, &seeder(3, "latam")).expect("insert");
        insert(&conn, &seeder(1, "europe")).expect("insert");
        insert(&conn, &seeder(2, "europe")).expect("insert");

        let all = list(&conn, None).expect("list");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].region, "europe");
        assert_eq!(all[2].region, "latam");

        let europe = list(&conn, Some("europe")).expect("list");
        assert_eq!(europe.len(), 2);
        assert!(europe.iter().all(|s| s.region == "europe"));

        assert!(list(&conn, Some("africa")).expect("list").is_empty());
    }

    #[test]
    fn test_update() {
        let conn = test_db();
        let s = seeder(1, "europe");
        insert(&conn, &s).expect("insert");

        update(&conn, &s.pubkey, "latam", Some("Bob"), 200).expect("update");
        let got = get(&conn, &s.pubkey).expect("get");
        assert_eq!(got.region, "latam");
        assert_eq!(got.label.as_deref(), Some("Bob"));
        assert_eq!(got.updated_at, 200);
        assert_eq!(got.created_at, 100);
    }

    #[test]
    fn test_update_missing() {
        let conn = test_db();
        let missing = Pubkey::from_bytes(&[9; 32]);
        let result = update(&conn, &missing, "europe", None, 1);
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_delete() {
        let conn = test_db();
        let s = seeder(1, "europe");
        insert(&conn, &s).expect("insert");
        delete(&conn, &s.pubkey).expect("delete");

        assert!(matches!(get(&conn, &s.pubkey), Err(DbError::NotFound(_))));
        assert!(matches!(delete(&conn, &s.pubkey), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_count_and_regions() {
        let conn = test_db();
        insert(&conn, &seeder(1, "europe")).expect("insert");
        insert(&conn, &seeder(2, "europe")).expect("insert");
        insert(&conn, &seeder(3, "asia")).expect("insert");

        assert_eq!(count(&conn).expect("count"), 3);
        assert_eq!(
            regions(&conn).expect("regions"),
            vec![("asia".to_string(), 1), ("europe".to_string(), 2)]
        );
    }
}
