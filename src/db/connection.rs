use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Open the writer connection. WAL so that change-detection readers can run
/// concurrently with the writer thread; NORMAL durability is the default
/// trade-off for a rebuildable catalog.
pub fn open_connection(path: &Path, busy_timeout_ms: u64) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    configure(&conn, busy_timeout_ms)?;
    Ok(conn)
}

/// Open a read-only connection for worker-thread lookups.
pub fn open_read_connection(path: &Path, busy_timeout_ms: u64) -> anyhow::Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.execute_batch(&format!("PRAGMA busy_timeout={busy_timeout_ms};"))?;
    Ok(conn)
}

fn configure(conn: &Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout={busy_timeout_ms};"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("catalog.sqlite3");
        let conn = open_connection(&path, 5000).unwrap();
        drop(conn);
        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.sqlite3");
        let conn = open_connection(&path, 5000).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_read_connection_rejects_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.sqlite3");
        let conn = open_connection(&path, 5000).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        drop(conn);

        let ro = open_read_connection(&path, 5000).unwrap();
        assert!(ro.execute("INSERT INTO t (x) VALUES (1)", []).is_err());
    }
}
