//! SQLite connection utilities

use rusqlite::Connection;
use std::path::Path;

/// Create a new SQLite connection with the pragmas the job registry expects
pub fn create_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Enable WAL so a status poller and a job writer do not block each other
pub fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
}
