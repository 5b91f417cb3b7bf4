use anyhow::{Result, bail};
use rusqlite::Connection;
use tracing::info;

/// Highest schema version this build knows how to read and write.
pub const SCHEMA_VERSION: i64 = 1;

const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "
    CREATE TABLE students (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE counselors (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE messages (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id      INTEGER NOT NULL REFERENCES students(id),
        counselor_id    INTEGER NOT NULL REFERENCES counselors(id),
        sender_role     TEXT NOT NULL CHECK (sender_role IN ('student', 'counselor')),
        text            TEXT NOT NULL CHECK (length(text) > 0),
        created_at      TEXT NOT NULL
    );

    CREATE INDEX idx_messages_pair
        ON messages(student_id, counselor_id, created_at, id);
    ",
)];

/// Bring the schema up to `SCHEMA_VERSION`. Each step runs in its own
/// transaction. A database written by a newer build is refused outright.
pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let current = current_version(conn)?;
    if current > SCHEMA_VERSION {
        bail!(
            "database schema version {} is newer than supported version {}",
            current,
            SCHEMA_VERSION
        );
    }

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        info!("Running migration v{}", version);
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
    }

    info!("Database schema at v{}", SCHEMA_VERSION);
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}
