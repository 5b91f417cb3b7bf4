use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use guidepost_types::models::{Message, ParticipantId, Role};

use crate::Database;
use crate::models::{AccountRow, MessageRow};

impl Database {
    // -- Accounts --

    pub fn create_student(&self, name: &str) -> Result<AccountRow> {
        self.with_conn_mut(|conn| insert_account(conn, AccountTable::Students, name))
    }

    pub fn create_counselor(&self, name: &str) -> Result<AccountRow> {
        self.with_conn_mut(|conn| insert_account(conn, AccountTable::Counselors, name))
    }

    pub fn student_exists(&self, id: ParticipantId) -> Result<bool> {
        self.with_conn(|conn| account_exists(conn, AccountTable::Students, id))
    }

    pub fn counselor_exists(&self, id: ParticipantId) -> Result<bool> {
        self.with_conn(|conn| account_exists(conn, AccountTable::Counselors, id))
    }

    // -- Messages --

    /// Store a message and hand back the committed record.
    ///
    /// The writer lock is held across the timestamp read and the insert, so
    /// within one conversation ids and `created_at` never disagree on order.
    pub fn append_message(
        &self,
        student_id: ParticipantId,
        counselor_id: ParticipantId,
        sender_role: Role,
        text: &str,
    ) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let latest: Option<String> = conn.query_row(
                "SELECT MAX(created_at) FROM messages WHERE student_id = ?1 AND counselor_id = ?2",
                params![student_id, counselor_id],
                |row| row.get(0),
            )?;

            let mut created_at = Utc::now().trunc_subsecs(6);
            if let Some(latest) = latest {
                let latest = parse_timestamp(&latest)?;
                if latest > created_at {
                    created_at = latest;
                }
            }

            conn.execute(
                "INSERT INTO messages (student_id, counselor_id, sender_role, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    student_id,
                    counselor_id,
                    sender_role.as_str(),
                    text,
                    format_timestamp(&created_at)
                ],
            )?;

            Ok(Message {
                id: conn.last_insert_rowid(),
                student_id,
                counselor_id,
                sender_role,
                text: text.to_string(),
                created_at,
            })
        })
    }

    /// Full history for one student/counselor pair, oldest first.
    pub fn list_messages(
        &self,
        student_id: ParticipantId,
        counselor_id: ParticipantId,
    ) -> Result<Vec<Message>> {
        let rows = self.with_conn(|conn| query_messages(conn, student_id, counselor_id))?;
        rows.into_iter().map(Message::try_from).collect()
    }
}

#[derive(Clone, Copy)]
enum AccountTable {
    Students,
    Counselors,
}

impl AccountTable {
    fn name(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Counselors => "counselors",
        }
    }
}

fn insert_account(conn: &Connection, table: AccountTable, name: &str) -> Result<AccountRow> {
    conn.execute(
        &format!("INSERT INTO {} (name) VALUES (?1)", table.name()),
        [name],
    )?;
    let id = conn.last_insert_rowid();

    let row = conn.query_row(
        &format!("SELECT id, name, created_at FROM {} WHERE id = ?1", table.name()),
        [id],
        |row| {
            Ok(AccountRow {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )?;

    Ok(row)
}

fn account_exists(conn: &Connection, table: AccountTable, id: ParticipantId) -> Result<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", table.name()),
            [id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn query_messages(
    conn: &Connection,
    student_id: ParticipantId,
    counselor_id: ParticipantId,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, counselor_id, sender_role, text, created_at
         FROM messages
         WHERE student_id = ?1 AND counselor_id = ?2
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt
        .query_map(params![student_id, counselor_id], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                student_id: row.get(1)?,
                counselor_id: row.get(2)?,
                sender_role: row.get(3)?,
                text: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let sender_role = row
            .sender_role
            .parse::<Role>()
            .with_context(|| format!("message {}", row.id))?;
        let created_at = parse_timestamp(&row.created_at)
            .with_context(|| format!("message {}", row.id))?;

        Ok(Message {
            id: row.id,
            student_id: row.student_id,
            counselor_id: row.counselor_id,
            sender_role,
            text: row.text,
            created_at,
        })
    }
}

/// Fixed-width RFC 3339 with microseconds, so text order matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?;
    Ok(ts.with_timezone(&Utc))
}
