/// Database row types. These map directly to SQLite rows; timestamps stay
/// as the stored RFC 3339 text until converted.

pub struct AccountRow {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub student_id: i64,
    pub counselor_id: i64,
    pub sender_role: String,
    pub text: String,
    pub created_at: String,
}
