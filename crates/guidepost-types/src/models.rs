use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Numeric account id. Only unique within a role.
pub type ParticipantId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Counselor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Counselor => "counselor",
        }
    }

    /// The other side of a conversation.
    pub fn opposite(self) -> Self {
        match self {
            Self::Student => Self::Counselor,
            Self::Counselor => Self::Student,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "counselor" => Ok(Self::Counselor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A student or counselor. Identity is the (id, role) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: Role,
}

impl Participant {
    pub fn student(id: ParticipantId) -> Self {
        Self { id, role: Role::Student }
    }

    pub fn counselor(id: ParticipantId) -> Self {
        Self { id, role: Role::Counselor }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

/// A stored message. Immutable once the store hands it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub student_id: ParticipantId,
    pub counselor_id: ParticipantId,
    pub sender_role: Role,
    pub text: String,
    #[serde(serialize_with = "serialize_micros")]
    pub created_at: DateTime<Utc>,
}

/// RFC 3339 in UTC with exactly six fractional digits, e.g.
/// `2026-10-18T12:00:00.000000Z`.
fn serialize_micros<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

impl Message {
    pub fn sender(&self) -> Participant {
        self.party(self.sender_role)
    }

    /// The participant on the opposite side of the pair from the sender.
    pub fn recipient(&self) -> Participant {
        self.party(self.sender_role.opposite())
    }

    fn party(&self, role: Role) -> Participant {
        match role {
            Role::Student => Participant::student(self.student_id),
            Role::Counselor => Participant::counselor(self.counselor_id),
        }
    }
}

/// Point-in-time view of who is connected, split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub counselors: Vec<ParticipantId>,
    pub students: Vec<ParticipantId>,
    pub all: Vec<ParticipantId>,
}

impl PresenceSnapshot {
    pub fn from_participants<'a, I>(participants: I) -> Self
    where
        I: IntoIterator<Item = &'a Participant>,
    {
        let mut counselors = BTreeSet::new();
        let mut students = BTreeSet::new();
        for p in participants {
            match p.role {
                Role::Counselor => counselors.insert(p.id),
                Role::Student => students.insert(p.id),
            };
        }

        let all: BTreeSet<ParticipantId> = counselors.union(&students).copied().collect();

        Self {
            counselors: counselors.into_iter().collect(),
            students: students.into_iter().collect(),
            all: all.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
