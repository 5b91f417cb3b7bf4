use std::sync::Arc;

use tracing::{debug, warn};

use guidepost_db::Database;
use guidepost_gateway::router::DeliveryRouter;
use guidepost_types::models::{Message, ParticipantId, Role};

use crate::error::{ServiceError, ServiceResult};

/// Longest message body accepted, in characters.
pub const MAX_TEXT_CHARS: usize = 4000;

/// Durable, ordered log of messages per student/counselor pair.
pub trait MessageStore: Send + Sync {
    /// Atomic per call: either the whole message is committed or nothing is.
    fn append(
        &self,
        student_id: ParticipantId,
        counselor_id: ParticipantId,
        sender_role: Role,
        text: &str,
    ) -> anyhow::Result<Message>;

    fn list(&self, student_id: ParticipantId, counselor_id: ParticipantId) -> anyhow::Result<Vec<Message>>;
}

/// Who exists. Answered by the account side of the system.
pub trait AccountDirectory: Send + Sync {
    fn student_exists(&self, id: ParticipantId) -> anyhow::Result<bool>;
    fn counselor_exists(&self, id: ParticipantId) -> anyhow::Result<bool>;
}

impl MessageStore for Database {
    fn append(
        &self,
        student_id: ParticipantId,
        counselor_id: ParticipantId,
        sender_role: Role,
        text: &str,
    ) -> anyhow::Result<Message> {
        self.append_message(student_id, counselor_id, sender_role, text)
    }

    fn list(&self, student_id: ParticipantId, counselor_id: ParticipantId) -> anyhow::Result<Vec<Message>> {
        self.list_messages(student_id, counselor_id)
    }
}

impl AccountDirectory for Database {
    fn student_exists(&self, id: ParticipantId) -> anyhow::Result<bool> {
        Database::student_exists(self, id)
    }

    fn counselor_exists(&self, id: ParticipantId) -> anyhow::Result<bool> {
        Database::counselor_exists(self, id)
    }
}

/// Send and history: store first, then hand the committed message to the
/// delivery router. The caller's result never depends on delivery.
#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn MessageStore>,
    accounts: Arc<dyn AccountDirectory>,
    router: Arc<dyn DeliveryRouter>,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        accounts: Arc<dyn AccountDirectory>,
        router: Arc<dyn DeliveryRouter>,
    ) -> Self {
        Self {
            store,
            accounts,
            router,
        }
    }

    pub async fn send(
        &self,
        student_id: ParticipantId,
        counselor_id: ParticipantId,
        sender_role: Role,
        text: String,
    ) -> ServiceResult<Message> {
        validate_id("studentId", student_id)?;
        validate_id("counselorId", counselor_id)?;
        validate_text(&text)?;

        // Run blocking DB work off the async runtime
        let store = self.store.clone();
        let accounts = self.accounts.clone();
        let message = tokio::task::spawn_blocking(move || -> ServiceResult<Message> {
            if !accounts.counselor_exists(counselor_id)? {
                return Err(ServiceError::NotFound(format!("counselor {} not found", counselor_id)));
            }
            if !accounts.student_exists(student_id)? {
                return Err(ServiceError::NotFound(format!("student {} not found", student_id)));
            }
            Ok(store.append(student_id, counselor_id, sender_role, &text)?)
        })
        .await
        .map_err(|e| {
            warn!("spawn_blocking join error: {}", e);
            ServiceError::Storage(anyhow::anyhow!("append task failed: {}", e))
        })??;

        debug!(
            "stored message {} ({} -> {})",
            message.id,
            message.sender(),
            message.recipient()
        );
        self.router.dispatch(message.clone());

        Ok(message)
    }

    pub async fn history(
        &self,
        student_id: ParticipantId,
        counselor_id: ParticipantId,
    ) -> ServiceResult<Vec<Message>> {
        validate_id("studentId", student_id)?;
        validate_id("counselorId", counselor_id)?;

        let store = self.store.clone();
        let messages = tokio::task::spawn_blocking(move || store.list(student_id, counselor_id))
            .await
            .map_err(|e| {
                warn!("spawn_blocking join error: {}", e);
                ServiceError::Storage(anyhow::anyhow!("list task failed: {}", e))
            })??;

        Ok(messages)
    }
}

pub fn validate_id(field: &str, id: ParticipantId) -> ServiceResult<()> {
    if id <= 0 {
        return Err(ServiceError::Validation(format!("{} must be a positive integer", field)));
    }
    Ok(())
}

fn validate_text(text: &str) -> ServiceResult<()> {
    if text.trim().is_empty() {
        return Err(ServiceError::Validation("text must not be empty".into()));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ServiceError::Validation(format!(
            "text exceeds {} characters",
            MAX_TEXT_CHARS
        )));
    }
    Ok(())
}
