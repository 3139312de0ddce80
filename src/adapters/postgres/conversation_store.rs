//! PostgreSQL implementation of ConversationStore.
//!
//! Persists Conversation aggregates with their messages and model-facing
//! history to PostgreSQL.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::conversation::{Conversation, HistoryTurn, Message, Role, TurnRole};
use crate::domain::foundation::{ConversationId, MessageId, Timestamp};
use crate::ports::{ConversationStore, StoreError};

/// PostgreSQL implementation of ConversationStore.
#[derive(Clone)]
pub struct PostgresConversationStore {
    pool: PgPool,
}

impl PostgresConversationStore {
    /// Creates a new PostgresConversationStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PostgresConversationStore {
    async fn create(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to start transaction: {}", e)))?;

        // Insert conversation
        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, last_city, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(conversation.id().as_uuid())
        .bind(conversation.title())
        .bind(conversation.last_city())
        .bind(conversation.created_at().as_datetime())
        .bind(conversation.last_activity().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to insert conversation: {}", e)))?;

        // Insert any messages already attached to the aggregate
        for message in conversation.messages() {
            insert_message(&mut tx, conversation.id(), message).await?;
        }

        // Insert any history turns
        for turn in conversation.history() {
            insert_history_turn(&mut tx, conversation.id(), turn).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, StoreError> {
        // Fetch conversation
        let conv_row = sqlx::query(
            r#"
            SELECT id, title, last_city, created_at, last_activity
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch conversation: {}", e)))?;

        let conv_row = match conv_row {
            Some(row) => row,
            None => return Ok(None),
        };

        // Fetch messages
        let message_rows = sqlx::query(
            r#"
            SELECT id, role, content, streaming, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch messages: {}", e)))?;

        // Reconstruct messages
        let messages: Result<Vec<Message>, StoreError> = message_rows
            .iter()
            .map(|row| {
                let message_id: uuid::Uuid = row.get("id");
                let role_str: &str = row.get("role");
                let content: String = row.get("content");
                let streaming: bool = row.get("streaming");
                let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");

                Ok(Message::reconstitute(
                    MessageId::from_uuid(message_id),
                    str_to_role(role_str)?,
                    content,
                    streaming,
                    Timestamp::from_datetime(created_at),
                ))
            })
            .collect();
        let messages = messages?;

        // Fetch history in insert order
        let history_rows = sqlx::query(
            r#"
            SELECT role, content
            FROM history_turns
            WHERE conversation_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch history: {}", e)))?;

        let history: Result<Vec<HistoryTurn>, StoreError> = history_rows
            .iter()
            .map(|row| {
                let role_str: &str = row.get("role");
                let content: String = row.get("content");
                Ok(HistoryTurn {
                    role: str_to_turn_role(role_str)?,
                    text: content,
                })
            })
            .collect();
        let history = history?;

        // Reconstruct conversation
        let id_uuid: uuid::Uuid = conv_row.get("id");
        let title: String = conv_row.get("title");
        let last_city: Option<String> = conv_row.get("last_city");
        let created_at: chrono::DateTime<chrono::Utc> = conv_row.get("created_at");
        let last_activity: chrono::DateTime<chrono::Utc> = conv_row.get("last_activity");

        let conversation = Conversation::reconstitute(
            ConversationId::from_uuid(id_uuid),
            title,
            messages,
            history,
            last_city,
            Timestamp::from_datetime(created_at),
            Timestamp::from_datetime(last_activity),
        );

        Ok(Some(conversation))
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        message: &Message,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to start transaction: {}", e)))?;

        // Touching last_activity first doubles as the existence check
        let result = sqlx::query(
            r#"
            UPDATE conversations SET last_activity = $2
            WHERE id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to touch conversation: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(conversation_id));
        }

        insert_message(&mut tx, &conversation_id, message).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn update_message_text(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET content = $3
            WHERE id = $2 AND conversation_id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(message_id.as_uuid())
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to update message text: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MessageNotFound(message_id));
        }

        Ok(())
    }

    async fn complete_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to start transaction: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE messages SET streaming = FALSE
            WHERE id = $2 AND conversation_id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(message_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to complete message: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MessageNotFound(message_id));
        }

        sqlx::query(
            r#"
            UPDATE conversations SET last_activity = $2
            WHERE id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to touch conversation: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn remove_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE id = $2 AND conversation_id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(message_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to delete message: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MessageNotFound(message_id));
        }

        Ok(())
    }

    async fn append_history(
        &self,
        conversation_id: ConversationId,
        turns: &[HistoryTurn],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to start transaction: {}", e)))?;

        for turn in turns {
            insert_history_turn(&mut tx, &conversation_id, turn).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn set_last_city(
        &self,
        conversation_id: ConversationId,
        city: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE conversations SET last_city = $2
            WHERE id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(city)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to set last city: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(conversation_id));
        }

        Ok(())
    }
}

// === Helper Functions ===

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    conversation_id: &ConversationId,
    message: &Message,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, role, content, streaming, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(message.id().as_uuid())
    .bind(conversation_id.as_uuid())
    .bind(role_to_str(message.role()))
    .bind(message.text())
    .bind(message.is_streaming())
    .bind(message.created_at().as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| StoreError::Database(format!("Failed to insert message: {}", e)))?;

    Ok(())
}

async fn insert_history_turn(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    conversation_id: &ConversationId,
    turn: &HistoryTurn,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO history_turns (conversation_id, role, content)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(conversation_id.as_uuid())
    .bind(turn_role_to_str(turn.role))
    .bind(&turn.text)
    .execute(&mut **tx)
    .await
    .map_err(|e| StoreError::Database(format!("Failed to insert history turn: {}", e)))?;

    Ok(())
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Bot => "bot",
    }
}

fn str_to_role(s: &str) -> Result<Role, StoreError> {
    match s {
        "user" => Ok(Role::User),
        "bot" => Ok(Role::Bot),
        _ => Err(StoreError::Database(format!("Invalid message role: {}", s))),
    }
}

fn turn_role_to_str(role: TurnRole) -> &'static str {
    match role {
        TurnRole::Human => "human",
        TurnRole::Ai => "ai",
    }
}

fn str_to_turn_role(s: &str) -> Result<TurnRole, StoreError> {
    match s {
        "human" => Ok(TurnRole::Human),
        "ai" => Ok(TurnRole::Ai),
        _ => Err(StoreError::Database(format!("Invalid history role: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_storage_strings() {
        assert_eq!(str_to_role(role_to_str(Role::User)).unwrap(), Role::User);
        assert_eq!(str_to_role(role_to_str(Role::Bot)).unwrap(), Role::Bot);
        assert!(str_to_role("system").is_err());
    }

    #[test]
    fn turn_roles_round_trip_through_storage_strings() {
        assert_eq!(
            str_to_turn_role(turn_role_to_str(TurnRole::Human)).unwrap(),
            TurnRole::Human
        );
        assert_eq!(
            str_to_turn_role(turn_role_to_str(TurnRole::Ai)).unwrap(),
            TurnRole::Ai
        );
        assert!(str_to_turn_role("assistant").is_err());
    }

    // Note: database integration tests require a running PostgreSQL
    // instance with migrations applied and are run separately.
}
