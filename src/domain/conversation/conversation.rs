//! Conversation aggregate.
//!
//! Owns the display messages, the model-facing history, and the weather
//! context (last mentioned city). All mutation goes through aggregate
//! methods so streaming state stays consistent.

use crate::domain::foundation::{ConversationId, MessageId, Timestamp};
use serde::{Deserialize, Serialize};

use super::history::HistoryTurn;
use super::message::Message;

/// Title used until the first user message arrives.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Titles derived from message text are cut to this many characters.
const MAX_TITLE_CHARS: usize = 60;

/// A chat conversation with the weather assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    id: ConversationId,

    /// Display title.
    title: String,

    /// Ordered display messages, user and bot interleaved.
    messages: Vec<Message>,

    /// Append-only transcript handed to the chat model.
    history: Vec<HistoryTurn>,

    /// Last city the user asked about, carried across turns.
    last_city: Option<String>,

    /// When the conversation was created.
    created_at: Timestamp,

    /// Last time a message was added or completed.
    last_activity: Timestamp,
}

impl Conversation {
    /// Creates a new conversation.
    ///
    /// An empty or whitespace title falls back to [`DEFAULT_TITLE`].
    pub fn new(title: Option<String>) -> Self {
        let title = match title {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => DEFAULT_TITLE.to_string(),
        };
        let now = Timestamp::now();
        Self {
            id: ConversationId::new(),
            title,
            messages: Vec::new(),
            history: Vec::new(),
            last_city: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Reconstitutes a conversation from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: ConversationId,
        title: String,
        messages: Vec<Message>,
        history: Vec<HistoryTurn>,
        last_city: Option<String>,
        created_at: Timestamp,
        last_activity: Timestamp,
    ) -> Self {
        Self {
            id,
            title,
            messages,
            history,
            last_city,
            created_at,
            last_activity,
        }
    }

    /// Derives a title from message text, cut to a displayable length.
    pub fn derive_title(text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return DEFAULT_TITLE.to_string();
        }
        trimmed.chars().take(MAX_TITLE_CHARS).collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the conversation ID.
    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Returns the display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the display messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the model-facing history in order.
    pub fn history(&self) -> &[HistoryTurn] {
        &self.history
    }

    /// Returns the last city the user asked about, if any.
    pub fn last_city(&self) -> Option<&str> {
        self.last_city.as_deref()
    }

    /// Returns when the conversation was created.
    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    /// Returns the last activity timestamp.
    pub fn last_activity(&self) -> &Timestamp {
        &self.last_activity
    }

    /// Finds a message by ID.
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    /// Finds a message by ID for mutation.
    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id() == id)
    }

    /// Returns the messages still in the streaming state.
    pub fn streaming_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_streaming())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a message and refreshes the activity timestamp.
    ///
    /// The first user message also retitles a conversation that still
    /// carries the default title.
    pub fn push_message(&mut self, message: Message) {
        if message.is_user() && self.title == DEFAULT_TITLE {
            self.title = Self::derive_title(message.text());
        }
        self.messages.push(message);
        self.touch();
    }

    /// Removes a message by ID, returning it if present.
    pub fn remove_message(&mut self, id: &MessageId) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id() == id)?;
        self.touch();
        Some(self.messages.remove(idx))
    }

    /// Appends turns to the model-facing history.
    pub fn append_history(&mut self, turns: Vec<HistoryTurn>) {
        self.history.extend(turns);
        self.touch();
    }

    /// Records the last city the user asked about.
    pub fn set_last_city(&mut self, city: impl Into<String>) {
        self.last_city = Some(city.into());
    }

    /// Refreshes the activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Timestamp::now();
    }
}
