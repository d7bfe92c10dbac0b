//! Voice-assistant conversation store.
//!
//! Holds the running transcript and the saved-conversation list. The
//! speech capture hardware itself is outside this layer: the UI feeds
//! recognized text into [`AssistantStore::send`] and renders the
//! transcript back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;
use wayfare_client::{ApiClient, endpoints::voice};
use wayfare_core::bus::EventBus;
use wayfare_core::error::{Result, WayfareError};
use wayfare_core::event::{AppEvent, NoticeLevel};

const WELCOME_MESSAGE: &str = "Hello! I'm your travel assistant. How can I help you plan?";

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    User,
    Assistant,
    System,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessage {
    pub id: String,
    pub role: SpeakerRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl AssistantMessage {
    fn new(role: SpeakerRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A previously saved conversation, as listed by the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessReply {
    reply: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

/// Per-operation loading flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssistantLoading {
    pub processing: bool,
    pub history: bool,
    pub saving: bool,
}

/// State container for the assistant conversation.
#[derive(Clone)]
pub struct AssistantStore {
    api: ApiClient,
    bus: EventBus,
    messages: Arc<RwLock<Vec<AssistantMessage>>>,
    saved: Arc<RwLock<Vec<ConversationSummary>>>,
    conversation_id: Arc<RwLock<Option<String>>>,
    loading: Arc<RwLock<AssistantLoading>>,
}

impl AssistantStore {
    pub fn new(api: ApiClient, bus: EventBus) -> Self {
        Self {
            api,
            bus,
            messages: Arc::new(RwLock::new(vec![AssistantMessage::new(
                SpeakerRole::System,
                WELCOME_MESSAGE,
            )])),
            saved: Arc::new(RwLock::new(Vec::new())),
            conversation_id: Arc::new(RwLock::new(None)),
            loading: Arc::new(RwLock::new(AssistantLoading::default())),
        }
    }

    pub async fn transcript(&self) -> Vec<AssistantMessage> {
        self.messages.read().await.clone()
    }

    /// The most recent `count` transcript entries.
    pub async fn recent(&self, count: usize) -> Vec<AssistantMessage> {
        let messages = self.messages.read().await;
        let skip = messages.len().saturating_sub(count);
        messages[skip..].to_vec()
    }

    pub async fn saved_conversations(&self) -> Vec<ConversationSummary> {
        self.saved.read().await.clone()
    }

    pub async fn loading(&self) -> AssistantLoading {
        *self.loading.read().await
    }

    pub async fn user_message_count(&self) -> usize {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.role == SpeakerRole::User)
            .count()
    }

    /// Sends one user utterance and appends the assistant's reply.
    ///
    /// Empty input is rejected locally and never reaches the network.
    pub async fn send(&self, text: &str) -> Result<AssistantMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WayfareError::validation("message", "message must not be empty"));
        }

        self.messages
            .write()
            .await
            .push(AssistantMessage::new(SpeakerRole::User, text));
        self.loading.write().await.processing = true;

        let conversation_id = self.conversation_id.read().await.clone();
        let result: Result<ProcessReply> = self
            .api
            .post(
                &voice::process(),
                &json!({ "message": text, "conversationId": conversation_id }),
            )
            .await;

        self.loading.write().await.processing = false;
        match result {
            Ok(reply) => {
                if reply.conversation_id.is_some() {
                    *self.conversation_id.write().await = reply.conversation_id;
                }
                let message = AssistantMessage::new(SpeakerRole::Assistant, reply.reply);
                self.messages.write().await.push(message.clone());
                Ok(message)
            }
            Err(error) => Err(error),
        }
    }

    /// Fetches the saved-conversation list.
    pub async fn fetch_history(&self) -> Result<Vec<ConversationSummary>> {
        self.loading.write().await.history = true;

        let result: Result<Vec<ConversationSummary>> =
            self.api.get(&voice::history(), Vec::new()).await;

        self.loading.write().await.history = false;
        match result {
            Ok(summaries) => {
                *self.saved.write().await = summaries.clone();
                Ok(summaries)
            }
            Err(error) => Err(error),
        }
    }

    /// Saves the current transcript under a title.
    pub async fn save_conversation(&self, title: &str) -> Result<ConversationSummary> {
        self.loading.write().await.saving = true;

        let transcript = self.messages.read().await.clone();
        let result: Result<ConversationSummary> = self
            .api
            .post(
                &voice::history(),
                &json!({ "title": title, "messages": transcript }),
            )
            .await;

        self.loading.write().await.saving = false;
        match result {
            Ok(summary) => {
                self.saved.write().await.insert(0, summary.clone());
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Conversation saved"));
                Ok(summary)
            }
            Err(error) => Err(error),
        }
    }

    /// Resets the transcript to the welcome message and forgets the
    /// server-side conversation id.
    pub async fn clear_conversation(&self) {
        *self.messages.write().await =
            vec![AssistantMessage::new(SpeakerRole::System, WELCOME_MESSAGE)];
        *self.conversation_id.write().await = None;
    }
}
