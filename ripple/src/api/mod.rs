//! REST collaborator for conversation lists and message history.
//!
//! The realtime socket only carries live events; the initial conversation
//! list and per-conversation history come from the HTTP API. [`ChatApi`] is
//! the seam the client depends on. [`HttpChatApi`] talks to the real server
//! with `reqwest`; [`InMemoryApi`] serves canned records in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use url::Url;

use ripple_proto::message::ConversationId;
use ripple_proto::record::{ConversationRecord, MessageRecord};

/// Errors returned by the REST collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The base URL or a derived endpoint is not a valid URL.
    #[error("invalid API url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request could not be sent or the body could not be decoded.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The in-memory API was told to fail.
    #[error("API unavailable")]
    Unavailable,
}

/// Source of conversation lists and message history.
pub trait ChatApi: Send + Sync + 'static {
    /// Fetch the local user's conversations.
    fn fetch_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationRecord>, ApiError>> + Send;

    /// Fetch the message history of one conversation, oldest first.
    fn fetch_messages(
        &self,
        conversation: ConversationId,
    ) -> impl std::future::Future<Output = Result<Vec<MessageRecord>, ApiError>> + Send;
}

impl<T: ChatApi> ChatApi for std::sync::Arc<T> {
    fn fetch_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationRecord>, ApiError>> + Send {
        (**self).fetch_conversations()
    }

    fn fetch_messages(
        &self,
        conversation: ConversationId,
    ) -> impl std::future::Future<Output = Result<Vec<MessageRecord>, ApiError>> + Send {
        (**self).fetch_messages(conversation)
    }
}

/// A list body as the server returns it: either a bare array or an object
/// wrapping the array.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "conversations", alias = "messages", alias = "items")]
        data: Vec<T>,
    },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { data: items } => items,
        }
    }
}

/// [`ChatApi`] over HTTP.
///
/// Endpoints are resolved relative to the base URL:
/// `GET {base}/conversations` and `GET {base}/conversations/{id}/messages`.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpChatApi {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// When `token` is set every request carries it as a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            token,
        })
    }

    /// Resolve `path` against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, ApiError> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "API request rejected");
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: ListBody<T> = response.json().await?;
        Ok(body.into_vec())
    }
}

impl ChatApi for HttpChatApi {
    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>, ApiError> {
        let url = self.endpoint("conversations")?;
        let records = self.get_list(url).await?;
        tracing::debug!(count = records.len(), "fetched conversations");
        Ok(records)
    }

    async fn fetch_messages(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<MessageRecord>, ApiError> {
        let url = self.endpoint(&format!("conversations/{conversation}/messages"))?;
        let records = self.get_list(url).await?;
        tracing::debug!(%conversation, count = records.len(), "fetched history");
        Ok(records)
    }
}

/// [`ChatApi`] serving records from memory.
#[derive(Debug, Default)]
pub struct InMemoryApi {
    conversations: Mutex<Vec<ConversationRecord>>,
    messages: Mutex<HashMap<ConversationId, Vec<MessageRecord>>>,
    failing: AtomicBool,
    history_fetches: AtomicUsize,
}

impl InMemoryApi {
    /// Create an API with no records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a conversation record.
    #[must_use]
    pub fn with_conversation(self, record: ConversationRecord) -> Self {
        self.conversations.lock().push(record);
        self
    }

    /// Set the history of a conversation.
    #[must_use]
    pub fn with_messages(self, conversation: ConversationId, records: Vec<MessageRecord>) -> Self {
        self.messages.lock().insert(conversation, records);
        self
    }

    /// Make every subsequent call fail with [`ApiError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many history fetches have been made.
    #[must_use]
    pub fn history_fetches(&self) -> usize {
        self.history_fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ApiError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ApiError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl ChatApi for InMemoryApi {
    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>, ApiError> {
        self.check()?;
        Ok(self.conversations.lock().clone())
    }

    async fn fetch_messages(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<MessageRecord>, ApiError> {
        self.history_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .messages
            .lock()
            .get(&conversation)
            .cloned()
            .unwrap_or_default())
    }
}
