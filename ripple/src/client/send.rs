//! Outbound operations: chat messages and typing indicators.

use chrono::Utc;

use ripple_proto::codec::{self, OutboundFrame};
use ripple_proto::message::{ChatKind, ConversationId, MessageId, MessageStatus};
use ripple_proto::typing::TypingData;

use crate::api::ChatApi;
use crate::chat::Message;
use crate::transport::{Connector, Outgoing};

use super::{ClientError, ClientEvent, ConnectionState, Inner, Shared};

impl Shared {
    /// Outbound queue of the connection, if it is open.
    fn open_outbound(&self) -> Option<&tokio::sync::mpsc::UnboundedSender<Outgoing>> {
        if self.shut_down || self.conn.state != ConnectionState::Open {
            return None;
        }
        self.conn.outbound.as_ref()
    }
}

impl<C: Connector, A: ChatApi> Inner<C, A> {
    pub(super) fn send_message(
        &self,
        conversation: ConversationId,
        content: String,
        kind: ChatKind,
    ) -> Result<MessageId, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let mut shared = self.shared.lock();
        let outbound = shared.open_outbound().ok_or(ClientError::NotConnected)?;

        let timestamp = Utc::now();
        let frame = OutboundFrame::chat(kind, content.clone(), conversation, timestamp);
        let text = codec::encode(&frame)?;
        outbound.send(Outgoing::Text(text)).map_err(|_| {
            tracing::warn!(%conversation, "connection writer gone, message not sent");
            ClientError::NotConnected
        })?;

        let message = Message {
            id: MessageId::local(),
            conversation,
            sender: shared.chat.local_user(),
            content,
            timestamp,
            kind,
            status: MessageStatus::Sending,
        };
        let id = message.id.clone();
        tracing::debug!(%conversation, %id, %kind, "message sent");
        shared.chat.push_outgoing(message.clone());
        self.emit(ClientEvent::MessageAdded(message));
        self.emit(ClientEvent::ConversationUpdated(conversation));
        Ok(id)
    }

    pub(super) fn send_typing_indicator(&self, conversation: ConversationId, is_typing: bool) {
        let shared = self.shared.lock();
        let Some(outbound) = shared.open_outbound() else {
            tracing::trace!(%conversation, "typing indicator skipped: not connected");
            return;
        };

        let frame = OutboundFrame::Typing {
            to: conversation,
            data: TypingData { is_typing },
            timestamp: Utc::now(),
        };
        match codec::encode(&frame) {
            Ok(text) => {
                let _ = outbound.send(Outgoing::Text(text));
            }
            Err(e) => tracing::warn!(err = %e, "failed to encode typing indicator"),
        }
    }
}
