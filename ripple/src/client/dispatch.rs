//! Inbound frame dispatch.
//!
//! Frames are decoded outside the state lock, then applied under it. A frame
//! that fails to decode is dropped with a warning and never affects the
//! connection.

use std::sync::Arc;

use ripple_proto::codec::{self, InboundFrame, IncomingMessage, ReceiptTarget};
use ripple_proto::message::{ConversationId, MessageStatus, UserId};
use ripple_proto::presence::PresenceChange;
use ripple_proto::typing::TypingEvent;

use crate::api::ChatApi;
use crate::chat::{EchoOutcome, ReceiveOutcome};
use crate::transport::Connector;

use super::{ClientEvent, Inner, Shared};

impl<C: Connector, A: ChatApi> Inner<C, A> {
    /// Apply one inbound text frame from connection `generation`.
    pub(super) fn on_frame(self: &Arc<Self>, generation: u64, text: &str) {
        let frame = match codec::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(err = %e, len = text.len(), "dropping malformed frame");
                return;
            }
        };

        let mut shared = self.shared.lock();
        if !shared.is_current(generation) {
            tracing::trace!(generation, "frame from superseded connection ignored");
            return;
        }

        match frame {
            InboundFrame::Chat(message) => self.on_chat(&mut shared, &message),
            InboundFrame::Typing(event) => self.on_typing(&mut shared, &event),
            InboundFrame::Presence(change) => self.on_presence(&mut shared, &change),
            InboundFrame::Delivered(target) => {
                self.on_receipt(&mut shared, &target, MessageStatus::Delivered);
            }
            InboundFrame::Read(target) => {
                self.on_receipt(&mut shared, &target, MessageStatus::Read);
            }
            InboundFrame::Error(message) => {
                tracing::warn!(error = %message, "server reported an error");
                shared.conn.last_error = Some(message.clone());
                self.emit(ClientEvent::Error(message));
            }
            InboundFrame::Ignored(kind) => {
                tracing::debug!(kind = %kind, "ignoring frame");
            }
        }
    }

    fn on_chat(&self, shared: &mut Shared, message: &IncomingMessage) {
        let local_user = shared.chat.local_user();
        let Some(sender) = message.sender else {
            tracing::warn!(kind = %message.kind, "chat frame without sender, dropping");
            return;
        };
        let Some(conversation) = message.conversation_for(local_user) else {
            tracing::warn!(%sender, "chat frame without a resolvable conversation, dropping");
            return;
        };

        if sender == local_user {
            match shared.chat.reconcile_echo(conversation, message) {
                EchoOutcome::Reconciled { local_id, message } => {
                    tracing::debug!(%conversation, %local_id, id = %message.id, "send confirmed");
                    self.emit(ClientEvent::MessageReconciled {
                        conversation,
                        local_id,
                        message,
                    });
                    self.emit(ClientEvent::ConversationUpdated(conversation));
                }
                EchoOutcome::Added(message) => {
                    self.emit(ClientEvent::MessageAdded(message));
                    self.emit(ClientEvent::ConversationUpdated(conversation));
                }
                EchoOutcome::Duplicate => {
                    tracing::debug!(%conversation, "duplicate echo ignored");
                }
            }
            return;
        }

        match shared.chat.receive(conversation, sender, message) {
            ReceiveOutcome::Added(message) => {
                tracing::debug!(%conversation, %sender, id = %message.id, "message received");
                self.emit(ClientEvent::MessageAdded(message));
                self.emit(ClientEvent::ConversationUpdated(conversation));
            }
            ReceiveOutcome::Duplicate => {
                tracing::debug!(%conversation, "duplicate message ignored");
            }
        }
    }

    fn on_typing(self: &Arc<Self>, shared: &mut Shared, event: &TypingEvent) {
        let local_user = shared.chat.local_user();
        if event.user == local_user {
            return;
        }
        let conversation = event.conversation_for(local_user);

        let changed = if event.is_typing {
            self.start_typing_timer(shared, conversation, event.user)
        } else {
            shared.typing.stop(conversation, event.user)
        };

        if changed {
            self.emit(ClientEvent::TypingChanged {
                conversation,
                users: shared.typing.users(conversation),
            });
        }
    }

    /// (Re)arm the expiry timer for `user` in `conversation`.
    fn start_typing_timer(
        self: &Arc<Self>,
        shared: &mut Shared,
        conversation: ConversationId,
        user: UserId,
    ) -> bool {
        let token = shared.typing.next_token();
        let timeout = self.settings.typing_timeout;
        let this = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            this.on_typing_expired(conversation, user, token);
        });
        shared
            .typing
            .start(conversation, user, token, timer.abort_handle())
    }

    fn on_typing_expired(&self, conversation: ConversationId, user: UserId, token: u64) {
        let mut shared = self.shared.lock();
        if shared.typing.expire(conversation, user, token) {
            tracing::trace!(%conversation, %user, "typing indicator expired");
            self.emit(ClientEvent::TypingChanged {
                conversation,
                users: shared.typing.users(conversation),
            });
        }
    }

    fn on_presence(&self, shared: &mut Shared, change: &PresenceChange) {
        if shared.chat.apply_presence(change) {
            tracing::debug!(%change, "presence changed");
            self.emit(ClientEvent::PresenceChanged {
                online: shared.chat.online_users(),
            });
        }
    }

    fn on_receipt(&self, shared: &mut Shared, target: &ReceiptTarget, status: MessageStatus) {
        let updates = shared.chat.apply_receipt(target, status);
        if updates.is_empty() {
            tracing::debug!(?target, %status, "receipt matched nothing new");
        }
        for update in updates {
            self.emit(ClientEvent::StatusChanged {
                conversation: update.conversation,
                message_id: update.message_id,
                status: update.status,
            });
        }
    }
}
