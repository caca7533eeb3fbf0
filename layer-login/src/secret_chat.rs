//! Secret-chat credential lifecycle: accept/decline, restoration, sequence counters.

use layer_session::{SecretChatRecord, SecretChatState, SessionContext};

use crate::capability::{Notifier, ProtocolClient, Prompt, SecretChatDecision};
use crate::errors::InvocationError;

/// Handles secret-chat requests for one session and keeps their counters.
pub struct SecretChatLifecycle<'a, P, U, N> {
    ctx:      SessionContext,
    client:   &'a P,
    prompt:   &'a U,
    notifier: &'a N,
}

impl<'a, P, U, N> SecretChatLifecycle<'a, P, U, N>
where
    P: ProtocolClient,
    U: Prompt,
    N: Notifier,
{
    pub fn new(ctx: SessionContext, client: &'a P, prompt: &'a U, notifier: &'a N) -> Self {
        Self { ctx, client, prompt, notifier }
    }

    /// An incoming request from the protocol layer.
    ///
    /// The chat is kept as pending while the user decides. Accepting persists
    /// the whole chat set immediately once the server confirms; a failed
    /// accept is reported and leaves the chat pending. Declining forgets the
    /// chat and its contact entry without contacting the server.
    pub async fn on_request(&self, request: SecretChatRecord) -> Result<SecretChatDecision, InvocationError> {
        let id = request.id;
        let pending = SecretChatRecord { state: SecretChatState::Pending, ..request };
        self.ctx.state().await.secret_chats.insert(id, pending.clone());
        self.ctx.schedule_save();

        match self.prompt.confirm_secret_chat(&pending).await {
            SecretChatDecision::Decline => {
                self.ctx.state().await.secret_chats.remove(&id);
                self.notifier.remove_contact(id);
                self.ctx.schedule_save();
                tracing::info!("[layer-login] Secret chat {id} declined");
                Ok(SecretChatDecision::Decline)
            }
            SecretChatDecision::Accept => match self.client.accept_secret_chat(&pending).await {
                Ok(accepted) => {
                    let established = SecretChatRecord { id, state: SecretChatState::Ok, ..accepted };
                    self.ctx.state().await.secret_chats.insert(id, established);
                    if let Err(e) = self.ctx.save_secret_chats_now().await {
                        tracing::warn!("[layer-login] Persisting secret chat {id} failed: {e}");
                    }
                    tracing::info!("[layer-login] Secret chat {id} established");
                    Ok(SecretChatDecision::Accept)
                }
                Err(e) => {
                    let (code, message) = e.report();
                    tracing::warn!("[layer-login] Accepting secret chat {id} failed: {e}");
                    self.notifier.report_error(code, &message);
                    Err(e)
                }
            },
        }
    }

    /// Chats with established keys, in id order. After a restart these are the
    /// ones restored from disk, counters included.
    pub async fn established(&self) -> Vec<SecretChatRecord> {
        self.ctx.state().await.established_chats().cloned().collect()
    }

    /// Record an incoming message with sequence number `seq`.
    ///
    /// Returns `false` for unknown or non-established chats, for sequence
    /// numbers already seen, and for `i32::MAX` (no successor to expect).
    pub async fn advance_in_seq(&self, id: i32, seq: i32) -> bool {
        {
            let mut state = self.ctx.state().await;
            let Some(chat) = state.secret_chats.get_mut(&id).filter(|c| c.is_established()) else {
                return false;
            };
            if seq < chat.in_seq {
                tracing::debug!("[layer-login] Secret chat {id}: stale in_seq {seq} < {}", chat.in_seq);
                return false;
            }
            let Some(next) = seq.checked_add(1) else {
                tracing::warn!("[layer-login] Secret chat {id}: in_seq exhausted");
                return false;
            };
            chat.last_in_seq = seq;
            chat.in_seq      = next;
        }
        self.ctx.schedule_save();
        true
    }

    /// Take the next outgoing sequence number of an established chat.
    /// `None` once the counter has reached `i32::MAX`; the chat is left as is.
    pub async fn next_out_seq(&self, id: i32) -> Option<i32> {
        let seq = {
            let mut state = self.ctx.state().await;
            let chat = state.secret_chats.get_mut(&id).filter(|c| c.is_established())?;
            let seq = chat.out_seq;
            chat.out_seq = seq.checked_add(1)?;
            seq
        };
        self.ctx.schedule_save();
        Some(seq)
    }
}
