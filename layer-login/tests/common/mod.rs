//! Scripted collaborators that record every call.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use layer_login::{
    AccountStatus, InvocationError, LoginConfig, NoRetries, Notifier, Prompt, ProtocolClient,
    RegistrationForm, RpcError, SecretChatDecision, SentCode, VerificationHandle,
};
use layer_session::{
    AuthKey, DcEnvironment, InMemoryBackend, SecretChatRecord, SecretChatState, SecretKey,
    SessionContext, SessionStore,
};

pub const PHONE: &str = "+15550100";

pub fn rpc(code: i32, message: &str) -> InvocationError {
    RpcError::from_telegram(code, message).into()
}

pub fn config() -> LoginConfig {
    LoginConfig {
        phone: PHONE.into(),
        retry_policy: Arc::new(NoRetries),
        ..Default::default()
    }
}

/// The key [`FakeClient`] reports for `dc_id` once its handshake is done.
pub fn transport_key(dc_id: i32) -> AuthKey {
    AuthKey::from_bytes([dc_id as u8; 256])
}

/// A fresh session over an empty in-memory backend: production bootstrap
/// table, no keys, nothing signed.
pub fn memory_context(save_delay: Duration) -> (Arc<InMemoryBackend>, SessionContext) {
    let backend = Arc::new(InMemoryBackend::new());
    (backend.clone(), reopen(&backend, save_delay))
}

/// Load whatever `backend` holds into a new context, as a restart would.
pub fn reopen(backend: &Arc<InMemoryBackend>, save_delay: Duration) -> SessionContext {
    let store = SessionStore::with_backend(backend.clone(), DcEnvironment::Production);
    SessionContext::new(store, save_delay)
}

/// Install the transport key for each of `dc_ids` and mark it signed, as a
/// previous successful login would have left it.
pub async fn sign_in_memory(ctx: &SessionContext, dc_ids: &[i32]) {
    let mut state = ctx.state().await;
    for &id in dc_ids {
        let dc = state.credentials.get_mut(id).unwrap();
        dc.set_auth_key(transport_key(id));
        assert!(state.credentials.mark_signed(id));
    }
}

// ─── FakeClient ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SendCode(String),
    VerifyCode(String),
    CheckPassword(String),
    Register { first: String, last: String, code: String },
    Export(i32),
    Accept(i32),
}

pub struct FakeClient {
    pub calls:       Mutex<Vec<Call>>,
    pub dcs_ready:   AtomicBool,
    send_code:       Mutex<VecDeque<Result<AccountStatus, InvocationError>>>,
    verify:          Mutex<VecDeque<Result<AccountStatus, InvocationError>>>,
    register:        Mutex<VecDeque<Result<(), InvocationError>>>,
    password:        Mutex<VecDeque<Result<(), InvocationError>>>,
    accept:          Mutex<VecDeque<Result<(), InvocationError>>>,
    failing_exports: Mutex<HashSet<i32>>,
    withheld_keys:   Mutex<HashSet<i32>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self {
            calls:           Mutex::default(),
            dcs_ready:       AtomicBool::new(true),
            send_code:       Mutex::default(),
            verify:          Mutex::default(),
            register:        Mutex::default(),
            password:        Mutex::default(),
            accept:          Mutex::default(),
            failing_exports: Mutex::default(),
            withheld_keys:   Mutex::default(),
        }
    }
}

impl FakeClient {
    pub fn on_send_code(self, r: Result<AccountStatus, InvocationError>) -> Self {
        self.send_code.lock().unwrap().push_back(r);
        self
    }

    pub fn on_verify(self, r: Result<AccountStatus, InvocationError>) -> Self {
        self.verify.lock().unwrap().push_back(r);
        self
    }

    pub fn on_register(self, r: Result<(), InvocationError>) -> Self {
        self.register.lock().unwrap().push_back(r);
        self
    }

    pub fn on_password(self, r: Result<(), InvocationError>) -> Self {
        self.password.lock().unwrap().push_back(r);
        self
    }

    pub fn on_accept(self, r: Result<(), InvocationError>) -> Self {
        self.accept.lock().unwrap().push_back(r);
        self
    }

    pub fn failing_export(self, dc_id: i32) -> Self {
        self.failing_exports.lock().unwrap().insert(dc_id);
        self
    }

    /// Stop reporting a key for `dc_id`, as if its handshake had been lost.
    pub fn withhold_key(&self, dc_id: i32) {
        self.withheld_keys.lock().unwrap().insert(dc_id);
    }

    pub fn dcs_pending(self) -> Self {
        self.dcs_ready.store(false, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn exports(&self) -> Vec<i32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c { Call::Export(id) => Some(id), _ => None })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProtocolClient for FakeClient {
    fn auth_key(&self, dc_id: i32) -> Option<AuthKey> {
        let ready = self.dcs_ready.load(Ordering::SeqCst) && !self.withheld_keys.lock().unwrap().contains(&dc_id);
        ready.then(|| transport_key(dc_id))
    }

    async fn send_code(&self, phone: &str) -> Result<SentCode, InvocationError> {
        self.record(Call::SendCode(phone.into()));
        let status = self.send_code.lock().unwrap().pop_front().unwrap_or(Ok(AccountStatus::Registered))?;
        let n = self.calls().len();
        Ok(SentCode { handle: VerificationHandle::new(phone, format!("hash-{n}")), status })
    }

    async fn verify_code(&self, _handle: &VerificationHandle, code: &str) -> Result<AccountStatus, InvocationError> {
        self.record(Call::VerifyCode(code.into()));
        self.verify.lock().unwrap().pop_front().unwrap_or(Ok(AccountStatus::Registered))
    }

    async fn check_password(&self, password: &str) -> Result<(), InvocationError> {
        self.record(Call::CheckPassword(password.into()));
        self.password.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn verify_code_with_registration(
        &self,
        _handle: &VerificationHandle,
        first:   &str,
        last:    &str,
        code:    &str,
    ) -> Result<(), InvocationError> {
        self.record(Call::Register { first: first.into(), last: last.into(), code: code.into() });
        self.register.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn export_auth(&self, dc_id: i32) -> Result<(), InvocationError> {
        self.record(Call::Export(dc_id));
        if self.failing_exports.lock().unwrap().contains(&dc_id) {
            return Err(rpc(400, "AUTH_BYTES_INVALID"));
        }
        Ok(())
    }

    async fn accept_secret_chat(&self, chat: &SecretChatRecord) -> Result<SecretChatRecord, InvocationError> {
        self.record(Call::Accept(chat.id));
        self.accept.lock().unwrap().pop_front().unwrap_or(Ok(()))?;
        Ok(established(chat.clone()))
    }
}

/// What a successful key exchange turns a pending chat into.
pub fn established(chat: SecretChatRecord) -> SecretChatRecord {
    let key = SecretKey::from_bytes([chat.id as u8 ^ 0x5a; 256]);
    SecretChatRecord {
        state:           SecretChatState::Ok,
        access_hash:     0x0102_0304_0506_0708,
        key_fingerprint: 0x1111,
        key_digest:      key.digest(),
        key,
        protocol_layer:  73,
        ..chat
    }
}

// ─── FakePrompt ───────────────────────────────────────────────────────────────

/// Answers are handed out in order; an exhausted queue cancels.
#[derive(Default)]
pub struct FakePrompt {
    codes:         Mutex<VecDeque<String>>,
    forms:         Mutex<VecDeque<RegistrationForm>>,
    passwords:     Mutex<VecDeque<String>>,
    decisions:     Mutex<VecDeque<SecretChatDecision>>,
    pub code_prompts:     Mutex<usize>,
    pub form_prompts:     Mutex<usize>,
    pub password_prompts: Mutex<usize>,
    pub chat_prompts: Mutex<Vec<i32>>,
}

impl FakePrompt {
    pub fn code(self, code: &str) -> Self {
        self.codes.lock().unwrap().push_back(code.into());
        self
    }

    pub fn form(self, first: &str, last: &str, code: &str) -> Self {
        self.forms.lock().unwrap().push_back(RegistrationForm::new(first, last, code));
        self
    }

    pub fn password(self, password: &str) -> Self {
        self.passwords.lock().unwrap().push_back(password.into());
        self
    }

    pub fn decide(self, decision: SecretChatDecision) -> Self {
        self.decisions.lock().unwrap().push_back(decision);
        self
    }

    pub fn code_prompts(&self) -> usize { *self.code_prompts.lock().unwrap() }

    pub fn form_prompts(&self) -> usize { *self.form_prompts.lock().unwrap() }

    pub fn password_prompts(&self) -> usize { *self.password_prompts.lock().unwrap() }
}

impl Prompt for FakePrompt {
    async fn request_code(&self) -> Option<String> {
        *self.code_prompts.lock().unwrap() += 1;
        self.codes.lock().unwrap().pop_front()
    }

    async fn request_registration(&self) -> Option<RegistrationForm> {
        *self.form_prompts.lock().unwrap() += 1;
        self.forms.lock().unwrap().pop_front()
    }

    async fn request_password(&self) -> Option<String> {
        *self.password_prompts.lock().unwrap() += 1;
        self.passwords.lock().unwrap().pop_front()
    }

    async fn confirm_secret_chat(&self, chat: &SecretChatRecord) -> SecretChatDecision {
        self.chat_prompts.lock().unwrap().push(chat.id);
        self.decisions.lock().unwrap().pop_front().unwrap_or(SecretChatDecision::Decline)
    }
}

// ─── FakeNotifier ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeNotifier {
    pub ready:    Mutex<usize>,
    pub errors:   Mutex<Vec<(i32, String)>>,
    pub removed:  Mutex<Vec<i32>>,
}

impl FakeNotifier {
    pub fn ready_count(&self) -> usize { *self.ready.lock().unwrap() }

    pub fn errors(&self) -> Vec<(i32, String)> { self.errors.lock().unwrap().clone() }

    pub fn removed(&self) -> Vec<i32> { self.removed.lock().unwrap().clone() }
}

impl Notifier for FakeNotifier {
    fn connection_ready(&self) {
        *self.ready.lock().unwrap() += 1;
    }

    fn report_error(&self, code: i32, message: &str) {
        self.errors.lock().unwrap().push((code, message.into()));
    }

    fn remove_contact(&self, chat_id: i32) {
        self.removed.lock().unwrap().push(chat_id);
    }
}
