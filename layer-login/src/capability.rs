//! The collaborators a login flow drives: protocol client, user prompt and notifier.
//!
//! All three are plain traits so the transport, the UI and the tests can plug in
//! their own implementations. The flow never holds more than one outstanding
//! call into a [`ProtocolClient`].

#![allow(async_fn_in_trait)]

use std::fmt;

use layer_session::{AuthKey, SecretChatRecord};

use crate::errors::InvocationError;

// ─── VerificationHandle ───────────────────────────────────────────────────────

/// Opaque challenge returned by [`ProtocolClient::send_code`].
///
/// Pass it back to the verification calls together with the code the user typed.
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationHandle {
    pub(crate) phone:           String,
    pub(crate) phone_code_hash: String,
}

impl VerificationHandle {
    pub fn new(phone: impl Into<String>, phone_code_hash: impl Into<String>) -> Self {
        Self { phone: phone.into(), phone_code_hash: phone_code_hash.into() }
    }

    pub fn phone(&self) -> &str { &self.phone }

    pub fn phone_code_hash(&self) -> &str { &self.phone_code_hash }
}

impl fmt::Debug for VerificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerificationHandle {{ phone: {:?} }}", self.phone)
    }
}

/// Whether the phone number already belongs to an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountStatus {
    Registered,
    NotRegistered,
}

/// Result of a successful [`ProtocolClient::send_code`].
#[derive(Clone, Debug)]
pub struct SentCode {
    pub handle: VerificationHandle,
    pub status: AccountStatus,
}

/// First name, last name and code entered together on the sign-up path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name:  String,
    pub code:       String,
}

impl RegistrationForm {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, code: impl Into<String>) -> Self {
        Self { first_name: first_name.into(), last_name: last_name.into(), code: code.into() }
    }

    /// All three fields contain something other than whitespace.
    pub fn is_complete(&self) -> bool {
        [&self.first_name, &self.last_name, &self.code].iter().all(|s| !s.trim().is_empty())
    }
}

/// Answer to an incoming secret-chat request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretChatDecision {
    Accept,
    Decline,
}

// ─── Traits ───────────────────────────────────────────────────────────────────

/// The network side: Telegram calls the login flow issues.
pub trait ProtocolClient {
    /// The key the transport layer negotiated with `dc_id`, or `None` while
    /// the handshake is still running. Observed only; the flow never drives
    /// handshakes. The key is copied into the session before a datacenter is
    /// marked signed.
    fn auth_key(&self, dc_id: i32) -> Option<AuthKey>;

    async fn send_code(&self, phone: &str) -> Result<SentCode, InvocationError>;

    /// Sign in. `PHONE_CODE_*` errors mean the code was rejected.
    async fn verify_code(&self, handle: &VerificationHandle, code: &str) -> Result<AccountStatus, InvocationError>;

    /// Finish a sign-in that answered `SESSION_PASSWORD_NEEDED`.
    /// `PASSWORD_HASH_INVALID` means the password was wrong.
    async fn check_password(&self, password: &str) -> Result<(), InvocationError>;

    /// Sign up with a name. `PHONE_CODE_*` errors mean the code was rejected.
    async fn verify_code_with_registration(
        &self,
        handle:     &VerificationHandle,
        first_name: &str,
        last_name:  &str,
        code:       &str,
    ) -> Result<(), InvocationError>;

    /// Export the current authorization to `dc_id` and import it there.
    async fn export_auth(&self, dc_id: i32) -> Result<(), InvocationError>;

    /// Accept a requested secret chat. Returns the record with the negotiated
    /// key, fingerprint and access hash filled in.
    async fn accept_secret_chat(&self, chat: &SecretChatRecord) -> Result<SecretChatRecord, InvocationError>;
}

/// The user side. `None` means the prompt was cancelled.
pub trait Prompt {
    async fn request_code(&self) -> Option<String>;

    async fn request_registration(&self) -> Option<RegistrationForm>;

    /// The two-factor password.
    async fn request_password(&self) -> Option<String>;

    async fn confirm_secret_chat(&self, chat: &SecretChatRecord) -> SecretChatDecision;
}

/// Outgoing notifications to the embedding application.
pub trait Notifier {
    /// Login reached `Ready`.
    fn connection_ready(&self);

    /// A user-visible failure.
    fn report_error(&self, code: i32, message: &str);

    /// Drop the contact-list entry that represented a declined secret chat.
    fn remove_contact(&self, chat_id: i32);
}
