//! The login state machine.
//!
//! ```text
//! Init → AwaitingAllDcAuth → SendingCode ─┬→ AwaitingCode ──────────┬→ ExportingAuth(n) … → Ready
//!                                 ▲        │    │  │ 2FA enabled     │
//!                                 │        │    │  └→ AwaitingPassword ┤ ↺ wrong password
//!                                 └────────┼────┘ code rejected      │
//!                                          └→ AwaitingNameAndCode ───┘
//!                                               ↺ rejected or blank
//! any step → Failed(reason)
//! ```
//!
//! A rejected simple code asks the server for a fresh one; a rejected
//! registration re-prompts the same form with the existing challenge.
//!
//! A datacenter only becomes signed once the key the transport negotiated
//! with it has been copied into the session, so the credential file written
//! at the end always reloads.

use std::sync::Arc;
use std::time::Duration;

use layer_session::SessionContext;
use tokio::time::{self, Instant};

use crate::capability::{AccountStatus, Notifier, ProtocolClient, Prompt, VerificationHandle};
use crate::errors::{InvocationError, LoginFailure};
use crate::retry::{AutoSleep, RetryPolicy, with_retries};

// ─── LoginConfig ──────────────────────────────────────────────────────────────

/// Configuration for a [`LoginFlow`].
#[derive(Clone)]
pub struct LoginConfig {
    /// The account identifier codes are sent to.
    pub phone:             String,
    /// How often datacenter authorization is re-checked.
    pub poll_interval:     Duration,
    /// Give up waiting for datacenter handshakes after this long. `None` waits forever.
    pub dc_auth_timeout:   Option<Duration>,
    /// Rejected codes tolerated before failing with [`LoginFailure::RetriesExhausted`].
    pub max_code_attempts: u32,
    /// Applied to every network step before its failure is classified.
    pub retry_policy:      Arc<dyn RetryPolicy>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            phone:             String::new(),
            poll_interval:     Duration::from_millis(100),
            dc_auth_timeout:   None,
            max_code_attempts: 5,
            retry_policy:      Arc::new(AutoSleep::default()),
        }
    }
}

// ─── LoginState ───────────────────────────────────────────────────────────────

/// Where a [`LoginFlow`] is. Never persisted; rebuilt from the credential
/// table on every run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginState {
    Init,
    AwaitingAllDcAuth,
    SendingCode,
    AwaitingCode,
    AwaitingNameAndCode,
    /// Sign-in needs the two-factor password.
    AwaitingPassword,
    /// Export to the first unsigned datacenter with id `>=` this one.
    ExportingAuth(i32),
    Ready,
    Failed(LoginFailure),
}

impl LoginState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }
}

// ─── LoginFlow ────────────────────────────────────────────────────────────────

/// Drives one login attempt from a loaded session to `Ready` or `Failed`.
///
/// One step runs at a time and each step issues at most one network call.
pub struct LoginFlow<'a, P, U, N> {
    ctx:           SessionContext,
    client:        &'a P,
    prompt:        &'a U,
    notifier:      &'a N,
    config:        LoginConfig,
    state:         LoginState,
    handle:        Option<VerificationHandle>,
    working_dc:    i32,
    code_attempts: u32,
}

impl<'a, P, U, N> LoginFlow<'a, P, U, N>
where
    P: ProtocolClient,
    U: Prompt,
    N: Notifier,
{
    pub fn new(ctx: SessionContext, client: &'a P, prompt: &'a U, notifier: &'a N, config: LoginConfig) -> Self {
        Self {
            ctx,
            client,
            prompt,
            notifier,
            config,
            state: LoginState::Init,
            handle: None,
            working_dc: 0,
            code_attempts: 0,
        }
    }

    pub fn state(&self) -> &LoginState { &self.state }

    /// Rejected codes so far.
    pub fn code_attempts(&self) -> u32 { self.code_attempts }

    /// Step until a terminal state, then notify the embedding application.
    pub async fn run(&mut self) -> Result<(), LoginFailure> {
        while !self.state.is_terminal() {
            self.step().await;
        }
        match &self.state {
            LoginState::Failed(failure) => {
                let (code, message) = failure.report();
                tracing::warn!("[layer-login] Login failed: {failure}");
                self.notifier.report_error(code, &message);
                Err(failure.clone())
            }
            _ => {
                tracing::info!("[layer-login] Ready (working DC{})", self.working_dc);
                self.notifier.connection_ready();
                Ok(())
            }
        }
    }

    /// Perform a single transition. Does nothing in a terminal state.
    pub async fn step(&mut self) {
        let next = match self.state.clone() {
            LoginState::Init                => self.init().await,
            LoginState::AwaitingAllDcAuth   => self.await_dc_auth().await,
            LoginState::SendingCode         => self.send_code().await,
            LoginState::AwaitingCode        => self.await_code().await,
            LoginState::AwaitingNameAndCode => self.await_registration().await,
            LoginState::AwaitingPassword    => self.await_password().await,
            LoginState::ExportingAuth(from) => self.export_next(from).await,
            terminal                        => terminal,
        };
        if next != self.state {
            tracing::debug!("[layer-login] {:?} → {:?}", self.state, next);
        }
        self.state = next;
    }

    async fn init(&mut self) -> LoginState {
        self.working_dc = self.ctx.state().await.credentials.working_dc;
        LoginState::AwaitingAllDcAuth
    }

    async fn all_dcs_ready(&self) -> bool {
        let state = self.ctx.state().await;
        state.credentials.dcs.values().all(|dc| dc.signed || self.client.auth_key(dc.id).is_some())
    }

    async fn await_dc_auth(&self) -> LoginState {
        if self.all_dcs_ready().await {
            return LoginState::SendingCode;
        }
        tracing::debug!("[layer-login] Waiting for datacenter handshakes");

        let period = self.config.poll_interval.max(Duration::from_millis(1));
        let poll = async {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if self.all_dcs_ready().await {
                    break;
                }
            }
        };
        match self.config.dc_auth_timeout {
            None => {
                poll.await;
                LoginState::SendingCode
            }
            Some(limit) => match time::timeout(limit, poll).await {
                Ok(())  => LoginState::SendingCode,
                Err(_)  => LoginState::Failed(LoginFailure::DcAuthTimeout),
            },
        }
    }

    async fn send_code(&mut self) -> LoginState {
        let working_signed = {
            let state = self.ctx.state().await;
            state.credentials.get(self.working_dc).is_some_and(|dc| dc.signed)
        };
        if working_signed {
            tracing::debug!("[layer-login] DC{} already signed, skipping code", self.working_dc);
            return LoginState::ExportingAuth(0);
        }

        let client = self.client;
        let phone  = self.config.phone.as_str();
        match with_retries(self.config.retry_policy.as_ref(), || client.send_code(phone)).await {
            Ok(sent) => {
                tracing::info!("[layer-login] Login code sent");
                self.handle = Some(sent.handle);
                match sent.status {
                    AccountStatus::Registered    => LoginState::AwaitingCode,
                    AccountStatus::NotRegistered => LoginState::AwaitingNameAndCode,
                }
            }
            Err(e) if e.is("PHONE_NUMBER_*") => LoginState::Failed(LoginFailure::InvalidPhoneNumber),
            Err(e) => LoginState::Failed(e.into()),
        }
    }

    async fn await_code(&mut self) -> LoginState {
        let Some(handle) = self.handle.clone() else {
            return LoginState::SendingCode;
        };
        let Some(code) = self.prompt.request_code().await else {
            return LoginState::Failed(LoginFailure::Cancelled);
        };
        let code   = code.trim();
        let client = self.client;
        match with_retries(self.config.retry_policy.as_ref(), || client.verify_code(&handle, code)).await {
            Ok(AccountStatus::Registered) => self.verified().await,
            Ok(AccountStatus::NotRegistered) => LoginState::AwaitingNameAndCode,
            Err(e) if e.is("SESSION_PASSWORD_NEEDED") => {
                tracing::info!("[layer-login] Two-factor password required");
                LoginState::AwaitingPassword
            }
            Err(e) if is_code_rejection(&e) => self.rejected(LoginState::SendingCode, &e),
            Err(e) => LoginState::Failed(e.into()),
        }
    }

    async fn await_registration(&mut self) -> LoginState {
        let Some(handle) = self.handle.clone() else {
            return LoginState::SendingCode;
        };
        let Some(form) = self.prompt.request_registration().await else {
            return LoginState::Failed(LoginFailure::Cancelled);
        };
        if !form.is_complete() {
            tracing::debug!("[layer-login] Incomplete registration form, asking again");
            return LoginState::AwaitingNameAndCode;
        }

        let client = self.client;
        let result = with_retries(self.config.retry_policy.as_ref(), || {
            client.verify_code_with_registration(
                &handle,
                form.first_name.trim(),
                form.last_name.trim(),
                form.code.trim(),
            )
        })
        .await;
        match result {
            Ok(()) => self.verified().await,
            Err(e) if is_code_rejection(&e) => self.rejected(LoginState::AwaitingNameAndCode, &e),
            Err(e) => LoginState::Failed(e.into()),
        }
    }

    async fn await_password(&mut self) -> LoginState {
        let Some(password) = self.prompt.request_password().await else {
            return LoginState::Failed(LoginFailure::Cancelled);
        };
        let client = self.client;
        match with_retries(self.config.retry_policy.as_ref(), || client.check_password(&password)).await {
            Ok(()) => self.verified().await,
            Err(e) if e.is("PASSWORD_HASH_INVALID") => self.rejected(LoginState::AwaitingPassword, &e),
            Err(e) => LoginState::Failed(e.into()),
        }
    }

    async fn verified(&mut self) -> LoginState {
        tracing::info!("[layer-login] Signed in on DC{}", self.working_dc);
        self.handle = None;
        if !self.sign(self.working_dc).await {
            return LoginState::Failed(LoginFailure::MissingAuthKey { dc_id: self.working_dc });
        }
        self.ctx.schedule_save();
        LoginState::ExportingAuth(0)
    }

    /// Copy the transport's key for `dc_id` into the session and mark it
    /// signed. `false` if no key is known for it.
    async fn sign(&self, dc_id: i32) -> bool {
        let mut state = self.ctx.state().await;
        let table = &mut state.credentials;
        if let (Some(key), Some(dc)) = (self.client.auth_key(dc_id), table.get_mut(dc_id)) {
            if dc.auth_key.as_ref() != Some(&key) {
                dc.set_auth_key(key);
            }
        }
        table.mark_signed(dc_id)
    }

    fn rejected(&mut self, retry: LoginState, error: &InvocationError) -> LoginState {
        self.code_attempts += 1;
        tracing::info!(
            "[layer-login] Code rejected ({error}), attempt {}/{}",
            self.code_attempts, self.config.max_code_attempts
        );
        if self.code_attempts >= self.config.max_code_attempts {
            LoginState::Failed(LoginFailure::RetriesExhausted)
        } else {
            retry
        }
    }

    async fn export_next(&mut self, from: i32) -> LoginState {
        let next = self.ctx.state().await.credentials.first_unsigned(from);
        let Some(dc_id) = next else {
            if let Err(e) = self.ctx.save_credentials_now().await {
                tracing::warn!("[layer-login] Saving credentials failed: {e}");
            }
            return LoginState::Ready;
        };

        let client = self.client;
        match with_retries(self.config.retry_policy.as_ref(), || client.export_auth(dc_id)).await {
            Ok(()) => {
                tracing::debug!("[layer-login] Authorization exported to DC{dc_id}");
                if !self.sign(dc_id).await {
                    return LoginState::Failed(LoginFailure::MissingAuthKey { dc_id });
                }
                self.ctx.schedule_save();
                LoginState::ExportingAuth(dc_id + 1)
            }
            Err(e) => {
                tracing::warn!("[layer-login] Export to DC{dc_id} failed: {e}");
                LoginState::Failed(LoginFailure::ExportFailed { dc_id })
            }
        }
    }
}

fn is_code_rejection(e: &InvocationError) -> bool {
    e.is("PHONE_CODE_*")
}
