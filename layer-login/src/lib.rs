//! # layer-login
//!
//! Telegram user login and secret-chat acceptance on top of a
//! [`layer_session::SessionContext`].
//!
//! The network, the user interface and application notifications are supplied
//! by the caller through [`ProtocolClient`], [`Prompt`] and [`Notifier`].
//!
//! ```rust,no_run
//! # use layer_login::*;
//! # async fn demo<P: ProtocolClient, U: Prompt, N: Notifier>(client: P, ui: U, app: N)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = layer_session::SessionContext::open(&layer_session::StoreConfig {
//!     root: "accounts/+15550100".into(),
//!     ..Default::default()
//! })?;
//!
//! let mut flow = LoginFlow::new(ctx.clone(), &client, &ui, &app, LoginConfig {
//!     phone: "+15550100".into(),
//!     ..Default::default()
//! });
//! flow.run().await?;
//! ctx.close().await?;
//! # Ok(()) }
//! ```

#![deny(unsafe_code)]

mod capability;
mod errors;
mod login;
pub mod retry;
mod secret_chat;

pub use capability::{
    AccountStatus, Notifier, Prompt, ProtocolClient, RegistrationForm, SecretChatDecision, SentCode,
    VerificationHandle,
};
pub use errors::{InvocationError, LoginFailure, RpcError};
pub use login::{LoginConfig, LoginFlow, LoginState};
pub use retry::{AutoSleep, NoRetries, RetryContext, RetryPolicy};
pub use secret_chat::SecretChatLifecycle;
