//! # layer-session
//!
//! Durable Telegram session state, restored across restarts.
//!
//! A session lives in a per-account *content root* holding three files, each
//! with its own magic number and versioned layout:
//!
//! | File     | Contents                                                     |
//! |----------|--------------------------------------------------------------|
//! | `state`  | [`SyncCursor`] — last acknowledged pts / qts / seq / date     |
//! | `auth`   | [`CredentialTable`] — per-DC address, auth key, working DC    |
//! | `secret` | [`SecretChatRecord`]s — keys and sequence counters            |
//!
//! [`codec`] converts between these records and bytes; [`SessionStore`] maps
//! them onto a [`SessionBackend`]; [`SessionContext`] holds the live state of
//! one connection and coalesces bursts of mutations into a single write.
//!
//! Corrupt or foreign files are never fatal: they read as absent, and a
//! missing credential file falls back to the built-in datacenter list.

#![deny(unsafe_code)]

pub mod backend;
pub mod bootstrap;
pub mod codec;
mod context;
mod errors;
mod records;
mod store;
mod wire;

pub use backend::{FileBackend, InMemoryBackend, ResourceKind, SessionBackend};
pub use bootstrap::DcEnvironment;
pub use context::SessionContext;
pub use errors::{CodecError, StoreError};
pub use records::{
    AuthKey, CredentialTable, DatacenterCredential, SecretChatRecord, SecretChatState, SecretKey,
    SyncCursor,
};
pub use store::{SessionState, SessionStore, StoreConfig};
