//! Typed load/save of the three session resources.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{FileBackend, ResourceKind, SessionBackend};
use crate::bootstrap::DcEnvironment;
use crate::codec;
use crate::errors::{CodecError, StoreError};
use crate::records::{CredentialTable, SecretChatRecord, SyncCursor};

// ─── StoreConfig ─────────────────────────────────────────────────────────────

/// Configuration for [`SessionStore::open`] and [`crate::SessionContext::open`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Per-account content root.
    pub root:        PathBuf,
    /// Which bootstrap datacenter list to fall back to.
    pub environment: DcEnvironment,
    /// How long a scheduled checkpoint waits before writing (default: next tick).
    pub save_delay:  Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root:        PathBuf::from("layer-session"),
            environment: DcEnvironment::Production,
            save_delay:  Duration::ZERO,
        }
    }
}

// ─── SessionState ────────────────────────────────────────────────────────────

/// Everything a session restores at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub cursor:       SyncCursor,
    pub credentials:  CredentialTable,
    /// Secret chats keyed by chat id, pending ones included.
    pub secret_chats: BTreeMap<i32, SecretChatRecord>,
}

impl SessionState {
    /// Chats whose keys are established.
    pub fn established_chats(&self) -> impl Iterator<Item = &SecretChatRecord> {
        self.secret_chats.values().filter(|c| c.is_established())
    }
}

// ─── SessionStore ────────────────────────────────────────────────────────────

/// Maps a backend's three resources to typed session state.
///
/// Reads never fail: a missing, unreadable or corrupt resource yields the
/// default for that part of the state. Writes report I/O errors to the caller.
#[derive(Clone)]
pub struct SessionStore {
    backend:     Arc<dyn SessionBackend>,
    environment: DcEnvironment,
}

impl SessionStore {
    /// Open the on-disk content root described by `config`.
    pub fn open(config: &StoreConfig) -> io::Result<Self> {
        let backend = FileBackend::open(&config.root)?;
        Ok(Self::with_backend(Arc::new(backend), config.environment))
    }

    pub fn with_backend(backend: Arc<dyn SessionBackend>, environment: DcEnvironment) -> Self {
        Self { backend, environment }
    }

    pub fn backend_name(&self) -> &str { self.backend.name() }

    pub fn environment(&self) -> DcEnvironment { self.environment }

    /// Load cursor, credentials and secret chats.
    ///
    /// Without a readable credential file the bootstrap datacenter table of the
    /// configured environment is used.
    pub fn load_all(&self) -> SessionState {
        let credentials = self.load_credentials().unwrap_or_else(|| {
            tracing::info!("[layer-session] No stored credentials, using {:?} bootstrap DCs", self.environment);
            CredentialTable::bootstrap(self.environment)
        });
        let state = SessionState {
            cursor:       self.load_cursor().unwrap_or_default(),
            credentials,
            secret_chats: self.load_secret_chats().into_iter().map(|c| (c.id, c)).collect(),
        };
        tracing::debug!(
            "[layer-session] Loaded session via {} backend (working DC{}, {} DCs, {} secret chats)",
            self.backend.name(),
            state.credentials.working_dc,
            state.credentials.dcs.len(),
            state.secret_chats.len(),
        );
        state
    }

    pub fn load_cursor(&self) -> Option<SyncCursor> {
        self.read_resource(ResourceKind::Cursor, codec::decode_cursor)
    }

    pub fn load_credentials(&self) -> Option<CredentialTable> {
        self.read_resource(ResourceKind::Credentials, codec::decode_credentials)
    }

    pub fn load_secret_chats(&self) -> Vec<SecretChatRecord> {
        self.read_resource(ResourceKind::SecretChats, codec::decode_secret_chats)
            .unwrap_or_default()
    }

    pub fn save_cursor(&self, state: &SessionState) -> Result<(), StoreError> {
        self.write_resource(ResourceKind::Cursor, codec::encode_cursor(&state.cursor))
    }

    /// Rewrite the credential file. A table whose working datacenter has no key
    /// is refused with [`StoreError::Codec`] and the previous file stays.
    pub fn save_credentials(&self, state: &SessionState) -> Result<(), StoreError> {
        let bytes = codec::encode_credentials(&state.credentials)?;
        self.write_resource(ResourceKind::Credentials, bytes)
    }

    /// Rewrite the secret-chat file; only established chats are kept.
    pub fn save_secret_chats(&self, state: &SessionState) -> Result<(), StoreError> {
        self.write_resource(
            ResourceKind::SecretChats,
            codec::encode_secret_chats(state.secret_chats.values()),
        )
    }

    /// Remove every resource (sign-out / reset).
    pub fn wipe(&self) -> Result<(), StoreError> {
        for kind in ResourceKind::ALL {
            self.backend.delete(kind)?;
        }
        tracing::info!("[layer-session] Session wiped");
        Ok(())
    }

    fn read_resource<T>(
        &self,
        kind:   ResourceKind,
        decode: fn(&[u8]) -> Result<T, CodecError>,
    ) -> Option<T> {
        let bytes = match self.backend.read(kind) {
            Ok(Some(b)) => b,
            Ok(None) => {
                tracing::debug!("[layer-session] {} absent", kind.file_name());
                return None;
            }
            Err(e) => {
                tracing::warn!("[layer-session] Reading {} failed ({e}), treating as absent", kind.file_name());
                return None;
            }
        };
        match decode(&bytes) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("[layer-session] Discarding corrupt {} ({e})", kind.file_name());
                None
            }
        }
    }

    fn write_resource(&self, kind: ResourceKind, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.backend.write(kind, &bytes)?;
        tracing::debug!("[layer-session] Wrote {} ({} bytes)", kind.file_name(), bytes.len());
        Ok(())
    }
}
