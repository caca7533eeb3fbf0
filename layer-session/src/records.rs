//! Plain session records: sync cursor, datacenter credentials, secret chats.

use std::collections::BTreeMap;
use std::fmt;

use sha1::{Digest, Sha1};

use crate::bootstrap::{self, DcEnvironment};

/// SHA-1 of `data`.
pub(crate) fn sha1(data: &[u8]) -> [u8; 20] {
    let mut h = Sha1::new();
    h.update(data);
    h.finalize().into()
}

// ─── SyncCursor ──────────────────────────────────────────────────────────────

/// Position in the server's update stream that was last durably acknowledged.
///
/// Always written as a whole; there is no partial update on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncCursor {
    /// Combined updates (protocol) sequence.
    pub seq:  u32,
    /// Main sequence counter (messages, channels).
    pub pts:  u32,
    /// Secondary counter for secret chats.
    pub qts:  u32,
    /// Date of the last known update (Unix timestamp).
    pub date: u32,
}

// ─── AuthKey ─────────────────────────────────────────────────────────────────

/// A 256-byte datacenter authorization key.
///
/// `Debug` prints the key id only.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey([u8; 256]);

impl AuthKey {
    pub const LEN: usize = 256;

    pub fn from_bytes(data: [u8; 256]) -> Self { Self(data) }

    pub fn as_bytes(&self) -> &[u8; 256] { &self.0 }

    /// The key identifier: SHA-1(key)[12..20] read as little-endian `i64`.
    pub fn key_id(&self) -> i64 {
        let sha = sha1(&self.0);
        let mut id = [0u8; 8];
        id.copy_from_slice(&sha[12..20]);
        i64::from_le_bytes(id)
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey(id={:#018x})", self.key_id())
    }
}

// ─── DatacenterCredential ────────────────────────────────────────────────────

/// Address and (optionally) negotiated key for one datacenter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatacenterCredential {
    pub id:          i32,
    pub ip:          String,
    pub port:        u16,
    pub auth_key_id: i64,
    /// `None` until the transport layer has negotiated a key.
    pub auth_key:    Option<AuthKey>,
    /// The key was confirmed by an explicit export/authorization round-trip.
    pub signed:      bool,
}

impl DatacenterCredential {
    /// A known address with no key yet.
    pub fn new(id: i32, ip: impl Into<String>, port: u16) -> Self {
        Self { id, ip: ip.into(), port, auth_key_id: 0, auth_key: None, signed: false }
    }

    /// `ip:port`
    pub fn addr(&self) -> String { format!("{}:{}", self.ip, self.port) }

    /// Install a freshly negotiated key. The credential is unsigned until the
    /// next export succeeds.
    pub fn set_auth_key(&mut self, key: AuthKey) {
        self.auth_key_id = key.key_id();
        self.auth_key    = Some(key);
        self.signed      = false;
    }
}

// ─── CredentialTable ─────────────────────────────────────────────────────────

/// All known datacenters keyed by id, plus the working id and our own user id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialTable {
    pub working_dc: i32,
    pub dcs:        BTreeMap<i32, DatacenterCredential>,
    /// The logged-in account's user id, once known.
    pub our_id:     Option<i32>,
}

impl CredentialTable {
    /// The hardcoded datacenter list for `environment`, nothing signed.
    pub fn bootstrap(environment: DcEnvironment) -> Self {
        let dcs = bootstrap::default_dcs(environment)
            .iter()
            .map(|&(id, ip)| (id, DatacenterCredential::new(id, ip, bootstrap::DEFAULT_PORT)))
            .collect();
        Self { working_dc: bootstrap::default_working_dc(environment), dcs, our_id: None }
    }

    /// Highest datacenter id present (0 when empty).
    pub fn max_index(&self) -> i32 {
        self.dcs.keys().next_back().copied().unwrap_or(0)
    }

    pub fn get(&self, id: i32) -> Option<&DatacenterCredential> { self.dcs.get(&id) }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut DatacenterCredential> { self.dcs.get_mut(&id) }

    pub fn insert(&mut self, dc: DatacenterCredential) {
        self.dcs.insert(dc.id, dc);
    }

    pub fn working(&self) -> Option<&DatacenterCredential> { self.get(self.working_dc) }

    /// Mark `id` signed. Returns `false` if the slot is unknown or holds no
    /// key, in which case nothing changes.
    pub fn mark_signed(&mut self, id: i32) -> bool {
        match self.dcs.get_mut(&id) {
            Some(dc) if dc.auth_key.is_some() => { dc.signed = true; true }
            _ => false,
        }
    }

    /// The lowest id `>= from` whose credential is not signed yet.
    pub fn first_unsigned(&self, from: i32) -> Option<i32> {
        self.dcs.range(from..).find(|(_, dc)| !dc.signed).map(|(&id, _)| id)
    }

    pub fn all_signed(&self) -> bool {
        self.dcs.values().all(|dc| dc.signed)
    }
}

// ─── Secret chats ────────────────────────────────────────────────────────────

/// A 256-byte end-to-end key of a secret chat. `Debug` prints the digest prefix only.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; 256]);

impl SecretKey {
    pub fn from_bytes(data: [u8; 256]) -> Self { Self(data) }

    pub fn as_bytes(&self) -> &[u8; 256] { &self.0 }

    /// SHA-1 of the key, used as the visual fingerprint source.
    pub fn digest(&self) -> [u8; 20] { sha1(&self.0) }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.digest();
        write!(f, "SecretKey({:02x}{:02x}{:02x}{:02x}…)", d[0], d[1], d[2], d[3])
    }
}

/// Lifecycle state of a secret chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretChatState {
    /// Requested or waiting for the other side; never persisted.
    Pending,
    /// Keys exchanged; the only state that survives a rewrite.
    Ok,
    /// Closed by either side.
    Deleted,
}

impl SecretChatState {
    /// The on-disk integer.
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Pending => 1,
            Self::Ok      => 3,
            Self::Deleted => 4,
        }
    }

    /// Inverse of [`Self::to_raw`]; `0` and `2` (none/request) also read as pending.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0..=2 => Some(Self::Pending),
            3     => Some(Self::Ok),
            4     => Some(Self::Deleted),
            _     => None,
        }
    }
}

/// One end-to-end encrypted chat with its key material and sequence counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretChatRecord {
    pub id:              i32,
    pub display_name:    String,
    pub user_id:         i32,
    pub admin_id:        i32,
    /// Creation time (Unix timestamp).
    pub created_at:      u32,
    pub ttl:             u32,
    pub protocol_layer:  u32,
    pub access_hash:     i64,
    pub state:           SecretChatState,
    pub key_fingerprint: i64,
    pub key:             SecretKey,
    pub key_digest:      [u8; 20],
    pub in_seq:          i32,
    pub last_in_seq:     i32,
    pub out_seq:         i32,
}

impl SecretChatRecord {
    /// A freshly requested chat: no key yet, counters at zero.
    pub fn pending(id: i32, display_name: impl Into<String>, user_id: i32, admin_id: i32) -> Self {
        let key = SecretKey::from_bytes([0u8; 256]);
        Self {
            id,
            display_name:    display_name.into(),
            user_id,
            admin_id,
            created_at:      0,
            ttl:             0,
            protocol_layer:  0,
            access_hash:     0,
            state:           SecretChatState::Pending,
            key_fingerprint: 0,
            key_digest:      key.digest(),
            key,
            in_seq:          0,
            last_in_seq:     0,
            out_seq:         0,
        }
    }

    pub fn is_established(&self) -> bool { self.state == SecretChatState::Ok }
}
