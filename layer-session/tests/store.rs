use std::fs;
use std::sync::Arc;

use layer_session::{
    AuthKey, DcEnvironment, InMemoryBackend, ResourceKind, SecretChatRecord, SecretChatState,
    SecretKey, SessionState, SessionStore, StoreConfig, SyncCursor, codec,
};

fn open(dir: &tempfile::TempDir, environment: DcEnvironment) -> SessionStore {
    SessionStore::open(&StoreConfig {
        root: dir.path().join("account"),
        environment,
        ..Default::default()
    })
    .unwrap()
}

fn established(id: i32) -> SecretChatRecord {
    let key = SecretKey::from_bytes([id as u8; 256]);
    SecretChatRecord {
        state: SecretChatState::Ok,
        key_fingerprint: 0x55,
        key_digest: key.digest(),
        key,
        in_seq: 4,
        last_in_seq: 3,
        out_seq: 8,
        ..SecretChatRecord::pending(id, format!("chat {id}"), 100 + id, 1)
    }
}

fn signed_state(environment: DcEnvironment) -> SessionState {
    let mut state = SessionState {
        credentials: layer_session::CredentialTable::bootstrap(environment),
        ..Default::default()
    };
    for (id, dc) in state.credentials.dcs.iter_mut() {
        dc.set_auth_key(AuthKey::from_bytes([*id as u8; 256]));
        dc.signed = true;
    }
    state.credentials.our_id = Some(4242);
    state
}

#[test]
fn fresh_root_loads_production_bootstrap() {
    let dir   = tempfile::tempdir().unwrap();
    let store = open(&dir, DcEnvironment::Production);
    assert!(dir.path().join("account/downloads").is_dir());

    let state = store.load_all();
    assert_eq!(state.cursor, SyncCursor::default());
    assert!(state.secret_chats.is_empty());

    let t = &state.credentials;
    assert_eq!(t.working_dc, 2);
    assert_eq!(t.dcs.keys().copied().collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    assert_eq!(t.get(1).unwrap().addr(), "149.154.175.50:443");
    assert_eq!(t.get(5).unwrap().addr(), "149.154.171.5:443");
    assert!(t.dcs.values().all(|dc| !dc.signed && dc.auth_key.is_none()));
}

#[test]
fn fresh_root_loads_test_bootstrap() {
    let dir   = tempfile::tempdir().unwrap();
    let state = open(&dir, DcEnvironment::Test).load_all();
    let t = &state.credentials;
    assert_eq!(t.working_dc, 2);
    assert_eq!(t.dcs.keys().copied().collect::<Vec<_>>(), [1, 2, 3]);
    assert_eq!(t.get(2).unwrap().ip, "149.154.167.40");
}

#[test]
fn full_save_and_reload() {
    let dir   = tempfile::tempdir().unwrap();
    let store = open(&dir, DcEnvironment::Production);

    let mut state = signed_state(DcEnvironment::Production);
    state.cursor = SyncCursor { seq: 10, pts: 20, qts: 30, date: 40 };
    for chat in [established(1), established(2)] {
        state.secret_chats.insert(chat.id, chat);
    }

    store.save_cursor(&state).unwrap();
    store.save_credentials(&state).unwrap();
    store.save_secret_chats(&state).unwrap();

    let reopened = open(&dir, DcEnvironment::Production).load_all();
    assert_eq!(reopened, state);
}

#[test]
fn save_credentials_is_idempotent() {
    let dir   = tempfile::tempdir().unwrap();
    let store = open(&dir, DcEnvironment::Production);
    let state = signed_state(DcEnvironment::Production);
    let path  = dir.path().join("account/auth");

    store.save_credentials(&state).unwrap();
    let first = fs::read(&path).unwrap();
    store.save_credentials(&state).unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);
}

#[test]
fn pending_and_deleted_chats_are_dropped_on_rewrite() {
    let dir   = tempfile::tempdir().unwrap();
    let store = open(&dir, DcEnvironment::Production);

    let mut state = SessionState::default();
    let mut pending = established(1);
    pending.state = SecretChatState::Pending;
    let mut deleted = established(3);
    deleted.state = SecretChatState::Deleted;
    for chat in [pending, established(2), deleted, established(4)] {
        state.secret_chats.insert(chat.id, chat);
    }
    store.save_secret_chats(&state).unwrap();

    let bytes = fs::read(dir.path().join("account/secret")).unwrap();
    assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
    let reloaded = store.load_secret_chats();
    assert_eq!(reloaded.iter().map(|c| c.id).collect::<Vec<_>>(), [2, 4]);
}

#[test]
fn corrupt_files_read_as_absent() {
    let dir   = tempfile::tempdir().unwrap();
    let store = open(&dir, DcEnvironment::Test);

    let mut state = signed_state(DcEnvironment::Production);
    state.cursor.pts = 99;
    state.secret_chats.insert(1, established(1));
    store.save_cursor(&state).unwrap();
    store.save_credentials(&state).unwrap();
    store.save_secret_chats(&state).unwrap();

    for name in ["state", "auth", "secret"] {
        let path  = dir.path().join("account").join(name);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    }

    let loaded = store.load_all();
    assert_eq!(loaded.cursor, SyncCursor::default());
    assert!(loaded.secret_chats.is_empty());
    // falls back to the configured (test) environment, not what was on disk
    assert_eq!(loaded.credentials, layer_session::CredentialTable::bootstrap(DcEnvironment::Test));
}

#[test]
fn foreign_file_in_place_of_credentials() {
    let backend = InMemoryBackend::new()
        .with_resource(ResourceKind::Credentials, codec::encode_cursor(&SyncCursor::default()))
        .with_resource(ResourceKind::Cursor, b"garbage".to_vec());
    let store = SessionStore::with_backend(Arc::new(backend), DcEnvironment::Production);
    let state = store.load_all();
    assert_eq!(state.credentials.dcs.len(), 5);
    assert_eq!(state.cursor, SyncCursor::default());
}

#[test]
fn wipe_removes_everything() {
    let dir   = tempfile::tempdir().unwrap();
    let store = open(&dir, DcEnvironment::Production);
    let state = signed_state(DcEnvironment::Production);
    store.save_cursor(&state).unwrap();
    store.save_credentials(&state).unwrap();

    store.wipe().unwrap();
    assert!(!dir.path().join("account/auth").exists());
    assert!(!dir.path().join("account/state").exists());
    assert_eq!(store.load_credentials(), None);
}
