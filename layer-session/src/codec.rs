//! Binary codec for the three session files.
//!
//! | File     | Layout                                                               |
//! |----------|----------------------------------------------------------------------|
//! | `state`  | magic, version (0), pts, qts, seq, date                              |
//! | `auth`   | magic, max index, working id, per-slot records, own user id          |
//! | `secret` | magic, version (2), record count, per-chat records                   |
//!
//! All integers are little-endian `i32` unless noted. Decoding never panics;
//! anything malformed comes back as a [`CodecError`].

use crate::errors::CodecError;
use crate::records::{
    sha1, AuthKey, CredentialTable, DatacenterCredential, SecretChatRecord, SecretChatState,
    SecretKey, SyncCursor,
};
use crate::wire::{Reader, Writer};

/// Magic of the `state` file.
pub const CURSOR_MAGIC: u32 = 0x2894_9a93;
/// Magic of the `auth` file.
pub const CREDENTIALS_MAGIC: u32 = 0x868a_a81d;
/// Magic of the `secret` file.
pub const SECRET_CHATS_MAGIC: u32 = 0x37a1_988a;

/// Version written into the `state` file.
pub const CURSOR_VERSION: i32 = 0;
/// Version written into the `secret` file; 0 and 1 are still readable.
pub const SECRET_CHATS_VERSION: i32 = 2;

const MAX_DC_INDEX: i32 = 1000;
const MAX_IP_LEN: i32 = 100;
const MAX_NAME_LEN: i32 = 1000;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Encode the sync cursor (24 bytes including the header).
pub fn encode_cursor(cursor: &SyncCursor) -> Vec<u8> {
    let mut w = Writer::new();
    w.put_u32(CURSOR_MAGIC);
    w.put_i32(CURSOR_VERSION);
    w.put_u32(cursor.pts);
    w.put_u32(cursor.qts);
    w.put_u32(cursor.seq);
    w.put_u32(cursor.date);
    w.into_bytes()
}

pub fn decode_cursor(bytes: &[u8]) -> Result<SyncCursor, CodecError> {
    let mut r = Reader::from_slice(bytes);
    r.expect_magic(CURSOR_MAGIC)?;
    let version = r.read_i32()?;
    if version < 0 {
        return Err(CodecError::OutOfRange { field: "cursor version", value: version.into() });
    }
    let pts  = r.read_u32()?;
    let qts  = r.read_u32()?;
    let seq  = r.read_u32()?;
    let date = r.read_u32()?;
    Ok(SyncCursor { seq, pts, qts, date })
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Encode the datacenter table.
///
/// Only slots holding a key are written as present; a keyless slot is
/// indistinguishable from an unknown one on disk. Tables the decoder would
/// reject are refused: the working datacenter must hold a key, ids must be
/// below 1000 and addresses shorter than 100 bytes.
pub fn encode_credentials(table: &CredentialTable) -> Result<Vec<u8>, CodecError> {
    let max = table.max_index();
    if max >= MAX_DC_INDEX {
        return Err(CodecError::OutOfRange { field: "max dc index", value: max.into() });
    }
    if table.working().and_then(|dc| dc.auth_key.as_ref()).is_none() {
        return Err(CodecError::OutOfRange { field: "working dc", value: table.working_dc.into() });
    }

    let mut w = Writer::new();
    w.put_u32(CREDENTIALS_MAGIC);
    w.put_i32(max);
    w.put_i32(table.working_dc);

    for id in 0..=max {
        let slot = table.get(id).and_then(|dc| dc.auth_key.as_ref().map(|key| (dc, key)));
        match slot {
            None => w.put_i32(0),
            Some((dc, key)) => {
                if dc.ip.len() >= MAX_IP_LEN as usize {
                    return Err(CodecError::OutOfRange { field: "ip length", value: dc.ip.len() as i64 });
                }
                w.put_i32(1);
                w.put_i32(dc.port.into());
                w.put_string(&dc.ip);
                w.put_i64(dc.auth_key_id);
                w.put_bytes(key.as_bytes());
            }
        }
    }

    w.put_i32(table.our_id.unwrap_or(0));
    Ok(w.into_bytes())
}

/// Decode the datacenter table. Every slot read back is marked signed: the
/// file is only written once all exports have completed.
pub fn decode_credentials(bytes: &[u8]) -> Result<CredentialTable, CodecError> {
    let mut r = Reader::from_slice(bytes);
    r.expect_magic(CREDENTIALS_MAGIC)?;

    let max = r.read_i32()?;
    if !(1..MAX_DC_INDEX).contains(&max) {
        return Err(CodecError::OutOfRange { field: "max dc index", value: max.into() });
    }
    let working_dc = r.read_i32()?;

    let mut table = CredentialTable { working_dc, ..CredentialTable::default() };
    for id in 0..=max {
        if r.read_i32()? == 0 {
            continue;
        }
        let port = r.read_i32()?;
        let port = u16::try_from(port)
            .map_err(|_| CodecError::OutOfRange { field: "port", value: port.into() })?;
        let ip          = r.read_string("ip length", MAX_IP_LEN)?;
        let auth_key_id = r.read_i64()?;
        let auth_key    = AuthKey::from_bytes(r.read_array::<256>()?);
        table.insert(DatacenterCredential {
            id,
            ip,
            port,
            auth_key_id,
            auth_key: Some(auth_key),
            signed: true,
        });
    }

    if table.working().is_none() {
        return Err(CodecError::OutOfRange { field: "working dc", value: working_dc.into() });
    }

    // Older files end right after the slots.
    table.our_id = match r.remaining() {
        0 => None,
        _ => Some(r.read_i32()?).filter(|&id| id != 0),
    };
    Ok(table)
}

// ─── Secret chats ────────────────────────────────────────────────────────────

/// Encode every established chat in `records`; pending and deleted ones are
/// skipped. The record count sits in the header and is patched once the body
/// is written.
pub fn encode_secret_chats<'a, I>(records: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a SecretChatRecord>,
{
    let mut w = Writer::new();
    w.put_u32(SECRET_CHATS_MAGIC);
    w.put_i32(SECRET_CHATS_VERSION);
    let count_at = w.offset();
    w.put_i32(0);

    let mut count = 0i32;
    for chat in records.into_iter().filter(|c| c.state == SecretChatState::Ok) {
        write_secret_chat(&mut w, chat);
        count += 1;
    }

    w.patch_i32(count_at, count);
    w.into_bytes()
}

fn write_secret_chat(w: &mut Writer, chat: &SecretChatRecord) {
    w.put_i32(chat.id);
    w.put_string(clamp_name(&chat.display_name));
    w.put_i32(chat.user_id);
    w.put_i32(chat.admin_id);
    w.put_u32(chat.created_at);
    w.put_u32(chat.ttl);
    w.put_u32(chat.protocol_layer);
    w.put_i64(chat.access_hash);
    w.put_i32(chat.state.to_raw());
    w.put_i64(chat.key_fingerprint);
    w.put_bytes(chat.key.as_bytes());
    w.put_bytes(&chat.key_digest);
    w.put_i32(chat.in_seq);
    w.put_i32(chat.last_in_seq);
    w.put_i32(chat.out_seq);
}

/// Longest prefix of `name` that the decoder will accept, cut on a char boundary.
fn clamp_name(name: &str) -> &str {
    let limit = (MAX_NAME_LEN - 1) as usize;
    if name.len() <= limit {
        return name;
    }
    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Decode a secret-chat file of version 0, 1 or 2.
///
/// Exactly as many records as the header announces are read; trailing bytes
/// are ignored.
pub fn decode_secret_chats(bytes: &[u8]) -> Result<Vec<SecretChatRecord>, CodecError> {
    let mut r = Reader::from_slice(bytes);
    r.expect_magic(SECRET_CHATS_MAGIC)?;

    let version = r.read_i32()?;
    if !(0..=SECRET_CHATS_VERSION).contains(&version) {
        return Err(CodecError::OutOfRange { field: "secret chat version", value: version.into() });
    }
    let count = r.read_i32()?;
    if count < 0 {
        return Err(CodecError::OutOfRange { field: "secret chat count", value: count.into() });
    }

    let mut chats = Vec::with_capacity((count as usize).min(64));
    for _ in 0..count {
        chats.push(read_secret_chat(&mut r, version)?);
    }
    Ok(chats)
}

fn read_secret_chat(r: &mut Reader<'_>, version: i32) -> Result<SecretChatRecord, CodecError> {
    let id             = r.read_i32()?;
    let display_name   = r.read_string("name length", MAX_NAME_LEN)?;
    let user_id        = r.read_i32()?;
    let admin_id       = r.read_i32()?;
    let created_at     = r.read_u32()?;
    let ttl            = r.read_u32()?;
    let protocol_layer = r.read_u32()?;
    let access_hash    = r.read_i64()?;
    let raw_state      = r.read_i32()?;
    let state = SecretChatState::from_raw(raw_state)
        .ok_or(CodecError::OutOfRange { field: "secret chat state", value: raw_state.into() })?;
    let key_fingerprint = r.read_i64()?;
    let key_bytes       = r.read_array::<256>()?;

    let key_digest = if version >= 2 { r.read_array::<20>()? } else { sha1(&key_bytes) };

    let (in_seq, last_in_seq, out_seq) = if version >= 1 {
        (r.read_i32()?, r.read_i32()?, r.read_i32()?)
    } else {
        (0, 0, 0)
    };

    Ok(SecretChatRecord {
        id,
        display_name,
        user_id,
        admin_id,
        created_at,
        ttl,
        protocol_layer,
        access_hash,
        state,
        key_fingerprint,
        key: SecretKey::from_bytes(key_bytes),
        key_digest,
        in_seq,
        last_in_seq,
        out_seq,
    })
}
