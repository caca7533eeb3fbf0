//! layer-inspect — print the contents of a session content root.
//!
//!   cargo run -p layer-inspect -- accounts/+15550100 [--test]
//!
//! `--test` selects the test-environment bootstrap list used when no
//! credential file is readable. Nothing under the root is created or written.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::DateTime;
use layer_session::{DcEnvironment, FileBackend, SessionState, SessionStore};

const USAGE: &str = "usage: layer-inspect <content-root> [--test]";

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("layer_session=info,layer_inspect=info"),
    )
    .init();

    if let Err(e) = run() {
        eprintln!("✗ {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut root        = None;
    let mut environment = DcEnvironment::Production;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--test"         => environment = DcEnvironment::Test,
            "-h" | "--help"  => {
                println!("{USAGE}");
                return Ok(());
            }
            _ if root.is_none() => root = Some(arg),
            _ => return Err(USAGE.into()),
        }
    }
    let root = root.ok_or(USAGE)?;

    let backend = FileBackend::open_existing(&root)?;
    tracing::info!("[layer-inspect] Reading {root} ({environment:?})");
    let store = SessionStore::with_backend(Arc::new(backend), environment);
    print!("{}", render(&store.load_all()));
    Ok(())
}

fn render(state: &SessionState) -> String {
    let mut out = String::new();
    let c = &state.cursor;
    let _ = writeln!(out, "cursor   pts={} qts={} seq={} date={}", c.pts, c.qts, c.seq, format_date(c.date));

    let t = &state.credentials;
    let _ = writeln!(out, "our id   {}", t.our_id.map_or_else(|| "-".to_string(), |id| id.to_string()));
    let _ = writeln!(out, "datacenters ({}):", t.dcs.len());
    for dc in t.dcs.values() {
        let marker = if dc.id == t.working_dc { '*' } else { ' ' };
        let key = match &dc.auth_key {
            Some(_) => format!("key {:#018x}", dc.auth_key_id),
            None    => "no key".to_string(),
        };
        let _ = writeln!(
            out,
            " {marker}DC{:<3} {:<22} {key}{}",
            dc.id,
            dc.addr(),
            if dc.signed { " signed" } else { "" },
        );
    }

    let _ = writeln!(out, "secret chats ({}):", state.secret_chats.len());
    for chat in state.secret_chats.values() {
        let _ = writeln!(
            out,
            "  #{} {:?} with {} created {} layer {} seq in={}/{} out={} digest {} [{:?}]",
            chat.id,
            chat.display_name,
            chat.user_id,
            format_date(chat.created_at),
            chat.protocol_layer,
            chat.in_seq,
            chat.last_in_seq,
            chat.out_seq,
            hex::encode(chat.key_digest),
            chat.state,
        );
    }
    out
}

fn format_date(unix: u32) -> String {
    if unix == 0 {
        return "-".into();
    }
    DateTime::from_timestamp(i64::from(unix), 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| unix.to_string())
}
