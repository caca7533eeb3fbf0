//! Failures of the login flow and of the calls it makes.
//!
//! [`InvocationError`] is what a [`crate::ProtocolClient`] hands back;
//! [`LoginFailure`] is the terminal reason a [`crate::LoginFlow`] stops with.

use std::{fmt, io};

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// A server-side rejection, split into status code, symbolic name and an
/// optional trailing number (`FLOOD_WAIT_30` has name `FLOOD_WAIT`, value 30).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcError {
    pub code:  i32,
    /// Symbolic name without the numeric tail.
    pub name:  String,
    pub value: Option<u32>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {}: {}", self.code, self.name)?;
        if let Some(v) = self.value {
            write!(f, " (value: {v})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Build from the status code and error string carried by `rpc_error`.
    pub fn from_telegram(code: i32, message: &str) -> Self {
        if let Some(idx) = message.rfind('_') {
            let suffix = &message[idx + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(v) = suffix.parse::<u32>() {
                    return Self { code, name: message[..idx].to_string(), value: Some(v) };
                }
            }
        }
        Self { code, name: message.to_string(), value: None }
    }

    /// Compare the name against `pattern`. A leading or trailing `*` turns the
    /// comparison into a suffix or prefix test, so `PHONE_CODE_*` covers both
    /// `PHONE_CODE_INVALID` and `PHONE_CODE_EXPIRED`.
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.name.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.name.ends_with(suffix)
        } else {
            self.name == pattern
        }
    }

    /// Seconds to wait, if this is a `FLOOD_WAIT_n`.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        if self.code == 420 && self.name == "FLOOD_WAIT" {
            self.value.map(u64::from)
        } else {
            None
        }
    }
}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// What a [`crate::ProtocolClient`] call can fail with.
#[derive(Debug)]
pub enum InvocationError {
    /// Telegram rejected the request.
    Rpc(RpcError),
    Io(io::Error),
    /// The connection went away before an answer arrived.
    Dropped,
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e) => write!(f, "{e}"),
            Self::Io(e)  => write!(f, "I/O error: {e}"),
            Self::Dropped => write!(f, "request dropped"),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rpc(e) => Some(e),
            Self::Io(e)  => Some(e),
            Self::Dropped => None,
        }
    }
}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<RpcError> for InvocationError {
    fn from(e: RpcError) -> Self { Self::Rpc(e) }
}

impl InvocationError {
    /// [`RpcError::is`] for server rejections; local failures never match.
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Rpc(e) => e.is(pattern),
            _            => false,
        }
    }

    /// Seconds the server asked us to back off, if any.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        match self {
            Self::Rpc(e) => e.flood_wait_seconds(),
            _            => None,
        }
    }

    /// `(code, message)` as shown to the user. Local failures use code 0.
    pub fn report(&self) -> (i32, String) {
        match self {
            Self::Rpc(e) => (e.code, e.name.clone()),
            other        => (0, other.to_string()),
        }
    }
}

// ─── LoginFailure ─────────────────────────────────────────────────────────────

/// Why a login flow stopped in [`crate::LoginState::Failed`].
///
/// Every variant is terminal: the flow does not retry on its own and a new
/// [`crate::LoginFlow`] must be started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginFailure {
    /// The server refused the phone number.
    InvalidPhoneNumber,
    /// The user dismissed a prompt.
    Cancelled,
    /// Exporting the authorization to `dc_id` failed after retries.
    ExportFailed { dc_id: i32 },
    /// Too many rejected verification codes.
    RetriesExhausted,
    /// The transport had no key for `dc_id` when it was about to be signed.
    MissingAuthKey { dc_id: i32 },
    /// Datacenters did not finish their handshakes within the configured limit.
    DcAuthTimeout,
    /// Any other server or transport error.
    Protocol { code: i32, message: String },
}

impl LoginFailure {
    /// `(code, message)` for the error-reporting collaborator.
    pub fn report(&self) -> (i32, String) {
        match self {
            Self::InvalidPhoneNumber  => (400, "Invalid phone number".into()),
            Self::Cancelled           => (0, "Login cancelled".into()),
            Self::ExportFailed { .. } => (500, "Authentication export failed.".into()),
            Self::RetriesExhausted    => (400, "Too many invalid codes".into()),
            Self::MissingAuthKey { dc_id } => (500, format!("No authorization key for DC{dc_id}")),
            Self::DcAuthTimeout       => (408, "Timed out waiting for datacenter authorization".into()),
            Self::Protocol { code, message } => (*code, message.clone()),
        }
    }
}

impl fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExportFailed { dc_id } => write!(f, "authentication export to DC{dc_id} failed"),
            Self::Protocol { code, message } => write!(f, "{code}: {message}"),
            other => f.write_str(&other.report().1),
        }
    }
}

impl std::error::Error for LoginFailure {}

impl From<InvocationError> for LoginFailure {
    fn from(e: InvocationError) -> Self {
        let (code, message) = e.report();
        Self::Protocol { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_suffix_is_split_off() {
        let e = RpcError::from_telegram(420, "FLOOD_WAIT_30");
        assert_eq!(e.name, "FLOOD_WAIT");
        assert_eq!(e.value, Some(30));
        assert_eq!(e.flood_wait_seconds(), Some(30));

        let e = RpcError::from_telegram(400, "PHONE_CODE_INVALID");
        assert_eq!(e.value, None);
        assert_eq!(e.flood_wait_seconds(), None);
    }

    #[test]
    fn wildcard_matching() {
        let e: InvocationError = RpcError::from_telegram(400, "PHONE_CODE_EXPIRED").into();
        assert!(e.is("PHONE_CODE_*"));
        assert!(e.is("*_EXPIRED"));
        assert!(!e.is("PHONE_NUMBER_*"));
        assert!(!InvocationError::Dropped.is("*"));
    }

    #[test]
    fn protocol_failure_keeps_server_code() {
        let failure = LoginFailure::from(InvocationError::Rpc(RpcError::from_telegram(500, "AUTH_RESTART")));
        assert_eq!(failure.report(), (500, "AUTH_RESTART".to_string()));
        assert_eq!(LoginFailure::from(InvocationError::Dropped).report().0, 0);
    }
}
