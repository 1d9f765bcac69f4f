use thiserror::Error;

use crate::protocol::response::ErrPayload;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // ─── Server Error ────────────────────────────────────────────────────
    #[error("server error {code} ({sql_state}): {message}")]
    Server {
        code: u16,
        sql_state: String,
        message: String,
    },
    // ─── Transport ───────────────────────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    // ─── Protocol Violations ─────────────────────────────────────────────
    #[error("unexpected sequence id: expected {expected}, got {actual}")]
    UnexpectedSequenceId { expected: u8, actual: u8 },
    #[error("unexpected packet 0x{first_byte:02x} while {phase}")]
    UnexpectedPacket { first_byte: u8, phase: &'static str },
    #[error("malformed payload: {0}")]
    Decode(&'static str),
    // ─── Negotiation Failures ────────────────────────────────────────────
    #[error("server does not speak CLIENT_PROTOCOL_41")]
    UnsupportedProtocol,
    #[error("unsupported authentication plugin: {0}")]
    UnsupportedAuthPlugin(String),
    #[error("unsupported protocol feature: {0}")]
    Unsupported(&'static str),
    // ─── Incorrect Usage ─────────────────────────────────────────────────
    #[error("statement takes {expected} parameters, {actual} bound")]
    ParamsCountMismatch { expected: usize, actual: usize },
    #[error("cannot map value to a mysql field type: {0}")]
    UnsupportedType(&'static str),
    #[error("bad configuration: {0}")]
    BadConfig(String),
}

impl From<ErrPayload> for Error {
    fn from(err: ErrPayload) -> Self {
        Error::Server {
            code: err.error_code,
            sql_state: err.sql_state,
            message: err.message,
        }
    }
}

impl Error {
    /// Returns true if the error indicates the connection is broken and
    /// cannot be reused.
    ///
    /// This is conservative - returns true (broken) when in doubt.
    pub fn is_conn_broken(&self) -> bool {
        match self {
            Error::Server { sql_state, .. } => {
                match sql_state.as_str() {
                    // Integrity errors - connection still usable
                    "23000" => false,
                    // Data errors - connection still usable
                    "22001" | "22003" | "22007" | "22012" => false,
                    // Programming errors - connection still usable
                    "42000" | "42S01" | "42S02" | "42S22" => false,
                    // Not supported - connection still usable
                    "0A000" => false,
                    // Everything else - assume broken
                    _ => true,
                }
            }
            // Arity and type mapping mistakes are caught before any bytes
            // reach the wire; the connection stays in sync.
            Error::ParamsCountMismatch { .. } | Error::UnsupportedType(_) => false,
            // All other errors - assume broken
            _ => true,
        }
    }
}
