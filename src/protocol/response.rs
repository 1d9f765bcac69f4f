//! Generic response payloads: OK, ERR and the legacy EOF packet.
//!
//! `0xfe` is ambiguous: with CLIENT_DEPRECATE_EOF a result set ends with an
//! OK packet whose header byte is 0xfe; without it the server sends the
//! 5-byte legacy EOF packet. Disambiguation needs the negotiated
//! capabilities and the payload length, so the helpers here take both.

use zerocopy::byteorder::little_endian::U16 as U16LE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::constant::{CapabilityFlags, StatusFlags};
use crate::error::{Error, Result};
use crate::protocol::packet::MAX_PAYLOAD_PER_PACKET;
use crate::protocol::primitive::*;

/// Parsed OK packet
#[derive(Debug, Clone)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: StatusFlags,
    pub warnings: u16,
    pub info: String,
}

impl OkPayload {
    /// Parse an OK-layout payload (header byte 0x00, or 0xfe under
    /// CLIENT_DEPRECATE_EOF).
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, data) = read_int_1(payload)?;
        if header != 0x00 && header != 0xfe {
            return Err(Error::UnexpectedPacket {
                first_byte: header,
                phase: "parsing OK packet",
            });
        }

        let (affected_rows, data) = read_int_lenenc(data)?;
        let (last_insert_id, data) = read_int_lenenc(data)?;
        let (status_flags, data) = read_int_2(data)?;
        let (warnings, data) = read_int_2(data)?;
        let info = String::from_utf8_lossy(read_string_eof(data)).into_owned();

        Ok(OkPayload {
            affected_rows,
            last_insert_id,
            status_flags: StatusFlags::from_bits_truncate(status_flags),
            warnings,
            info,
        })
    }
}

/// Parsed ERR packet
#[derive(Debug, Clone, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl ErrPayload {
    /// Parse an ERR payload (header byte 0xff). The `#sql_state` block is
    /// only present on post-handshake errors under CLIENT_PROTOCOL_41.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, data) = read_int_1(payload)?;
        if header != 0xff {
            return Err(Error::UnexpectedPacket {
                first_byte: header,
                phase: "parsing ERR packet",
            });
        }

        let (error_code, data) = read_int_2(data)?;

        let (sql_state, data) = if data.first() == Some(&b'#') {
            let (state, rest) = read_string_fix(&data[1..], 5)?;
            (String::from_utf8_lossy(state).into_owned(), rest)
        } else {
            (String::new(), data)
        };

        Ok(ErrPayload {
            error_code,
            sql_state,
            message: String::from_utf8_lossy(read_string_eof(data)).into_owned(),
        })
    }
}

/// Legacy EOF packet body: warnings + status flags (zero-copy)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct EofPacket {
    warnings: U16LE,
    status_flags: U16LE,
}

impl EofPacket {
    pub fn warnings(&self) -> u16 {
        self.warnings.get()
    }

    pub fn status_flags(&self) -> StatusFlags {
        StatusFlags::from_bits_truncate(self.status_flags.get())
    }

    /// Read a legacy EOF packet (header byte 0xfe, payload length < 9)
    pub fn parse(payload: &[u8]) -> Result<&EofPacket> {
        let (header, data) = read_int_1(payload)?;
        if header != 0xfe || data.len() < 4 {
            return Err(Error::Decode("malformed EOF packet"));
        }
        EofPacket::ref_from_bytes(&data[..4]).map_err(|_| Error::Decode("EOF packet cast"))
    }
}

/// Returns true when `payload` terminates a result set under the
/// negotiated capabilities rather than carrying row data.
pub fn is_result_set_terminator(payload: &[u8], capabilities: CapabilityFlags) -> bool {
    if payload.first() != Some(&0xfe) || payload.len() >= MAX_PAYLOAD_PER_PACKET {
        return false;
    }
    if capabilities.contains(CapabilityFlags::CLIENT_DEPRECATE_EOF) {
        // OK packet styled as EOF: lenc affected + lenc insert id + 2+2
        payload.len() >= 7
    } else {
        payload.len() < 9
    }
}

/// Parse a result-set terminator into an `OkPayload`, normalizing the
/// legacy EOF form (no row counts) into the OK shape.
pub fn read_terminator(payload: &[u8], capabilities: CapabilityFlags) -> Result<OkPayload> {
    if capabilities.contains(CapabilityFlags::CLIENT_DEPRECATE_EOF) {
        OkPayload::parse(payload)
    } else {
        let eof = EofPacket::parse(payload)?;
        Ok(OkPayload {
            affected_rows: 0,
            last_insert_id: 0,
            status_flags: eof.status_flags(),
            warnings: eof.warnings(),
            info: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deprecate_eof() -> CapabilityFlags {
        CapabilityFlags::CLIENT_DEPRECATE_EOF
    }

    #[test]
    fn parse_ok() {
        // affected_rows=1, last_insert_id=0, status=AUTOCOMMIT, warnings=0
        let payload = [0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let ok = OkPayload::parse(&payload).unwrap();
        assert_eq!(ok.affected_rows, 1);
        assert_eq!(ok.last_insert_id, 0);
        assert!(ok
            .status_flags
            .contains(StatusFlags::SERVER_STATUS_AUTOCOMMIT));
        assert_eq!(ok.warnings, 0);
        assert!(ok.info.is_empty());
    }

    #[test]
    fn parse_err_with_sql_state() {
        let mut payload = vec![0xff, 0xef, 0x03]; // 1007
        payload.push(b'#');
        payload.extend_from_slice(b"HY000");
        payload.extend_from_slice(b"Can't create database 'x'; database exists");
        let err = ErrPayload::parse(&payload).unwrap();
        assert_eq!(err.error_code, 1007);
        assert_eq!(err.sql_state, "HY000");
        assert!(err.message.contains("database exists"));
    }

    #[test]
    fn parse_err_without_sql_state() {
        let mut payload = vec![0xff, 0x15, 0x04]; // 1045 during connect
        payload.extend_from_slice(b"Access denied");
        let err = ErrPayload::parse(&payload).unwrap();
        assert_eq!(err.error_code, 1045);
        assert!(err.sql_state.is_empty());
        assert_eq!(err.message, "Access denied");
    }

    #[test]
    fn parse_legacy_eof() {
        let payload = [0xfe, 0x01, 0x00, 0x02, 0x00];
        let eof = EofPacket::parse(&payload).unwrap();
        assert_eq!(eof.warnings(), 1);
        assert!(eof
            .status_flags()
            .contains(StatusFlags::SERVER_STATUS_AUTOCOMMIT));
    }

    #[test]
    fn terminator_ambiguity() {
        let legacy_eof = [0xfe, 0x00, 0x00, 0x02, 0x00];
        let ok_as_eof = [0xfe, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];

        assert!(is_result_set_terminator(&legacy_eof, CapabilityFlags::empty()));
        assert!(is_result_set_terminator(&ok_as_eof, deprecate_eof()));
        // A row packet never terminates
        assert!(!is_result_set_terminator(&[0x00, 0x00, 0x01], deprecate_eof()));

        let ok = read_terminator(&ok_as_eof, deprecate_eof()).unwrap();
        assert_eq!(ok.affected_rows, 0);
        let ok = read_terminator(&legacy_eof, CapabilityFlags::empty()).unwrap();
        assert!(ok
            .status_flags
            .contains(StatusFlags::SERVER_STATUS_AUTOCOMMIT));
    }
}
