use tracing::trace;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::col::ColumnDefinitionBytes;
use crate::constant::{CapabilityFlags, CommandByte};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::response::{is_result_set_terminator, read_terminator, ErrPayload, OkPayload};
use crate::protocol::r#trait::params::Params;
use crate::row::BinaryRowPayload;

/// COM_STMT_PREPARE OK response body (zero-copy)
///
/// Layout after the 0x00 status byte:
/// - statement_id: 4 bytes
/// - num_columns: 2 bytes
/// - num_params: 2 bytes
/// - reserved: 1 byte
/// - warning_count: 2 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct PrepareOk {
    pub statement_id: U32LE,
    pub num_columns: U16LE,
    pub num_params: U16LE,
    pub _reserved: u8,
    pub warning_count: U16LE,
}

/// Write COM_STMT_PREPARE command
pub fn write_prepare(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::StmtPrepare as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// Read a COM_STMT_PREPARE response (zero-copy). An ERR payload becomes a
/// `Server` error.
pub fn read_prepare_ok(payload: &[u8]) -> Result<&PrepareOk> {
    let (status, data) = read_int_1(payload)?;
    if status == 0xff {
        return Err(ErrPayload::parse(payload)?.into());
    }
    if status != 0x00 {
        return Err(Error::UnexpectedPacket {
            first_byte: status,
            phase: "reading prepare response",
        });
    }

    if data.len() < 11 {
        return Err(Error::Decode("prepare ok too short"));
    }
    PrepareOk::ref_from_bytes(&data[..11]).map_err(|_| Error::Decode("prepare ok cast"))

    // Param and column definition packets follow; the caller reads them.
}

/// Write COM_STMT_EXECUTE command.
///
/// The caller has already checked the parameter count against the
/// statement's arity.
pub fn write_execute<P: Params>(out: &mut Vec<u8>, statement_id: u32, params: &P) -> Result<()> {
    write_int_1(out, CommandByte::StmtExecute as u8);
    write_int_4(out, statement_id);

    // flags (1 byte) - CURSOR_TYPE_NO_CURSOR
    write_int_1(out, 0x00);

    // iteration count (4 bytes) - always 1
    write_int_4(out, 1);

    if params.len() > 0 {
        params.write_null_bitmap(out);

        // new-params-bound flag; types are sent on every execute
        write_int_1(out, 0x01);
        params.write_types(out);
        params.write_values(out)?;
    }
    Ok(())
}

/// Write COM_STMT_CLOSE command (the server sends no response)
pub fn write_close_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtClose as u8);
    write_int_4(out, statement_id);
}

/// Write COM_STMT_RESET command
pub fn write_reset_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtReset as u8);
    write_int_4(out, statement_id);
}

/// Event produced by one step of the binary-protocol state machine
#[derive(Debug)]
pub enum ExecEvent<'a> {
    /// Need the next packet
    NeedPayload,
    /// Execute returned OK (no result set)
    NoResultSet(OkPayload),
    /// Result set started with this many columns
    ResultSetStart { num_columns: usize },
    /// Column definition packet received
    Column(ColumnDefinitionBytes<'a>),
    /// Binary row received
    Row(BinaryRowPayload<'a>),
    /// Result set finished
    Eof(OkPayload),
}

/// Packet state machine for a COM_STMT_EXECUTE response.
///
/// Same shape as the text-protocol machine; rows are binary and always
/// start with a 0x00 header byte, so the 0xfe terminator is unambiguous.
pub enum Exec {
    Start,
    ReadingColumns {
        num_columns: usize,
        remaining: usize,
    },
    ColumnsEof {
        num_columns: usize,
    },
    ReadingRows {
        num_columns: usize,
    },
    Finished,
}

impl Exec {
    pub fn new() -> Self {
        Self::Start
    }

    pub fn drive<'a>(
        &mut self,
        payload: &'a [u8],
        capabilities: CapabilityFlags,
    ) -> Result<ExecEvent<'a>> {
        match self {
            Self::Start => {
                let first = *payload
                    .first()
                    .ok_or(Error::Decode("empty execute response"))?;
                match first {
                    0xff => Err(ErrPayload::parse(payload)?.into()),
                    0x00 => {
                        *self = Self::Finished;
                        Ok(ExecEvent::NoResultSet(OkPayload::parse(payload)?))
                    }
                    _ => {
                        let (column_count, _rest) = read_int_lenenc(payload)?;
                        let num_columns = column_count as usize;
                        trace!(num_columns, "binary result set");
                        *self = Self::ReadingColumns {
                            num_columns,
                            remaining: num_columns,
                        };
                        Ok(ExecEvent::ResultSetStart { num_columns })
                    }
                }
            }

            Self::ReadingColumns {
                num_columns,
                remaining,
            } => {
                *remaining -= 1;
                if *remaining == 0 {
                    *self = if capabilities.contains(CapabilityFlags::CLIENT_DEPRECATE_EOF) {
                        Self::ReadingRows {
                            num_columns: *num_columns,
                        }
                    } else {
                        Self::ColumnsEof {
                            num_columns: *num_columns,
                        }
                    };
                }
                Ok(ExecEvent::Column(ColumnDefinitionBytes(payload)))
            }

            Self::ColumnsEof { num_columns } => {
                if payload.first() != Some(&0xfe) {
                    return Err(Error::UnexpectedPacket {
                        first_byte: payload.first().copied().unwrap_or(0),
                        phase: "expecting EOF after column definitions",
                    });
                }
                *self = Self::ReadingRows {
                    num_columns: *num_columns,
                };
                Ok(ExecEvent::NeedPayload)
            }

            Self::ReadingRows { num_columns } => match payload.first() {
                Some(&0xff) => Err(ErrPayload::parse(payload)?.into()),
                _ if is_result_set_terminator(payload, capabilities) => {
                    *self = Self::Finished;
                    Ok(ExecEvent::Eof(read_terminator(payload, capabilities)?))
                }
                Some(&0x00) => Ok(ExecEvent::Row(BinaryRowPayload::parse(
                    payload,
                    *num_columns,
                )?)),
                first => Err(Error::UnexpectedPacket {
                    first_byte: first.copied().unwrap_or(0),
                    phase: "reading binary row",
                }),
            },

            Self::Finished => Err(Error::UnexpectedPacket {
                first_byte: payload.first().copied().unwrap_or(0),
                phase: "execute already finished",
            }),
        }
    }
}

impl Default for Exec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::{ColumnType, CAPABILITIES_ALWAYS_ENABLED};
    use crate::protocol::r#trait::param::Null;

    fn caps() -> CapabilityFlags {
        CAPABILITIES_ALWAYS_ENABLED
    }

    #[test]
    fn parse_prepare_ok() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&7u32.to_le_bytes()); // statement id
        payload.extend_from_slice(&1u16.to_le_bytes()); // columns
        payload.extend_from_slice(&3u16.to_le_bytes()); // params
        payload.push(0);
        payload.extend_from_slice(&0u16.to_le_bytes()); // warnings

        let ok = read_prepare_ok(&payload).unwrap();
        assert_eq!(ok.statement_id.get(), 7);
        assert_eq!(ok.num_columns.get(), 1);
        assert_eq!(ok.num_params.get(), 3);
    }

    #[test]
    fn prepare_error_surfaces_as_server_error() {
        let mut payload = vec![0xff, 0x48, 0x04, b'#'];
        payload.extend_from_slice(b"42000");
        payload.extend_from_slice(b"syntax error");
        match read_prepare_ok(&payload).unwrap_err() {
            Error::Server { code, .. } => assert_eq!(code, 1096),
            other => panic!("expected Server error, got {other:?}"),
        }
    }

    #[test]
    fn execute_payload_layout() {
        // SELECT ? with [NULL, 42u32, "hi"]
        let mut out = Vec::new();
        write_execute(&mut out, 7, &(Null, 42u32, "hi")).unwrap();

        assert_eq!(out[0], 0x17);
        assert_eq!(&out[1..5], &7u32.to_le_bytes());
        assert_eq!(out[5], 0x00); // no cursor
        assert_eq!(&out[6..10], &1u32.to_le_bytes());

        // null bitmap: only parameter 0 is NULL
        assert_eq!(out[10], 0b0000_0001);
        // new-params-bound flag
        assert_eq!(out[11], 0x01);
        // type descriptors: NULL, LONG unsigned, STRING
        assert_eq!(
            &out[12..18],
            &[
                ColumnType::MYSQL_TYPE_NULL as u8,
                0x00,
                ColumnType::MYSQL_TYPE_LONG as u8,
                0x80,
                ColumnType::MYSQL_TYPE_STRING as u8,
                0x00,
            ]
        );
        // values: 42u32 fixed-width, then "hi" length-encoded
        assert_eq!(&out[18..22], &42u32.to_le_bytes());
        assert_eq!(&out[22..], &[0x02, b'h', b'i']);
    }

    #[test]
    fn execute_without_params_has_no_bind_block() {
        let mut out = Vec::new();
        write_execute(&mut out, 1, &()).unwrap();
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn close_and_reset_payloads() {
        let mut out = Vec::new();
        write_close_statement(&mut out, 9);
        assert_eq!(out[0], 0x19);
        assert_eq!(&out[1..], &9u32.to_le_bytes());

        out.clear();
        write_reset_statement(&mut out, 9);
        assert_eq!(out[0], 0x1a);
    }

    #[test]
    fn exec_flow_binary_rows() {
        let mut sm = Exec::new();

        match sm.drive(&[0x01], caps()).unwrap() {
            ExecEvent::ResultSetStart { num_columns } => assert_eq!(num_columns, 1),
            other => panic!("expected ResultSetStart, got {other:?}"),
        }

        let col = crate::col::tests::column_def_payload(
            "n",
            ColumnType::MYSQL_TYPE_LONG,
            crate::constant::ColumnFlags::empty(),
        );
        assert!(matches!(sm.drive(&col, caps()).unwrap(), ExecEvent::Column(_)));

        let mut row = vec![0x00, 0x00];
        row.extend_from_slice(&5i32.to_le_bytes());
        assert!(matches!(sm.drive(&row, caps()).unwrap(), ExecEvent::Row(_)));

        let eof = [0xfe, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];
        assert!(matches!(sm.drive(&eof, caps()).unwrap(), ExecEvent::Eof(_)));
        assert!(sm.drive(&eof, caps()).is_err());
    }

    #[test]
    fn exec_no_result_set() {
        let mut sm = Exec::new();
        let ok = [0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        match sm.drive(&ok, caps()).unwrap() {
            ExecEvent::NoResultSet(ok) => assert_eq!(ok.affected_rows, 1),
            other => panic!("expected NoResultSet, got {other:?}"),
        }
    }
}
