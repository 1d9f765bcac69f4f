use tracing::trace;

use crate::col::ColumnDefinitionBytes;
use crate::constant::{CapabilityFlags, CommandByte};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::response::{is_result_set_terminator, read_terminator, ErrPayload, OkPayload};
use crate::row::TextRowPayload;

/// Write COM_QUERY command
pub fn write_query(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::Query as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// Event produced by one step of the text-protocol state machine
#[derive(Debug)]
pub enum QueryEvent<'a> {
    /// Need the next packet
    NeedPayload,
    /// Query returned OK (no result set)
    NoResultSet(OkPayload),
    /// Result set started with this many columns
    ResultSetStart { num_columns: usize },
    /// Column definition packet received
    Column(ColumnDefinitionBytes<'a>),
    /// Row data received
    Row(TextRowPayload<'a>),
    /// Result set finished
    Eof(OkPayload),
}

/// Packet state machine for a COM_QUERY response.
///
/// Pure parsing, no I/O: feed each received payload to `drive` and act on
/// the returned event. Payloads may have independent lifetimes.
pub enum Query {
    /// Waiting for the initial query response
    Start,
    /// Reading column definitions
    ReadingColumns {
        num_columns: usize,
        remaining: usize,
    },
    /// Waiting for the legacy EOF that closes the column block
    ColumnsEof { num_columns: usize },
    /// Reading rows
    ReadingRows { num_columns: usize },
    /// Finished
    Finished,
}

impl Query {
    pub fn new() -> Self {
        Self::Start
    }

    pub fn drive<'a>(
        &mut self,
        payload: &'a [u8],
        capabilities: CapabilityFlags,
    ) -> Result<QueryEvent<'a>> {
        match self {
            Self::Start => {
                let first = *payload.first().ok_or(Error::Decode("empty query response"))?;
                match first {
                    0xff => Err(ErrPayload::parse(payload)?.into()),
                    0x00 => {
                        *self = Self::Finished;
                        Ok(QueryEvent::NoResultSet(OkPayload::parse(payload)?))
                    }
                    0xfb => Err(Error::Unsupported("LOCAL INFILE")),
                    _ => {
                        let (column_count, _rest) = read_int_lenenc(payload)?;
                        let num_columns = column_count as usize;
                        trace!(num_columns, "text result set");
                        *self = Self::ReadingColumns {
                            num_columns,
                            remaining: num_columns,
                        };
                        Ok(QueryEvent::ResultSetStart { num_columns })
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
                Ok(QueryEvent::Column(ColumnDefinitionBytes(payload)))
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
                Ok(QueryEvent::NeedPayload)
            }

            Self::ReadingRows { num_columns } => {
                // Text rows are length-encoded strings, so the first byte
                // can collide with 0xfe; the terminator check also looks
                // at the payload length and negotiated capabilities.
                match payload.first() {
                    Some(&0xff) => Err(ErrPayload::parse(payload)?.into()),
                    _ if is_result_set_terminator(payload, capabilities) => {
                        *self = Self::Finished;
                        Ok(QueryEvent::Eof(read_terminator(payload, capabilities)?))
                    }
                    Some(_) => Ok(QueryEvent::Row(TextRowPayload::new(payload, *num_columns))),
                    None => Err(Error::Decode("empty row packet")),
                }
            }

            Self::Finished => Err(Error::UnexpectedPacket {
                first_byte: payload.first().copied().unwrap_or(0),
                phase: "query already finished",
            }),
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}
