pub mod param;
pub mod params;

pub use param::{Null, Param};
pub use params::Params;

use crate::col::Column;
use crate::error::Result;
use crate::protocol::response::OkPayload;
use crate::row::{BinaryRowPayload, TextRowPayload};

/// Event callbacks for a text-protocol (COM_QUERY) result.
///
/// The connection drives the callbacks in order: either `no_result_set`
/// once, or `resultset_start`, `row` zero or more times, `resultset_end`.
/// The whole stream is drained before the query call returns.
pub trait TextResultSetHandler {
    fn no_result_set(&mut self, ok: OkPayload) -> Result<()>;
    fn resultset_start(&mut self, columns: &[Column]) -> Result<()>;
    fn row(&mut self, columns: &[Column], row: TextRowPayload<'_>) -> Result<()>;
    fn resultset_end(&mut self, ok: OkPayload) -> Result<()>;
}

/// Event callbacks for a binary-protocol (COM_STMT_EXECUTE) result.
pub trait BinaryResultSetHandler {
    fn no_result_set(&mut self, ok: OkPayload) -> Result<()>;
    fn resultset_start(&mut self, columns: &[Column]) -> Result<()>;
    fn row(&mut self, columns: &[Column], row: BinaryRowPayload<'_>) -> Result<()>;
    fn resultset_end(&mut self, ok: OkPayload) -> Result<()>;
}
