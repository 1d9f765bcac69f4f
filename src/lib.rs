mod buffer;
pub mod col;
pub mod constant;
pub mod error;
mod opts;
mod prepared;
pub mod protocol;
pub mod row;
pub mod sync;
pub mod value;

pub use buffer::BufferSet;
pub use opts::Opts;
pub use prepared::PreparedStatement;

#[cfg(test)]
mod opts_test;
