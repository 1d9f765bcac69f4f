/// A set of reusable buffers for MySQL protocol communication.
///
/// `Conn` uses a single `BufferSet` for all its operations; buffers are
/// cleared at the start of each command rather than reallocated.
#[derive(Debug)]
pub struct BufferSet {
    /// General-purpose read buffer.
    /// Bytes are valid during an operation.
    pub read_buffer: Vec<u8>,

    /// General-purpose write buffer.
    /// It always starts with 4 bytes reserved for the first packet header,
    /// followed by the payload without considering the 16MB split.
    /// Layout: [4-byte header space][payload]
    pub write_buffer: Vec<u8>,

    /// Column definition payloads accumulated during one result set
    pub columns: Vec<crate::col::Column>,
}

impl BufferSet {
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::new(),
            write_buffer: vec![0; 4],
            columns: Vec::new(),
        }
    }

    /// Clear the write buffer, reserve 4 bytes for the header, and return
    /// mutable access to it.
    #[inline]
    pub fn new_write_buffer(&mut self) -> &mut Vec<u8> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(&[0_u8; 4]);
        &mut self.write_buffer
    }

    /// The payload bytes (everything after the reserved header)
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.write_buffer[4..]
    }

    /// The payload length (total buffer length minus 4-byte header)
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.write_buffer.len().saturating_sub(4)
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_buffer_reserves_header_space() {
        let mut bufs = BufferSet::new();
        assert_eq!(bufs.payload_len(), 0);

        bufs.new_write_buffer().extend_from_slice(b"\x0e");
        assert_eq!(bufs.payload_len(), 1);
        assert_eq!(bufs.payload(), b"\x0e");
        assert_eq!(bufs.write_buffer.len(), 5);

        // Reset reclaims the space without losing the reservation
        bufs.new_write_buffer();
        assert_eq!(bufs.payload_len(), 0);
        assert_eq!(bufs.write_buffer.len(), 4);
    }
}
