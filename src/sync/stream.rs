use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Transport under a connection: buffered TCP or Unix socket.
///
/// Reads go through the `BufReader`; writes bypass it and hit the socket
/// directly, so a flushed packet is fully visible to the server.
#[derive(Debug)]
pub enum Stream {
    Tcp(BufReader<TcpStream>),
    #[cfg(unix)]
    Unix(BufReader<UnixStream>),
}

impl Stream {
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(BufReader::new(stream))
    }

    #[cfg(unix)]
    pub fn unix(stream: UnixStream) -> Self {
        Self::Unix(BufReader::new(stream))
    }

    /// Shut down both directions; in-flight reads on other code paths
    /// return an I/O error afterwards.
    pub fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            Self::Tcp(r) => r.get_ref().shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(r) => r.get_ref().shutdown(Shutdown::Both),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Tcp(r) => r.get_mut().write(buf),
            #[cfg(unix)]
            Self::Unix(r) => r.get_mut().write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Tcp(r) => r.get_mut().flush(),
            #[cfg(unix)]
            Self::Unix(r) => r.get_mut().flush(),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Tcp(r) => r.read(buf),
            #[cfg(unix)]
            Self::Unix(r) => r.read(buf),
        }
    }
}
