use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct TcpTimeouts {
    pub read: Duration,
    pub write: Duration,
    pub connect: Duration,
}

/// A TCP client that connects on first use and reconnects after the peer
/// drops the link.
pub struct LazyTcpStream {
    addr: Option<SocketAddr>,
    label: String,
    stream: Option<TcpStream>,
    max_retries: u32,
    timeouts: TcpTimeouts,
}

fn is_broken_link(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}

impl LazyTcpStream {
    pub fn new<A: ToSocketAddrs + ToString>(addr: A, max_retries: u32, timeouts: TcpTimeouts) -> Self {
        let label = addr.to_string();
        let addr = addr.to_socket_addrs().ok().and_then(|mut addrs| addrs.next());

        if addr.is_none() {
            warn!("Cannot resolve address {}", label);
        }

        Self {
            addr,
            label,
            stream: None,
            max_retries,
            timeouts,
        }
    }

    pub fn peer(&self) -> &str {
        &self.label
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self) -> io::Result<&mut TcpStream> {
        let addr = self.addr.ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("Unresolved address {}", self.label),
            )
        })?;

        let mut attempt = 0;
        let stream = loop {
            match TcpStream::connect_timeout(&addr, self.timeouts.connect) {
                Ok(stream) => break stream,
                Err(e) if attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    debug!("Connection to {} failed ({}), retry {}", self.label, e, attempt);
                }
            }
        };

        stream.set_read_timeout(Some(self.timeouts.read))?;
        stream.set_write_timeout(Some(self.timeouts.write))?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", self.label);

        Ok(self.stream.insert(stream))
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        if self.stream.is_none() {
            return self.connect();
        }

        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::from(ErrorKind::NotConnected))
    }

    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Throws away whatever the peer sent that nobody read, such as a reply
    /// that arrived after its read timed out. Never blocks.
    pub fn clear_input(&mut self) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };

        stream.set_nonblocking(true)?;

        let mut buf = [0; 256];
        let mut discarded = 0;
        let result = loop {
            match stream.read(&mut buf) {
                Ok(0) => break Ok(discarded),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(discarded),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };

        stream.set_nonblocking(false)?;
        result
    }

    // One retry on a fresh connection when the link turns out to be dead.
    fn with_stream<T>(&mut self, mut op: impl FnMut(&mut TcpStream) -> io::Result<T>) -> io::Result<T> {
        match op(self.stream()?) {
            Err(e) if is_broken_link(&e) => {
                warn!("Connection to {} lost: {}", self.label, e);
                self.disconnect();
                op(self.stream()?)
            }
            result => result,
        }
    }
}

impl Read for LazyTcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.with_stream(|stream| stream.read(buf))
    }
}

impl Write for LazyTcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_stream(|stream| stream.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_stream(|stream| stream.flush())
    }
}
