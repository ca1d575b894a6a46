use std::io;

use flexdc::{Terminators, framing};
use tracing::{debug, warn};
use utilities::lazy_tcp::LazyTcpStream;

/// Byte-stream link to one FlexDC unit.
pub trait Transport: Send {
    /// Sends a command and waits for the device to acknowledge it.
    fn write(&mut self, command: &str) -> io::Result<()>;

    /// Sends a query and returns the reply without its terminator.
    fn write_read(&mut self, command: &str) -> io::Result<String>;
}

pub struct AsciiTransport {
    stream: LazyTcpStream,
    terminators: Terminators,
}

impl AsciiTransport {
    pub fn new(stream: LazyTcpStream, terminators: Terminators) -> Self {
        Self {
            stream,
            terminators,
        }
    }

    // After a failed exchange a late reply may still be on its way; drop
    // whatever already arrived so the next query starts clean.
    fn discard_pending(&mut self) {
        match self.stream.clear_input() {
            Ok(0) => {}
            Ok(n) => debug!("Discarded {} stale bytes from {}", n, self.stream.peer()),
            Err(e) => {
                warn!("Dropping link to {}: {}", self.stream.peer(), e);
                self.stream.disconnect();
            }
        }
    }
}

impl Transport for AsciiTransport {
    fn write(&mut self, command: &str) -> io::Result<()> {
        let ack = framing::exchange(&mut self.stream, command, &self.terminators)
            .inspect_err(|_| self.discard_pending())?;

        if ack.is_empty() {
            debug!("{} <- {}", self.stream.peer(), command);
        } else {
            warn!("{} <- {} acknowledged with {:?}", self.stream.peer(), command, ack);
        }
        Ok(())
    }

    fn write_read(&mut self, command: &str) -> io::Result<String> {
        let reply = framing::exchange(&mut self.stream, command, &self.terminators)
            .inspect_err(|_| self.discard_pending())?;

        debug!("{} <- {} -> {}", self.stream.peer(), command, reply);
        Ok(reply)
    }
}

#[cfg(test)]
pub mod mock {
    use std::{
        collections::{HashMap, HashSet},
        io,
        sync::{Arc, Mutex},
    };

    use super::Transport;

    #[derive(Default)]
    struct State {
        sent: Vec<(String, bool)>,
        replies: HashMap<String, String>,
        failing: HashSet<String>,
        offline: bool,
    }

    /// Scripted device. Clones share state so a test can keep a handle
    /// after moving one into a controller.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        state: Arc<Mutex<State>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(&self, command: &str, reply: &str) -> &Self {
            let mut state = self.state.lock().unwrap();
            state.replies.insert(command.to_string(), reply.to_string());
            self
        }

        pub fn fail(&self, command: &str) -> &Self {
            self.state.lock().unwrap().failing.insert(command.to_string());
            self
        }

        pub fn recover(&self, command: &str) -> &Self {
            self.state.lock().unwrap().failing.remove(command);
            self
        }

        pub fn set_offline(&self, offline: bool) {
            self.state.lock().unwrap().offline = offline;
        }

        pub fn sent(&self) -> Vec<String> {
            let state = self.state.lock().unwrap();
            state.sent.iter().map(|(command, _)| command.clone()).collect()
        }

        /// Commands sent without expecting a reply.
        pub fn writes(&self) -> Vec<String> {
            let state = self.state.lock().unwrap();
            state
                .sent
                .iter()
                .filter(|(_, query)| !query)
                .map(|(command, _)| command.clone())
                .collect()
        }

        pub fn clear(&self) {
            self.state.lock().unwrap().sent.clear();
        }

        fn record(&self, command: &str, query: bool) -> io::Result<()> {
            let mut state = self.state.lock().unwrap();
            state.sent.push((command.to_string(), query));

            if state.offline || state.failing.contains(command) {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply"));
            }
            Ok(())
        }
    }

    impl Transport for MockTransport {
        fn write(&mut self, command: &str) -> io::Result<()> {
            self.record(command, false)
        }

        fn write_read(&mut self, command: &str) -> io::Result<String> {
            self.record(command, true)?;
            let state = self.state.lock().unwrap();
            Ok(state.replies.get(command).cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::{TcpListener, TcpStream},
        sync::mpsc,
        time::Duration,
    };

    use utilities::lazy_tcp::TcpTimeouts;

    use super::*;

    fn connect(listener: &TcpListener) -> AsciiTransport {
        let timeouts = TcpTimeouts {
            read: Duration::from_millis(200),
            write: Duration::from_millis(200),
            connect: Duration::from_millis(500),
        };
        AsciiTransport::new(
            LazyTcpStream::new(listener.local_addr().unwrap(), 0, timeouts),
            Terminators::default(),
        )
    }

    fn expect_line(peer: &mut TcpStream, line: &[u8]) {
        let mut received = vec![0; line.len()];
        peer.read_exact(&mut received).unwrap();
        assert_eq!(received, line);
    }

    #[test]
    fn late_acknowledgement_is_not_taken_as_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut transport = connect(&listener);

        let device = std::thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            expect_line(&mut peer, b"XST\r\n");
            std::thread::sleep(Duration::from_millis(5));
            peer.write_all(b">").unwrap();

            expect_line(&mut peer, b"XPS\r\n");
            peer.write_all(b"-1200\r\n>").unwrap();
        });

        transport.write("XST").unwrap();
        assert_eq!(transport.write_read("XPS").unwrap(), "-1200");
        device.join().unwrap();
    }

    #[test]
    fn missing_acknowledgement_fails_the_write() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut transport = connect(&listener);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let device = std::thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            expect_line(&mut peer, b"XMO=0\r\n");
            let _ = done_rx.recv();
        });

        assert!(transport.write("XMO=0").is_err());
        drop(done_tx);
        device.join().unwrap();
    }
}
