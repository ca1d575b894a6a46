use std::io::{self, Error, ErrorKind, Read, Write};

pub const DEFAULT_INPUT_TERMINATOR: &str = ">";
pub const DEFAULT_OUTPUT_TERMINATOR: &str = "\r\n";

/// Longest reply accepted before the input terminator shows up.
pub const MAX_REPLY_LEN: usize = 80;

/// End-of-message delimiters for both directions of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminators {
    pub input: String,
    pub output: String,
}

impl Default for Terminators {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT_TERMINATOR.to_string(),
            output: DEFAULT_OUTPUT_TERMINATOR.to_string(),
        }
    }
}

impl Terminators {
    /// Uses the configured delimiters, falling back to the FlexDC defaults
    /// for whichever one is left empty.
    pub fn resolve(input: &str, output: &str) -> Self {
        let defaults = Self::default();
        Self {
            input: if input.is_empty() {
                defaults.input
            } else {
                input.to_string()
            },
            output: if output.is_empty() {
                defaults.output
            } else {
                output.to_string()
            },
        }
    }
}

pub fn write_command(
    sender: &mut impl Write,
    command: &str,
    terminators: &Terminators,
) -> io::Result<()> {
    let mut line = Vec::with_capacity(command.len() + terminators.output.len());
    line.extend_from_slice(command.as_bytes());
    line.extend_from_slice(terminators.output.as_bytes());

    sender.write_all(&line)?;
    sender.flush()
}

/// Reads one reply and returns it without the input terminator.
pub fn read_reply(sender: &mut impl Read, terminators: &Terminators) -> io::Result<String> {
    let terminator = terminators.input.as_bytes();
    let mut reply = Vec::with_capacity(16);
    let mut byte = [0; 1];

    while !reply.ends_with(terminator) {
        if reply.len() >= MAX_REPLY_LEN + terminator.len() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Reply exceeds maximum length without terminator",
            ));
        }

        match sender.read(&mut byte) {
            Ok(0) => {
                return Err(Error::new(
                    ErrorKind::UnexpectedEof,
                    "Connection closed before reply terminator",
                ));
            }
            Ok(_) => reply.push(byte[0]),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    reply.truncate(reply.len() - terminator.len());
    Ok(String::from_utf8_lossy(&reply).trim().to_string())
}

pub fn exchange(
    sender: &mut (impl Write + Read),
    command: &str,
    terminators: &Terminators,
) -> io::Result<String> {
    write_command(sender, command, terminators)?;
    read_reply(sender, terminators)
}
