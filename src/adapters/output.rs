//! Status and info output channels.
//!
//! The status channel carries `[GNUPG:] ` prefixed protocol lines to the
//! descriptor chosen with `--status-fd`; the info channel carries
//! human-readable progress to standard error. Either may be absent, in which
//! case writes are dropped. Channels are opened once in `main` and handed to
//! the workflows by mutable reference.

use crate::domain::status::{StatusEvent, STATUS_PREFIX};
use crate::infra::error::{SignerError, SignerResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Prefix of every info-channel line.
pub const INFO_PREFIX: &str = "[smime-signer:] ";

/// Where a channel writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTarget {
    Discard,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl ChannelTarget {
    /// Resolves a `--status-fd` descriptor: `1` stdout, `2` stderr, any
    /// other non-empty value a file path, nothing at all discards.
    #[must_use]
    pub fn from_descriptor(descriptor: Option<&str>) -> Self {
        match descriptor.map(str::trim) {
            None | Some("") => Self::Discard,
            Some("1") => Self::Stdout,
            Some("2") => Self::Stderr,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }
}

/// One line-oriented output channel.
pub struct Channel {
    sink: Option<Box<dyn Write + Send>>,
    prefix: &'static str,
}

impl Channel {
    /// Opens `target`; file targets are created if absent and truncated.
    pub fn open(target: &ChannelTarget, prefix: &'static str) -> SignerResult<Self> {
        let sink: Option<Box<dyn Write + Send>> = match target {
            ChannelTarget::Discard => None,
            ChannelTarget::Stdout => Some(Box::new(std::io::stdout())),
            ChannelTarget::Stderr => Some(Box::new(std::io::stderr())),
            ChannelTarget::File(path) => Some(Box::new(
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| {
                        SignerError::OutputError(format!("{}: {e}", path.display()))
                    })?,
            )),
        };
        Ok(Self { sink, prefix })
    }

    /// A channel over an arbitrary writer.
    #[must_use]
    pub fn from_writer(writer: Box<dyn Write + Send>, prefix: &'static str) -> Self {
        Self {
            sink: Some(writer),
            prefix,
        }
    }

    #[must_use]
    pub fn discard(prefix: &'static str) -> Self {
        Self { sink: None, prefix }
    }

    fn write_line(&mut self, line: &str) -> SignerResult<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        writeln!(sink, "{}{}", self.prefix, line)
            .and_then(|()| sink.flush())
            .map_err(|e| SignerError::OutputError(e.to_string()))
    }

    fn flush(&mut self) -> SignerResult<()> {
        match self.sink.as_mut() {
            Some(sink) => sink
                .flush()
                .map_err(|e| SignerError::OutputError(e.to_string())),
            None => Ok(()),
        }
    }
}

/// The pair of channels every workflow writes to.
pub struct OutputChannels {
    status: Channel,
    info: Channel,
}

impl OutputChannels {
    #[must_use]
    pub fn new(status: Channel, info: Channel) -> Self {
        Self { status, info }
    }

    /// Status to `status_target`, info to standard error.
    pub fn open(status_target: &ChannelTarget) -> SignerResult<Self> {
        Ok(Self {
            status: Channel::open(status_target, STATUS_PREFIX)?,
            info: Channel::open(&ChannelTarget::Stderr, INFO_PREFIX)?,
        })
    }

    /// Both channels discarded.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            status: Channel::discard(STATUS_PREFIX),
            info: Channel::discard(INFO_PREFIX),
        }
    }

    /// Channels writing into in-memory buffers.
    #[must_use]
    pub fn in_memory(status: &MemorySink, info: &MemorySink) -> Self {
        Self {
            status: Channel::from_writer(Box::new(status.clone()), STATUS_PREFIX),
            info: Channel::from_writer(Box::new(info.clone()), INFO_PREFIX),
        }
    }

    pub fn emit_status(&mut self, event: &StatusEvent) -> SignerResult<()> {
        log::debug!("status: {event}");
        self.status.write_line(&event.to_string())
    }

    pub fn emit_info(&mut self, message: &str) -> SignerResult<()> {
        self.info.write_line(message)
    }

    pub fn flush(&mut self) -> SignerResult<()> {
        self.status.flush()?;
        self.info.flush()
    }
}

/// Shared in-memory writer, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }

    /// Written lines with the channel prefix removed.
    #[must_use]
    pub fn lines_without(&self, prefix: &str) -> Vec<String> {
        self.contents()
            .lines()
            .map(|line| line.strip_prefix(prefix).unwrap_or(line).to_string())
            .collect()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| std::io::Error::other("memory sink poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
