use std::time::Duration;

use eyre::{Context, Result, eyre};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

use crate::adapters::telnet::TelnetFilter;

const READ_BUFFER_SIZE: usize = 4096;
/// How long an unterminated line (a prompt) waits for more text before it is returned
const PARTIAL_LINE_DELAY: Duration = Duration::from_millis(250);

/// A telnet connection to the Hades server
pub struct HadesSession {
    peer: String,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    filter: TelnetFilter,
    buffer: Box<[u8]>,
    pending: Vec<u8>,
}

impl HadesSession {
    pub async fn connect(server: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let peer = format!("{server}:{port}");
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&peer))
            .await
            .map_err(|_| eyre!("Timed out connecting to {peer} after {connect_timeout:?}"))?
            .with_context(|| format!("Failed to connect to {peer}"))?;
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        Ok(Self {
            peer,
            reader,
            writer,
            filter: TelnetFilter::new(),
            buffer: vec![0; READ_BUFFER_SIZE].into_boxed_slice(),
            pending: Vec::new(),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Read the next line with telnet commands removed, including its terminator.
    ///
    /// Text without a trailing newline, such as a `login: ` prompt, is returned
    /// once the server stays quiet for a moment. Returns `None` once the server
    /// closed the connection. Cancel safe.
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                let rest = self.pending.split_off(end + 1);
                return Ok(Some(std::mem::replace(&mut self.pending, rest)));
            }

            let read = if self.pending.is_empty() {
                self.reader.read(&mut self.buffer).await
            } else {
                match tokio::time::timeout(PARTIAL_LINE_DELAY, self.reader.read(&mut self.buffer))
                    .await
                {
                    Ok(read) => read,
                    Err(_) => return Ok(Some(std::mem::take(&mut self.pending))),
                }
            }
            .with_context(|| format!("Failed to read from {}", self.peer))?;

            if read == 0 {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.pending)));
            }
            let text = self.filter.filter(&self.buffer[..read]);
            self.pending.extend_from_slice(&text);
        }
    }

    /// Send one line terminated with CRLF
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut payload = Vec::with_capacity(line.len() + 2);
        payload.extend_from_slice(line.as_bytes());
        payload.extend_from_slice(b"\r\n");
        self.writer
            .write_all(&payload)
            .await
            .with_context(|| format!("Failed to write to {}", self.peer))
    }
}
