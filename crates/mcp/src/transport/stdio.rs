//! Line-delimited JSON-RPC over stdin/stdout

use crate::core::{
    constants::MAX_MESSAGE_SIZE,
    error::{Error, Result},
    types::JsonRpcResponse,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// One JSON message per line in each direction
pub struct StdioTransport<R, W> {
    reader: BufReader<R>,
    line: Vec<u8>,
    writer: W,
}

impl StdioTransport<tokio::io::Stdin, tokio::io::Stdout> {
    /// Transport bound to the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::new(),
            writer,
        }
    }

    /// Next non-empty line, or `None` at end of input.
    ///
    /// An oversized line is discarded as it streams in and reported as
    /// [`Error::InvalidMessage`]; a line that is not UTF-8 is reported as
    /// [`Error::Encoding`]. Either way the transport stays usable.
    pub async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            let Some(oversized) = self.read_line().await? else {
                return Ok(None);
            };
            if oversized {
                return Err(Error::InvalidMessage(format!(
                    "message exceeds {} byte limit",
                    MAX_MESSAGE_SIZE
                )));
            }

            let line = std::str::from_utf8(&self.line)
                .map_err(|e| Error::Encoding(e.to_string()))?
                .trim();
            if line.is_empty() {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }

    /// Fill `self.line` with the next line. Returns `None` at end of input,
    /// otherwise whether the line went over [`MAX_MESSAGE_SIZE`].
    async fn read_line(&mut self) -> Result<Option<bool>> {
        self.line.clear();
        let mut read_any = false;
        let mut oversized = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            read_any = true;

            let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
                Some(end) => (&available[..=end], true),
                None => (available, false),
            };
            let consumed = chunk.len();
            if !oversized {
                self.line.extend_from_slice(chunk);
                if self.line.len() > MAX_MESSAGE_SIZE {
                    oversized = true;
                    self.line = Vec::new();
                }
            }
            self.reader.consume(consumed);

            if done {
                break;
            }
        }

        Ok(read_any.then_some(oversized))
    }

    /// Write one response followed by a newline
    pub async fn send(&mut self, response: &JsonRpcResponse) -> Result<()> {
        let mut json = response.to_json()?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Consume the transport and return the writer
    pub fn into_writer(self) -> W {
        self.writer
    }
}
