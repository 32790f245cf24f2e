use super::types::*;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Newline-delimited JSON-RPC over a byte stream, stdio by default
pub struct Protocol<R = BufReader<Stdin>, W = Stdout> {
    reader: R,
    writer: W,
}

impl Protocol {
    pub fn new() -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Protocol<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn with_io(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read the next request. `None` once the stream is closed or unreadable.
    pub async fn read_request(&mut self) -> Result<Option<JsonRpcRequest>> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line).await {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let request = serde_json::from_str(trimmed).context("Malformed JSON-RPC message")?;
                    return Ok(Some(request));
                }
                Err(e) => {
                    tracing::error!("Input stream failed: {}", e);
                    return Ok(None);
                }
            }
        }
    }

    /// Write one response line and flush
    pub async fn send_response(&mut self, response: JsonRpcResponse) -> Result<()> {
        let mut json = serde_json::to_vec(&response)?;
        json.push(b'\n');
        self.writer.write_all(&json).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn success_response<T: Serialize>(&self, id: Value, result: T) -> JsonRpcResponse<T> {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error_response(&self, id: Value, error: JsonRpcError) -> JsonRpcResponse {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}
