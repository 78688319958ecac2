//! Event-stream frame parsing
//!
//! Raw bytes are buffered and split into blocks at a blank line. Within a
//! block every `data:` line contributes to the payload; other fields
//! (`event:`, `id:`, comments) are ignored. Chunk boundaries may fall
//! anywhere, including inside a UTF-8 sequence or between `\r` and `\n`.

use tracing::warn;

/// Keep-alive payload sent by the server between real frames
pub const KEEP_ALIVE: &str = "ping";

/// Largest unterminated block kept in memory; anything longer is discarded
/// up to the next blank line
pub const MAX_BLOCK_BYTES: usize = 1024 * 1024;

/// Incremental block splitter for an event stream
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
    /// Offset already searched for a block end
    scanned: usize,
    /// Inside an oversized block whose head was dropped
    discarding: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the payloads of every block it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = self.next_block_end() {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if let Some(payload) = block_payload(&block[..end]) {
                payloads.push(payload);
            }
        }

        if self.buffer.len() > MAX_BLOCK_BYTES {
            warn!(
                buffered = self.buffer.len(),
                max = MAX_BLOCK_BYTES,
                "discarding oversized event-stream block"
            );
            // A trailing newline may be the first half of the terminator
            let trailing_newline = self.buffer.last() == Some(&b'\n');
            self.buffer.clear();
            if trailing_newline {
                self.buffer.push(b'\n');
            }
            self.scanned = 0;
            self.discarding = true;
        }
        payloads
    }

    /// Flush a trailing block left in the buffer at end of stream
    pub fn finish(&mut self) -> Option<String> {
        let block = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        block_payload(&block)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn next_block_end(&mut self) -> Option<usize> {
        let start = self.scanned;
        match self.buffer[start..].windows(2).position(|w| w == b"\n\n") {
            Some(offset) => Some(start + offset),
            None => {
                // Keep the last byte in range so a terminator split across pushes is found
                self.scanned = self.buffer.len().saturating_sub(1);
                None
            }
        }
    }
}

/// Join the `data:` lines of one block, or `None` if it has none
fn block_payload(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let mut data: Option<String> = None;

    for line in text.lines() {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data {
            Some(ref mut joined) => {
                joined.push('\n');
                joined.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    data
}

/// True for the server's keep-alive payload
pub fn is_keep_alive(payload: &str) -> bool {
    payload.trim() == KEEP_ALIVE
}
