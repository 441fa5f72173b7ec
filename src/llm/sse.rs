/// Line buffer over a server-sent-events byte stream.
///
/// Bytes are held until a full line is available, so a multi-byte UTF-8
/// character split across network chunks decodes intact.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

pub const DONE_SENTINEL: &str = "[DONE]";

/// What one `data:` payload contributes to the answer.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Delta(String),
    Skip,
    /// The provider reported an error inside the stream.
    Failed(String),
}

/// Payload of a `data: ` line, trimmed.
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))
        .map(str::trim)
}
