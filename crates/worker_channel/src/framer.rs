/// Reassembles newline-delimited lines from arbitrarily split byte chunks.
///
/// Only complete lines are ever yielded. Whatever follows the last `\n` of a
/// chunk is retained and prefixed to the next one, so a line split across any
/// number of reads comes out exactly once and intact. Decoding happens per
/// complete line, which keeps multi-byte UTF-8 sequences that straddle a chunk
/// boundary intact as well.
#[derive(Debug, Clone, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns the lines it completed, in order.
    ///
    /// The returned iterator owns the completed bytes; the framer is free to be
    /// fed again while it is still being consumed.
    pub fn feed(&mut self, chunk: &[u8]) -> FramedLines {
        self.buffer.extend_from_slice(chunk);
        let complete = match self.buffer.iter().rposition(|byte| *byte == b'\n') {
            Some(last_newline) => {
                let tail = self.buffer.split_off(last_newline + 1);
                std::mem::replace(&mut self.buffer, tail)
            }
            None => Vec::new(),
        };
        FramedLines {
            complete,
            offset: 0,
        }
    }

    /// Flushes the retained tail at end of stream.
    ///
    /// Returns `None` when nothing but whitespace is pending.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.buffer);
        let line = decode_line(&tail);
        if line.trim().is_empty() {
            None
        } else {
            Some(line)
        }
    }

    /// Number of bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Complete lines produced by one [`LineFramer::feed`] call.
#[derive(Debug, Clone)]
pub struct FramedLines {
    complete: Vec<u8>,
    offset: usize,
}

impl Iterator for FramedLines {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.complete.get(self.offset..)?;
        let end = rest.iter().position(|byte| *byte == b'\n')?;
        let line = decode_line(&rest[..end]);
        self.offset += end + 1;
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
