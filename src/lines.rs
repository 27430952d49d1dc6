//! Line splitting for chunked output.
//!
//! OS reads arrive in arbitrary chunks. [`LineBuffer`] turns them into
//! complete lines, holding back at most one partial line between calls.
//! [`Utf8Decoder`] sits in front of it and carries incomplete multi-byte
//! sequences across raw byte reads.

/// Default end-of-line delimiter.
pub const DEFAULT_EOL: &str = "\n";

/// Accumulates text chunks and yields delimiter-terminated lines.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    eol: String,
    pending: Option<String>,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_EOL)
    }
}

impl LineBuffer {
    /// Create a buffer splitting on `eol`. An empty delimiter falls back to `\n`.
    #[must_use]
    pub fn new(eol: impl Into<String>) -> Self {
        let eol = eol.into();
        Self {
            eol: if eol.is_empty() {
                DEFAULT_EOL.to_string()
            } else {
                eol
            },
            pending: None,
        }
    }

    /// The delimiter lines are split on.
    #[must_use]
    pub fn eol(&self) -> &str {
        &self.eol
    }

    /// The buffered partial line, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Feed a chunk and return every line it completes, in order.
    ///
    /// The trailing segment after the last delimiter is kept as the pending
    /// fragment and prepended to the next chunk.
    pub fn read_lines(&mut self, chunk: &str) -> Vec<String> {
        let data = match self.pending.take() {
            Some(mut pending) => {
                pending.push_str(chunk);
                pending
            }
            None => chunk.to_string(),
        };

        let Some((complete, rest)) = data.rsplit_once(self.eol.as_str()) else {
            if !data.is_empty() {
                self.pending = Some(data);
            }
            return Vec::new();
        };

        if !rest.is_empty() {
            self.pending = Some(rest.to_string());
        }

        complete
            .split(self.eol.as_str())
            .map(str::to_string)
            .collect()
    }

    /// Take the pending fragment as a final line, if there is one.
    pub fn flush(&mut self) -> Option<String> {
        self.pending.take().filter(|line| !line.is_empty())
    }

    /// Discard the pending fragment without emitting it.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// Decodes raw byte chunks into text without splitting multi-byte characters.
///
/// Invalid sequences become U+FFFD; an incomplete sequence at the end of a
/// chunk is held until the next one arrives.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, prefixed with whatever was carried from the last call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.carry.len());

        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(text) => {
                    out.push_str(text);
                    self.carry.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.carry[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end, wait for more bytes.
                        None => {
                            self.carry.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.carry.drain(..valid + len);
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush any carried bytes, replacing them lossily.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        rest
    }

    /// Drop carried bytes.
    pub fn clear(&mut self) {
        self.carry.clear();
    }
}
