//! Incremental framing for a stream of concatenated JSON objects.
//!
//! JSON objects are self-delimiting, so no length prefix is needed. Encoded
//! messages are newline-terminated for readability only; the decoder does not
//! rely on line boundaries.

use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    scan: Scan,
}

/// How far the first value in the buffer has been scanned. Kept across
/// `decode` calls so each byte is inspected once.
#[derive(Debug, Default, Clone, Copy)]
struct Scan {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

enum Boundary {
    /// An object or array ends at this offset.
    Complete(usize),
    Incomplete,
    /// The first value is not an object or array.
    Scalar,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Decode the next complete message.
    ///
    /// Returns `Ok(None)` when the buffer holds only whitespace or a prefix
    /// of a message. Nothing is parsed until a whole top-level value is
    /// buffered.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>, serde_json::Error> {
        match self.find_boundary() {
            Boundary::Incomplete => Ok(None),
            Boundary::Complete(end) => {
                let result = serde_json::from_slice(&self.buf[..end]);
                self.buf.drain(..end);
                self.scan = Scan::default();
                result.map(Some)
            }
            Boundary::Scalar => {
                self.scan = Scan::default();
                self.decode_scalar()
            }
        }
    }

    fn find_boundary(&mut self) -> Boundary {
        while self.scan.pos < self.buf.len() {
            let b = self.buf[self.scan.pos];
            let s = &mut self.scan;
            s.pos += 1;

            if s.depth == 0 {
                match b {
                    b'{' | b'[' => s.depth = 1,
                    b if b.is_ascii_whitespace() => {}
                    _ => return Boundary::Scalar,
                }
                continue;
            }
            if s.in_string {
                if s.escaped {
                    s.escaped = false;
                } else if b == b'\\' {
                    s.escaped = true;
                } else if b == b'"' {
                    s.in_string = false;
                }
                continue;
            }
            match b {
                b'"' => s.in_string = true,
                b'{' | b'[' => s.depth += 1,
                b'}' | b']' => {
                    s.depth -= 1;
                    if s.depth == 0 {
                        return Boundary::Complete(s.pos);
                    }
                }
                _ => {}
            }
        }

        if self.scan.depth == 0 {
            self.buf.clear();
            self.scan = Scan::default();
        }
        Boundary::Incomplete
    }

    /// Numbers, strings and literals are rare at the top level; let serde
    /// find where they end.
    fn decode_scalar<T: DeserializeOwned>(&mut self) -> Result<Option<T>, serde_json::Error> {
        let (next, consumed) = {
            let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<T>();
            let next = stream.next();
            (next, stream.byte_offset())
        };

        match next {
            Some(Ok(msg)) => {
                self.buf.drain(..consumed);
                Ok(Some(msg))
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(e),
            None => {
                self.buf.clear();
                Ok(None)
            }
        }
    }

    /// True when undecoded, non-whitespace bytes remain.
    pub fn has_partial(&self) -> bool {
        self.buf.iter().any(|b| !b.is_ascii_whitespace())
    }
}

pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(msg)?;
    bytes.push(b'\n');
    Ok(bytes)
}
