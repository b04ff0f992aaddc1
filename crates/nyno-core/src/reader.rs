//! Newline framing for inbound server messages.

use std::io::Read;

use crate::client::ClientError;

/// Size of a single receive.
const CHUNK_SIZE: usize = 2048;

/// Accumulates received bytes and splits them into lines.
///
/// Bytes that arrive after a newline stay buffered and are returned by the
/// next call, so pipelined responses are not lost.
#[derive(Debug, Default)]
pub struct LineReader {
    buf: Vec<u8>,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read up to and including the next `\n` and return the trimmed text
    /// before it.
    pub fn read_line<R: Read>(&mut self, src: &mut R) -> Result<String, ClientError> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                let text = std::str::from_utf8(&line[..pos]).map_err(ClientError::InvalidUtf8)?;
                return Ok(text.trim().to_string());
            }

            let n = match src.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ClientError::from_io(e)),
            };
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Bytes received but not yet returned as a line.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out its data in fixed-size pieces to mimic partial receives.
    struct Trickle {
        data: Vec<u8>,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(self.data.len()).min(out.len());
            out[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn test_reads_single_line() {
        let mut reader = LineReader::new();
        let mut src = Cursor::new(b"{\"status\":true}\n".to_vec());
        assert_eq!(reader.read_line(&mut src).unwrap(), "{\"status\":true}");
        assert!(reader.buffered().is_empty());
    }

    #[test]
    fn test_keeps_pipelined_lines() {
        let mut reader = LineReader::new();
        let mut src = Cursor::new(b"{\"a\":1}\n{\"b\":2}\n".to_vec());
        assert_eq!(reader.read_line(&mut src).unwrap(), "{\"a\":1}");
        assert_eq!(reader.buffered(), b"{\"b\":2}\n");
        assert_eq!(reader.read_line(&mut src).unwrap(), "{\"b\":2}");
    }

    #[test]
    fn test_assembles_partial_receives() {
        let mut reader = LineReader::new();
        let mut src = Trickle {
            data: b"  {\"route\":\"/sync\"}  \r\n".to_vec(),
            step: 3,
        };
        assert_eq!(reader.read_line(&mut src).unwrap(), "{\"route\":\"/sync\"}");
    }

    #[test]
    fn test_eof_is_connection_closed() {
        let mut reader = LineReader::new();
        let mut src = Cursor::new(b"{\"partial\":".to_vec());
        assert!(matches!(
            reader.read_line(&mut src),
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut reader = LineReader::new();
        let mut src = Cursor::new(vec![0xff, 0xfe, b'\n']);
        assert!(matches!(
            reader.read_line(&mut src),
            Err(ClientError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_clear_drops_leftovers() {
        let mut reader = LineReader::new();
        let mut src = Cursor::new(b"one\ntwo\n".to_vec());
        reader.read_line(&mut src).unwrap();
        reader.clear();
        assert!(reader.buffered().is_empty());
    }
}
