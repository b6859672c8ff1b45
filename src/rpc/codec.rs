//! Newline-delimited command codec.
//!
//! Wire format (client → node):
//! ```text
//! ┌──────────────────────────────┬────┐
//! │ ASCII command (≤ 256 bytes)  │ \n │   optional \r before \n
//! └──────────────────────────────┴────┘
//! ```
//!
//! A single socket read may carry part of a line or several lines; the
//! decoder buffers across reads and yields complete lines only.

use heapless::Vec;

use crate::error::CommsError;

/// Longest accepted line, terminator excluded.
pub const MAX_LINE: usize = 256;

pub struct LineDecoder {
    /// One spare byte for the `\r` of a full-length `\r\n` line.
    buf: Vec<u8, { MAX_LINE + 1 }>,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Feed bytes, returning every line they complete.  Blank lines are
    /// skipped.  On overflow or bad UTF-8 the partial line is discarded and
    /// the error returned; lines completed earlier in `data` are lost too.
    pub fn feed(&mut self, data: &[u8]) -> Result<std::vec::Vec<String>, CommsError> {
        let mut lines = std::vec::Vec::new();
        for &byte in data {
            if byte == b'\n' {
                let raw = self.buf.strip_suffix(b"\r").unwrap_or(&self.buf);
                let line = core::str::from_utf8(raw).map(str::to_owned);
                self.buf.clear();
                let line = line.map_err(|_| CommsError::InvalidUtf8)?;
                if !line.trim().is_empty() {
                    lines.push(line);
                }
            } else if self.buf.push(byte).is_err()
                || (self.buf.len() > MAX_LINE && byte != b'\r')
            {
                self.buf.clear();
                return Err(CommsError::LineTooLong);
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_across_reads() {
        let mut d = LineDecoder::new();
        assert!(d.feed(b"GE").unwrap().is_empty());
        assert_eq!(d.feed(b"TS\nSTA").unwrap(), ["GETS"]);
        assert_eq!(d.feed(b"TUS\r\n").unwrap(), ["STATUS"]);
    }

    #[test]
    fn several_lines_in_one_read() {
        let mut d = LineDecoder::new();
        assert_eq!(
            d.feed(b"STOP\n\n  \nCONTROL V1 OPEN\n").unwrap(),
            ["STOP", "CONTROL V1 OPEN"]
        );
    }

    #[test]
    fn overlong_line_rejected_then_recovers() {
        let mut d = LineDecoder::new();
        let long = [b'A'; MAX_LINE + 1];
        assert_eq!(d.feed(&long), Err(CommsError::LineTooLong));
        assert_eq!(d.feed(b"GETS\n").unwrap(), ["GETS"]);
    }

    #[test]
    fn max_length_line_accepted() {
        let mut d = LineDecoder::new();
        let mut line = [b'A'; MAX_LINE + 1];
        line[MAX_LINE] = b'\n';
        assert_eq!(d.feed(&line).unwrap().len(), 1);
    }

    #[test]
    fn max_length_line_accepted_with_crlf() {
        let mut d = LineDecoder::new();
        let mut line = vec![b'A'; MAX_LINE];
        line.extend_from_slice(b"\r\n");
        let lines = d.feed(&line).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_LINE);
    }

    #[test]
    fn carriage_return_only_excused_before_newline() {
        let mut d = LineDecoder::new();
        let mut line = vec![b'A'; MAX_LINE];
        line.extend_from_slice(b"\rB\n");
        assert_eq!(d.feed(&line), Err(CommsError::LineTooLong));

        let mut line = vec![b'A'; MAX_LINE + 1];
        line.extend_from_slice(b"\r\n");
        assert_eq!(d.feed(&line), Err(CommsError::LineTooLong));
        assert_eq!(d.feed(b"STOP\r\n").unwrap(), ["STOP"]);
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut d = LineDecoder::new();
        assert_eq!(d.feed(b"GE\xffTS\n"), Err(CommsError::InvalidUtf8));
    }
}
