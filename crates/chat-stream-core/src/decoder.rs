//! Splits a chunked byte stream into text lines.
//!
//! Splitting happens on raw bytes, so a multi-byte UTF-8 sequence cut by a
//! chunk boundary stays in the carry-over buffer until its line completes.

#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, without terminators.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.buf[start..end]));
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Returns the trailing line left without a terminator, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Some(line)
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.push_chunk(chunk));
        }
        lines.extend(decoder.finish());
        lines
    }

    #[test]
    fn partial_line_is_carried_over() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push_chunk(b"data: {\"delta\":\"hel").is_empty());
        assert_eq!(decoder.pending(), 19);
        let lines = decoder.push_chunk(b"lo\"}\n\n");
        assert_eq!(lines, vec!["data: {\"delta\":\"hello\"}".to_string(), String::new()]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        assert_eq!(
            decode_all(&[b"data: a\r\ndata: b\r\n"]),
            vec!["data: a".to_string(), "data: b".to_string()]
        );
    }

    #[test]
    fn every_split_point_yields_the_same_lines() {
        let input = "data: {\"delta\":\"Grüße 🌍\"}\ndata: {\"delta\":\"née\"}\ndata: [DONE]\n".as_bytes();
        let expected = decode_all(&[input]);
        for split in 0..=input.len() {
            let (a, b) = input.split_at(split);
            assert_eq!(decode_all(&[a, b]), expected, "split at {split}");
        }
        let single_bytes: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(decode_all(&single_bytes), expected);
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        assert_eq!(decode_all(&[b"data: x\ndata: y"]), vec!["data: x", "data: y"]);
    }
}
