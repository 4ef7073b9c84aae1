//! Incremental decoder for `text/event-stream` bodies

/// Splits a byte stream into SSE `data:` payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// characters and lines split across network chunks decode correctly.
/// Multi-line `data:` fields are joined with `\n`, and an event is emitted on
/// the blank line that terminates it.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.process_line(rest.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"a\":1}\n\n");
        assert_eq!(events, vec![r#"{"a":1}"#]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: hel").is_empty());
        assert!(decoder.push(b"lo\r\n").is_empty());
        assert_eq!(decoder.push(b"\r\n"), vec!["hello"]);
    }

    #[test]
    fn test_utf8_split_inside_character() {
        let bytes = "data: café\n\n".as_bytes();
        let split = bytes.len() - 3; // inside the two-byte 'é'
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec!["café"]);
    }

    #[test]
    fn test_comments_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\ndata: line one\ndata: line two\n\n");
        assert_eq!(events, vec!["line one\nline two"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert!(decoder.finish().is_none());
    }
}
