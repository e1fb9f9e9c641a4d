//! Incremental `text/event-stream` decoder.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Buffers raw chunks and yields complete events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk and return every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }
}

fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }

    Some(SseEvent {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"event: put\ndata: {\"path\":").is_empty());

        let events = decoder.feed(b"\"/\",\"data\":null}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "put".to_string(),
                    data: r#"{"path":"/","data":null}"#.to_string(),
                },
                SseEvent {
                    event: "keep-alive".to_string(),
                    data: "null".to_string(),
                },
            ]
        );
    }

    #[test]
    fn accepts_crlf_and_comments() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b": hello\r\nevent: cancel\r\ndata: denied\r\n\r\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "cancel".to_string(),
                data: "denied".to_string(),
            }]
        );
    }

    #[test]
    fn joins_multiline_data_and_defaults_event_name() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b"data: first\ndata: second\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "first\nsecond");
    }
}
