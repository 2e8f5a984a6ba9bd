//! Incremental server-sent-events decoding.
//!
//! Bytes arrive in arbitrary slices; [`SseDecoder::push`] buffers them and
//! yields every complete event (terminated by a blank line).

/// One decoded SSE item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    /// A dispatched event. `data` lines are joined with `\n`.
    Event {
        event: Option<String>,
        id: Option<String>,
        data: String,
    },
    /// A comment-only block (`: keep-alive`), used by servers as liveness.
    Comment,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    /// Bytes of a UTF-8 sequence cut off at the end of the previous slice.
    partial: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns all events completed by this slice.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.partial.extend_from_slice(bytes);
        let complete = match std::str::from_utf8(&self.partial) {
            Ok(_) => self.partial.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.partial.len(),
        };
        let tail = self.partial.split_off(complete);
        let head = std::mem::replace(&mut self.partial, tail);
        self.buffer.push_str(&String::from_utf8_lossy(&head));

        if self.buffer.contains('\r') {
            // A trailing CR may be the first half of a CRLF split across slices.
            let pending_cr = self.buffer.ends_with('\r');
            if pending_cr {
                self.buffer.pop();
            }
            self.buffer = self.buffer.replace("\r\n", "\n").replace('\r', "\n");
            if pending_cr {
                self.buffer.push('\r');
            }
        }

        let mut items = Vec::new();
        while let Some(event_end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..event_end + 2).collect();
            if let Some(item) = parse_block(&block[..event_end]) {
                items.push(item);
            }
        }
        items
    }

    /// Flush a trailing event that was never terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseItem> {
        let partial = std::mem::take(&mut self.partial);
        self.buffer.push_str(&String::from_utf8_lossy(&partial));
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches('\n');
        if rest.is_empty() {
            None
        } else {
            parse_block(rest)
        }
    }
}

fn parse_block(block: &str) -> Option<SseItem> {
    let mut event = None;
    let mut id = None;
    let mut data: Vec<&str> = Vec::new();
    let mut saw_comment = false;

    for line in block.lines() {
        if line.starts_with(':') {
            saw_comment = true;
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => data.push(value),
            "event" => event = Some(value.to_string()),
            "id" => id = Some(value.to_string()),
            _ => {}
        }
    }

    if data.is_empty() && event.is_none() {
        return saw_comment.then_some(SseItem::Comment);
    }

    Some(SseItem::Event {
        event,
        id,
        data: data.join("\n"),
    })
}
