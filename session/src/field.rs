//! Text framing for the `text/event-stream` wire format.
//!
//! Every function here returns the exact chunk(s) handed to the transport.
//! Nothing is buffered: a field is one newline-terminated line, and a
//! multi-line payload becomes one line per segment.

/// Blank line that makes the client dispatch the buffered fields.
pub const DISPATCH: &str = "\n";

/// `id:<value>\n`. `None` resets the client's last event id.
pub fn id(value: Option<&str>) -> String {
    single_line("id", value.unwrap_or_default())
}

/// `event:<name>\n`.
pub fn event(name: &str) -> String {
    single_line("event", name)
}

/// `retry:<ms>\n`.
pub fn retry(ms: u64) -> String {
    format!("retry:{ms}\n")
}

/// One `data:<line>\n` chunk per line of `payload`, in order.
pub fn data(payload: &str) -> Vec<String> {
    split_lines(payload)
        .map(|line| format!("data:{line}\n"))
        .collect()
}

/// One `:<line>\n` chunk per line of `text`. Clients ignore comments, so
/// these are only useful to keep idle connections open.
pub fn comment(text: &str) -> Vec<String> {
    split_lines(text).map(|line| format!(":{line}\n")).collect()
}

fn single_line(name: &str, value: &str) -> String {
    format!("{name}:{}\n", strip_line_breaks(value))
}

/// Single-line fields lose their line breaks so a value can never start a
/// new field on the wire.
pub(crate) fn strip_line_breaks(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

/// Splits on `\r\n`, `\r` and `\n`, the three line endings EventSource
/// parsers recognise. An empty input yields one empty line.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['\r', '\n']) {
            Some(pos) => {
                let skip = if current[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&current[pos + skip..]);
                Some(&current[..pos])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

/// A complete event: optional type and id, a data payload, then dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

impl Message {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event: None,
            id: None,
            data: data.into(),
        }
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.event = Some(name.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The chunks this message writes, in wire order.
    pub fn encode(&self) -> Vec<String> {
        let mut chunks = Vec::new();
        if let Some(name) = &self.event {
            chunks.push(event(name));
        }
        if let Some(value) = &self.id {
            chunks.push(id(Some(value)));
        }
        chunks.extend(data(&self.data));
        chunks.push(DISPATCH.to_string());
        chunks
    }
}
