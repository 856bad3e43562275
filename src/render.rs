//! Render sinks: where received messages end up.
//!
//! A sink starts out showing a single placeholder entry. The session clears
//! it right before the first real message is appended, so an empty history
//! leaves the placeholder in place.
//!
//! User-supplied text is never spliced raw into output. Terminal output has
//! control characters stripped (no ANSI injection) and the HTML form escapes
//! markup characters.

use std::fmt;
use std::io::Write;

use colored::*;

use crate::error::ChatError;
use crate::protocol::Message;

/// Text shown for the placeholder.
pub const PLACEHOLDER_TEXT: &str = "No messages yet.";

// ---------------------------------------------------------------------------
// Rendered message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    /// Posted under this session's username.
    You,
    Other(String),
}

impl Author {
    pub fn label(&self) -> &str {
        match self {
            Author::You => "You",
            Author::Other(name) => name,
        }
    }
}

/// A message ready for display, attributed relative to the local session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub author: Author,
    pub content: String,
}

impl RenderedMessage {
    /// Attribute `message` to [`Author::You`] when its username equals
    /// `local_username`, otherwise to the sender.
    pub fn from_message(message: &Message, local_username: &str) -> Self {
        let author = if message.username == local_username {
            Author::You
        } else {
            Author::Other(message.username.clone())
        };
        Self {
            author,
            content: message.content.clone(),
        }
    }

    pub fn is_self(&self) -> bool {
        self.author == Author::You
    }

    /// HTML fragment for embedders that render into markup.
    pub fn to_html(&self) -> String {
        let class = if self.is_self() {
            "message self-message"
        } else {
            "message"
        };
        format!(
            "<div class=\"{}\"><b>({})</b> {}</div>",
            class,
            escape_html(self.author.label()),
            escape_html(&self.content)
        )
    }
}

impl fmt::Display for RenderedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) {}",
            strip_control(self.author.label()),
            strip_control(&self.content)
        )
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Drop control characters; newlines and tabs collapse to a space so one
/// message always occupies one line.
pub fn strip_control(s: &str) -> String {
    s.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

pub trait RenderSink {
    /// True while the placeholder entry is still showing.
    fn has_placeholder(&self) -> bool;

    /// Remove every entry, placeholder included.
    fn clear(&mut self) -> Result<(), ChatError>;

    fn append(&mut self, message: RenderedMessage) -> Result<(), ChatError>;

    /// Bring the newest entry into view.
    fn scroll_to_latest(&mut self) -> Result<(), ChatError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory container
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Placeholder,
    Message(RenderedMessage),
}

/// Keeps rendered entries in memory, in append order.
#[derive(Debug, Clone)]
pub struct MessageContainer {
    entries: Vec<Entry>,
    /// Index of the entry last scrolled into view.
    scrolled_to: Option<usize>,
}

impl MessageContainer {
    /// A container holding only the placeholder.
    pub fn new() -> Self {
        Self {
            entries: vec![Entry::Placeholder],
            scrolled_to: None,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &RenderedMessage> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Message(m) => Some(m),
            Entry::Placeholder => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn scrolled_to(&self) -> Option<usize> {
        self.scrolled_to
    }

    /// Plain-text lines, one per entry.
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| match e {
                Entry::Placeholder => PLACEHOLDER_TEXT.to_string(),
                Entry::Message(m) => m.to_string(),
            })
            .collect()
    }
}

impl Default for MessageContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for MessageContainer {
    fn has_placeholder(&self) -> bool {
        matches!(self.entries.first(), Some(Entry::Placeholder))
    }

    fn clear(&mut self) -> Result<(), ChatError> {
        self.entries.clear();
        self.scrolled_to = None;
        Ok(())
    }

    fn append(&mut self, message: RenderedMessage) -> Result<(), ChatError> {
        self.entries.push(Entry::Message(message));
        Ok(())
    }

    fn scroll_to_latest(&mut self) -> Result<(), ChatError> {
        self.scrolled_to = self.entries.len().checked_sub(1);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Terminal sink
// ---------------------------------------------------------------------------

/// Writes one line per message to `out`.
///
/// A terminal cannot take lines back, so `clear` only drops the placeholder
/// flag; the placeholder line stays in scrollback.
pub struct TerminalSink<W: Write> {
    out: W,
    color: bool,
    placeholder: bool,
}

impl<W: Write> TerminalSink<W> {
    /// Create the sink and print the placeholder line.
    pub fn new(mut out: W, color: bool) -> Result<Self, ChatError> {
        if color {
            writeln!(out, "{}", PLACEHOLDER_TEXT.dimmed())?;
        } else {
            writeln!(out, "{}", PLACEHOLDER_TEXT)?;
        }
        out.flush()?;
        Ok(Self {
            out,
            color,
            placeholder: true,
        })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderSink for TerminalSink<W> {
    fn has_placeholder(&self) -> bool {
        self.placeholder
    }

    fn clear(&mut self) -> Result<(), ChatError> {
        self.placeholder = false;
        Ok(())
    }

    fn append(&mut self, message: RenderedMessage) -> Result<(), ChatError> {
        let label = format!("({})", strip_control(message.author.label()));
        let content = strip_control(&message.content);
        if !self.color {
            writeln!(self.out, "{} {}", label, content)?;
        } else if message.is_self() {
            writeln!(self.out, "{} {}", label.bright_green().bold(), content)?;
        } else {
            writeln!(self.out, "{} {}", label.bright_cyan().bold(), content)?;
        }
        Ok(())
    }

    fn scroll_to_latest(&mut self) -> Result<(), ChatError> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(username: &str, content: &str) -> Message {
        Message {
            username: username.into(),
            content: content.into(),
        }
    }

    // -- RenderedMessage ----------------------------------------------------

    #[test]
    fn test_self_message_renders_as_you() {
        let r = RenderedMessage::from_message(&msg("client-4821", "hi"), "client-4821");
        assert!(r.is_self());
        assert_eq!(r.to_string(), "(You) hi");
    }

    #[test]
    fn test_other_message_renders_with_username() {
        let r = RenderedMessage::from_message(&msg("client-7", "yo"), "client-4821");
        assert_eq!(r.author, Author::Other("client-7".into()));
        assert_eq!(r.to_string(), "(client-7) yo");
    }

    #[test]
    fn test_username_match_is_exact() {
        let r = RenderedMessage::from_message(&msg("Client-4821", "x"), "client-4821");
        assert!(!r.is_self());
    }

    #[test]
    fn test_to_html_escapes_content_and_username() {
        let r = RenderedMessage::from_message(
            &msg("<b>", "<script>alert('x')</script> & \"more\""),
            "me",
        );
        let html = r.to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"));
        assert!(html.contains("(&lt;b&gt;)"));
        assert!(html.contains("&amp; &quot;more&quot;"));
        assert!(html.starts_with("<div class=\"message\">"));
    }

    #[test]
    fn test_to_html_self_class() {
        let r = RenderedMessage::from_message(&msg("me", "hi"), "me");
        assert_eq!(
            r.to_html(),
            "<div class=\"message self-message\"><b>(You)</b> hi</div>"
        );
    }

    #[test]
    fn test_display_strips_ansi_escape() {
        let r = RenderedMessage::from_message(&msg("eve", "\x1b[2Jgotcha"), "me");
        assert_eq!(r.to_string(), "(eve) [2Jgotcha");
    }

    #[test]
    fn test_strip_control_flattens_newlines() {
        assert_eq!(strip_control("a\nb\tc\r"), "a b c ");
    }

    // -- MessageContainer ---------------------------------------------------

    #[test]
    fn test_container_starts_with_placeholder() {
        let c = MessageContainer::new();
        assert!(c.has_placeholder());
        assert_eq!(c.entries(), &[Entry::Placeholder]);
        assert_eq!(c.lines(), vec![PLACEHOLDER_TEXT.to_string()]);
    }

    #[test]
    fn test_container_clear_and_append() {
        let mut c = MessageContainer::new();
        c.clear().unwrap();
        assert!(c.is_empty());
        assert!(!c.has_placeholder());
        c.append(RenderedMessage::from_message(&msg("a", "1"), "b")).unwrap();
        c.scroll_to_latest().unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.scrolled_to(), Some(0));
        assert_eq!(c.messages().count(), 1);
    }

    // -- TerminalSink -------------------------------------------------------

    #[test]
    fn test_terminal_sink_plain_output() {
        let mut sink = TerminalSink::new(Vec::new(), false).unwrap();
        assert!(sink.has_placeholder());
        sink.clear().unwrap();
        assert!(!sink.has_placeholder());
        sink.append(RenderedMessage::from_message(&msg("me", "hi"), "me"))
            .unwrap();
        sink.append(RenderedMessage::from_message(&msg("bob", "hey"), "me"))
            .unwrap();
        sink.scroll_to_latest().unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "No messages yet.\n(You) hi\n(bob) hey\n");
    }

    #[test]
    fn test_terminal_sink_strips_control_chars() {
        let mut sink = TerminalSink::new(Vec::new(), false).unwrap();
        sink.append(RenderedMessage::from_message(&msg("x\x1b", "a\x07b"), "me"))
            .unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.ends_with("(x) ab\n"));
    }
}
