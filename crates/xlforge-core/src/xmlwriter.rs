//! Buffered streaming XML writer.
//!
//! Writes SpreadsheetML text directly to an underlying [`std::io::Write`]
//! without building an intermediate DOM. In debug builds it keeps an
//! element-name stack so mismatched `start_element`/`end_element` calls
//! panic immediately instead of producing malformed XML silently.

use std::io::Write;

use crate::error::Result;

/// Bytes buffered before an automatic flush to the underlying writer.
const FLUSH_THRESHOLD: usize = 8192;

/// Streaming XML writer used by every worksheet/styles/shared-strings
/// serializer.
pub struct XmlStreamWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
    #[cfg(debug_assertions)]
    open_elements: Vec<String>,
}

impl<W: Write> XmlStreamWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: Vec::with_capacity(FLUSH_THRESHOLD),
            #[cfg(debug_assertions)]
            open_elements: Vec::new(),
        }
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() >= FLUSH_THRESHOLD {
            self.flush()?;
        }
        Ok(())
    }

    pub fn write_declaration(&mut self) -> Result<()> {
        self.write_raw(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#)
    }

    /// Open a start tag without closing it (`<name`), so callers can add
    /// attributes before calling [`close_start_tag`](Self::close_start_tag).
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"<")?;
        self.write_raw(name.as_bytes())?;
        #[cfg(debug_assertions)]
        self.open_elements.push(name.to_string());
        Ok(())
    }

    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_raw(name.as_bytes())?;
        self.write_raw(b"=\"")?;
        self.write_escaped_attr(value)?;
        self.write_raw(b"\"")
    }

    pub fn attribute_u32(&mut self, name: &str, value: u32) -> Result<()> {
        self.attribute_display(name, value)
    }

    pub fn attribute_f64(&mut self, name: &str, value: f64) -> Result<()> {
        self.attribute_display(name, value)
    }

    fn attribute_display(&mut self, name: &str, value: impl std::fmt::Display) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_raw(name.as_bytes())?;
        self.write_raw(b"=\"")?;
        self.write_raw(value.to_string().as_bytes())?;
        self.write_raw(b"\"")
    }

    /// Close the current start tag as `>`, leaving it open for child content.
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// Close the current start tag as `/>`, ending the element immediately.
    pub fn close_empty_element(&mut self) -> Result<()> {
        #[cfg(debug_assertions)]
        self.open_elements.pop();
        self.write_raw(b"/>")
    }

    pub fn end_element(&mut self, name: &str) -> Result<()> {
        #[cfg(debug_assertions)]
        {
            let expected = self.open_elements.pop();
            debug_assert_eq!(
                expected.as_deref(),
                Some(name),
                "xml writer: end_element({name}) does not match the open element stack"
            );
        }
        self.write_raw(b"</")?;
        self.write_raw(name.as_bytes())?;
        self.write_raw(b">")
    }

    /// Write escaped character data (element text content).
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        self.write_escaped(text, false)
    }

    fn write_escaped_attr(&mut self, text: &str) -> Result<()> {
        self.write_escaped(text, true)
    }

    /// Escape `& < > " '` and drop control characters outside the three
    /// XML-legal ones (tab, LF, CR), matching what Excel itself tolerates
    /// in a SpreadsheetML text node.
    fn write_escaped(&mut self, text: &str, in_attribute: bool) -> Result<()> {
        for ch in text.chars() {
            match ch {
                '&' => self.write_raw(b"&amp;")?,
                '<' => self.write_raw(b"&lt;")?,
                '>' => self.write_raw(b"&gt;")?,
                '"' if in_attribute => self.write_raw(b"&quot;")?,
                '\'' if in_attribute => self.write_raw(b"&apos;")?,
                '\t' | '\n' | '\r' => {
                    let mut buf = [0u8; 4];
                    self.write_raw(ch.encode_utf8(&mut buf).as_bytes())?
                }
                c if (c as u32) < 0x20 => {
                    // Other C0 control characters are not legal XML
                    // character data and are silently dropped.
                }
                c => {
                    let mut buf = [0u8; 4];
                    self.write_raw(c.encode_utf8(&mut buf).as_bytes())?
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush and return the underlying writer, asserting the element stack
    /// is balanced in debug builds.
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        #[cfg(debug_assertions)]
        debug_assert!(
            self.open_elements.is_empty(),
            "xml writer finished with unclosed elements: {:?}",
            self.open_elements
        );
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn into_string(w: XmlStreamWriter<Vec<u8>>) -> String {
        String::from_utf8(w.finish().unwrap()).unwrap()
    }

    #[test]
    fn writes_a_simple_element_with_attribute() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("row").unwrap();
        w.attribute("r", "1").unwrap();
        w.close_start_tag().unwrap();
        w.write_text("hello").unwrap();
        w.end_element("row").unwrap();
        assert_eq!(into_string(w), r#"<row r="1">hello</row>"#);
    }

    #[test]
    fn writes_self_closing_element() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("c").unwrap();
        w.attribute("r", "A1").unwrap();
        w.close_empty_element().unwrap();
        assert_eq!(into_string(w), r#"<c r="A1"/>"#);
    }

    #[test]
    fn escapes_reserved_characters_in_text_and_attributes() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("t").unwrap();
        w.close_start_tag().unwrap();
        w.write_text("a < b & c > d \"e\" 'f'").unwrap();
        w.end_element("t").unwrap();
        assert_eq!(
            into_string(w),
            "<t>a &lt; b &amp; c &gt; d \"e\" 'f'</t>"
        );
    }

    #[test]
    fn escapes_quotes_only_inside_attributes() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("c").unwrap();
        w.attribute("t", "he said \"hi\"").unwrap();
        w.close_empty_element().unwrap();
        assert_eq!(into_string(w), r#"<c t="he said &quot;hi&quot;"/>"#);
    }

    #[test]
    fn preserves_tab_newline_and_carriage_return() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("t").unwrap();
        w.close_start_tag().unwrap();
        w.write_text("a\tb\nc\rd").unwrap();
        w.end_element("t").unwrap();
        assert_eq!(into_string(w), "<t>a\tb\nc\rd</t>");
    }

    #[test]
    fn drops_other_control_characters() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("t").unwrap();
        w.close_start_tag().unwrap();
        w.write_text("a\u{0001}b\u{0007}c").unwrap();
        w.end_element("t").unwrap();
        assert_eq!(into_string(w), "<t>abc</t>");
    }

    #[test]
    #[should_panic(expected = "does not match the open element stack")]
    fn mismatched_end_element_panics_in_debug() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("row").unwrap();
        w.close_start_tag().unwrap();
        w.end_element("cell").unwrap();
    }

    #[test]
    fn flushes_automatically_past_threshold() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("t").unwrap();
        w.close_start_tag().unwrap();
        let long = "x".repeat(FLUSH_THRESHOLD + 100);
        w.write_text(&long).unwrap();
        w.end_element("t").unwrap();
        let out = into_string(w);
        assert_eq!(out.len(), long.len() + "<t></t>".len());
    }
}
