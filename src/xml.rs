//! Minimal pull tokenizer for the vendor export payloads.
//!
//! Both dialects are attribute-only XML: every piece of data sits in element
//! attributes and character data carries nothing. The tokenizer therefore
//! only reports start/end element events with decoded attributes and skips
//! text, comments, processing instructions and the DOCTYPE.

use anyhow::{anyhow, bail};

#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    End {
        name: String,
    },
}

pub struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
    /// A self-closing tag produces a Start event immediately followed by
    /// this pending End event.
    pending_end: Option<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Tokenizer {
            input: input.as_bytes(),
            pos: 0,
            pending_end: None,
        }
    }

    /// Returns the next element event, or `None` at end of input.
    pub fn next_event(&mut self) -> anyhow::Result<Option<XmlEvent>> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(XmlEvent::End { name }));
        }

        loop {
            // Skip character data up to the next markup.
            while self.pos < self.input.len() && self.input[self.pos] != b'<' {
                self.pos += 1;
            }
            if self.pos >= self.input.len() {
                return Ok(None);
            }
            self.pos += 1; // consume '<'

            match self.peek() {
                Some(b'?') => {
                    self.skip_until("?>")?;
                    continue;
                }
                Some(b'!') => {
                    // Comment or DOCTYPE.
                    if self.input[self.pos..].starts_with(b"!--") {
                        self.skip_until("-->")?;
                    } else {
                        self.skip_until(">")?;
                    }
                    continue;
                }
                Some(b'/') => {
                    self.pos += 1;
                    let name = self.read_name()?;
                    self.skip_whitespace();
                    if self.peek() != Some(b'>') {
                        bail!("malformed closing tag </{}>", name);
                    }
                    self.pos += 1;
                    return Ok(Some(XmlEvent::End { name }));
                }
                Some(_) => return self.read_start_tag().map(Some),
                None => bail!("unexpected end of input after '<'"),
            }
        }
    }

    fn read_start_tag(&mut self) -> anyhow::Result<XmlEvent> {
        let name = self.read_name()?;
        let mut attributes = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                    if self.peek() != Some(b'>') {
                        bail!("malformed self-closing tag <{}>", name);
                    }
                    self.pos += 1;
                    self.pending_end = Some(name.clone());
                    break;
                }
                Some(_) => {
                    let attr_name = self.read_name()?;
                    self.skip_whitespace();
                    if self.peek() != Some(b'=') {
                        bail!("attribute {} in <{}> has no value", attr_name, name);
                    }
                    self.pos += 1;
                    self.skip_whitespace();
                    let value = self.read_attr_value()?;
                    attributes.push((attr_name, value));
                }
                None => bail!("unexpected end of input in <{}>", name),
            }
        }

        Ok(XmlEvent::Start { name, attributes })
    }

    fn read_name(&mut self) -> anyhow::Result<String> {
        let start = self.pos;
        while self.pos < self.input.len() {
            let c = self.input[self.pos];
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'.' || c == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            bail!("expected a name at byte offset {}", start);
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn read_attr_value(&mut self) -> anyhow::Result<String> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => bail!("attribute value must be quoted"),
        };
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.input.len() && self.input[self.pos] != quote {
            self.pos += 1;
        }
        if self.pos >= self.input.len() {
            bail!("unterminated attribute value");
        }
        let raw = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.pos += 1;
        decode_entities(&raw)
    }

    fn skip_until(&mut self, marker: &str) -> anyhow::Result<()> {
        let marker = marker.as_bytes();
        while self.pos < self.input.len() {
            if self.input[self.pos..].starts_with(marker) {
                self.pos += marker.len();
                return Ok(());
            }
            self.pos += 1;
        }
        Err(anyhow!("unterminated markup, expected {:?}", String::from_utf8_lossy(marker)))
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }
}

fn decode_entities(raw: &str) -> anyhow::Result<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let end = tail
            .find(';')
            .ok_or_else(|| anyhow!("unterminated entity in attribute value"))?;
        let entity = &tail[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                let cp = u32::from_str_radix(&entity[2..], 16)
                    .map_err(|_| anyhow!("bad character reference &{};", entity))?;
                out.push(char::from_u32(cp).ok_or_else(|| anyhow!("bad code point {}", cp))?);
            }
            _ if entity.starts_with('#') => {
                let cp: u32 = entity[1..]
                    .parse()
                    .map_err(|_| anyhow!("bad character reference &{};", entity))?;
                out.push(char::from_u32(cp).ok_or_else(|| anyhow!("bad code point {}", cp))?);
            }
            _ => bail!("unknown entity &{};", entity),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<XmlEvent> {
        let mut t = Tokenizer::new(input);
        let mut out = Vec::new();
        while let Some(ev) = t.next_event().expect("tokenize") {
            out.push(ev);
        }
        out
    }

    #[test]
    fn start_end_and_attributes() {
        let events = collect(r#"<Course day="2" startSlot="4"><Teacher id="54"/></Course>"#);
        assert_eq!(events.len(), 4);
        match &events[0] {
            XmlEvent::Start { name, attributes } => {
                assert_eq!(name, "Course");
                assert_eq!(attributes[0], ("day".to_string(), "2".to_string()));
                assert_eq!(attributes[1], ("startSlot".to_string(), "4".to_string()));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            events[2],
            XmlEvent::End {
                name: "Teacher".to_string()
            }
        );
    }

    #[test]
    fn declaration_comments_and_text_are_skipped() {
        let events = collect(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- export -->\n<Root>text</Root>",
        );
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], XmlEvent::Start { name, .. } if name == "Root"));
    }

    #[test]
    fn entities_in_attribute_values() {
        let events = collect(r#"<Room name="A &amp; B &#233;tage"/>"#);
        match &events[0] {
            XmlEvent::Start { attributes, .. } => {
                assert_eq!(attributes[0].1, "A & B étage");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let mut t = Tokenizer::new("<Course day=\"2\"");
        assert!(t.next_event().is_err());
    }
}
