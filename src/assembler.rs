//! Entity assembly over the raw element event stream.
//!
//! One recognized top-level element is "open" at a time. Its attributes seed
//! a JSON object; every nested element encountered while it is open appends
//! that element's attributes to an array field named after the nested tag.
//! The record is only complete (and handed to the caller) on the matching
//! end event, so callers must not act on a record before then.
//!
//! Completion is matched by tag name, which makes a nested element carrying
//! the open entity's own tag ambiguous input. That is rejected as fatal
//! rather than silently closing the entity early.

use serde_json::{Map, Value};

use crate::error::{ImportError, Result};
use crate::xml::{Tokenizer, XmlEvent};

pub struct Assembler<'a> {
    recognized: &'a [&'a str],
    open: Option<(String, Map<String, Value>)>,
}

/// A fully assembled entity record: the top-level tag plus its JSON object.
pub type Entity = (String, Value);

impl<'a> Assembler<'a> {
    pub fn new(recognized: &'a [&'a str]) -> Self {
        Assembler {
            recognized,
            open: None,
        }
    }

    /// Feeds one event. Returns a completed entity on a matching end event.
    pub fn feed(&mut self, event: XmlEvent) -> Result<Option<Entity>> {
        match event {
            XmlEvent::Start { name, attributes } => {
                if let Some((open_name, record)) = self.open.as_mut() {
                    if *open_name == name {
                        return Err(ImportError::Parse(format!(
                            "element <{}> opened while a <{}> entity is still open",
                            name, open_name
                        )));
                    }
                    // Nested element: append to the list named after its tag,
                    // at whatever depth it appears.
                    let child = attributes_to_object(attributes);
                    let field = record
                        .entry(name)
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(children) = field {
                        children.push(Value::Object(child));
                    }
                    return Ok(None);
                }
                if self.recognized.contains(&name.as_str()) {
                    self.open = Some((name, attributes_to_object(attributes)));
                }
                Ok(None)
            }
            XmlEvent::End { name } => match self.open.take() {
                Some((tag, record)) if tag == name => Ok(Some((tag, Value::Object(record)))),
                other => {
                    self.open = other;
                    Ok(None)
                }
            },
        }
    }

    /// True while a top-level entity is open and incomplete.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

fn attributes_to_object(attributes: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in attributes {
        map.insert(k, Value::String(v));
    }
    map
}

/// Runs the tokenizer over a payload, feeding each completed entity to the
/// callback. The callback may itself fail the run.
pub fn assemble<F>(payload: &str, recognized: &[&str], mut on_entity: F) -> Result<()>
where
    F: FnMut(Entity) -> Result<()>,
{
    let mut tokenizer = Tokenizer::new(payload);
    let mut assembler = Assembler::new(recognized);
    loop {
        let event = tokenizer
            .next_event()
            .map_err(|e| ImportError::Parse(e.to_string()))?;
        let Some(event) = event else { break };
        if let Some(entity) = assembler.feed(event)? {
            on_entity(entity)?;
        }
    }
    if assembler.is_open() {
        return Err(ImportError::Parse(
            "payload ended with an entity still open".to_string(),
        ));
    }
    Ok(())
}
