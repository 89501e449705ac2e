use crate::error::{IngestError, Result};
use crate::utils::constants::SIDECAR_EXTENSION;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Reads XML sidecar descriptors into JSON documents.
///
/// Elements become objects keyed by tag name. Attributes are stored as
/// `@name`, text mixed with attributes or children as `#text`, and repeated
/// sibling elements are collected into arrays. An element holding only text
/// becomes a string; an empty element becomes `null`.
pub struct SidecarReader {
    extension: String,
}

impl SidecarReader {
    pub fn new() -> Self {
        Self {
            extension: SIDECAR_EXTENSION.to_string(),
        }
    }

    pub fn sidecar_path(&self, dataset_path: &Path) -> PathBuf {
        dataset_path.with_extension(&self.extension)
    }

    /// The parsed sidecar for a dataset, or `None` when no sidecar exists.
    pub fn read_for(&self, dataset_path: &Path) -> Result<Option<Value>> {
        let sidecar = self.sidecar_path(dataset_path);
        if !sidecar.is_file() {
            return Ok(None);
        }

        std::fs::read_to_string(&sidecar)
            .map_err(IngestError::from)
            .and_then(|xml| parse_xml(&xml))
            .map(Some)
            .map_err(|e| IngestError::Sidecar {
                path: sidecar,
                message: e.to_string(),
            })
    }
}

impl Default for SidecarReader {
    fn default() -> Self {
        Self::new()
    }
}

struct Element {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Element {
    fn start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value()?.into_owned();
            fields.insert(key, Value::String(value));
        }

        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.fields.insert(name, value);
            }
        }
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.fields.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            }
        } else {
            let mut fields = self.fields;
            if !text.is_empty() {
                fields.insert("#text".to_string(), Value::String(text.to_string()));
            }
            Value::Object(fields)
        }
    }
}

/// Convert an XML document into a nested JSON value keyed by the root tag.
pub fn parse_xml(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = Map::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::start(&start)?),
            Event::Empty(start) => {
                let element = Element::start(&start)?;
                close(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    IngestError::Config("unbalanced closing tag in sidecar".to_string())
                })?;
                close(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(IngestError::Config(
            "sidecar ended inside an open element".to_string(),
        ));
    }
    if root.is_empty() {
        return Err(IngestError::Config("sidecar has no root element".to_string()));
    }
    Ok(Value::Object(root))
}

fn close(stack: &mut [Element], root: &mut Map<String, Value>, element: Element) {
    let name = element.name.clone();
    let value = element.into_value();
    match stack.last_mut() {
        Some(parent) => parent.add_child(name, value),
        None => {
            root.insert(name, value);
        }
    }
}
