//! Flattening of XMP metadata packets
//!
//! Every property of every `rdf:Description` becomes one entry keyed by its
//! lower-cased qualified name (`dc:title`, `xmp:createdate`). Properties
//! holding an `rdf:Alt`, `rdf:Seq` or `rdf:Bag` become lists of their `rdf:li`
//! items; anything else keeps its trimmed text. Nested structures are not
//! descended into.

use crate::error::{Error, Result};
use crate::types::{MetadataValue, XmpMetadata};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const DESCRIPTION: &str = "rdf:description";

struct Property {
    key: String,
    depth: usize,
    container: bool,
    items: Vec<String>,
    text: String,
}

impl Property {
    fn into_value(self) -> MetadataValue {
        if self.container {
            MetadataValue::List(self.items.into_iter().map(|s| s.trim().to_string()).collect())
        } else {
            MetadataValue::Text(self.text.trim().to_string())
        }
    }
}

fn qualified_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).to_lowercase()
}

fn read_attributes(element: &BytesStart<'_>, store: &mut XmpMetadata) -> Result<()> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| xmp_error(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_lowercase();
        if key == "xmlns" || key.starts_with("xmlns:") || key.starts_with("rdf:") {
            continue;
        }
        let value = attribute.unescape_value().map_err(|e| xmp_error(e.to_string()))?;
        store.insert(key, MetadataValue::Text(value.trim().to_string()));
    }
    Ok(())
}

fn resource_attribute(element: &BytesStart<'_>) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref().eq_ignore_ascii_case(b"rdf:resource"))
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

fn xmp_error(message: String) -> Error {
    Error::engine(format!("malformed XMP metadata: {}", message))
}

/// Parses an XMP packet into a flat key/value store
pub fn parse_xmp(xml: &str) -> Result<XmpMetadata> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut store = XmpMetadata::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<Property> = None;

    loop {
        match reader.read_event().map_err(|e| xmp_error(e.to_string()))? {
            Event::Start(element) => {
                let name = qualified_name(&element);
                if name == DESCRIPTION {
                    read_attributes(&element, &mut store)?;
                } else if let Some(property) = current.as_mut() {
                    match name.as_str() {
                        "rdf:alt" | "rdf:seq" | "rdf:bag" => property.container = true,
                        "rdf:li" => property.items.push(String::new()),
                        _ => {}
                    }
                } else if path.last().map(String::as_str) == Some(DESCRIPTION) {
                    current = Some(Property {
                        key: name.clone(),
                        depth: path.len(),
                        container: false,
                        items: Vec::new(),
                        text: String::new(),
                    });
                }
                path.push(name);
            }
            Event::Empty(element) => {
                let name = qualified_name(&element);
                if name == DESCRIPTION {
                    read_attributes(&element, &mut store)?;
                } else if let Some(property) = current.as_mut() {
                    if name == "rdf:li" {
                        property.items.push(String::new());
                    }
                } else if path.last().map(String::as_str) == Some(DESCRIPTION) {
                    let value = resource_attribute(&element).unwrap_or_default();
                    store.insert(name, MetadataValue::Text(value));
                }
            }
            Event::Text(text) => {
                if let Some(property) = current.as_mut() {
                    let text = text.unescape().map_err(|e| xmp_error(e.to_string()))?;
                    match path.last().map(String::as_str) {
                        Some("rdf:li") => {
                            if let Some(item) = property.items.last_mut() {
                                item.push_str(&text);
                            }
                        }
                        Some(name) if name == property.key => property.text.push_str(&text),
                        _ => {}
                    }
                }
            }
            Event::CData(data) => {
                if let Some(property) = current.as_mut() {
                    property.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                path.pop();
                if current.as_ref().is_some_and(|p| p.depth == path.len()) {
                    if let Some(property) = current.take() {
                        let key = property.key.clone();
                        store.insert(key, property.into_value());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(store)
}
