// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The push-style event interface between an XML source and the import engine.

use crate::errors::ParseError;
use indexmap::IndexMap;
use quick_xml::{Reader, events::Event};
use std::io::BufRead;

/// Receives the events of one log, in document order.
///
/// Nested elements are fully bracketed: every `on_start` is eventually followed by a matching
/// `on_end` for well-formed input. Self-closing elements are delivered as a start immediately
/// followed by an end.
pub trait LogEventHandler {
    /// Called when an element is opened.
    fn on_start(&mut self, name: &str, attrs: &Attributes) -> Result<(), ParseError>;

    /// Called for character data between tags. May be called several times within one element.
    fn on_char(&mut self, text: &str) -> Result<(), ParseError>;

    /// Called when an element is closed.
    fn on_end(&mut self, name: &str) -> Result<(), ParseError>;
}

/// The attributes of an element.
///
/// A missing attribute is distinguishable from one that is present but empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    inner: IndexMap<String, String>,
}

impl Attributes {
    /// Creates an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an attribute, replacing an earlier one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.inner.insert(name.into(), value.into());
        self
    }

    /// Returns the value of the attribute, or `None` if it is absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).map(String::as_str)
    }

    /// Iterates over the attributes in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (name, value) in iter {
            attrs.insert(name, value);
        }
        attrs
    }
}

/// Reads XML from `input` and pushes its events into `handler` until the end of the document.
///
/// Element and attribute names are reported without namespace prefixes. Comments, processing
/// instructions and the declaration are not reported.
pub fn drive_xml(
    input: impl BufRead,
    handler: &mut impl LogEventHandler,
) -> Result<(), ParseError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().expand_empty_elements = true;

    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| ParseError::xml(reader.error_position(), err))?;
        let position = reader.buffer_position();
        let decoder = reader.decoder();

        match event {
            Event::Start(start) => {
                let local_name = start.local_name();
                let name = decoder
                    .decode(local_name.as_ref())
                    .map_err(|err| ParseError::xml(position, err))?;

                let mut attrs = Attributes::new();
                for attr in start.attributes() {
                    let attr = attr.map_err(|err| ParseError::xml(position, err))?;
                    let key = attr.key.local_name();
                    let key = decoder
                        .decode(key.as_ref())
                        .map_err(|err| ParseError::xml(position, err))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|err| ParseError::xml(position, err))?;
                    attrs.insert(key, value);
                }

                handler.on_start(&name, &attrs)?;
            }
            Event::End(end) => {
                let local_name = end.local_name();
                let name = decoder
                    .decode(local_name.as_ref())
                    .map_err(|err| ParseError::xml(position, err))?;
                handler.on_end(&name)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|err| ParseError::xml(position, err))?;
                handler.on_char(&text)?;
            }
            Event::CData(cdata) => {
                let text = decoder
                    .decode(&cdata)
                    .map_err(|err| ParseError::xml(position, err))?;
                handler.on_char(&text)?;
            }
            Event::Eof => break,
            // Empty elements are expanded by the reader config.
            _ => {}
        }

        buf.clear();
    }

    Ok(())
}
