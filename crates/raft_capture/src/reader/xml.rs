use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::{
    escape::resolve_predefined_entity,
    events::{BytesRef, BytesStart, Event},
    Reader,
};

use tracing::debug;

use crate::ParserStreamError;

/// Element subtree of one record, with namespaces stripped from names.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Follows a `/`-separated chain of first children.
    pub fn descend(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .try_fold(self, |element, name| element.child(name))
    }

    /// Trimmed text of the element at `path`; `None` when absent or blank.
    pub fn text_at(&self, path: &str) -> Option<String> {
        self.descend(path).and_then(XmlElement::trimmed_text)
    }

    pub fn trimmed_text(&self) -> Option<String> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Element content as bytes, decoding base64 when the element says so
    /// (`base64="true"` or `encoding="base64"`).
    pub fn payload(&self, source: &Path) -> Result<Vec<u8>, ParserStreamError> {
        let encoded = self.attribute("base64") == Some("true")
            || self
                .attribute("encoding")
                .is_some_and(|value| value.eq_ignore_ascii_case("base64"));
        if !encoded {
            return Ok(self.text.as_bytes().to_vec());
        }
        let compact: Vec<u8> = self
            .text
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(compact)
            .map_err(|source_err| ParserStreamError::Base64 {
                path: source.to_path_buf(),
                element: self.name.clone(),
                source: source_err,
            })
    }
}

enum XmlEvent {
    Start(XmlElement),
    Empty(XmlElement),
    End,
    Text(String),
    Eof,
}

/// Streams every `<record_tag>` element of an XML document as an
/// [`XmlElement`] tree. Only one record is held in memory at a time.
pub(crate) struct XmlRecordReader<R: BufRead> {
    reader: Reader<R>,
    record_tag: &'static str,
    path: PathBuf,
    buf: Vec<u8>,
    done: bool,
}

impl XmlRecordReader<BufReader<File>> {
    pub fn open(path: &Path, record_tag: &'static str) -> Result<Self, ParserStreamError> {
        let file = super::open(path)?;
        debug!(path = %path.display(), record_tag, "streaming xml records");
        Ok(Self::new(BufReader::new(file), path, record_tag))
    }
}

impl<R: BufRead> XmlRecordReader<R> {
    pub fn new(source: R, path: &Path, record_tag: &'static str) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = false;
        Self {
            reader,
            record_tag,
            path: path.to_path_buf(),
            buf: Vec::new(),
            done: false,
        }
    }

    fn next_event(&mut self) -> Result<XmlEvent, ParserStreamError> {
        self.buf.clear();
        let decoded = match self.reader.read_event_into(&mut self.buf) {
            Ok(Event::Start(start)) => element_from_start(&start).map(XmlEvent::Start),
            Ok(Event::Empty(start)) => element_from_start(&start).map(XmlEvent::Empty),
            Ok(Event::End(_)) => Ok(XmlEvent::End),
            Ok(Event::Text(text)) => text
                .decode()
                .map(|text| XmlEvent::Text(text.into_owned()))
                .map_err(quick_xml::Error::from),
            Ok(Event::CData(data)) => data
                .decode()
                .map(|text| XmlEvent::Text(text.into_owned()))
                .map_err(quick_xml::Error::from),
            Ok(Event::GeneralRef(reference)) => resolve_reference(&reference).map(XmlEvent::Text),
            Ok(Event::Eof) => Ok(XmlEvent::Eof),
            Ok(_) => Ok(XmlEvent::Text(String::new())),
            Err(err) => Err(err),
        };
        decoded.map_err(|err| self.error(err.to_string()))
    }

    fn error(&self, message: String) -> ParserStreamError {
        ParserStreamError::Xml {
            path: self.path.clone(),
            position: self.reader.buffer_position(),
            message,
        }
    }

    fn read_record(&mut self, root: XmlElement) -> Result<XmlElement, ParserStreamError> {
        let mut stack = vec![root];
        loop {
            match self.next_event()? {
                XmlEvent::Start(element) => stack.push(element),
                XmlEvent::Empty(element) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    }
                }
                XmlEvent::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                XmlEvent::End => {
                    let Some(finished) = stack.pop() else {
                        continue;
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => return Ok(finished),
                    }
                }
                XmlEvent::Eof => {
                    return Err(self.error(format!(
                        "unexpected end of file inside <{}>",
                        self.record_tag
                    )))
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for XmlRecordReader<R> {
    type Item = Result<XmlElement, ParserStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let event = match self.next_event() {
                Ok(event) => event,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            match event {
                XmlEvent::Start(element) if element.name == self.record_tag => {
                    let record = self.read_record(element);
                    self.done = record.is_err();
                    return Some(record);
                }
                XmlEvent::Empty(element) if element.name == self.record_tag => {
                    return Some(Ok(element));
                }
                XmlEvent::Eof => {
                    self.done = true;
                    return None;
                }
                _ => {}
            }
        }
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, quick_xml::Error> {
    let mut attributes = BTreeMap::new();
    for attr in start.attributes().flatten() {
        let value = attr.unescape_value()?.into_owned();
        attributes.insert(local_name(attr.key.as_ref()), value);
    }
    Ok(XmlElement {
        name: local_name(start.name().as_ref()),
        attributes,
        ..XmlElement::default()
    })
}

fn local_name(qualified: &[u8]) -> String {
    let name = String::from_utf8_lossy(qualified);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

/// Character references and the predefined entities resolve; any other
/// entity is kept as written since no DTD is read.
fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, quick_xml::Error> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = reference.decode()?;
    Ok(match resolve_predefined_entity(&name) {
        Some(resolved) => resolved.to_string(),
        None => format!("&{name};"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(xml: &str, tag: &'static str) -> Vec<Result<XmlElement, ParserStreamError>> {
        XmlRecordReader::new(xml.as_bytes(), Path::new("test.xml"), tag).collect()
    }

    #[test]
    fn yields_each_record_with_children_and_attributes() {
        let xml = r#"<?xml version="1.0"?>
<items burpVersion="1.7">
  <item><url><![CDATA[http://a/?x=1&y=2]]></url><host ip="10.0.0.1">a</host><comment/></item>
  <item><url>http://b/?q=&lt;p&gt;&amp;&#65;</url></item>
</items>"#;
        let items: Vec<XmlElement> = records(xml, "item")
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text_at("url").as_deref(), Some("http://a/?x=1&y=2"));
        assert_eq!(items[0].child("host").unwrap().attribute("ip"), Some("10.0.0.1"));
        assert!(items[0].child("comment").is_some());
        assert_eq!(items[1].text_at("url").as_deref(), Some("http://b/?q=<p>&A"));
    }

    #[test]
    fn references_resolve_in_text_and_attributes() {
        let xml = r#"<log><entry note="a &amp; b &#x41;">&copy; &#169;</entry></log>"#;
        let entry = records(xml, "entry").remove(0).unwrap();
        assert_eq!(entry.attribute("note"), Some("a & b A"));
        assert_eq!(entry.text, "&copy; \u{a9}");

        let broken = records("<log><entry>&#0;</entry></log>", "entry");
        assert!(matches!(broken[0], Err(ParserStreamError::Xml { .. })));
    }

    #[test]
    fn nested_paths_and_repeated_children() {
        let xml = "<r><issue><rr><request>a</request></rr><rr><request>b</request></rr></issue></r>";
        let issue = records(xml, "issue").remove(0).unwrap();
        let requests: Vec<_> = issue
            .children("rr")
            .filter_map(|rr| rr.text_at("request"))
            .collect();
        assert_eq!(requests, vec!["a", "b"]);
        assert_eq!(issue.text_at("rr/request").as_deref(), Some("a"));
        assert!(issue.descend("rr/response").is_none());
    }

    #[test]
    fn truncated_record_is_an_error_and_ends_the_stream() {
        let outcomes = records("<items><item><url>x</url>", "item");
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(ParserStreamError::Xml { .. })));
    }

    #[test]
    fn base64_payloads_are_decoded() {
        let mut element = XmlElement {
            name: "request".into(),
            text: "R0VU\nIC8=".into(),
            ..XmlElement::default()
        };
        element.attributes.insert("base64".into(), "true".into());
        assert_eq!(element.payload(Path::new("x")).unwrap(), b"GET /");

        element.text = "!!".into();
        assert!(matches!(
            element.payload(Path::new("x")),
            Err(ParserStreamError::Base64 { .. })
        ));
    }
}
