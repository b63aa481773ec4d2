//! Reader for the XML subset used by configuration documents.
//!
//! Supports the prolog, processing instructions, comments, a DOCTYPE
//! declaration, CDATA sections, single- and double-quoted attributes, the
//! five named entities and numeric character references. Text content is
//! checked for well-formed references and otherwise discarded.

use std::fmt;

/// One element of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Line of the opening tag, starting at 1.
    pub line: usize,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

/// A syntax error and the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct ReadError {
    pub line: usize,
    pub reason: String,
}

type ReadResult<T> = std::result::Result<T, ReadError>;

/// Parse a document and return its root element.
pub fn parse_document(input: &str) -> ReadResult<Element> {
    let mut reader = Reader::new(input);
    reader.skip_misc()?;
    if reader.current_char != Some('<') {
        return Err(reader.error("expected a root element"));
    }
    let root = reader.parse_element()?;
    reader.skip_misc()?;
    if let Some(ch) = reader.current_char {
        return Err(reader.error(format!("unexpected '{}' after the root element", ch)));
    }
    Ok(root)
}

struct Reader {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    line: usize,
}

impl Reader {
    fn new(input: &str) -> Self {
        let chars: Vec<char> = input.trim_start_matches('\u{feff}').chars().collect();
        let current_char = chars.first().copied();
        Self {
            input: chars,
            position: 0,
            current_char,
            line: 1,
        }
    }

    fn error(&self, reason: impl fmt::Display) -> ReadError {
        ReadError {
            line: self.line,
            reason: reason.to_string(),
        }
    }

    fn advance(&mut self) {
        if self.current_char == Some('\n') {
            self.line += 1;
        }
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn looking_at(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, ch)| self.input.get(self.position + i) == Some(&ch))
    }

    fn consume(&mut self, text: &str) -> bool {
        if !self.looking_at(text) {
            return false;
        }
        for _ in text.chars() {
            self.advance();
        }
        true
    }

    fn expect(&mut self, text: &str) -> ReadResult<()> {
        if self.consume(text) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", text)))
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_until(&mut self, terminator: &str, what: &str) -> ReadResult<()> {
        let start = self.line;
        while self.current_char.is_some() {
            if self.consume(terminator) {
                return Ok(());
            }
            self.advance();
        }
        Err(ReadError {
            line: start,
            reason: format!("unterminated {}", what),
        })
    }

    fn skip_doctype(&mut self) -> ReadResult<()> {
        let start = self.line;
        let mut depth = 0usize;
        while let Some(ch) = self.current_char {
            self.advance();
            match ch {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(ReadError {
            line: start,
            reason: "unterminated DOCTYPE".to_string(),
        })
    }

    /// Skip whitespace, comments, processing instructions and DOCTYPE.
    fn skip_misc(&mut self) -> ReadResult<()> {
        loop {
            self.skip_whitespace();
            if self.consume("<!--") {
                self.skip_until("-->", "comment")?;
            } else if self.consume("<?") {
                self.skip_until("?>", "processing instruction")?;
            } else if self.consume("<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn read_name(&mut self) -> ReadResult<String> {
        let mut name = String::new();
        match self.current_char {
            Some(ch) if ch.is_alphabetic() || ch == '_' || ch == ':' => {}
            Some(ch) => return Err(self.error(format!("invalid name character '{}'", ch))),
            None => return Err(self.error("unexpected end of document")),
        }
        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':') {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Ok(name)
    }

    /// Read a reference after its `&`, through the closing `;`.
    fn read_reference(&mut self) -> ReadResult<char> {
        let mut body = String::new();
        loop {
            match self.current_char {
                Some(';') => {
                    self.advance();
                    break;
                }
                Some(ch) if ch.is_alphanumeric() || ch == '#' => {
                    body.push(ch);
                    self.advance();
                }
                _ => return Err(self.error(format!("malformed reference '&{}'", body))),
            }
        }
        let decoded = match body.as_str() {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => match body.strip_prefix('#') {
                Some(hex) if hex.starts_with(['x', 'X']) => u32::from_str_radix(&hex[1..], 16)
                    .ok()
                    .and_then(char::from_u32),
                Some(decimal) => decimal.parse().ok().and_then(char::from_u32),
                None => None,
            },
        };
        decoded.ok_or_else(|| self.error(format!("unknown entity '&{};'", body)))
    }

    fn read_attribute_value(&mut self) -> ReadResult<String> {
        let quote = match self.current_char {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("attribute value must be quoted")),
        };
        self.advance();
        let mut value = String::new();
        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance();
                return Ok(value);
            }
            match ch {
                '&' => {
                    self.advance();
                    value.push(self.read_reference()?);
                }
                '<' => return Err(self.error("'<' is not allowed in attribute values")),
                _ => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
        Err(self.error("unterminated attribute value"))
    }

    fn parse_element(&mut self) -> ReadResult<Element> {
        let line = self.line;
        self.expect("<")?;
        let name = self.read_name()?;
        let mut element = Element {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            line,
        };

        loop {
            self.skip_whitespace();
            match self.current_char {
                Some('/') => {
                    self.expect("/>")?;
                    return Ok(element);
                }
                Some('>') => {
                    self.advance();
                    break;
                }
                Some(_) => {
                    let key = self.read_name()?;
                    self.skip_whitespace();
                    self.expect("=")?;
                    self.skip_whitespace();
                    let value = self.read_attribute_value()?;
                    if element.has_attribute(&key) {
                        return Err(self.error(format!(
                            "duplicate attribute '{}' on <{}>",
                            key, element.name
                        )));
                    }
                    element.attributes.push((key, value));
                }
                None => {
                    return Err(ReadError {
                        line,
                        reason: format!("unterminated tag <{}>", element.name),
                    })
                }
            }
        }

        self.parse_content(&mut element)?;
        Ok(element)
    }

    fn parse_content(&mut self, element: &mut Element) -> ReadResult<()> {
        loop {
            match self.current_char {
                None => {
                    return Err(ReadError {
                        line: element.line,
                        reason: format!("<{}> is never closed", element.name),
                    })
                }
                Some('<') => {
                    if self.consume("</") {
                        let closing = self.read_name()?;
                        if closing != element.name {
                            return Err(self.error(format!(
                                "mismatched closing tag </{}>, expected </{}>",
                                closing, element.name
                            )));
                        }
                        self.skip_whitespace();
                        self.expect(">")?;
                        return Ok(());
                    } else if self.consume("<!--") {
                        self.skip_until("-->", "comment")?;
                    } else if self.consume("<![CDATA[") {
                        self.skip_until("]]>", "CDATA section")?;
                    } else if self.consume("<?") {
                        self.skip_until("?>", "processing instruction")?;
                    } else {
                        let child = self.parse_element()?;
                        element.children.push(child);
                    }
                }
                Some('&') => {
                    self.advance();
                    self.read_reference()?;
                }
                Some(_) => self.advance(),
            }
        }
    }
}

/// Escape text for use inside a double-quoted attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let doc = r#"<?xml version="1.0" encoding="utf-8"?>
<!-- leading comment -->
<configuration description="a &amp; b">
    <test class='com.x.FooTest'>
        <option name="iterations" value="3" />
    </test>
    <![CDATA[ ignored <text> ]]>
</configuration>
"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.name, "configuration");
        assert_eq!(root.attribute("description"), Some("a & b"));
        assert_eq!(root.line, 3);
        assert_eq!(root.children.len(), 1);
        let test = &root.children[0];
        assert_eq!(test.attribute("class"), Some("com.x.FooTest"));
        assert_eq!(test.line, 4);
        assert_eq!(test.children[0].attribute("value"), Some("3"));
        assert_eq!(test.children[0].line, 5);
    }

    #[test]
    fn test_doctype_and_character_references() {
        let doc = "<!DOCTYPE configuration [ <!ENTITY x \"y\"> ]>\n<configuration a=\"&#65;&#x42;&lt;&gt;&quot;&apos;\"/>";
        let root = parse_document(doc).unwrap();
        assert_eq!(root.attribute("a"), Some("AB<>\"'"));
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_mismatched_tag_reports_line() {
        let doc = "<configuration>\n  <test class=\"x\">\n</configuration>";
        let err = parse_document(doc).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.reason.contains("mismatched"));
    }

    #[test]
    fn test_unclosed_and_trailing_content() {
        let err = parse_document("<configuration>\n<test class=\"x\"/>").unwrap_err();
        assert!(err.reason.contains("never closed"));
        assert_eq!(err.line, 1);

        assert!(parse_document("<a/><b/>").is_err());
        assert!(parse_document("").is_err());
        assert!(parse_document("<a b=unquoted/>").is_err());
        assert!(parse_document("<a b=\"&bogus;\"/>").is_err());
        assert!(parse_document("<a b=\"1\" b=\"2\"/>").is_err());
    }

    #[test]
    fn test_escape_attribute() {
        assert_eq!(escape_attribute("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        let doc = format!("<a v=\"{}\"/>", escape_attribute("x=\"1\" & <y>"));
        assert_eq!(parse_document(&doc).unwrap().attribute("v"), Some("x=\"1\" & <y>"));
    }
}
