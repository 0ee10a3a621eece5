//! XML Attribute Parsing
//!
//! Parses the attribute list of a start tag into an insertion-ordered map of
//! owned `name -> value` pairs, decoding entity references in values.

use super::entities::decode_text;
use super::scanner::{is_whitespace, Scanner};
use indexmap::IndexMap;

/// Attributes of one element, in document order
pub type Attributes = IndexMap<String, String>;

/// Parse attributes from raw tag content (after the element name, before `>` or `/>`)
pub fn parse_attributes(input: &[u8], decode: bool) -> Result<Attributes, &'static str> {
    let mut attrs = Attributes::new();
    let mut scanner = Scanner::new(input);

    loop {
        let before = scanner.position();
        scanner.skip_whitespace();
        if scanner.is_eof() {
            break;
        }
        if scanner.position() == before && !attrs.is_empty() {
            return Err("Attributes must be separated by whitespace");
        }

        let name = scanner.read_name().ok_or("Invalid attribute name")?;
        let name = std::str::from_utf8(name).map_err(|_| "Invalid UTF-8 in attribute name")?;

        scanner.skip_whitespace();
        if scanner.peek() != Some(b'=') {
            return Err("Attribute without value");
        }
        scanner.advance(1);
        scanner.skip_whitespace();

        let quote = match scanner.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err("Attribute value must be quoted"),
        };
        scanner.advance(1);
        let value_start = scanner.position();
        let value_end = scanner.find_byte(quote).ok_or("Unterminated attribute value")?;
        let raw = scanner.slice(value_start, value_end);
        scanner.set_position(value_end + 1);

        if raw.contains(&b'<') {
            return Err("'<' not allowed in attribute value");
        }
        let raw = std::str::from_utf8(raw).map_err(|_| "Invalid UTF-8 in attribute value")?;
        let value = if decode {
            decode_text(raw)?.into_owned()
        } else {
            raw.to_string()
        };

        if attrs.contains_key(name) {
            return Err("Duplicate attribute");
        }
        attrs.insert(name.to_string(), normalize_whitespace(value));
    }

    Ok(attrs)
}

/// Attribute-value normalization for literal tab/newline characters
fn normalize_whitespace(value: String) -> String {
    if value.bytes().any(|b| is_whitespace(b) && b != b' ') {
        value
            .chars()
            .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
            .collect()
    } else {
        value
    }
}
