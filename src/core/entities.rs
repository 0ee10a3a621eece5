//! XML Entity Decoding
//!
//! Handles the five predefined entities (`&lt; &gt; &amp; &quot; &apos;`) and
//! numeric character references (`&#123; &#x7B;`). DTD-declared entities are
//! not supported, so any other reference is a well-formedness error.
//!
//! Uses Cow for zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;

/// Decode entity references in text or attribute content
///
/// Returns Borrowed if no `&` is present.
#[inline]
pub fn decode_text(input: &str) -> Result<Cow<'_, str>, &'static str> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(input));
    }
    decode_entities(input).map(Cow::Owned)
}

fn decode_entities(input: &str) -> Result<String, &'static str> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = memchr(b'&', rest.as_bytes()) {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = memchr(b';', after.as_bytes()).ok_or("Unterminated entity reference")?;
        result.push(decode_entity(&after[..semi])?);
        rest = &after[semi + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

/// Decode a single reference body (without `&` and `;`)
fn decode_entity(entity: &str) -> Result<char, &'static str> {
    match entity {
        "lt" => Ok('<'),
        "gt" => Ok('>'),
        "amp" => Ok('&'),
        "quot" => Ok('"'),
        "apos" => Ok('\''),
        _ => match entity.strip_prefix('#') {
            Some(numeric) => decode_numeric_entity(numeric),
            None => Err("Undefined entity reference"),
        },
    }
}

fn decode_numeric_entity(entity: &str) -> Result<char, &'static str> {
    let codepoint = match entity.strip_prefix(|c: char| c == 'x' || c == 'X') {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => entity.parse::<u32>(),
    }
    .map_err(|_| "Invalid character reference")?;

    if !is_valid_xml_char(codepoint) {
        return Err("Character reference to invalid XML character");
    }
    char::from_u32(codepoint).ok_or("Invalid character reference")
}

/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}
