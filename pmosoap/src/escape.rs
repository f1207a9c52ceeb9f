//! Échappement du texte des éléments XML.

use std::borrow::Cow;

use quick_xml::escape::partial_escape;

/// Escapes `<`, `>` and `&` in element text content.
///
/// Quotes are left alone: they only matter inside attribute values. The
/// result must not be escaped a second time, `&` would be doubled.
pub fn escape_xml_text(text: &str) -> Cow<'_, str> {
    partial_escape(text)
}
