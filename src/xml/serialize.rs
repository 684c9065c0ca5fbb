//! XML request bodies for the blob service.

use crate::models::BlockId;

/// Escapes special XML characters in a string.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Serializes a `Put Block List` body committing `blocks` in order.
///
/// Every id goes under `<Latest>` so the service picks the most recently staged
/// version of each block.
pub fn serialize_block_list(blocks: &[BlockId]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?>"#);
    xml.push_str("<BlockList>");
    for block in blocks {
        xml.push_str(&format!("<Latest>{}</Latest>", xml_escape(block.as_str())));
    }
    xml.push_str("</BlockList>");
    xml
}
