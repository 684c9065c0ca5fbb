//! XML response parsing for the blob service.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{AdapterError, AdapterResult};
use crate::models::ListBlobsSegment;

/// Parses one `List Blobs` response page (`<EnumerationResults>`).
///
/// Only flat listings are requested, so `<BlobPrefix>` entries are ignored.
pub fn parse_list_blobs(xml: &str) -> AdapterResult<ListBlobsSegment> {
    let mut reader = Reader::from_str(xml);

    let mut segment = ListBlobsSegment::default();
    let mut stack: Vec<String> = Vec::new();
    let mut name = String::new();
    let mut next_marker = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let element = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if element == "Name" && parent_is(&stack, "Blob") {
                    name.clear();
                }
                stack.push(element);
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    if element == "Name" && parent_is(&stack, "Blob") {
                        segment.blobs.push(std::mem::take(&mut name));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| {
                    AdapterError::Protocol(format!("invalid list blobs text: {err}"))
                })?;
                match stack.last().map(String::as_str) {
                    Some("NextMarker") => next_marker.push_str(text.trim()),
                    _ if in_blob_name(&stack) => name.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(AdapterError::Protocol(format!(
                    "invalid list blobs response at {}: {err}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(AdapterError::Protocol(
            "truncated list blobs response".to_string(),
        ));
    }

    segment.next_marker = Some(next_marker).filter(|m| !m.is_empty());
    Ok(segment)
}

/// Extracts `(Code, Message)` from a service `<Error>` body.
pub fn parse_error_body(xml: &str) -> Option<(String, String)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut current: Option<String> = None;
    let mut code = None;
    let mut message = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = Some(String::from_utf8_lossy(e.name().as_ref()).to_string());
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Text(e)) => {
                let text = e.unescape().ok()?;
                match current.as_deref() {
                    Some("Code") => code = Some(text.to_string()),
                    Some("Message") => message.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    code.map(|code| (code, message))
}

/// Returns whether the innermost open element is `parent`.
fn parent_is(stack: &[String], parent: &str) -> bool {
    stack.last().map(String::as_str) == Some(parent)
}

fn in_blob_name(stack: &[String]) -> bool {
    matches!(stack, [.., parent, last] if parent == "Blob" && last == "Name")
}
