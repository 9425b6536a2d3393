//! Parsing of OAI `<record>` elements.
//!
//! Accepts any document containing `<record>` elements (a single record or a
//! collection under an arbitrary root). Each record carries a `<header>`
//! with `identifier`, `datestamp` and zero or more `setSpec` children, an
//! optional `status="deleted"` attribute, and optional `<metadata>` and
//! `<about>` blocks whose inner XML is kept verbatim.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;

use crate::error::{CatalogError, CatalogResult};
use crate::types::{NativeRecord, Payload, RecordHeader, XmlPayload};

/// Parses every `<record>` in `xml`, in document order.
///
/// `location` names the source in error messages.
pub fn parse_records(xml: &str, location: &str) -> CatalogResult<Vec<NativeRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut records = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"record" => {
                records.push(parse_record(&mut reader, xml, location)?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(CatalogError::xml(location, e)),
        }
    }

    Ok(records)
}

fn parse_record(reader: &mut Reader<&[u8]>, xml: &str, location: &str) -> CatalogResult<NativeRecord> {
    let mut header = None;
    let mut payload = XmlPayload::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"header" => header = Some(parse_header(reader, &e, location)?),
                b"metadata" => {
                    let inner = inner_xml(reader, e.name(), xml, location)?;
                    payload.schema_location = schema_location(inner);
                    payload.metadata = Some(inner.to_string());
                }
                b"about" => {
                    let inner = inner_xml(reader, e.name(), xml, location)?;
                    payload.about.push(inner.to_string());
                }
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(|err| CatalogError::xml(location, err))?;
                }
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"header" => {
                return Err(CatalogError::xml(location, "empty record header"));
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"record" => break,
            Ok(Event::Eof) => return Err(CatalogError::xml(location, "unterminated record")),
            Ok(_) => {}
            Err(e) => return Err(CatalogError::xml(location, e)),
        }
    }

    let header = header.ok_or_else(|| CatalogError::xml(location, "record without header"))?;
    Ok(NativeRecord::new(header, Payload::Xml(payload)))
}

fn parse_header(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    location: &str,
) -> CatalogResult<RecordHeader> {
    let mut identifier = None;
    let mut datestamp = None;
    let mut set_specs = Vec::new();
    let deleted = attribute(start, b"status", location)?.as_deref() == Some("deleted");

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let text = reader
                    .read_text(e.name())
                    .map_err(|err| CatalogError::xml(location, err))?;
                let text = unescape(text.trim(), location)?;
                match e.local_name().as_ref() {
                    b"identifier" => identifier = Some(text),
                    b"datestamp" => datestamp = Some(text),
                    b"setSpec" => set_specs.push(text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"header" => break,
            Ok(Event::Eof) => return Err(CatalogError::xml(location, "unterminated header")),
            Ok(_) => {}
            Err(e) => return Err(CatalogError::xml(location, e)),
        }
    }

    match (identifier, datestamp) {
        (Some(identifier), Some(datestamp)) if !identifier.is_empty() => Ok(RecordHeader {
            identifier,
            datestamp,
            set_specs,
            deleted,
        }),
        (Some(identifier), _) if !identifier.is_empty() => Err(CatalogError::InvalidRecord {
            identifier,
            message: format!("missing datestamp in {location}"),
        }),
        _ => Err(CatalogError::xml(location, "header without identifier")),
    }
}

/// Returns the raw markup between the start tag just read and its end tag.
fn inner_xml<'x>(
    reader: &mut Reader<&[u8]>,
    name: QName<'_>,
    xml: &'x str,
    location: &str,
) -> CatalogResult<&'x str> {
    let span = reader
        .read_to_end(name)
        .map_err(|e| CatalogError::xml(location, e))?;
    let start = usize::try_from(span.start).map_err(|e| CatalogError::xml(location, e))?;
    let end = usize::try_from(span.end).map_err(|e| CatalogError::xml(location, e))?;
    xml.get(start..end)
        .map(str::trim)
        .ok_or_else(|| CatalogError::xml(location, "element span out of range"))
}

/// Extracts the schema URL from the `xsi:schemaLocation` of the first element.
///
/// The attribute holds namespace/URL pairs; the last URL is taken.
fn schema_location(fragment: &str) -> Option<String> {
    let mut reader = Reader::from_str(fragment);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return attribute(&e, b"schemaLocation", "metadata")
                    .ok()
                    .flatten()
                    .and_then(|value| value.split_whitespace().last().map(str::to_string));
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn attribute(start: &BytesStart<'_>, local_name: &[u8], location: &str) -> CatalogResult<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| CatalogError::xml(location, e))?;
        if attr.key.local_name().as_ref() == local_name {
            let raw = std::str::from_utf8(&attr.value).map_err(|e| CatalogError::xml(location, e))?;
            return unescape(raw, location).map(Some);
        }
    }
    Ok(None)
}

fn unescape(raw: &str, location: &str) -> CatalogResult<String> {
    quick_xml::escape::unescape(raw)
        .map(Cow::into_owned)
        .map_err(|e| CatalogError::xml(location, e))
}
