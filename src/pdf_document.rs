//! PDF handling for sealed documents
//! Created: 2026-03-06
//! Author: kartik4905
//!
//! Upload checks, QR stamping and payload extraction. Only the first page
//! is touched: one image XObject is added to its resources and one content
//! stream draws it in the bottom-right corner.

use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, info, instrument};

use crate::config::QrConfig;
use crate::error::{Error, Result};
use crate::qr::{QrImage, VerificationPayload};

/// Info dictionary key holding the base64 payload
pub const PAYLOAD_INFO_KEY: &[u8] = b"DocSealPayload";
/// Info dictionary key holding the length of the signed original
pub const SIGNED_LENGTH_INFO_KEY: &[u8] = b"DocSealSignedLength";

const PDF_MAGIC: &[u8] = b"%PDF-";
const XOBJECT_NAME: &str = "DocSealQr";
const MAX_TREE_DEPTH: usize = 32;
const LETTER_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Rejects uploads that cannot be a PDF worth hashing
pub fn validate_upload(bytes: &[u8], max_bytes: u64) -> Result<()> {
    if bytes.is_empty() {
        return Err(Error::InvalidUpload("file is empty".into()));
    }
    if bytes.len() as u64 > max_bytes {
        return Err(Error::InvalidUpload(format!(
            "file is {} bytes, limit is {}",
            bytes.len(),
            max_bytes
        )));
    }

    // some producers put junk before the header; readers allow 1024 bytes
    let window = &bytes[..bytes.len().min(1024)];
    if !window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        return Err(Error::InvalidUpload("missing %PDF- header".into()));
    }
    Ok(())
}

/// A verification payload found in a sealed PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSeal {
    pub payload: VerificationPayload,
    /// Length of the original document; the stamp follows it
    pub signed_length: usize,
}

impl EmbeddedSeal {
    /// The leading bytes the signature was computed over
    pub fn signed_prefix<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        bytes.get(..self.signed_length)
    }
}

/// Embeds the QR image and the payload into the PDF.
///
/// The stamp is written as an incremental update, so `bytes` stays a
/// byte-exact prefix of the output. Its length is recorded next to the
/// payload. Stamping is deterministic: the same input, payload and config
/// always produce the same output.
#[instrument(skip_all, fields(document_id = %payload.document_id))]
pub fn stamp_pdf(
    bytes: &[u8],
    image: &QrImage,
    payload: &VerificationPayload,
    config: &QrConfig,
) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(bytes)?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(Error::Pdf("encrypted PDFs cannot be stamped".into()));
    }
    let previous_xref = last_startxref(bytes)?;

    let page_id = *doc
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| Error::Pdf("document has no pages".into()))?;

    let media_box = page_media_box(&doc, page_id)?;
    let mut updates: Vec<(ObjectId, Object)> = Vec::new();

    let image_id = doc.new_object_id();
    updates.push((image_id, Object::Stream(image_stream(image)?)));

    let mut resources = page_resources(&doc, page_id)?;
    let mut xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve(&doc, obj)?.as_dict()?.clone(),
        Err(_) => Dictionary::new(),
    };
    let name = unused_name(&xobjects);
    xobjects.set(name.clone(), Object::Reference(image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let draw = placement(&media_box, config, &name);
    let open_id = doc.new_object_id();
    updates.push((open_id, Object::Stream(Stream::new(Dictionary::new(), b"q\n".to_vec()))));
    let draw_id = doc.new_object_id();
    updates.push((draw_id, Object::Stream(Stream::new(Dictionary::new(), draw.into_bytes()))));

    let mut contents = vec![Object::Reference(open_id)];
    contents.extend(existing_contents(&doc, page_id)?);
    contents.push(Object::Reference(draw_id));

    let mut page = doc.get_object(page_id)?.as_dict()?.clone();
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    updates.push((page_id, Object::Dictionary(page)));

    let (info_id, info) = info_with_seal(&mut doc, payload, bytes.len())?;
    updates.push((info_id, info));

    let trailer = update_trailer(&doc, info_id, previous_xref)?;
    let update = incremental_update(bytes.len(), &mut updates, &trailer);

    let mut out = Vec::with_capacity(bytes.len() + update.len());
    out.extend_from_slice(bytes);
    out.extend_from_slice(&update);

    info!(page = ?page_id, xobject = %name, appended = update.len(), "Stamped verification QR code");
    Ok(out)
}

/// Reads the seal written by [`stamp_pdf`], if any. The newest stamp wins
/// when a document was sealed more than once.
pub fn extract_seal(bytes: &[u8]) -> Result<Option<EmbeddedSeal>> {
    let doc = Document::load_mem(bytes)?;

    let info = match doc.trailer.get(b"Info") {
        Ok(obj) => resolve(&doc, obj)?,
        Err(_) => return Ok(None),
    };
    let Object::Dictionary(info) = info else {
        return Ok(None);
    };

    let payload = match info.get(PAYLOAD_INFO_KEY) {
        Ok(Object::String(raw, _)) => {
            let text = std::str::from_utf8(raw)
                .map_err(|_| Error::MalformedPayload("embedded payload is not text".into()))?;
            VerificationPayload::from_base64(text)?
        }
        Ok(_) => return Err(Error::MalformedPayload("embedded payload is not a string".into())),
        Err(_) => return Ok(None),
    };

    let signed_length = match info.get(SIGNED_LENGTH_INFO_KEY) {
        Ok(Object::Integer(n)) if *n > 0 => usize::try_from(*n).ok(),
        _ => None,
    }
    .ok_or_else(|| Error::MalformedPayload("embedded seal has no signed length".into()))?;

    if signed_length >= bytes.len() {
        return Err(Error::MalformedPayload(format!(
            "signed length {} does not leave room for the stamp in {} bytes",
            signed_length,
            bytes.len()
        )));
    }

    Ok(Some(EmbeddedSeal { payload, signed_length }))
}

fn image_stream(image: &QrImage) -> Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&image.pixels)?;
    let compressed = encoder.finish()?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(image.size as i64),
        "Height" => Object::Integer(image.size as i64),
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => Object::Integer(8),
        "Filter" => "FlateDecode",
    };
    debug!(raw = image.pixels.len(), compressed = compressed.len(), "Built QR image stream");
    Ok(Stream::new(dict, compressed))
}

/// Content operators that close the wrapped original content and draw the
/// image in the bottom-right corner
fn placement(media_box: &[f64; 4], config: &QrConfig, name: &str) -> String {
    let [llx, lly, urx, ury] = *media_box;
    let size = f64::from(config.display_size_pt)
        .min(urx - llx)
        .min(ury - lly)
        .max(1.0);
    let margin = f64::from(config.margin_pt);
    let x = (urx - margin - size).max(llx);
    let y = (lly + margin).min(ury - size);

    format!(
        "\nQ\nq\n{size:.2} 0 0 {size:.2} {x:.2} {y:.2} cm\n/{name} Do\nQ\n",
        size = size,
        x = x,
        y = y,
        name = name
    )
}

fn unused_name(xobjects: &Dictionary) -> String {
    let mut name = XOBJECT_NAME.to_string();
    let mut n = 1;
    while xobjects.has(name.as_bytes()) {
        n += 1;
        name = format!("{}{}", XOBJECT_NAME, n);
    }
    name
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Looks `key` up on the page, then up the page tree
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_object(current)?.as_dict()?;
        if let Ok(value) = node.get(key) {
            return Ok(Some(resolve(doc, value)?));
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return Ok(None),
        }
    }
    Err(Error::Pdf("page tree is too deep or cyclic".into()))
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    match inherited(doc, page_id, b"Resources")? {
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        Some(_) => Err(Error::Pdf("page /Resources is not a dictionary".into())),
        None => Ok(Dictionary::new()),
    }
}

fn page_media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4]> {
    let Some(Object::Array(values)) = inherited(doc, page_id, b"MediaBox")? else {
        return Ok(LETTER_MEDIA_BOX);
    };

    let numbers: Vec<f64> = values
        .iter()
        .filter_map(|v| resolve(doc, v).ok().and_then(number))
        .collect();
    match numbers.as_slice() {
        [a, b, c, d] => Ok([a.min(*c), b.min(*d), a.max(*c), b.max(*d)]),
        _ => Err(Error::Pdf("malformed /MediaBox".into())),
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc.get_object(page_id)?.as_dict()?;
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            // an indirect array of streams
            Object::Array(items) => Ok(items.clone()),
            _ => Ok(vec![Object::Reference(*id)]),
        },
        Ok(Object::Array(items)) => Ok(items.clone()),
        Ok(_) => Err(Error::Pdf("page /Contents must be indirect".into())),
        Err(_) => Ok(Vec::new()),
    }
}

/// The Info dictionary with the seal added, under its existing object id
/// when there is one
fn info_with_seal(
    doc: &mut Document,
    payload: &VerificationPayload,
    signed_length: usize,
) -> Result<(ObjectId, Object)> {
    let current = doc.trailer.get(b"Info").ok().cloned();
    let (id, mut info) = match current {
        Some(Object::Reference(id)) => match doc.get_object(id)? {
            Object::Dictionary(info) => (id, info.clone()),
            _ => return Err(Error::Pdf("/Info is not a dictionary".into())),
        },
        Some(Object::Dictionary(direct)) => (doc.new_object_id(), direct),
        _ => (doc.new_object_id(), Dictionary::new()),
    };

    let length = i64::try_from(signed_length)
        .map_err(|_| Error::Pdf("document too large to seal".into()))?;
    info.set(
        PAYLOAD_INFO_KEY.to_vec(),
        Object::String(payload.to_base64()?.into_bytes(), StringFormat::Literal),
    );
    info.set(SIGNED_LENGTH_INFO_KEY.to_vec(), Object::Integer(length));
    Ok((id, Object::Dictionary(info)))
}

fn update_trailer(doc: &Document, info_id: ObjectId, previous_xref: usize) -> Result<Dictionary> {
    let root = doc
        .trailer
        .get(b"Root")
        .map_err(|_| Error::Pdf("trailer has no /Root".into()))?
        .clone();
    let size = doc
        .trailer
        .get(b"Size")
        .and_then(Object::as_i64)
        .unwrap_or(0)
        .max(i64::from(doc.max_id) + 1);

    let mut trailer = dictionary! {
        "Size" => Object::Integer(size),
        "Root" => root,
        "Info" => Object::Reference(info_id),
        "Prev" => Object::Integer(previous_xref as i64),
    };
    if let Ok(id) = doc.trailer.get(b"ID") {
        trailer.set("ID", id.clone());
    }
    Ok(trailer)
}

/// Offset named by the last `startxref` in the file
fn last_startxref(bytes: &[u8]) -> Result<usize> {
    const KEYWORD: &[u8] = b"startxref";
    let pos = bytes
        .windows(KEYWORD.len())
        .rposition(|w| w == KEYWORD)
        .ok_or_else(|| Error::Pdf("missing startxref".into()))?;

    let digits: String = bytes[pos + KEYWORD.len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| char::from(b))
        .collect();
    digits
        .parse()
        .map_err(|_| Error::Pdf("malformed startxref".into()))
}

/// Serializes `objects` as an update section for a file of `base_len`
/// bytes: the objects, a cross-reference table and a trailer pointing back
/// at the previous one.
fn incremental_update(base_len: usize, objects: &mut [(ObjectId, Object)], trailer: &Dictionary) -> Vec<u8> {
    objects.sort_by_key(|(id, _)| *id);

    let mut out = b"\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for ((number, generation), object) in objects.iter() {
        offsets.push((*number, *generation, base_len + out.len()));
        out.extend_from_slice(format!("{} {} obj\n", number, generation).as_bytes());
        write_object(&mut out, object);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = base_len + out.len();
    out.extend_from_slice(b"xref\n");
    for (number, generation, offset) in offsets {
        // fixed 20-byte entries
        out.extend_from_slice(format!("{} 1\n{:010} {:05} n\r\n", number, offset, generation).as_bytes());
    }

    out.extend_from_slice(b"trailer\n");
    write_dictionary(&mut out, trailer);
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

fn write_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(b.to_string().as_bytes()),
        Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) => out.extend_from_slice(r.to_string().as_bytes()),
        Object::Name(name) => write_name(out, name),
        Object::String(raw, StringFormat::Literal) => {
            out.push(b'(');
            for &b in raw {
                match b {
                    b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', b]),
                    b'\r' => out.extend_from_slice(b"\\r"),
                    _ => out.push(b),
                }
            }
            out.push(b')');
        }
        Object::String(raw, StringFormat::Hexadecimal) => {
            out.push(b'<');
            out.extend_from_slice(hex::encode_upper(raw).as_bytes());
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.set("Length", Object::Integer(stream.content.len() as i64));
            write_dictionary(out, &dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference((number, generation)) => {
            out.extend_from_slice(format!("{} {} R", number, generation).as_bytes());
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
        out.push(b'\n');
    }
    out.extend_from_slice(b">>");
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &b in name {
        let delimiter = b"()<>[]{}/%#".contains(&b);
        if (b'!'..=b'~').contains(&b) && !delimiter {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{:02X}", b).as_bytes());
        }
    }
}
