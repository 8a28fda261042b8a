//! PDF document model (component A).
//!
//! A minimal object-graph reader: locate the cross-reference table (falling
//! back to a full-file reconstruction scan when it's missing or damaged),
//! walk the page tree with attribute inheritance, and decode content
//! streams and font dictionaries. Saving is an incremental update: the
//! patcher (§4.H) never needs the original stream's filter, since this
//! module always writes patched streams back uncompressed.

use crate::error::{Error, Result};
use crate::fonts::{FontId, FontInfo, FontRegistry};
use crate::geometry::Rect;
use crate::object::{Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_object;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntryType};
use crate::xref_reconstruction::reconstruct_xref;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

const MAX_RESOLVE_DEPTH: u32 = 64;

/// An open PDF document: the raw bytes plus enough of the object graph to
/// walk pages, fonts, and content streams.
pub struct PdfDocument {
    data: Vec<u8>,
    version: (u8, u8),
    xref: CrossRefTable,
    trailer: HashMap<String, Object>,
    object_cache: RefCell<HashMap<ObjectRef, Object>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .finish_non_exhaustive()
    }
}

/// A page: its own object reference plus resolved (inherited) attributes.
#[derive(Debug, Clone)]
pub struct Page {
    /// Zero-based page index.
    pub index: usize,
    /// Indirect reference to the page dictionary.
    pub object_ref: ObjectRef,
    /// Page boundary, inherited from an ancestor `/Pages` node if absent.
    pub media_box: Rect,
    /// Rotation in degrees, normalized to {0, 90, 180, 270}.
    pub rotation: i32,
    /// Resolved `/Resources` dictionary (inherited if absent on the page).
    pub resources: HashMap<String, Object>,
    /// `/Contents` references, in stream-concatenation order.
    pub content_refs: Vec<ObjectRef>,
}

impl PdfDocument {
    /// Open a PDF document from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Open a PDF document from already-loaded bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;

        let mut cursor = Cursor::new(&data);
        let (xref, trailer_obj) = match find_xref_offset(&mut cursor)
            .and_then(|offset| parse_xref(&mut cursor, offset))
        {
            Ok(xref) if xref.len() >= 1 => {
                let trailer = xref.trailer().cloned().unwrap_or_default();
                (xref, Object::Dictionary(trailer))
            },
            _ => {
                log::warn!("xref table missing or damaged, reconstructing by full scan");
                reconstruct_xref(&mut cursor)?
            },
        };

        let trailer = trailer_obj.as_dict().cloned().ok_or_else(|| {
            Error::InvalidPdf("trailer is not a dictionary".to_string())
        })?;

        if trailer.get("Encrypt").is_some() {
            return Err(Error::EncryptedPdf);
        }

        Ok(Self {
            data,
            version,
            xref,
            trailer,
            object_cache: RefCell::new(HashMap::new()),
        })
    }

    /// PDF version as `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Load and parse an indirect object, following compressed (object
    /// stream) references transparently. Results are cached.
    pub fn get_object(&self, r: ObjectRef) -> Result<Object> {
        if let Some(obj) = self.object_cache.borrow().get(&r) {
            return Ok(obj.clone());
        }

        let entry = self
            .xref
            .get(r.id)
            .ok_or(Error::ObjectNotFound(r.id, r.gen))?;

        let obj = match entry.entry_type {
            XRefEntryType::Compressed => {
                let container_ref = ObjectRef::new(entry.offset as u32, 0);
                let container = self.get_object(container_ref)?;
                let members = parse_object_stream(&container)?;
                members
                    .get(&r.id)
                    .cloned()
                    .ok_or(Error::ObjectNotFound(r.id, r.gen))?
            },
            XRefEntryType::Free => {
                return Err(Error::ObjectNotFound(r.id, r.gen));
            },
            XRefEntryType::Uncompressed => {
                let offset = entry.offset as usize;
                parse_indirect_object_at(&self.data, offset)?
            },
        };

        self.object_cache.borrow_mut().insert(r, obj.clone());
        Ok(obj)
    }

    /// Follow `Object::Reference` indirection until a non-reference value
    /// is reached, bounded to guard against reference cycles.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        let mut depth = 0;
        while let Object::Reference(r) = current {
            depth += 1;
            if depth > MAX_RESOLVE_DEPTH {
                return Err(Error::RecursionLimitExceeded(MAX_RESOLVE_DEPTH));
            }
            current = self.get_object(r)?;
        }
        Ok(current)
    }

    fn catalog(&self) -> Result<HashMap<String, Object>> {
        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| Error::InvalidPdf("trailer missing /Root".to_string()))?;
        self.resolve(root)?
            .as_dict()
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("/Root is not a dictionary".to_string()))
    }

    /// Walk the page tree, collecting every leaf page with inherited
    /// `/Resources`, `/MediaBox`, and `/Rotate` attributes resolved.
    pub fn pages(&self) -> Result<Vec<Page>> {
        let catalog = self.catalog()?;
        let pages_ref = catalog
            .get("Pages")
            .ok_or_else(|| Error::InvalidPdf("catalog missing /Pages".to_string()))?
            .clone();

        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.collect_pages(&pages_ref, &Inherited::default(), &mut out, &mut seen)?;
        Ok(out)
    }

    fn collect_pages(
        &self,
        node_obj: &Object,
        inherited: &Inherited,
        out: &mut Vec<Page>,
        seen: &mut std::collections::HashSet<ObjectRef>,
    ) -> Result<()> {
        let node_ref = match node_obj {
            Object::Reference(r) => Some(*r),
            _ => None,
        };
        if let Some(r) = node_ref {
            if !seen.insert(r) {
                return Err(Error::CircularReference(r));
            }
        }

        let node = self.resolve(node_obj)?;
        let dict = node
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf("page tree node is not a dictionary".to_string()))?;

        let merged = inherited.merge(dict);

        match dict.get("Type").and_then(Object::as_name) {
            Some("Pages") => {
                let kids = dict
                    .get("Kids")
                    .and_then(Object::as_array)
                    .cloned()
                    .unwrap_or_default();
                for kid in &kids {
                    self.collect_pages(kid, &merged, out, seen)?;
                }
            },
            _ => {
                let object_ref = node_ref.unwrap_or(ObjectRef::new(0, 0));
                let media_box = merged
                    .media_box
                    .clone()
                    .map(|b| rect_from_array(&b))
                    .transpose()?
                    .unwrap_or(Rect::new(0.0, 0.0, 612.0, 792.0));
                let resources = merged
                    .resources
                    .clone()
                    .map(|r| self.resolve(&r))
                    .transpose()?
                    .and_then(|o| o.as_dict().cloned())
                    .unwrap_or_default();
                let rotation = merged.rotation.unwrap_or(0).rem_euclid(360);
                let content_refs = dict
                    .get("Contents")
                    .map(|c| self.content_refs_of(c))
                    .transpose()?
                    .unwrap_or_default();

                out.push(Page {
                    index: out.len(),
                    object_ref,
                    media_box,
                    rotation,
                    resources,
                    content_refs,
                });
            },
        }
        Ok(())
    }

    fn content_refs_of(&self, contents: &Object) -> Result<Vec<ObjectRef>> {
        match contents {
            Object::Reference(r) => Ok(vec![*r]),
            Object::Array(items) => Ok(items
                .iter()
                .filter_map(|o| o.as_reference())
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Decode and concatenate a page's content streams, in order, with a
    /// separating newline (per ISO 32000-1:2008 §7.8.2: streams in the
    /// array must be treated as if they were one stream).
    pub fn page_content(&self, page: &Page) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (i, r) in page.content_refs.iter().enumerate() {
            let stream = self.get_object(*r)?;
            let decoded = stream.decode_stream_data()?;
            if i > 0 {
                out.push(b'\n');
            }
            out.extend_from_slice(&decoded);
        }
        Ok(out)
    }

    /// Parse a page's `/Font` resources into a [`FontRegistry`], returning
    /// the resource-name-to-id mapping used to resolve `Tf` operands.
    pub fn page_fonts(&self, page: &Page) -> Result<(FontRegistry, HashMap<String, FontId>)> {
        let mut registry = FontRegistry::new();
        let mut by_name = HashMap::new();

        let font_dict = match page.resources.get("Font") {
            Some(obj) => self
                .resolve(obj)?
                .as_dict()
                .cloned()
                .ok_or_else(|| Error::InvalidPdf("/Font is not a dictionary".to_string()))?,
            None => return Ok((registry, by_name)),
        };

        for (name, font_ref) in &font_dict {
            let dict = self
                .resolve(font_ref)?
                .as_dict()
                .cloned()
                .ok_or_else(|| Error::InvalidPdf(format!("font /{} is not a dictionary", name)))?;
            let id = registry.next_id();
            let info = FontInfo::from_dict(id, &dict, |obj| self.resolve(obj).ok()?.decode_stream_data().ok())?;
            registry.insert(info);
            by_name.insert(name.clone(), id);
        }

        Ok((registry, by_name))
    }

    /// Write a new revision of this document as an incremental update: the
    /// original bytes untouched, followed by replacement stream objects and
    /// a fresh xref/trailer chained via `/Prev`. Replacement content is
    /// always written without a `/Filter` (patched streams are already
    /// decoded bytes).
    pub fn save_with_patches(&self, patches: &[(ObjectRef, Vec<u8>)]) -> Result<Vec<u8>> {
        let mut out = self.data.clone();
        let prev_startxref = {
            let mut cursor = Cursor::new(&self.data);
            find_xref_offset(&mut cursor).ok()
        };

        let mut new_entries = Vec::new();
        for (r, content) in patches {
            let original = self.get_object(*r)?;
            let mut dict = original.as_dict().cloned().unwrap_or_default();
            dict.remove("Filter");
            dict.remove("DecodeParms");
            dict.insert("Length".to_string(), Object::Integer(content.len() as i64));

            let offset = out.len();
            out.extend_from_slice(format!("{} {} obj\n", r.id, r.gen).as_bytes());
            out.extend_from_slice(&serialize_dict(&dict));
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(content);
            out.extend_from_slice(b"\nendstream\nendobj\n");
            new_entries.push((r.id, r.gen, offset as u64));
        }

        let xref_offset = out.len();
        out.extend_from_slice(b"xref\n");
        for (id, gen, offset) in &new_entries {
            out.extend_from_slice(format!("{} 1\n", id).as_bytes());
            out.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
        }

        let size = self
            .trailer
            .get("Size")
            .and_then(Object::as_integer)
            .unwrap_or(0)
            .max(new_entries.iter().map(|(id, _, _)| *id as i64 + 1).max().unwrap_or(0));

        out.extend_from_slice(b"trailer\n");
        let mut trailer = HashMap::new();
        if let Some(root) = self.trailer.get("Root") {
            trailer.insert("Root".to_string(), root.clone());
        }
        trailer.insert("Size".to_string(), Object::Integer(size));
        if let Some(prev) = prev_startxref {
            trailer.insert("Prev".to_string(), Object::Integer(prev as i64));
        }
        out.extend_from_slice(&serialize_dict(&trailer));
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<Object>,
    media_box: Option<Vec<Object>>,
    rotation: Option<i32>,
}

impl Inherited {
    fn merge(&self, dict: &HashMap<String, Object>) -> Self {
        Self {
            resources: dict.get("Resources").cloned().or_else(|| self.resources.clone()),
            media_box: dict
                .get("MediaBox")
                .and_then(Object::as_array)
                .cloned()
                .or_else(|| self.media_box.clone()),
            rotation: dict
                .get("Rotate")
                .and_then(Object::as_integer)
                .map(|i| i as i32)
                .or(self.rotation),
        }
    }
}

fn rect_from_array(arr: &[Object]) -> Result<Rect> {
    if arr.len() != 4 {
        return Err(Error::InvalidPdf("MediaBox must have 4 elements".to_string()));
    }
    let nums: Vec<f64> = arr
        .iter()
        .map(|o| {
            o.as_real()
                .or_else(|| o.as_integer().map(|i| i as f64))
                .ok_or_else(|| Error::InvalidPdf("MediaBox element is not numeric".to_string()))
        })
        .collect::<Result<_>>()?;
    Ok(Rect::from_points(
        nums[0] as f32,
        nums[1] as f32,
        nums[2] as f32,
        nums[3] as f32,
    ))
}

fn serialize_dict(dict: &HashMap<String, Object>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<<");
    for (key, value) in dict {
        out.push(b'/');
        out.extend_from_slice(key.as_bytes());
        out.push(b' ');
        out.extend_from_slice(serialize_object(value).as_bytes());
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
    out
}

fn serialize_object(obj: &Object) -> String {
    match obj {
        Object::Null => "null".to_string(),
        Object::Boolean(b) => b.to_string(),
        Object::Integer(i) => i.to_string(),
        Object::Real(r) => r.to_string(),
        Object::Name(n) => format!("/{}", n),
        Object::Reference(r) => format!("{} {} R", r.id, r.gen),
        Object::Array(items) => {
            let parts: Vec<String> = items.iter().map(serialize_object).collect();
            format!("[{}]", parts.join(" "))
        },
        _ => "null".to_string(),
    }
}

fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    if data.len() < 8 {
        return Err(Error::InvalidHeader("file too short to contain PDF header".to_string()));
    }
    if &data[0..5] != b"%PDF-" {
        return Err(Error::InvalidHeader(format!(
            "expected '%PDF-', found '{}'",
            String::from_utf8_lossy(&data[0..5])
        )));
    }
    if data[6] != b'.' {
        return Err(Error::InvalidHeader("invalid version separator".to_string()));
    }
    let major = data[5];
    let minor = data[7];
    if !major.is_ascii_digit() || !minor.is_ascii_digit() {
        return Err(Error::InvalidHeader("version is not numeric".to_string()));
    }
    let major = major - b'0';
    let minor = minor - b'0';
    if major > 2 || (major == 0 && minor == 0) {
        return Err(Error::UnsupportedVersion(format!("{}.{}", major, minor)));
    }
    Ok((major, minor))
}

fn parse_indirect_object_at(data: &[u8], offset: usize) -> Result<Object> {
    if offset >= data.len() {
        return Err(Error::ParseError {
            offset,
            reason: "object offset past end of file".to_string(),
        });
    }
    let slice = &data[offset..];
    // Skip the "N G obj" header textually rather than parsing it as PDF
    // objects: `obj` is a bare keyword, not a value `parse_object` accepts.
    let after_obj = skip_past_keyword(slice, b"obj").unwrap_or(slice);
    let (_, obj) = parse_object(after_obj).map_err(|_| Error::ParseError {
        offset,
        reason: "failed to parse indirect object body".to_string(),
    })?;
    Ok(obj)
}

fn skip_past_keyword<'a>(input: &'a [u8], keyword: &[u8]) -> Option<&'a [u8]> {
    let pos = input.windows(keyword.len()).position(|w| w == keyword)?;
    Some(&input[pos + keyword.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_valid() {
        let data = b"%PDF-1.7\n%rest of file";
        assert_eq!(parse_header(data).unwrap(), (1, 7));
    }

    #[test]
    fn test_parse_header_rejects_bad_magic() {
        let data = b"NOT-A-PDF";
        assert!(parse_header(data).is_err());
    }

    #[test]
    fn test_parse_header_rejects_unsupported_version() {
        let data = b"%PDF-9.9\n";
        assert!(matches!(parse_header(data), Err(Error::UnsupportedVersion(_))));
    }

    #[test]
    fn test_rect_from_array() {
        let arr = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(612.0),
            Object::Real(792.0),
        ];
        let rect = rect_from_array(&arr).unwrap();
        assert_eq!(rect.width, 612.0);
        assert_eq!(rect.height, 792.0);
    }

    #[test]
    fn test_inherited_merge_prefers_local() {
        let mut parent = Inherited::default();
        parent.rotation = Some(90);
        let mut local = HashMap::new();
        local.insert("Rotate".to_string(), Object::Integer(180));
        let merged = parent.merge(&local);
        assert_eq!(merged.rotation, Some(180));
    }

    #[test]
    fn test_inherited_merge_falls_back_to_parent() {
        let mut parent = Inherited::default();
        parent.rotation = Some(90);
        let local = HashMap::new();
        let merged = parent.merge(&local);
        assert_eq!(merged.rotation, Some(90));
    }
}
