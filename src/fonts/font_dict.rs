//! Font dictionary parsing: the per-font description needed to encode
//! replacement text back into content-stream bytes and measure it.
//!
//! This module handles parsing of PDF font dictionaries and their
//! encoding information. The ToUnicode CMap provides the most accurate
//! character mapping in both directions; simple-font `/Encoding` and
//! `/Differences` arrays and CIDFont `/W` / `/DW` tables supply widths
//! and, for fonts that lack a ToUnicode stream, a fallback.

use crate::error::{Error, Result};
use crate::fonts::cmap::{parse_tounicode_cmap, LazyCMap};
use crate::object::Object;
use std::collections::HashMap;

/// Stable id for a font resource, addressed by spans and content blocks
/// instead of holding the font object itself (§9: arena of font records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub u32);

/// Font encoding types for simple (non-CID) fonts.
#[derive(Debug, Clone)]
pub enum Encoding {
    /// Standard PDF encoding (WinAnsiEncoding, MacRomanEncoding, StandardEncoding)
    Standard(String),
    /// Custom encoding built from a base encoding plus a `/Differences` array
    Custom(HashMap<u8, char>),
    /// Identity encoding (CID fonts; code and CID are taken to be equal)
    Identity,
}

/// The full parsed description of one font resource.
///
/// Invariant (§3): for any character `c` in `coverage()`, `encode(c)`
/// yields a bytestring that the forward CMap decodes back to `c`.
#[derive(Debug, Clone)]
pub struct FontInfo {
    /// Stable id used by spans and content blocks to refer to this font.
    pub id: FontId,
    /// Base font name (e.g. "Helvetica-Bold", "ABCDEF+Calibri")
    pub base_font: String,
    /// Font subtype ("Type0", "Type1", "TrueType", "MMType1")
    pub subtype: String,
    /// Byte width of this font's character codes: 1 for simple fonts,
    /// 2 for Type0/CID fonts using a 2-byte CMap (we assume Identity-H,
    /// the overwhelming common case for embedded resume fonts).
    pub byte_width: u8,
    /// Encoding for simple fonts; unused (Identity) for Type0.
    pub encoding: Encoding,
    /// Forward/reverse ToUnicode CMap, if the font dictionary has one.
    pub to_unicode: Option<LazyCMap>,
    /// Font weight from the FontDescriptor (400 = normal, 700 = bold).
    pub font_weight: Option<i32>,
    /// FontDescriptor flags bit field (ISO 32000-1:2008 Table 123).
    /// Bit 3 (0x4): Symbolic. Bit 7 (0x40): Italic.
    pub flags: Option<i32>,
    /// Simple-font widths array, indexed by `char_code - first_char`.
    pub widths: Option<Vec<f32>>,
    /// First character code covered by `widths`.
    pub first_char: Option<u32>,
    /// Default width (glyph-space units) for codes outside `widths`/`cid_widths`.
    pub default_width: f32,
    /// CIDFont `/W` table: sparse CID → width (glyph-space units).
    pub cid_widths: Option<HashMap<u16, f32>>,
}

impl FontInfo {
    /// Parse a font dictionary object into a `FontInfo`. `resolve` fetches
    /// and decodes (filter-applies) the bytes of an indirect stream
    /// reference such as `/ToUnicode` — the object model (§4.A) owns
    /// resolution and stream decoding, this function only interprets the
    /// decoded dictionary and CMap text.
    pub fn from_dict(
        id: FontId,
        dict: &HashMap<String, Object>,
        resolve_stream: impl Fn(&Object) -> Option<Vec<u8>>,
    ) -> Result<Self> {
        let subtype = dict
            .get("Subtype")
            .and_then(object_name)
            .unwrap_or_else(|| "Type1".to_string());
        let base_font = dict
            .get("BaseFont")
            .and_then(object_name)
            .unwrap_or_else(|| "Unknown".to_string());

        let is_type0 = subtype == "Type0";

        let to_unicode = dict
            .get("ToUnicode")
            .and_then(&resolve_stream)
            .map(LazyCMap::new);

        let (widths, first_char, default_width, cid_widths, byte_width, encoding) = if is_type0 {
            let descendant = dict
                .get("DescendantFonts")
                .and_then(|o| match o {
                    Object::Array(a) => a.first(),
                    _ => None,
                });
            let cid_default_width = descendant
                .and_then(|_| dict.get("DW"))
                .and_then(object_number)
                .unwrap_or(1000.0);
            let cid_widths = parse_cid_widths(dict.get("W"));
            (None, None, cid_default_width, cid_widths, 2u8, Encoding::Identity)
        } else {
            let first_char = dict.get("FirstChar").and_then(object_number).map(|n| n as u32);
            let widths = dict.get("Widths").and_then(|o| match o {
                Object::Array(arr) => Some(
                    arr.iter()
                        .filter_map(object_number)
                        .collect::<Vec<f32>>(),
                ),
                _ => None,
            });
            let encoding = parse_encoding(dict.get("Encoding"));
            (widths, first_char, 0.0 /* fixed below */, None, 1u8, encoding)
        };

        let flags = dict
            .get("FontDescriptor")
            .and_then(|o| match o {
                Object::Dictionary(d) => d.get("Flags").and_then(object_number),
                _ => None,
            })
            .map(|n| n as i32);

        let font_weight = dict
            .get("FontDescriptor")
            .and_then(|o| match o {
                Object::Dictionary(d) => d.get("FontWeight").and_then(object_number),
                _ => None,
            })
            .map(|n| n as i32);

        let default_width = if is_type0 {
            default_width
        } else {
            dict.get("FontDescriptor")
                .and_then(|o| match o {
                    Object::Dictionary(d) => d.get("MissingWidth").and_then(object_number),
                    _ => None,
                })
                .unwrap_or(0.0)
        };

        Ok(FontInfo {
            id,
            base_font,
            subtype,
            byte_width,
            encoding,
            to_unicode,
            font_weight,
            flags,
            widths,
            first_char,
            default_width,
            cid_widths,
        })
    }

    /// Decode a character code to its Unicode string: ToUnicode first,
    /// falling back to this font's standard/custom `/Encoding` (§4.B) for
    /// codes ToUnicode doesn't cover, so a font with no ToUnicode stream
    /// at all isn't silently opaque.
    pub fn char_to_unicode(&self, char_code: u32) -> Option<String> {
        if let Some(cmap) = self.to_unicode.as_ref().and_then(|l| l.get()) {
            if let Some(s) = cmap.get(&char_code) {
                return Some(s.clone());
            }
        }
        self.encoding_char(char_code).map(|c| c.to_string())
    }

    /// Resolve a character code through `/Encoding` alone, independent of
    /// ToUnicode. `Custom` consults its `/Differences` table; `Standard`
    /// passes printable ASCII through unchanged, since WinAnsiEncoding,
    /// MacRomanEncoding and StandardEncoding all agree with ASCII in that
    /// range, which is the range resume text overwhelmingly uses. Codes
    /// outside it are left unmapped rather than guessed at.
    fn encoding_char(&self, char_code: u32) -> Option<char> {
        match &self.encoding {
            Encoding::Custom(map) => map.get(&(char_code as u8)).copied(),
            Encoding::Standard(_) if (0x20..=0x7e).contains(&char_code) => char::from_u32(char_code),
            _ => None,
        }
    }

    /// Reverse of `encoding_char`: the character code this font's
    /// `/Encoding` would use to represent `ch`, independent of ToUnicode.
    fn encoding_code(&self, ch: char) -> Option<u8> {
        match &self.encoding {
            Encoding::Custom(map) => map.iter().find(|(_, &mapped)| mapped == ch).map(|(&code, _)| code),
            Encoding::Standard(_) => {
                let code = ch as u32;
                if (0x20..=0x7e).contains(&code) {
                    Some(code as u8)
                } else {
                    None
                }
            },
            Encoding::Identity => None,
        }
    }

    /// Decode a raw operand byte string into text, chunking by this font's
    /// byte width. A code with no ToUnicode entry contributes nothing to
    /// the output rather than a placeholder (§4.C: identity-H fonts
    /// lacking ToUnicode decode to an empty string, not garbage).
    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut out = String::new();
        for chunk in bytes.chunks(self.byte_width as usize) {
            if chunk.len() < self.byte_width as usize {
                break;
            }
            let code = chunk
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | b as u32);
            if let Some(s) = self.char_to_unicode(code) {
                out.push_str(&s);
            }
        }
        out
    }

    /// The set of Unicode characters this font can encode: the ToUnicode
    /// reverse map, unioned with whatever `/Encoding` can reach on its own
    /// (§4.B) so a font with only a standard/custom encoding still reports
    /// real coverage instead of none.
    pub fn coverage(&self) -> std::collections::HashSet<char> {
        let mut set = self
            .to_unicode
            .as_ref()
            .and_then(|l| l.get())
            .map(|c| c.coverage())
            .unwrap_or_default();
        match &self.encoding {
            Encoding::Custom(map) => set.extend(map.values().copied()),
            Encoding::Standard(_) => set.extend((0x20u32..=0x7e).filter_map(char::from_u32)),
            Encoding::Identity => {},
        }
        set
    }

    /// Encode text into this font's byte representation.
    ///
    /// Tries the ToUnicode reverse map first, falling back to `/Encoding`
    /// (§4.B) for characters ToUnicode doesn't cover. Returns
    /// `(bytes, missing_chars)`: characters neither map can place are
    /// dropped from `bytes` and reported in `missing_chars`. Per §4.B, the
    /// caller decides whether a non-empty `missing_chars` means the whole
    /// replacement must be refused.
    pub fn encode(&self, text: &str) -> (Vec<u8>, Vec<char>) {
        let cmap = self.to_unicode.as_ref().and_then(|l| l.get());
        let mut bytes = Vec::new();
        let mut missing = Vec::new();

        for ch in text.chars() {
            let code = cmap
                .as_ref()
                .and_then(|c| c.reverse_get(&ch.to_string()))
                .or_else(|| self.encoding_code(ch).map(|c| c as u32));
            match code {
                Some(code) => {
                    if self.byte_width == 2 {
                        bytes.push((code >> 8) as u8);
                        bytes.push((code & 0xFF) as u8);
                    } else {
                        bytes.push(code as u8);
                    }
                },
                None => missing.push(ch),
            }
        }

        (bytes, missing)
    }

    /// Width of one glyph, in glyph-space units (1000/em), given its
    /// character code (for simple fonts) or CID (for Type0 fonts, under
    /// the Identity-H assumption that code == CID).
    pub fn get_glyph_width(&self, char_code: u16) -> f32 {
        if let Some(cid_widths) = &self.cid_widths {
            return *cid_widths.get(&char_code).unwrap_or(&self.default_width);
        }
        if let (Some(widths), Some(first_char)) = (&self.widths, self.first_char) {
            let idx = char_code as i64 - first_char as i64;
            if idx >= 0 && (idx as usize) < widths.len() {
                return widths[idx as usize];
            }
        }
        self.default_width
    }

    /// Measure a byte-encoded string at the given font size, summing
    /// per-glyph widths looked up in the width table (§4.B). Returns the
    /// width in user-space units (glyph-space-units × size / 1000).
    pub fn measure(&self, bytes: &[u8], size_pt: f32) -> f32 {
        let mut total = 0.0f32;
        if self.byte_width == 2 {
            for chunk in bytes.chunks(2) {
                if chunk.len() == 2 {
                    let code = ((chunk[0] as u16) << 8) | chunk[1] as u16;
                    total += self.get_glyph_width(code);
                }
            }
        } else {
            for &b in bytes {
                total += self.get_glyph_width(b as u16);
            }
        }
        total * size_pt / 1000.0
    }

    /// Bold by FontDescriptor flags (bit 19/0x40000 per some producers) or
    /// name convention, whichever is informative; flags bit 19 is
    /// ForceBold in the PDF spec, but we also trust font weight and a
    /// "Bold" substring in the base name, which is far more reliable in
    /// practice.
    pub fn is_bold(&self) -> bool {
        if let Some(w) = self.font_weight {
            if w >= 600 {
                return true;
            }
        }
        self.base_font.to_lowercase().contains("bold")
    }

    /// Italic by FontDescriptor flags bit 7 (0x40) or an "Italic"/"Oblique"
    /// substring in the base name.
    pub fn is_italic(&self) -> bool {
        if let Some(flags) = self.flags {
            if flags & 0x40 != 0 {
                return true;
            }
        }
        let lower = self.base_font.to_lowercase();
        lower.contains("italic") || lower.contains("oblique")
    }

    /// `true` if this font lacks a usable encoding: no ToUnicode CMap and
    /// no standard/custom encoding table for a simple font. Per §4.B,
    /// consumers must treat such a font as opaque and refuse replacement.
    pub fn has_usable_encoding(&self) -> bool {
        if self.to_unicode.is_some() {
            return true;
        }
        !matches!(self.encoding, Encoding::Identity) || self.subtype != "Type0"
    }
}

fn object_name(o: &Object) -> Option<String> {
    match o {
        Object::Name(s) => Some(s.clone()),
        _ => None,
    }
}

fn object_number(o: &Object) -> Option<f32> {
    match o {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn parse_encoding(obj: Option<&Object>) -> Encoding {
    match obj {
        Some(Object::Name(name)) => Encoding::Standard(name.clone()),
        Some(Object::Dictionary(dict)) => {
            let base = dict
                .get("BaseEncoding")
                .and_then(object_name)
                .unwrap_or_else(|| "StandardEncoding".to_string());
            let mut map = HashMap::new();
            if let Some(Object::Array(diffs)) = dict.get("Differences") {
                let mut code: u8 = 0;
                for entry in diffs {
                    match entry {
                        Object::Integer(n) => code = *n as u8,
                        Object::Name(glyph_name) => {
                            if let Some(ch) = glyph_name_to_char(glyph_name) {
                                map.insert(code, ch);
                            }
                            code = code.saturating_add(1);
                        },
                        _ => {},
                    }
                }
            }
            if map.is_empty() {
                Encoding::Standard(base)
            } else {
                Encoding::Custom(map)
            }
        },
        _ => Encoding::Standard("StandardEncoding".to_string()),
    }
}

/// Minimal glyph-name resolver for `/Differences` arrays: single-letter
/// glyph names map directly; `uniXXXX` names map via their hex code point.
/// A full Adobe Glyph List is unnecessary here since ToUnicode, where
/// present, always takes priority over this fallback (§4.B).
fn glyph_name_to_char(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("uni") {
        if let Ok(code) = u32::from_str_radix(hex, 16) {
            return char::from_u32(code);
        }
    }
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn parse_cid_widths(w: Option<&Object>) -> Option<HashMap<u16, f32>> {
    let arr = match w {
        Some(Object::Array(a)) => a,
        _ => return None,
    };
    let mut map = HashMap::new();
    let mut i = 0;
    while i < arr.len() {
        let start = object_number(&arr[i])? as u16;
        i += 1;
        if i >= arr.len() {
            break;
        }
        match &arr[i] {
            Object::Array(widths) => {
                for (offset, wobj) in widths.iter().enumerate() {
                    if let Some(width) = object_number(wobj) {
                        map.insert(start + offset as u16, width);
                    }
                }
                i += 1;
            },
            other => {
                let end = object_number(other)? as u16;
                i += 1;
                if i >= arr.len() {
                    break;
                }
                let width = object_number(&arr[i])?;
                i += 1;
                for cid in start..=end {
                    map.insert(cid, width);
                }
            },
        }
    }
    Some(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_font_with_cmap(cmap_src: &[u8]) -> FontInfo {
        FontInfo {
            id: FontId(0),
            base_font: "Helvetica".to_string(),
            subtype: "Type1".to_string(),
            byte_width: 1,
            encoding: Encoding::Standard("WinAnsiEncoding".to_string()),
            to_unicode: Some(LazyCMap::new(cmap_src.to_vec())),
            font_weight: None,
            flags: None,
            widths: Some(vec![600.0; 95]),
            first_char: Some(32),
            default_width: 500.0,
            cid_widths: None,
        }
    }

    #[test]
    fn test_round_trip_encode_decode() {
        let font = simple_font_with_cmap(b"beginbfrange\n<0020> <007E> <0020>\nendbfrange");
        let (bytes, missing) = font.encode("A");
        assert!(missing.is_empty());
        assert_eq!(font.char_to_unicode(bytes[0] as u32), Some("A".to_string()));
    }

    #[test]
    fn test_decode_round_trips_encoded_bytes() {
        let font = simple_font_with_cmap(b"beginbfrange\n<0020> <007E> <0020>\nendbfrange");
        let (bytes, missing) = font.encode("Hi");
        assert!(missing.is_empty());
        assert_eq!(font.decode(&bytes), "Hi");
    }

    #[test]
    fn test_unmappable_char_reported() {
        let font = simple_font_with_cmap(b"beginbfrange\n<0020> <007E> <0020>\nendbfrange");
        let (bytes, missing) = font.encode("A\u{65e5}B");
        assert_eq!(missing, vec!['\u{65e5}']);
        assert_eq!(bytes.len(), 2);
    }

    #[test]
    fn test_measure_uses_widths_array() {
        let font = simple_font_with_cmap(b"beginbfrange\n<0020> <007E> <0020>\nendbfrange");
        let (bytes, _) = font.encode("AAA");
        let width = font.measure(&bytes, 12.0);
        assert!((width - (600.0 * 3.0 * 12.0 / 1000.0)).abs() < 0.01);
    }

    #[test]
    fn test_cid_font_two_byte_width() {
        let mut cid_widths = HashMap::new();
        cid_widths.insert(0x0041, 700.0);
        let font = FontInfo {
            id: FontId(1),
            base_font: "ABCDEF+Calibri".to_string(),
            subtype: "Type0".to_string(),
            byte_width: 2,
            encoding: Encoding::Identity,
            to_unicode: Some(LazyCMap::new(b"beginbfchar\n<0041> <0041>\nendbfchar".to_vec())),
            font_weight: None,
            flags: None,
            widths: None,
            first_char: None,
            default_width: 0.0,
            cid_widths: Some(cid_widths),
        };
        let (bytes, missing) = font.encode("A");
        assert!(missing.is_empty());
        assert_eq!(bytes, vec![0x00, 0x41]);
        assert_eq!(font.measure(&bytes, 10.0), 7.0);
    }

    #[test]
    fn test_is_bold_by_name() {
        let mut font = simple_font_with_cmap(b"");
        font.base_font = "Arial-Bold".to_string();
        assert!(font.is_bold());
    }

    #[test]
    fn test_is_italic_by_flags() {
        let mut font = simple_font_with_cmap(b"");
        font.flags = Some(0x40);
        assert!(font.is_italic());
    }

    #[test]
    fn test_standard_encoding_without_tounicode_round_trips_ascii() {
        let font = FontInfo {
            id: FontId(3),
            base_font: "Helvetica".to_string(),
            subtype: "Type1".to_string(),
            byte_width: 1,
            encoding: Encoding::Standard("WinAnsiEncoding".to_string()),
            to_unicode: None,
            font_weight: None,
            flags: None,
            widths: Some(vec![600.0; 95]),
            first_char: Some(32),
            default_width: 500.0,
            cid_widths: None,
        };
        assert!(font.has_usable_encoding());
        let (bytes, missing) = font.encode("Hi");
        assert!(missing.is_empty());
        assert_eq!(font.decode(&bytes), "Hi");
    }

    #[test]
    fn test_custom_differences_encoding_without_tounicode_round_trips() {
        let mut map = HashMap::new();
        map.insert(0x64u8, 'ρ');
        let font = FontInfo {
            id: FontId(4),
            base_font: "Symbol".to_string(),
            subtype: "Type1".to_string(),
            byte_width: 1,
            encoding: Encoding::Custom(map),
            to_unicode: None,
            font_weight: None,
            flags: None,
            widths: None,
            first_char: None,
            default_width: 500.0,
            cid_widths: None,
        };
        assert!(font.has_usable_encoding());
        let (bytes, missing) = font.encode("ρ");
        assert!(missing.is_empty());
        assert_eq!(bytes, vec![0x64]);
        assert_eq!(font.decode(&bytes), "ρ");
        assert!(font.coverage().contains(&'ρ'));
    }

    #[test]
    fn test_missing_tounicode_is_unusable_for_type0() {
        let font = FontInfo {
            id: FontId(2),
            base_font: "Subset+Font".to_string(),
            subtype: "Type0".to_string(),
            byte_width: 2,
            encoding: Encoding::Identity,
            to_unicode: None,
            font_weight: None,
            flags: None,
            widths: None,
            first_char: None,
            default_width: 1000.0,
            cid_widths: None,
        };
        assert!(!font.has_usable_encoding());
    }
}
