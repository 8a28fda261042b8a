//! ToUnicode CMap parser with a forward and reverse lookup table.
//!
//! CMap (Character Map) streams define the mapping from character codes
//! to Unicode strings. The engine needs both directions: decoding raw
//! content-stream bytes into text (§4.C) and re-encoding replacement text
//! back into bytes for the same font (§4.B, §4.H).
//!
//! Phase 4.1: Advanced CMap directives
//!   - beginnotdefrange sections (fallback for unmapped characters)
//!   - escape sequences for special characters (space, tab, newline, etc.)
//!   - flexible whitespace in CMap syntax
//!
use crate::error::Result;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A character map from character codes to Unicode strings, and back.
///
/// Keys are character codes (1-4 bytes); we use `u32` to support the
/// multi-byte codes found in CID fonts. `reverse` maps a decoded Unicode
/// string back to its originating code, built while inserting forward
/// entries; for codes that decode to the same string (rare, but happens
/// with notdefrange fallbacks) the first inserted code wins, matching the
/// font's own bfchar/bfrange declaration order.
#[derive(Clone, Debug, Default)]
pub struct CMap {
    chars: HashMap<u32, String>,
    reverse: HashMap<String, u32>,
}

impl CMap {
    fn new() -> Self {
        CMap {
            chars: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    fn insert(&mut self, code: u32, unicode: String) {
        self.reverse.entry(unicode.clone()).or_insert(code);
        self.chars.insert(code, unicode);
    }

    /// Decode a character code to its Unicode string.
    pub fn get(&self, code: &u32) -> Option<&String> {
        self.chars.get(code)
    }

    /// Look up the character code that encodes a given Unicode string
    /// (typically a single `char`, rendered via `to_string()`).
    pub fn reverse_get(&self, unicode: &str) -> Option<u32> {
        self.reverse.get(unicode).copied()
    }

    /// The set of Unicode characters with a reverse mapping (the font's
    /// coverage set, per §4.B).
    pub fn coverage(&self) -> HashSet<char> {
        self.reverse
            .keys()
            .filter_map(|s| {
                let mut it = s.chars();
                match (it.next(), it.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            })
            .collect()
    }

    /// Check if the CMap is empty.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Get the number of forward mappings.
    pub fn len(&self) -> usize {
        self.chars.len()
    }
}

/// Lazy-loaded ToUnicode CMap wrapper.
///
/// Defers parsing until first access; the parsed result is cached on this
/// instance only, so repeated encode/decode calls against the same font
/// don't re-parse its stream. Per §5 and §9, this cache lives entirely
/// inside the `FontInfo`/`FontRegistry` a `Document` owns — there is no
/// process-wide or cross-document cache here.
#[derive(Debug, Clone)]
pub struct LazyCMap {
    raw_stream: Vec<u8>,
    parsed: Arc<Mutex<Option<Arc<CMap>>>>,
}

impl LazyCMap {
    /// Create a new lazy CMap from raw (already filter-decoded) stream bytes.
    pub fn new(raw_stream: Vec<u8>) -> Self {
        LazyCMap {
            raw_stream,
            parsed: Arc::new(Mutex::new(None)),
        }
    }

    /// Get the parsed CMap, parsing and caching it on first access.
    pub fn get(&self) -> Option<Arc<CMap>> {
        let mut parsed_guard = self.parsed.lock().unwrap();
        if let Some(cached) = parsed_guard.as_ref() {
            return Some(Arc::clone(cached));
        }

        match parse_tounicode_cmap(&self.raw_stream) {
            Ok(cmap) => {
                let cmap_arc = Arc::new(cmap);
                *parsed_guard = Some(Arc::clone(&cmap_arc));
                Some(cmap_arc)
            },
            Err(e) => {
                log::warn!("Failed to parse ToUnicode CMap: {}", e);
                None
            },
        }
    }
}

/// Parse an escape sequence token like `<space>`, `<tab>`, etc.
fn parse_escape_sequence(token: &str) -> Option<String> {
    let token = token.trim();
    let token = if token.starts_with('<') && token.ends_with('>') {
        &token[1..token.len() - 1]
    } else {
        token
    };

    match token.to_lowercase().trim() {
        "space" => Some(" ".to_string()),
        "tab" => Some("\t".to_string()),
        "newline" => Some("\n".to_string()),
        "carriage return" => Some("\r".to_string()),
        _ => None,
    }
}

/// Decode a UTF-16 surrogate pair encoded as a 32-bit value, falling back
/// to treating it as a direct code point if it isn't a valid pair.
fn decode_utf16_surrogate_pair(value: u32) -> Option<String> {
    let high = (value >> 16) as u16;
    let low = (value & 0xFFFF) as u16;

    if (0xD800..=0xDBFF).contains(&high) && (0xDC00..=0xDFFF).contains(&low) {
        let codepoint = 0x10000 + (((high & 0x3FF) as u32) << 10) + ((low & 0x3FF) as u32);
        char::from_u32(codepoint).map(|ch| ch.to_string())
    } else {
        char::from_u32(value).map(|ch| ch.to_string())
    }
}

fn decode_dst_hex(dst_hex: &str) -> Option<String> {
    if dst_hex.len() <= 4 {
        let code = u32::from_str_radix(dst_hex, 16).ok()?;
        char::from_u32(code).map(|c| c.to_string())
    } else if dst_hex.len() == 8 {
        let code = u32::from_str_radix(dst_hex, 16).ok()?;
        decode_utf16_surrogate_pair(code).or_else(|| {
            let mut result = String::new();
            if let Ok(c) = u32::from_str_radix(&dst_hex[0..4], 16) {
                if let Some(ch) = char::from_u32(c) {
                    result.push(ch);
                }
            }
            if let Ok(c) = u32::from_str_radix(&dst_hex[4..8], 16) {
                if let Some(ch) = char::from_u32(c) {
                    result.push(ch);
                }
            }
            (!result.is_empty()).then_some(result)
        })
    } else {
        let mut result = String::new();
        for i in (0..dst_hex.len()).step_by(4) {
            let end = (i + 4).min(dst_hex.len());
            if let Ok(code) = u32::from_str_radix(&dst_hex[i..end], 16) {
                if let Some(ch) = char::from_u32(code) {
                    result.push(ch);
                }
            }
        }
        (!result.is_empty()).then_some(result)
    }
}

/// Parse a ToUnicode CMap stream (`bfchar`, `bfrange`, `beginnotdefrange`
/// sections) per ISO 32000-1:2008 §9.10.3.
pub fn parse_tounicode_cmap(data: &[u8]) -> Result<CMap> {
    let mut cmap = CMap::new();
    let content = String::from_utf8_lossy(data);

    for section in extract_sections(&content, "beginbfchar", "endbfchar") {
        for line in section.lines() {
            if let Some((src, dst)) = parse_bfchar_line(line) {
                cmap.insert(src, dst);
            }
        }
    }

    for section in extract_sections(&content, "beginbfrange", "endbfrange") {
        for line in section.lines() {
            if let Some(mappings) = parse_bfrange_line(line) {
                for (src, dst) in mappings {
                    cmap.insert(src, dst);
                }
            }
        }
    }

    for section in extract_sections(&content, "beginnotdefrange", "endnotdefrange") {
        for line in section.lines() {
            if let Some(mappings) = parse_notdefrange_line(line) {
                for (src, dst) in mappings {
                    if !cmap.chars.contains_key(&src) {
                        cmap.insert(src, dst);
                    }
                }
            }
        }
    }

    Ok(cmap)
}

fn extract_sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut sections = Vec::new();
    let mut remaining = content;

    while let Some(begin_pos) = remaining.find(begin) {
        let after_begin = &remaining[begin_pos + begin.len()..];
        if let Some(end_pos) = after_begin.find(end) {
            sections.push(&after_begin[..end_pos]);
            remaining = &after_begin[end_pos + end.len()..];
        } else {
            break;
        }
    }

    sections
}

/// Parse a bfchar line: `<src> <dst>`.
fn parse_bfchar_line(line: &str) -> Option<(u32, String)> {
    lazy_static::lazy_static! {
        static ref RE: Regex = Regex::new(r"<([^>]*)>\s*<([^>]*)>").unwrap();
    }

    let caps = RE.captures(line)?;
    let src_str = caps[1].trim().replace(char::is_whitespace, "");
    let src = u32::from_str_radix(&src_str, 16).ok()?;

    let dst_str = caps[2].trim();
    let dst = parse_escape_sequence(&format!("<{}>", dst_str))
        .or_else(|| decode_dst_hex(&dst_str.replace(char::is_whitespace, "")))?;

    Some((src, dst))
}

/// Parse a bfrange line in either sequential (`<start> <end> <dst>`) or
/// array (`<start> <end> [<dst0> <dst1> ...]`) format.
fn parse_bfrange_line(line: &str) -> Option<Vec<(u32, String)>> {
    lazy_static::lazy_static! {
        static ref RE_SEQ: Regex = Regex::new(r"<([^>]*)>\s*<([^>]*)>\s*<([^>]*)>").unwrap();
        static ref RE_ARRAY: Regex = Regex::new(r"<([^>]*)>\s*<([^>]*)>\s*\[((?:\s*<[^>]+>\s*)+)\]").unwrap();
        static ref RE_HEX: Regex = Regex::new(r"<([^>]*)>").unwrap();
    }

    if let Some(caps) = RE_ARRAY.captures(line) {
        let start = u32::from_str_radix(&caps[1].trim().replace(char::is_whitespace, ""), 16).ok()?;
        let end = u32::from_str_radix(&caps[2].trim().replace(char::is_whitespace, ""), 16).ok()?;
        let array_str = &caps[3];

        let dst_hexes: Vec<String> = RE_HEX
            .captures_iter(array_str)
            .filter_map(|cap| {
                let s = cap.get(1).unwrap().as_str().trim().replace(char::is_whitespace, "");
                (!s.is_empty()).then_some(s)
            })
            .collect();

        let range_size = (end - start + 1) as usize;
        if dst_hexes.len() != range_size {
            log::warn!(
                "ToUnicode bfrange array size mismatch: expected {} entries for 0x{:X}-0x{:X}, got {}",
                range_size, start, end, dst_hexes.len()
            );
        }

        let mut result = Vec::new();
        for (i, dst_hex) in dst_hexes.iter().take(range_size).enumerate() {
            if let Some(dst) = decode_dst_hex(dst_hex) {
                result.push((start + i as u32, dst));
            }
        }
        return Some(result);
    }

    if let Some(caps) = RE_SEQ.captures(line) {
        let start = u32::from_str_radix(&caps[1].trim().replace(char::is_whitespace, ""), 16).ok()?;
        let end = u32::from_str_radix(&caps[2].trim().replace(char::is_whitespace, ""), 16).ok()?;
        let dst_start = u32::from_str_radix(&caps[3].trim().replace(char::is_whitespace, ""), 16).ok()?;

        let mut result = Vec::new();
        let range_size = end.saturating_sub(start).min(10_000);
        for i in 0..=range_size {
            let src = start.wrapping_add(i);
            let dst_code = dst_start.wrapping_add(i);
            let unicode_string = if dst_code > 0xFFFF {
                decode_utf16_surrogate_pair(dst_code)
            } else {
                char::from_u32(dst_code).map(|c| c.to_string())
            };
            if let Some(s) = unicode_string {
                result.push((src, s));
            }
        }
        return Some(result);
    }

    None
}

/// Parse a notdefrange line: `<start> <end> <dst>`, a fallback for codes
/// not otherwise mapped.
fn parse_notdefrange_line(line: &str) -> Option<Vec<(u32, String)>> {
    lazy_static::lazy_static! {
        static ref RE_SEQ: Regex = Regex::new(r"<([^>]*)>\s*<([^>]*)>\s*<([^>]*)>").unwrap();
    }

    let caps = RE_SEQ.captures(line)?;
    let start = u32::from_str_radix(&caps[1].trim().replace(char::is_whitespace, ""), 16).ok()?;
    let end = u32::from_str_radix(&caps[2].trim().replace(char::is_whitespace, ""), 16).ok()?;
    let dst_str = caps[3].trim();

    let dst = parse_escape_sequence(&format!("<{}>", dst_str))
        .or_else(|| decode_dst_hex(&dst_str.replace(char::is_whitespace, "")))?;

    let mut result = Vec::new();
    let range_size = end.saturating_sub(start).min(10_000);
    for i in 0..=range_size {
        result.push((start.wrapping_add(i), dst.clone()));
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bfchar_single() {
        let data = b"beginbfchar\n<0041> <0041>\nendbfchar";
        let cmap = parse_tounicode_cmap(data).unwrap();
        assert_eq!(cmap.get(&0x41), Some(&"A".to_string()));
        assert_eq!(cmap.reverse_get("A"), Some(0x41));
    }

    #[test]
    fn test_parse_bfrange_ascii_printable() {
        let data = b"beginbfrange\n<0020> <007E> <0020>\nendbfrange";
        let cmap = parse_tounicode_cmap(data).unwrap();
        assert_eq!(cmap.get(&0x20), Some(&" ".to_string()));
        assert_eq!(cmap.get(&0x41), Some(&"A".to_string()));
        assert_eq!(cmap.reverse_get("z"), Some(0x7A));
    }

    #[test]
    fn test_round_trip_coverage() {
        let data = b"beginbfrange\n<0020> <007E> <0020>\nendbfrange";
        let cmap = parse_tounicode_cmap(data).unwrap();
        for c in cmap.coverage() {
            let code = cmap.reverse_get(&c.to_string()).unwrap();
            assert_eq!(cmap.get(&code).unwrap().chars().next().unwrap(), c);
        }
    }

    #[test]
    fn test_parse_bfrange_array_ligatures() {
        let data = b"beginbfrange\n<005F> <0061> [<00660066> <00660069> <00660066006C>]\nendbfrange";
        let cmap = parse_tounicode_cmap(data).unwrap();
        assert_eq!(cmap.get(&0x5F), Some(&"ff".to_string()));
        assert_eq!(cmap.get(&0x60), Some(&"fi".to_string()));
        assert_eq!(cmap.get(&0x61), Some(&"ffl".to_string()));
    }

    #[test]
    fn test_parse_mixed_bfchar_bfrange() {
        let data = b"beginbfchar\n<0041> <0058>\nendbfchar\nbeginbfrange\n<0042> <0044> <0042>\nendbfrange";
        let cmap = parse_tounicode_cmap(data).unwrap();
        assert_eq!(cmap.get(&0x41), Some(&"X".to_string()));
        assert_eq!(cmap.get(&0x42), Some(&"B".to_string()));
        assert_eq!(cmap.get(&0x44), Some(&"D".to_string()));
    }

    #[test]
    fn test_notdefrange_fallback_does_not_override() {
        let data = b"beginbfchar\n<0041> <0041>\nendbfchar\nbeginnotdefrange\n<0000> <00FF> <FFFD>\nendnotdefrange";
        let cmap = parse_tounicode_cmap(data).unwrap();
        assert_eq!(cmap.get(&0x41), Some(&"A".to_string()));
        assert_eq!(cmap.get(&0x10), Some(&"\u{FFFD}".to_string()));
    }

    #[test]
    fn test_surrogate_pair_decode() {
        let data = b"beginbfchar\n<0001> <D835DF0C>\nendbfchar";
        let cmap = parse_tounicode_cmap(data).unwrap();
        assert_eq!(cmap.get(&0x01), Some(&"\u{1D70C}".to_string()));
    }

    #[test]
    fn test_empty_cmap() {
        let cmap = parse_tounicode_cmap(b"").unwrap();
        assert!(cmap.is_empty());
    }

    #[test]
    fn test_lazy_cmap_caches_parse() {
        let lazy = LazyCMap::new(b"beginbfchar\n<0041> <0041>\nendbfchar".to_vec());
        let first = lazy.get().unwrap();
        let second = lazy.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
