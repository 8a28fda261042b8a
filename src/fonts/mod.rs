//! Font and CMap handling: the engine's CMap & Width Engine (component B).
//!
//! For every font resource this recovers enough information to encode
//! arbitrary replacement text back into the font's byte representation,
//! measure it in user-space units, and report which characters the font
//! cannot express.

pub mod cmap;
pub mod font_dict;

pub use cmap::{CMap, LazyCMap};
pub use font_dict::{Encoding, FontId, FontInfo};

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Document-scoped registry of parsed fonts, addressed by stable id so
/// that spans and content blocks never hold a font object directly (§9).
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    fonts: HashMap<FontId, FontInfo>,
    next_id: u32,
}

impl FontRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next stable font id.
    pub fn next_id(&mut self) -> FontId {
        let id = FontId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a parsed font, returning its stable id.
    pub fn insert(&mut self, font: FontInfo) -> FontId {
        let id = font.id;
        self.fonts.insert(id, font);
        id
    }

    /// Look up a font by id.
    pub fn get(&self, id: FontId) -> Option<&FontInfo> {
        self.fonts.get(&id)
    }

    /// Encode text through the named font, per §4.B.
    pub fn encode(&self, font: FontId, text: &str) -> Result<(Vec<u8>, Vec<char>)> {
        let info = self
            .get(font)
            .ok_or_else(|| Error::Font(format!("unknown font id {:?}", font)))?;
        if !info.has_usable_encoding() {
            return Err(Error::UnsupportedFont(info.base_font.clone()));
        }
        Ok(info.encode(text))
    }

    /// Decode an operand byte string through the named font's ToUnicode map.
    pub fn decode(&self, font: FontId, bytes: &[u8]) -> Result<String> {
        let info = self
            .get(font)
            .ok_or_else(|| Error::Font(format!("unknown font id {:?}", font)))?;
        Ok(info.decode(bytes))
    }

    /// Measure an already-encoded byte string through the named font.
    pub fn measure(&self, font: FontId, bytes: &[u8], size_pt: f32) -> Result<f32> {
        let info = self
            .get(font)
            .ok_or_else(|| Error::Font(format!("unknown font id {:?}", font)))?;
        Ok(info.measure(bytes, size_pt))
    }

    /// Iterate all registered fonts.
    pub fn iter(&self) -> impl Iterator<Item = &FontInfo> {
        self.fonts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn make_font(id: FontId) -> FontInfo {
        FontInfo {
            id,
            base_font: "Helvetica".to_string(),
            subtype: "Type1".to_string(),
            byte_width: 1,
            encoding: Encoding::Standard("WinAnsiEncoding".to_string()),
            to_unicode: Some(LazyCMap::new(b"beginbfrange\n<0020> <007E> <0020>\nendbfrange".to_vec())),
            font_weight: None,
            flags: None,
            widths: Some(vec![600.0; 95]),
            first_char: Some(32),
            default_width: 500.0,
            cid_widths: None,
        }
    }

    #[test]
    fn test_registry_round_trip() {
        let mut reg = FontRegistry::new();
        let id = reg.next_id();
        reg.insert(make_font(id));

        let (bytes, missing) = reg.encode(id, "Hello").unwrap();
        assert!(missing.is_empty());
        let width = reg.measure(id, &bytes, 12.0).unwrap();
        assert!(width > 0.0);
    }

    #[test]
    fn test_registry_unknown_font_errors() {
        let reg = FontRegistry::new();
        let result = reg.encode(FontId(99), "x");
        assert!(result.is_err());
    }

    #[test]
    fn test_unusable_encoding_refused() {
        let mut reg = FontRegistry::new();
        let id = reg.next_id();
        let mut font = make_font(id);
        font.subtype = "Type0".to_string();
        font.encoding = Encoding::Identity;
        font.to_unicode = None;
        reg.insert(font);

        assert!(reg.encode(id, "x").is_err());
        let _ = Map::<u8, char>::new();
    }
}
