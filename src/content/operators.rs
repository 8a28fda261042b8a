//! PDF content stream operators.
//!
//! This module defines the operator types the span extractor (§4.C) and
//! content-stream patcher (§4.H) need to interpret: text positioning and
//! showing, text state, save/restore, the CTM, and fill/stroke color.
//! Path construction, painting, shading, images, and marked content are
//! not semantically relevant to either subsystem and are carried as
//! `Other` so the parser never fails on a well-formed stream it doesn't
//! need to fully understand.

use crate::object::Object;

/// A content stream operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Move text position (Td)
    Td {
        /// Horizontal offset
        tx: f32,
        /// Vertical offset
        ty: f32,
    },
    /// Move text position and set leading (TD)
    TD {
        /// Horizontal offset
        tx: f32,
        /// Vertical offset
        ty: f32,
    },
    /// Set text matrix (Tm)
    Tm {
        /// Matrix element a
        a: f32,
        /// Matrix element b
        b: f32,
        /// Matrix element c
        c: f32,
        /// Matrix element d
        d: f32,
        /// Matrix element e (x translation)
        e: f32,
        /// Matrix element f (y translation)
        f: f32,
    },
    /// Move to start of next line (T*)
    TStar,

    /// Show text string (Tj)
    Tj {
        /// Text to show (raw byte operand, font-encoded)
        text: Vec<u8>,
    },
    /// Show text with individual glyph positioning (TJ)
    TJ {
        /// Array of text strings and positioning adjustments
        array: Vec<TextElement>,
    },
    /// Move to next line and show text (')
    Quote {
        /// Text to show
        text: Vec<u8>,
    },
    /// Set spacing and show text (")
    DoubleQuote {
        /// Word spacing
        word_space: f32,
        /// Character spacing
        char_space: f32,
        /// Text to show
        text: Vec<u8>,
    },

    /// Set character spacing (Tc)
    Tc {
        /// Character spacing
        char_space: f32,
    },
    /// Set word spacing (Tw)
    Tw {
        /// Word spacing
        word_space: f32,
    },
    /// Set horizontal scaling (Tz)
    Tz {
        /// Horizontal scaling percentage
        scale: f32,
    },
    /// Set text leading (TL)
    TL {
        /// Text leading
        leading: f32,
    },
    /// Set font and size (Tf)
    Tf {
        /// Font resource name (as used in the page's `/Font` resource dict)
        font: String,
        /// Font size
        size: f32,
    },
    /// Set text rendering mode (Tr)
    Tr {
        /// Rendering mode
        render: u8,
    },
    /// Set text rise (Ts)
    Ts {
        /// Text rise
        rise: f32,
    },

    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,

    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Modify current transformation matrix (cm)
    Cm {
        /// Matrix element a
        a: f32,
        /// Matrix element b
        b: f32,
        /// Matrix element c
        c: f32,
        /// Matrix element d
        d: f32,
        /// Matrix element e (x translation)
        e: f32,
        /// Matrix element f (y translation)
        f: f32,
    },

    /// Set RGB fill color (rg)
    SetFillRgb {
        /// Red component (0.0-1.0)
        r: f32,
        /// Green component (0.0-1.0)
        g: f32,
        /// Blue component (0.0-1.0)
        b: f32,
    },
    /// Set RGB stroke color (RG)
    SetStrokeRgb {
        /// Red component (0.0-1.0)
        r: f32,
        /// Green component (0.0-1.0)
        g: f32,
        /// Blue component (0.0-1.0)
        b: f32,
    },
    /// Set gray fill color (g)
    SetFillGray {
        /// Gray level (0.0-1.0)
        gray: f32,
    },
    /// Set gray stroke color (G)
    SetStrokeGray {
        /// Gray level (0.0-1.0)
        gray: f32,
    },
    /// Set CMYK fill color (k)
    SetFillCmyk {
        /// Cyan component (0.0-1.0)
        c: f32,
        /// Magenta component (0.0-1.0)
        m: f32,
        /// Yellow component (0.0-1.0)
        y: f32,
        /// Black component (0.0-1.0)
        k: f32,
    },
    /// Set CMYK stroke color (K)
    SetStrokeCmyk {
        /// Cyan component (0.0-1.0)
        c: f32,
        /// Magenta component (0.0-1.0)
        m: f32,
        /// Yellow component (0.0-1.0)
        y: f32,
        /// Black component (0.0-1.0)
        k: f32,
    },
    /// Set fill color in the current color space (sc/scn)
    SetFillColor {
        /// Color components (length depends on color space)
        components: Vec<f32>,
    },
    /// Set stroke color in the current color space (SC/SCN)
    SetStrokeColor {
        /// Color components (length depends on color space)
        components: Vec<f32>,
    },

    /// Any operator not listed above: path construction/painting, clipping,
    /// XObjects, shading, inline images, marked content, and line-style
    /// state. Carried verbatim (name plus operands) so a patch can still
    /// recognize and skip over it without reinterpreting it.
    Other {
        /// Operator name (e.g. "re", "f", "Do", "BMC")
        name: String,
        /// Operands as parsed PDF objects
        operands: Vec<Object>,
    },
}

/// Element in a TJ array (text showing with positioning).
#[derive(Debug, Clone, PartialEq)]
pub enum TextElement {
    /// Text string to show
    String(Vec<u8>),
    /// Positioning adjustment, in thousandths of a unit of text space;
    /// positive values move left for horizontal writing.
    Offset(f32),
}

impl Operator {
    /// `true` for the operators that show text (`Tj`, `TJ`, `'`, `"`).
    pub fn is_text_showing(&self) -> bool {
        matches!(
            self,
            Operator::Tj { .. } | Operator::TJ { .. } | Operator::Quote { .. } | Operator::DoubleQuote { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_text_showing() {
        assert!(Operator::Tj { text: vec![] }.is_text_showing());
        assert!(Operator::TJ { array: vec![] }.is_text_showing());
        assert!(!Operator::TStar.is_text_showing());
        assert!(!Operator::SaveState.is_text_showing());
    }

    #[test]
    fn test_text_element_variants() {
        let el = TextElement::String(b"Hi".to_vec());
        assert_eq!(el, TextElement::String(b"Hi".to_vec()));
        let off = TextElement::Offset(-120.0);
        assert_eq!(off, TextElement::Offset(-120.0));
    }
}
