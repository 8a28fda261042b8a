//! Width-budget calculator (§4.G): turns a line's original visual width
//! into a character budget for the LLM doing the rewriting, and the hard
//! glyph-space width the patcher actually enforces.

use crate::fonts::FontInfo;

/// Slack multiplier bounds (§4.G): how much wider than the line's original
/// ink a replacement is allowed to advise itself to be, per font. Narrower
/// fonts (more glyphs per unit width) get less slack since overflow is more
/// noticeable relative to line height.
pub const MIN_SLACK: f32 = 1.00;
pub const MAX_SLACK: f32 = 1.15;

/// Original width, in user-space units, of a set of span bounding boxes:
/// rightmost `x1` minus leftmost `x0` (§4.G).
pub fn original_width(bboxes: &[(f32, f32, f32, f32)]) -> f32 {
    let x0 = bboxes.iter().map(|b| b.0).fold(f32::INFINITY, f32::min);
    let x1 = bboxes.iter().map(|b| b.2).fold(f32::NEG_INFINITY, f32::max);
    if x0.is_finite() && x1.is_finite() {
        (x1 - x0).max(0.0)
    } else {
        0.0
    }
}

/// A font's average glyph width, in glyph-space units, used as the
/// per-character divisor for the char-count budget. Simple fonts average
/// their `/Widths` table; CID fonts average their sparse `/W` entries;
/// either falls back to the font's default width if it has no table.
pub fn average_glyph_width(font: &FontInfo) -> f32 {
    if let Some(widths) = &font.widths {
        if !widths.is_empty() {
            return widths.iter().sum::<f32>() / widths.len() as f32;
        }
    }
    if let Some(cid) = &font.cid_widths {
        if !cid.is_empty() {
            return cid.values().sum::<f32>() / cid.len() as f32;
        }
    }
    font.default_width.max(1.0)
}

/// Character budget for a line: the glyph-space width it's allowed to
/// occupy (`original_width_pt` at `size_pt`), converted to a character
/// count via the font's average glyph width, inflated by `slack`.
///
/// The char count is advisory — the LLM's target, not a hard constraint.
/// The hard constraint is the glyph-space width itself, enforced later by
/// the patcher (§4.H step 3) when it measures the actual replacement.
pub fn char_budget(original_width_pt: f32, size_pt: f32, avg_glyph_width: f32, slack: f32) -> usize {
    let slack = slack.clamp(MIN_SLACK, MAX_SLACK);
    if avg_glyph_width <= 0.0 || size_pt <= 0.0 {
        return 0;
    }
    let avg_glyph_width_pt = avg_glyph_width * size_pt / 1000.0;
    ((original_width_pt / avg_glyph_width_pt) * slack).floor().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{Encoding, FontId};
    use std::collections::HashMap;

    fn font_with_widths(widths: Vec<f32>) -> FontInfo {
        FontInfo {
            id: FontId(0),
            base_font: "Helvetica".to_string(),
            subtype: "Type1".to_string(),
            byte_width: 1,
            encoding: Encoding::Standard("WinAnsiEncoding".to_string()),
            to_unicode: None,
            font_weight: None,
            flags: None,
            widths: Some(widths),
            first_char: Some(32),
            default_width: 500.0,
            cid_widths: None,
        }
    }

    #[test]
    fn test_original_width_spans_multiple_boxes() {
        let boxes = vec![(10.0, 0.0, 50.0, 10.0), (50.0, 0.0, 90.0, 10.0)];
        assert_eq!(original_width(&boxes), 80.0);
    }

    #[test]
    fn test_average_glyph_width_uses_widths_table() {
        let font = font_with_widths(vec![500.0, 600.0, 700.0]);
        assert_eq!(average_glyph_width(&font), 600.0);
    }

    #[test]
    fn test_average_glyph_width_falls_back_to_default() {
        let font = font_with_widths(vec![]);
        assert_eq!(average_glyph_width(&font), 500.0);
    }

    #[test]
    fn test_char_budget_scales_with_slack() {
        let tight = char_budget(100.0, 10.0, 600.0, MIN_SLACK);
        let loose = char_budget(100.0, 10.0, 600.0, MAX_SLACK);
        assert!(loose >= tight);
    }

    #[test]
    fn test_char_budget_clamps_slack_range() {
        let over = char_budget(100.0, 10.0, 600.0, 5.0);
        let at_max = char_budget(100.0, 10.0, 600.0, MAX_SLACK);
        assert_eq!(over, at_max);
        let _ = HashMap::<u8, u8>::new();
    }
}
