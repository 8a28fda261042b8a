//! Content-stream patcher (§4.H): the component that actually rewrites
//! bytes. Given a page's operators and a set of `(original text, origin) →
//! replacement text` assignments, it locates the content-block run that
//! produced each original text, re-encodes the replacement through the
//! same font, and either splices it in or drops it with a reason.
//!
//! Matching and rewriting both lean on `simulate.rs` for the graphics-state
//! walk; this module adds the text-diffing, boundary guards, and the
//! byte-range substitution pass.

use crate::content::{parse_content_stream, PositionedOperator};
use crate::error::{Error, Result};
use crate::fonts::{FontId, FontRegistry};
use crate::resume::protected::is_protected;
use crate::resume::simulate::simulate;
use std::collections::HashMap;
use std::ops::Range;

/// A decoded, positioned run recovered from a content stream, ready to be
/// matched against a semantic element's original text.
#[derive(Debug, Clone)]
pub struct ContentBlock {
    /// Font the block was drawn with.
    pub font_id: Option<FontId>,
    /// Font size at draw time.
    pub font_size: f32,
    /// Baseline origin in user space.
    pub origin: (f32, f32),
    /// Bounding box `(x0, y0, x1, y1)` in user space.
    pub bbox: (f32, f32, f32, f32),
    /// Byte range of the whole operator statement (operands + keyword).
    pub range: Range<usize>,
    /// Decoded text.
    pub text: String,
}

/// One assignment of replacement text for a piece of original text found
/// at a known origin. `origin` disambiguates repeated text (e.g. two
/// bullets that happen to start with the same word).
#[derive(Debug, Clone)]
pub struct ReplacementItem {
    /// Origin of the first span of the original text, from extraction.
    pub origin: (f32, f32),
    /// The original decoded text this item should match against.
    pub original_text: String,
    /// The text to splice in, already chosen by the caller (LLM output).
    pub replacement_text: String,
}

/// A batch of replacements to apply to one page's content stream.
#[derive(Debug, Clone, Default)]
pub struct ReplacementSet {
    pub items: Vec<ReplacementItem>,
}

/// What happened to one replacement item.
#[derive(Debug, Clone)]
pub enum PatchOutcome {
    Applied,
    Dropped { original_text: String, reason: Error },
}

/// y-tolerance for two blocks to be considered on the same line while
/// extending a match (mirrors the visual-line grouper's tolerance, §4.D).
const Y_TOLERANCE: f32 = 3.0;
/// Maximum horizontal gap between consecutive blocks in a match; wider
/// gaps almost always mean the next block belongs to an unrelated column.
const MAX_X_GAP: f32 = 200.0;
/// Tolerance for comparing measured widths against a budget.
const WIDTH_TOLERANCE: f32 = 0.5;

/// Build the content-block sequence for one page's operators.
pub fn content_blocks(
    ops: &[PositionedOperator],
    registry: &FontRegistry,
    font_by_name: &HashMap<String, FontId>,
) -> Vec<ContentBlock> {
    simulate(ops, registry, font_by_name)
        .into_iter()
        .map(|run| ContentBlock {
            font_id: run.font_id,
            font_size: run.font_size,
            origin: run.origin,
            bbox: run.bbox,
            range: run.range,
            text: run.text,
        })
        .collect()
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn origins_match(a: (f32, f32), b: (f32, f32)) -> bool {
    (a.0 - b.0).abs() <= Y_TOLERANCE * 2.0 && (a.1 - b.1).abs() <= Y_TOLERANCE
}

/// Find the contiguous run of blocks whose concatenated decoded text
/// equals `target_text` (after whitespace normalization), starting from
/// a block at `target_origin`. Never extends across a protected block
/// before the match completes, and never follows an x-gap wider than
/// [`MAX_X_GAP`]. Ties (multiple starting points satisfy the match) are
/// broken by smallest total x-span (§4.H step 2).
pub fn find_match(blocks: &[ContentBlock], target_text: &str, target_origin: (f32, f32)) -> Result<Vec<usize>> {
    let normalized_target = normalize_whitespace(target_text);
    if normalized_target.is_empty() {
        return Err(Error::MatchFailed(target_text.to_string()));
    }

    let mut best: Option<(Vec<usize>, f32)> = None;
    let mut protected_break: Option<usize> = None;

    for start in 0..blocks.len() {
        if !origins_match(blocks[start].origin, target_origin) {
            continue;
        }

        let mut acc = String::new();
        let mut indices = Vec::new();
        let mut last_x = blocks[start].origin.0;
        let mut completed = false;

        for i in start..blocks.len() {
            let b = &blocks[i];
            if i > start {
                if (b.origin.1 - blocks[start].origin.1).abs() > Y_TOLERANCE {
                    break;
                }
                if b.origin.0 + 0.01 < last_x {
                    break;
                }
                if b.origin.0 - last_x > MAX_X_GAP {
                    break;
                }
            }

            let already_matches = normalize_whitespace(&acc) == normalized_target;
            if is_protected(&b.text) && !already_matches {
                protected_break.get_or_insert(i);
                break;
            }

            acc.push_str(&b.text);
            indices.push(i);
            last_x = b.origin.0;

            if normalize_whitespace(&acc) == normalized_target {
                completed = true;
                break;
            }
        }

        if completed {
            let span = blocks[*indices.last().unwrap()].bbox.2 - blocks[start].bbox.0;
            if best.as_ref().map_or(true, |(_, best_span)| span < *best_span) {
                best = Some((indices, span));
            }
        }
    }

    if let Some((idx, _)) = best {
        return Ok(idx);
    }
    // A completed match elsewhere always wins (handled above); only once no
    // start produced one do we report why, distinguishing a genuine
    // protected-boundary break (§7) from an ordinary no-match.
    match protected_break {
        Some(i) => Err(Error::ProtectedBoundary(i)),
        None => Err(Error::MatchFailed(target_text.to_string())),
    }
}

fn escape_pdf_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if b == b'(' || b == b')' || b == b'\\' {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

/// Re-encode `text` through `font_id`, refusing if any character is
/// unmappable or the measured width exceeds `budget_width` (§4.H step 3).
pub fn encode_replacement(
    registry: &FontRegistry,
    font_id: FontId,
    font_size: f32,
    text: &str,
    budget_width: f32,
) -> Result<Vec<u8>> {
    let font = registry
        .get(font_id)
        .ok_or_else(|| Error::Font(format!("unknown font id {:?}", font_id)))?;
    let (bytes, missing) = font.encode(text);
    if let Some(ch) = missing.first() {
        return Err(Error::UnmappableGlyph(*ch, font.base_font.clone()));
    }
    let measured = font.measure(&bytes, font_size);
    if measured > budget_width + WIDTH_TOLERANCE {
        return Err(Error::BudgetExceeded { measured, budget: budget_width });
    }
    Ok(bytes)
}

/// Apply a replacement set to one page's decoded content stream, returning
/// the patched bytes and a per-item outcome log.
///
/// Matched runs collapse to a single literal-string `Tj` operator at the
/// first matched block's position (the safer alternative permitted for TJ
/// arrays, generalized to every match: replacement text carries no
/// meaningful per-glyph kerning of its own, so there is nothing a TJ array
/// would buy over a plain string). Any further matched blocks (a match
/// that originally spanned more than one operator) are blanked out in
/// place rather than removed, preserving operator count and alignment for
/// anything else in the stream that might reference surrounding bytes.
pub fn patch_content_stream(
    data: &[u8],
    registry: &FontRegistry,
    font_by_name: &HashMap<String, FontId>,
    replacements: &ReplacementSet,
) -> (Vec<u8>, Vec<PatchOutcome>) {
    let ops = match parse_content_stream(data) {
        Ok(ops) => ops,
        Err(e) => {
            log::warn!("content stream failed to parse, leaving it untouched: {}", e);
            return (data.to_vec(), Vec::new());
        },
    };
    let blocks = content_blocks(&ops, registry, font_by_name);

    let mut outcomes = Vec::with_capacity(replacements.items.len());
    let mut patches: Vec<(Range<usize>, Vec<u8>)> = Vec::new();

    for item in &replacements.items {
        let outcome = (|| -> Result<()> {
            let matched = find_match(&blocks, &item.original_text, item.origin)?;
            let first = &blocks[matched[0]];
            let font_id = first
                .font_id
                .ok_or_else(|| Error::Font("matched block has no resolved font".to_string()))?;

            let budget_width = {
                let x0 = matched.iter().map(|&i| blocks[i].bbox.0).fold(f32::INFINITY, f32::min);
                let x1 = matched.iter().map(|&i| blocks[i].bbox.2).fold(f32::NEG_INFINITY, f32::max);
                (x1 - x0).max(0.0)
            };

            let new_bytes = encode_replacement(registry, font_id, first.font_size, &item.replacement_text, budget_width)?;
            let escaped = escape_pdf_string(&new_bytes);
            let mut new_statement = Vec::with_capacity(escaped.len() + 8);
            new_statement.push(b'(');
            new_statement.extend_from_slice(&escaped);
            new_statement.extend_from_slice(b") Tj");

            patches.push((first.range.clone(), new_statement));
            for &idx in &matched[1..] {
                patches.push((blocks[idx].range.clone(), Vec::new()));
            }
            Ok(())
        })();

        match outcome {
            Ok(()) => outcomes.push(PatchOutcome::Applied),
            Err(e) => {
                log::warn!("dropped replacement for {:?}: {}", item.original_text, e);
                outcomes.push(PatchOutcome::Dropped {
                    original_text: item.original_text.clone(),
                    reason: e,
                });
            },
        }
    }

    patches.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut out = data.to_vec();
    for (range, new_bytes) in patches {
        out.splice(range, new_bytes);
    }

    (out, outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{Encoding, FontInfo};

    fn registry_with_helvetica() -> (FontRegistry, HashMap<String, FontId>) {
        let mut registry = FontRegistry::new();
        let id = registry.next_id();
        registry.insert(FontInfo {
            id,
            base_font: "Helvetica".to_string(),
            subtype: "Type1".to_string(),
            byte_width: 1,
            encoding: Encoding::Standard("WinAnsiEncoding".to_string()),
            to_unicode: Some(crate::fonts::LazyCMap::new(
                b"beginbfrange\n<0020> <007E> <0020>\nendbfrange".to_vec(),
            )),
            font_weight: None,
            flags: None,
            widths: Some(vec![600.0; 95]),
            first_char: Some(32),
            default_width: 500.0,
            cid_widths: None,
        });
        let mut by_name = HashMap::new();
        by_name.insert("F1".to_string(), id);
        (registry, by_name)
    }

    #[test]
    fn test_identity_replacement_is_byte_for_byte_stable_in_text() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let blocks = content_blocks(&ops, &registry, &by_name);
        let replacements = ReplacementSet {
            items: vec![ReplacementItem {
                origin: blocks[0].origin,
                original_text: "Hello".to_string(),
                replacement_text: "Hello".to_string(),
            }],
        };
        let (patched, outcomes) = patch_content_stream(data, &registry, &by_name, &replacements);
        assert!(matches!(outcomes[0], PatchOutcome::Applied));
        let ops2 = parse_content_stream(&patched).unwrap();
        let blocks2 = content_blocks(&ops2, &registry, &by_name);
        assert_eq!(blocks2[0].text, "Hello");
    }

    #[test]
    fn test_over_budget_replacement_is_dropped() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /F1 12 Tf 100 700 Td (Hi) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let blocks = content_blocks(&ops, &registry, &by_name);
        let replacements = ReplacementSet {
            items: vec![ReplacementItem {
                origin: blocks[0].origin,
                original_text: "Hi".to_string(),
                replacement_text: "This is a much, much longer replacement than the original".to_string(),
            }],
        };
        let (_patched, outcomes) = patch_content_stream(data, &registry, &by_name, &replacements);
        assert!(matches!(outcomes[0], PatchOutcome::Dropped { .. }));
    }

    #[test]
    fn test_unmappable_char_is_dropped() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /F1 12 Tf 100 700 Td (Hi) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let blocks = content_blocks(&ops, &registry, &by_name);
        let replacements = ReplacementSet {
            items: vec![ReplacementItem {
                origin: blocks[0].origin,
                original_text: "Hi".to_string(),
                replacement_text: "\u{65e5}".to_string(),
            }],
        };
        let (_patched, outcomes) = patch_content_stream(data, &registry, &by_name, &replacements);
        assert!(matches!(
            outcomes[0],
            PatchOutcome::Dropped { reason: Error::UnmappableGlyph(_, _), .. }
        ));
    }

    #[test]
    fn test_no_match_is_dropped_with_match_failed() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /F1 12 Tf 100 700 Td (Hi) Tj ET";
        let replacements = ReplacementSet {
            items: vec![ReplacementItem {
                origin: (999.0, 999.0),
                original_text: "Nonexistent".to_string(),
                replacement_text: "X".to_string(),
            }],
        };
        let (_patched, outcomes) = patch_content_stream(data, &registry, &by_name, &replacements);
        assert!(matches!(
            outcomes[0],
            PatchOutcome::Dropped { reason: Error::MatchFailed(_), .. }
        ));
    }

    fn block(text: &str, x: f32, y: f32) -> ContentBlock {
        ContentBlock {
            font_id: None,
            font_size: 10.0,
            origin: (x, y),
            bbox: (x, y, x + text.len() as f32 * 5.0, y + 10.0),
            range: 0..0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_match_crossing_protected_run_reports_protected_boundary() {
        let blocks = vec![block("Worked ", 0.0, 700.0), block("2021", 40.0, 700.0), block(" onward", 75.0, 700.0)];
        let err = find_match(&blocks, "Worked 2021 onward", (0.0, 700.0)).unwrap_err();
        assert!(matches!(err, Error::ProtectedBoundary(1)));
    }

    #[test]
    fn test_completed_match_elsewhere_wins_over_an_unrelated_protected_break() {
        let blocks = vec![
            block("Worked ", 0.0, 700.0),
            block("2021", 40.0, 700.0),
            block("Hello", 0.0, 600.0),
        ];
        let matched = find_match(&blocks, "Hello", (0.0, 600.0)).unwrap();
        assert_eq!(matched, vec![2]);
    }

    #[test]
    fn test_empty_replacement_set_leaves_stream_untouched() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /F1 12 Tf 100 700 Td (Hi) Tj ET";
        let replacements = ReplacementSet::default();
        let (patched, outcomes) = patch_content_stream(data, &registry, &by_name, &replacements);
        assert!(outcomes.is_empty());
        assert_eq!(patched, data);
    }
}
