//! Span extractor (§4.C): wraps the shared text-positioning simulator into
//! the spec's `TextSpan` record, one per `Tj`/`TJ`/`'`/`"` operator, ordered
//! by `(page, y, x)` as the rest of the pipeline expects.

use crate::content::parse_content_stream;
use crate::document::{PdfDocument, Page};
use crate::error::Result;
use crate::fonts::FontId;
use crate::resume::simulate::simulate;

/// A single decoded, positioned run of text from one `Tj`/`TJ` operator.
#[derive(Debug, Clone)]
pub struct TextSpan {
    /// Zero-based page index this span belongs to.
    pub page: usize,
    /// Baseline origin `(x, y)` in page user space.
    pub origin: (f32, f32),
    /// Bounding box `(x0, y0, x1, y1)` in page user space.
    pub bbox: (f32, f32, f32, f32),
    /// Font this span was drawn with.
    pub font_id: Option<FontId>,
    /// Font size in points at draw time.
    pub font_size: f32,
    /// Fill color packed as `0xRRGGBB`.
    pub color: u32,
    /// Bold, per the font's `is_bold()`.
    pub bold: bool,
    /// Italic, per the font's `is_italic()`.
    pub italic: bool,
    /// Decoded text (empty if the font lacked a usable ToUnicode map).
    pub text: String,
    /// Byte range of the source operator in the page's concatenated
    /// content stream, needed by the patcher (§4.H) to locate this span's
    /// origin operator again without re-running simulation.
    pub byte_range: std::ops::Range<usize>,
}

/// Extract every text span from every page of a document, in reading order:
/// page index ascending, then `y` ascending, then `x` ascending within a
/// page (§3: "ordering total by (y,x)").
pub fn extract_spans(doc: &PdfDocument) -> Result<Vec<TextSpan>> {
    let pages = doc.pages()?;
    let mut spans = Vec::new();
    for page in &pages {
        spans.extend(extract_page_spans(doc, page)?);
    }
    Ok(spans)
}

/// Extract spans from a single page.
pub fn extract_page_spans(doc: &PdfDocument, page: &Page) -> Result<Vec<TextSpan>> {
    let content = doc.page_content(page)?;
    let (registry, font_by_name) = doc.page_fonts(page)?;
    let ops = parse_content_stream(&content)?;
    let runs = simulate(&ops, &registry, &font_by_name);

    let mut spans: Vec<TextSpan> = runs
        .into_iter()
        .map(|run| {
            let (bold, italic) = run
                .font_id
                .and_then(|id| registry.get(id))
                .map(|f| (f.is_bold(), f.is_italic()))
                .unwrap_or((false, false));
            TextSpan {
                page: page.index,
                origin: run.origin,
                bbox: run.bbox,
                font_id: run.font_id,
                font_size: run.font_size,
                color: run.color,
                bold,
                italic,
                text: run.text,
                byte_range: run.range,
            }
        })
        .collect();

    spans.sort_by(|a, b| {
        a.origin
            .1
            .partial_cmp(&b.origin.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.origin.0.partial_cmp(&b.origin.0).unwrap_or(std::cmp::Ordering::Equal))
    });

    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{Encoding, FontInfo, FontRegistry};
    use std::collections::HashMap;

    fn registry_with_bold_and_plain() -> (FontRegistry, HashMap<String, FontId>) {
        let mut registry = FontRegistry::new();
        let plain_id = registry.next_id();
        registry.insert(FontInfo {
            id: plain_id,
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
        let bold_id = registry.next_id();
        registry.insert(FontInfo {
            id: bold_id,
            base_font: "Helvetica-Bold".to_string(),
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
        by_name.insert("F1".to_string(), plain_id);
        by_name.insert("F2".to_string(), bold_id);
        (registry, by_name)
    }

    #[test]
    fn test_spans_sorted_by_y_then_x() {
        let (registry, by_name) = registry_with_bold_and_plain();
        let data = b"BT /F1 12 Tf 50 700 Td (Second) Tj 0 20 Td (First) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let runs = simulate(&ops, &registry, &by_name);
        let mut spans: Vec<TextSpan> = runs
            .into_iter()
            .map(|run| TextSpan {
                page: 0,
                origin: run.origin,
                bbox: run.bbox,
                font_id: run.font_id,
                font_size: run.font_size,
                color: run.color,
                bold: false,
                italic: false,
                text: run.text,
                byte_range: run.range,
            })
            .collect();
        spans.sort_by(|a, b| a.origin.1.partial_cmp(&b.origin.1).unwrap());
        assert_eq!(spans[0].text, "Second");
        assert_eq!(spans[1].text, "First");
    }

    #[test]
    fn test_bold_flag_follows_font() {
        let (registry, by_name) = registry_with_bold_and_plain();
        let data = b"BT /F2 12 Tf 0 0 Td (Bold) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let runs = simulate(&ops, &registry, &by_name);
        let bold = runs[0]
            .font_id
            .and_then(|id| registry.get(id))
            .map(|f| f.is_bold())
            .unwrap_or(false);
        assert!(bold);
    }
}
