//! Shared text-positioning simulator.
//!
//! Both the span extractor (§4.C) and the content-stream patcher's block
//! matcher (§4.H step 1) need the same thing: walk a page's operators,
//! track graphics and text state, and produce one record per text-showing
//! operator with its decoded text, origin, and byte range. This module is
//! that walk; `span.rs` wraps its output into `TextSpan`, `patch.rs` wraps
//! it into `ContentBlock`.

use crate::content::{GraphicsStateStack, Matrix, Operator, PositionedOperator, TextElement};
use crate::fonts::{FontId, FontRegistry};
use std::collections::HashMap;
use std::ops::Range;

/// One text-showing operator, decoded and positioned.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Byte range of the whole operator (operands + keyword) in the stream.
    pub range: Range<usize>,
    /// Resolved font id, if the current `/F..` resource name was registered.
    pub font_id: Option<FontId>,
    /// Font resource name as used in `Tf` (e.g. "F1").
    pub font_name: String,
    /// Font size at the time of the operator.
    pub font_size: f32,
    /// Baseline origin in user space, before the run.
    pub origin: (f32, f32),
    /// Approximate bounding box `(x0, y0, x1, y1)` in user space.
    pub bbox: (f32, f32, f32, f32),
    /// 24-bit fill color, packed as `0xRRGGBB`.
    pub color: u32,
    /// Decoded text (empty if the font has no usable ToUnicode map).
    pub text: String,
    /// Raw operand bytes, concatenated in operator order (TJ strings only).
    pub raw_bytes: Vec<u8>,
}

/// Walk a stream's operators and emit one `TextRun` per text-showing op.
pub fn simulate(
    ops: &[PositionedOperator],
    registry: &FontRegistry,
    font_by_name: &HashMap<String, FontId>,
) -> Vec<TextRun> {
    let mut stack = GraphicsStateStack::new();
    let mut runs = Vec::new();

    for positioned in ops {
        match &positioned.operator {
            Operator::SaveState => stack.save(),
            Operator::RestoreState => stack.restore(),
            Operator::Cm { a, b, c, d, e, f } => {
                let m = Matrix { a: *a, b: *b, c: *c, d: *d, e: *e, f: *f };
                let gs = stack.current_mut();
                gs.ctm = gs.ctm.multiply(&m);
            },
            Operator::BeginText => {
                let gs = stack.current_mut();
                gs.text_matrix = Matrix::identity();
                gs.text_line_matrix = Matrix::identity();
            },
            Operator::EndText => {},
            Operator::Tm { a, b, c, d, e, f } => {
                let m = Matrix { a: *a, b: *b, c: *c, d: *d, e: *e, f: *f };
                let gs = stack.current_mut();
                gs.text_matrix = m;
                gs.text_line_matrix = m;
            },
            Operator::Td { tx, ty } => apply_td(&mut stack, *tx, *ty),
            Operator::TD { tx, ty } => {
                stack.current_mut().leading = -*ty;
                apply_td(&mut stack, *tx, *ty);
            },
            Operator::TStar => {
                let leading = stack.current().leading;
                apply_td(&mut stack, 0.0, -leading);
            },
            Operator::Tc { char_space } => stack.current_mut().char_space = *char_space,
            Operator::Tw { word_space } => stack.current_mut().word_space = *word_space,
            Operator::Tz { scale } => stack.current_mut().horizontal_scaling = *scale,
            Operator::TL { leading } => stack.current_mut().leading = *leading,
            Operator::Tf { font, size } => {
                let gs = stack.current_mut();
                gs.font_name = Some(font.clone());
                gs.font_size = *size;
            },
            Operator::Tr { render } => stack.current_mut().render_mode = *render,
            Operator::Ts { rise } => stack.current_mut().text_rise = *rise,

            Operator::SetFillRgb { r, g, b } => stack.current_mut().fill_color_rgb = (*r, *g, *b),
            Operator::SetFillGray { gray } => stack.current_mut().fill_color_rgb = (*gray, *gray, *gray),
            Operator::SetFillCmyk { c, m, y, k } => {
                stack.current_mut().fill_color_rgb = cmyk_to_rgb(*c, *m, *y, *k);
            },
            Operator::SetFillColor { components } => {
                if components.len() == 3 {
                    stack.current_mut().fill_color_rgb = (components[0], components[1], components[2]);
                } else if components.len() == 1 {
                    let v = components[0];
                    stack.current_mut().fill_color_rgb = (v, v, v);
                } else if components.len() == 4 {
                    stack.current_mut().fill_color_rgb =
                        cmyk_to_rgb(components[0], components[1], components[2], components[3]);
                }
            },

            Operator::Tj { text } => {
                if let Some(run) = build_run(&stack, registry, font_by_name, text.clone(), positioned.range.clone()) {
                    advance_by_text(&mut stack, registry, font_by_name, text);
                    runs.push(run);
                }
            },
            Operator::Quote { text } => {
                let leading = stack.current().leading;
                apply_td(&mut stack, 0.0, -leading);
                if let Some(run) = build_run(&stack, registry, font_by_name, text.clone(), positioned.range.clone()) {
                    advance_by_text(&mut stack, registry, font_by_name, text);
                    runs.push(run);
                }
            },
            Operator::DoubleQuote { word_space, char_space, text } => {
                stack.current_mut().word_space = *word_space;
                stack.current_mut().char_space = *char_space;
                let leading = stack.current().leading;
                apply_td(&mut stack, 0.0, -leading);
                if let Some(run) = build_run(&stack, registry, font_by_name, text.clone(), positioned.range.clone()) {
                    advance_by_text(&mut stack, registry, font_by_name, text);
                    runs.push(run);
                }
            },
            Operator::TJ { array } => {
                let mut combined = Vec::new();
                for el in array {
                    if let TextElement::String(s) = el {
                        combined.extend_from_slice(s);
                    }
                }
                if let Some(mut run) =
                    build_run(&stack, registry, font_by_name, combined, positioned.range.clone())
                {
                    for el in array {
                        match el {
                            TextElement::String(s) => advance_by_text(&mut stack, registry, font_by_name, s),
                            TextElement::Offset(adj) => {
                                let gs = stack.current();
                                let th = gs.horizontal_scaling / 100.0;
                                let tx = -(*adj / 1000.0) * gs.font_size * th;
                                translate_text_matrix(&mut stack, tx);
                            },
                        }
                    }
                    let gs = stack.current();
                    let end_point = gs.ctm.transform_point(
                        gs.text_matrix.transform_point(0.0, 0.0).x,
                        gs.text_matrix.transform_point(0.0, 0.0).y,
                    );
                    run.bbox.2 = run.bbox.2.max(end_point.x);
                    runs.push(run);
                }
            },
            Operator::Other { .. } => {},
        }
    }

    runs
}

fn apply_td(stack: &mut GraphicsStateStack, tx: f32, ty: f32) {
    let gs = stack.current_mut();
    let translation = Matrix::translation(tx, ty);
    gs.text_line_matrix = gs.text_line_matrix.multiply(&translation);
    gs.text_matrix = gs.text_line_matrix;
}

fn translate_text_matrix(stack: &mut GraphicsStateStack, tx: f32) {
    let gs = stack.current_mut();
    let translation = Matrix::translation(tx, 0.0);
    gs.text_matrix = gs.text_matrix.multiply(&translation);
}

fn build_run(
    stack: &GraphicsStateStack,
    registry: &FontRegistry,
    font_by_name: &HashMap<String, FontId>,
    raw_bytes: Vec<u8>,
    range: Range<usize>,
) -> Option<TextRun> {
    let gs = stack.current();
    let font_name = gs.font_name.clone().unwrap_or_default();
    let font_id = font_by_name.get(&font_name).copied();
    let text = font_id
        .and_then(|id| registry.decode(id, &raw_bytes).ok())
        .unwrap_or_default();

    let to_user_space = |tx: f32, ty: f32| {
        let text_space = gs.text_matrix.transform_point(tx, ty);
        gs.ctm.transform_point(text_space.x, text_space.y)
    };
    let origin_point = to_user_space(0.0, 0.0);
    let width = font_id
        .and_then(|id| registry.measure(id, &raw_bytes, gs.font_size).ok())
        .unwrap_or(0.0);
    let far_point = to_user_space(width, 0.0);
    let top_point = to_user_space(0.0, gs.font_size);

    let color = rgb_to_u24(gs.fill_color_rgb);

    Some(TextRun {
        range,
        font_id,
        font_name,
        font_size: gs.font_size,
        origin: (origin_point.x, origin_point.y),
        bbox: (
            origin_point.x.min(far_point.x),
            origin_point.y.min(top_point.y),
            origin_point.x.max(far_point.x),
            origin_point.y.max(top_point.y),
        ),
        color,
        text,
        raw_bytes,
    })
}

fn advance_by_text(
    stack: &mut GraphicsStateStack,
    registry: &FontRegistry,
    font_by_name: &HashMap<String, FontId>,
    bytes: &[u8],
) {
    let gs = stack.current();
    let font_name = gs.font_name.clone().unwrap_or_default();
    let font_id = font_by_name.get(&font_name).copied();
    let font_size = gs.font_size;
    let char_space = gs.char_space;
    let word_space = gs.word_space;
    let th = gs.horizontal_scaling / 100.0;

    let glyph_width = font_id
        .and_then(|id| registry.measure(id, bytes, font_size).ok())
        .unwrap_or(0.0);

    let byte_width = font_id.and_then(|id| registry.get(id)).map(|f| f.byte_width).unwrap_or(1);
    let glyph_count = (bytes.len() / byte_width.max(1) as usize) as f32;
    let space_count = if byte_width == 1 { bytes.iter().filter(|&&b| b == b' ').count() as f32 } else { 0.0 };

    let tx = (glyph_width + glyph_count * char_space + space_count * word_space) * th;
    translate_text_matrix(stack, tx);
}

fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> (f32, f32, f32) {
    (
        (1.0 - c) * (1.0 - k),
        (1.0 - m) * (1.0 - k),
        (1.0 - y) * (1.0 - k),
    )
}

fn rgb_to_u24(rgb: (f32, f32, f32)) -> u32 {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    (to_byte(rgb.0) << 16) | (to_byte(rgb.1) << 8) | to_byte(rgb.2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_content_stream;
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
    fn test_simulate_single_tj() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /F1 12 Tf 100 700 Td (Hi) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let runs = simulate(&ops, &registry, &by_name);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "Hi");
        assert_eq!(runs[0].origin, (100.0, 700.0));
        assert_eq!(runs[0].font_size, 12.0);
    }

    #[test]
    fn test_simulate_advances_position_between_runs() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /F1 12 Tf 100 700 Td (Hi) Tj 0 -20 Td (Bye) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let runs = simulate(&ops, &registry, &by_name);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].origin, (100.0, 680.0));
    }

    #[test]
    fn test_simulate_tj_array_concatenates_strings() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /F1 12 Tf 0 0 Td [(Hi) -250 (There)] TJ ET";
        let ops = parse_content_stream(data).unwrap();
        let runs = simulate(&ops, &registry, &by_name);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "HiThere");
    }

    #[test]
    fn test_unknown_font_yields_empty_text_not_panic() {
        let (registry, by_name) = registry_with_helvetica();
        let data = b"BT /Missing 12 Tf 0 0 Td (Hi) Tj ET";
        let ops = parse_content_stream(data).unwrap();
        let runs = simulate(&ops, &registry, &by_name);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "");
    }
}
