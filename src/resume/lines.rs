//! Visual-line grouper (§4.D): purely physical clustering of spans sharing
//! a page and a y-origin, with no semantic interpretation at all. That
//! comes later, in `classify.rs` and `group.rs`.

use crate::resume::span::TextSpan;

/// Tolerance, in user-space units, within which two spans are considered to
/// share a baseline. Resume layouts are typeset with clean baselines; 3
/// units absorbs float accumulation from matrix composition without
/// merging genuinely distinct lines (which are usually >=9 units apart).
const Y_TOLERANCE: f32 = 3.0;

/// A cluster of spans sharing a page and (approximately) a y-origin,
/// x-sorted left to right.
#[derive(Debug, Clone)]
pub struct VisualLine {
    /// Page this line is on.
    pub page: usize,
    /// Representative y-origin: the first span's y, used for subsequent
    /// distance comparisons as the cluster grows.
    pub y_origin: f32,
    /// Spans making up this line, sorted by x ascending.
    pub spans: Vec<TextSpan>,
}

impl VisualLine {
    /// Leftmost x among this line's spans' bounding boxes.
    pub fn x0(&self) -> f32 {
        self.spans
            .iter()
            .map(|s| s.bbox.0)
            .fold(f32::INFINITY, f32::min)
    }

    /// Rightmost x among this line's spans' bounding boxes.
    pub fn x1(&self) -> f32 {
        self.spans
            .iter()
            .map(|s| s.bbox.2)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Concatenated decoded text of this line's spans, in x order.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Group already (page, y, x)-sorted spans into visual lines.
///
/// Spans are assumed sorted as `extract_spans` produces them: page
/// ascending, y ascending, x ascending. A new line starts whenever the
/// page changes or the y-origin moves by more than [`Y_TOLERANCE`] from
/// the line's anchor y.
pub fn group_visual_lines(spans: &[TextSpan]) -> Vec<VisualLine> {
    let mut lines: Vec<VisualLine> = Vec::new();

    for span in spans {
        let fits_current = lines.last().map_or(false, |line: &VisualLine| {
            line.page == span.page && (line.y_origin - span.origin.1).abs() <= Y_TOLERANCE
        });

        if fits_current {
            lines.last_mut().unwrap().spans.push(span.clone());
        } else {
            lines.push(VisualLine {
                page: span.page,
                y_origin: span.origin.1,
                spans: vec![span.clone()],
            });
        }
    }

    for line in &mut lines {
        line.spans
            .sort_by(|a, b| a.origin.0.partial_cmp(&b.origin.0).unwrap_or(std::cmp::Ordering::Equal));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontId;

    fn span(page: usize, x: f32, y: f32, text: &str) -> TextSpan {
        TextSpan {
            page,
            origin: (x, y),
            bbox: (x, y, x + 10.0, y + 10.0),
            font_id: Some(FontId(0)),
            font_size: 10.0,
            color: 0,
            bold: false,
            italic: false,
            text: text.to_string(),
            byte_range: 0..1,
        }
    }

    #[test]
    fn test_spans_on_same_baseline_group_together() {
        let spans = vec![span(0, 10.0, 700.0, "Hi"), span(0, 40.0, 701.0, "There")];
        let lines = group_visual_lines(&spans);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "HiThere");
    }

    #[test]
    fn test_spans_beyond_tolerance_split_into_lines() {
        let spans = vec![span(0, 10.0, 700.0, "Top"), span(0, 10.0, 680.0, "Bottom")];
        let lines = group_visual_lines(&spans);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_spans_across_pages_never_merge() {
        let spans = vec![span(0, 10.0, 700.0, "PageOne"), span(1, 10.0, 700.0, "PageTwo")];
        let lines = group_visual_lines(&spans);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_line_x_sorted_even_if_input_is_not() {
        let spans = vec![span(0, 50.0, 700.0, "B"), span(0, 10.0, 700.5, "A")];
        let lines = group_visual_lines(&spans);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "AB");
    }
}
