//! Line classifier (§4.E): walks a document's visual lines once, in
//! reading order, tagging each with a [`LineType`] and the section it
//! belongs to. Classification is stateful — "what section are we in" and
//! "where was the last bullet" both carry forward from line to line — so
//! this has to run as a single left-to-right pass, never per-line in
//! isolation.

use crate::resume::lines::VisualLine;

/// Fixed vocabulary of section header names a resume commonly uses.
/// Matched case-insensitively against a line's full text after trimming.
const SECTION_KEYWORDS: &[&str] = &[
    "experience",
    "work experience",
    "professional experience",
    "employment",
    "education",
    "skills",
    "technical skills",
    "core competencies",
    "projects",
    "awards",
    "honors",
    "honors and awards",
    "certifications",
    "publications",
    "summary",
    "objective",
    "profile",
    "interests",
    "languages",
    "references",
    "volunteer",
    "activities",
    "leadership",
];

/// Sections whose body lines are bullet text under rule 5.
const BULLET_TEXT_SECTIONS: &[&str] = &[
    "experience",
    "work experience",
    "professional experience",
    "employment",
    "projects",
    "awards",
    "honors",
    "honors and awards",
    "certifications",
    "publications",
];

const BULLET_MARKERS: &[char] = &['●', '•', '◦', '○', '■', '▪'];

/// Fonts noticeably larger than the document's median are a section-header
/// signal when combined with bold. 1.15x is generous enough to catch
/// resumes typeset with a subtle size bump (e.g. 11pt body, 12.5pt
/// headers) without tripping on ordinary bold emphasis at body size.
const HEADER_SIZE_RATIO: f32 = 1.15;

/// Continuation lines within this many y-units of the previous bullet (or
/// skill-content) line are treated as wrapped continuations of it, not new
/// elements (§4.E rules 4 and 5).
const CONTINUATION_Y_TOLERANCE: f32 = 15.0;

/// Horizontal tolerance for a bullet-text continuation line to still count
/// as aligned with the bullet body above it.
const CONTINUATION_X_TOLERANCE: f32 = 15.0;

/// y-band, from the top of a page, within which a line with no bullet
/// marker of its own is still treated as a continuation of a bullet that
/// was cut off by a page break (§9 open question: heuristic, may
/// misclassify; see DESIGN.md).
const PAGE_BREAK_TOP_BAND: f32 = 120.0;

/// x threshold below which a Projects-section line is a left-margin
/// continuation rather than a new title (§4.E rule 6).
const PROJECTS_LEFT_MARGIN: f32 = 20.0;

/// Classification tag for a visual line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    /// A section header, or anything that doesn't match a more specific rule.
    Structure,
    /// Empty or zero-width-space-only line.
    ZwsPadding,
    /// A line containing only a bullet marker glyph.
    BulletMarker,
    /// Bullet body text (possibly a continuation of a previous bullet).
    BulletText,
    /// Bold-label + regular-content skill line.
    SkillContent,
}

/// A visual line tagged with its classification and the section active at
/// the time it was classified.
#[derive(Debug, Clone)]
pub struct ClassifiedLine {
    /// The underlying visual line.
    pub line: VisualLine,
    /// This line's classification.
    pub line_type: LineType,
    /// Section name active when this line was classified (lowercase,
    /// matched keyword, or the raw header text if no keyword matched but
    /// the font-size heuristic fired).
    pub section: Option<String>,
    /// Page of the line's first span.
    pub page: usize,
    /// y-origin of the line's first span.
    pub y_origin: f32,
}

struct ClassifierState {
    current_section: Option<String>,
    median_font_size: f32,
    page_height_seen: std::collections::HashMap<usize, f32>,
    last_bullet_y: Option<(usize, f32)>,
    last_bullet_x: Option<f32>,
}

/// Classify a document's visual lines in a single left-to-right pass.
pub fn classify_lines(lines: &[VisualLine]) -> Vec<ClassifiedLine> {
    let median_font_size = median_font_size(lines);
    let mut state = ClassifierState {
        current_section: None,
        median_font_size,
        page_height_seen: std::collections::HashMap::new(),
        last_bullet_y: None,
        last_bullet_x: None,
    };

    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        state
            .page_height_seen
            .entry(line.page)
            .and_modify(|y| *y = y.max(line.y_origin))
            .or_insert(line.y_origin);

        let line_type = classify_one(line, &mut state);
        out.push(ClassifiedLine {
            line: line.clone(),
            line_type,
            section: state.current_section.clone(),
            page: line.page,
            y_origin: line.y_origin,
        });
    }
    out
}

fn median_font_size(lines: &[VisualLine]) -> f32 {
    let mut sizes: Vec<f32> = lines
        .iter()
        .flat_map(|l| l.spans.iter().map(|s| s.font_size))
        .collect();
    if sizes.is_empty() {
        return 10.0;
    }
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap());
    sizes[sizes.len() / 2]
}

fn classify_one(line: &VisualLine, state: &mut ClassifierState) -> LineType {
    let text = line.text();
    let trimmed = text.trim();

    // Rule 1: section header.
    let normalized = trimmed.to_lowercase();
    let keyword_match = SECTION_KEYWORDS
        .iter()
        .find(|kw| normalized == **kw || normalized.trim_start_matches(|c: char| !c.is_alphabetic()) == **kw);
    let looks_like_header = keyword_match.is_some() || is_bold_and_large(line, state.median_font_size);

    if looks_like_header && !trimmed.is_empty() {
        let section = keyword_match.map(|s| s.to_string()).unwrap_or(normalized);
        log::debug!("section header detected: {:?}", section);
        state.current_section = Some(section);
        state.last_bullet_y = None;
        state.last_bullet_x = None;
        return LineType::Structure;
    }

    // Rule 2: empty or ZWS-only.
    if is_zws_only(trimmed) {
        return LineType::ZwsPadding;
    }

    // Rule 3: bullet-marker-only line.
    if is_bullet_marker_only(trimmed) {
        state.last_bullet_y = Some((line.page, line.y_origin));
        state.last_bullet_x = Some(line.x0());
        return LineType::BulletMarker;
    }

    let in_skill_section = state
        .current_section
        .as_deref()
        .map(|s| s.contains("skill") || s.contains("competenc"))
        .unwrap_or(false);
    let in_bullet_section = state
        .current_section
        .as_deref()
        .map(|s| BULLET_TEXT_SECTIONS.contains(&s))
        .unwrap_or(false);

    // Rule 4: skill content.
    if in_skill_section {
        let content_spans: Vec<_> = line
            .spans
            .iter()
            .filter(|s| !is_bullet_marker_only(s.text.trim()) && !is_zws_only(s.text.trim()))
            .collect();
        let has_bold = content_spans.iter().any(|s| s.bold);
        let has_regular = content_spans.iter().any(|s| !s.bold);
        if has_bold && has_regular {
            return LineType::SkillContent;
        }
        if let Some((page, y)) = state.last_bullet_y {
            if page == line.page && (y - line.y_origin).abs() <= CONTINUATION_Y_TOLERANCE {
                return LineType::SkillContent;
            }
        }
    }

    // Rule 5: bullet text.
    if in_bullet_section {
        let starts_with_bullet_char = trimmed.starts_with(BULLET_MARKERS);
        let at_known_bullet_y = state
            .last_bullet_y
            .map(|(page, y)| page == line.page && (y - line.y_origin).abs() < 0.5)
            .unwrap_or(false);
        let is_continuation = state
            .last_bullet_y
            .zip(state.last_bullet_x)
            .map(|((page, y), x)| {
                page == line.page
                    && (y - line.y_origin).abs() <= CONTINUATION_Y_TOLERANCE
                    && (x - line.x0()).abs() <= CONTINUATION_X_TOLERANCE
            })
            .unwrap_or(false);
        let top_band_continuation = state
            .last_bullet_y
            .map(|(page, _)| page != line.page && line.y_origin <= page_top_y(state, line.page) + PAGE_BREAK_TOP_BAND)
            .unwrap_or(false)
            && line.page
                > state
                    .last_bullet_y
                    .map(|(p, _)| p)
                    .unwrap_or(line.page);

        if starts_with_bullet_char || at_known_bullet_y || is_continuation || top_band_continuation {
            state.last_bullet_y = Some((line.page, line.y_origin));
            state.last_bullet_x = Some(line.x0());
            return LineType::BulletText;
        }

        // Rule 6: Projects left-margin continuations.
        if state.current_section.as_deref() == Some("projects") && line.x0() < PROJECTS_LEFT_MARGIN {
            state.last_bullet_y = Some((line.page, line.y_origin));
            state.last_bullet_x = Some(line.x0());
            return LineType::BulletText;
        }
    }

    // Rule 7: default.
    LineType::Structure
}

fn page_top_y(state: &ClassifierState, page: usize) -> f32 {
    // y-origins are measured from the page bottom in PDF user space, so
    // "top of page" is the maximum y seen so far (a one-pass approximation:
    // by the time a line on `page` is classified, earlier lines of that
    // same page have already set its high-water mark).
    state.page_height_seen.get(&page).copied().unwrap_or(0.0)
        .max(state.page_height_seen.get(&page.saturating_sub(1)).copied().unwrap_or(0.0))
}

fn is_zws_only(text: &str) -> bool {
    text.is_empty() || text.chars().all(|c| c == '\u{200B}')
}

fn is_bullet_marker_only(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| BULLET_MARKERS.contains(&c) || c.is_whitespace())
}

fn is_bold_and_large(line: &VisualLine, median: f32) -> bool {
    let all_bold = !line.spans.is_empty() && line.spans.iter().all(|s| s.bold);
    let max_size = line.spans.iter().map(|s| s.font_size).fold(0.0f32, f32::max);
    all_bold && max_size >= median * HEADER_SIZE_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontId;
    use crate::resume::span::TextSpan;

    fn span(page: usize, x: f32, y: f32, size: f32, bold: bool, text: &str) -> TextSpan {
        TextSpan {
            page,
            origin: (x, y),
            bbox: (x, y, x + 10.0, y + size),
            font_id: Some(FontId(0)),
            font_size: size,
            color: 0,
            bold,
            italic: false,
            text: text.to_string(),
            byte_range: 0..1,
        }
    }

    fn line(spans: Vec<TextSpan>) -> VisualLine {
        VisualLine {
            page: spans[0].page,
            y_origin: spans[0].origin.1,
            spans,
        }
    }

    #[test]
    fn test_keyword_header_detected() {
        let lines = vec![
            line(vec![span(0, 10.0, 700.0, 10.0, true, "Experience")]),
            line(vec![span(0, 10.0, 680.0, 10.0, false, "Did some things")]),
        ];
        let classified = classify_lines(&lines);
        assert_eq!(classified[0].line_type, LineType::Structure);
        assert_eq!(classified[0].section.as_deref(), Some("experience"));
    }

    #[test]
    fn test_empty_line_is_zws_padding() {
        let lines = vec![line(vec![span(0, 10.0, 700.0, 10.0, false, "")])];
        let classified = classify_lines(&lines);
        assert_eq!(classified[0].line_type, LineType::ZwsPadding);
    }

    #[test]
    fn test_bullet_marker_only_line() {
        let lines = vec![line(vec![span(0, 10.0, 700.0, 10.0, false, "•")])];
        let classified = classify_lines(&lines);
        assert_eq!(classified[0].line_type, LineType::BulletMarker);
    }

    #[test]
    fn test_bullet_text_in_experience_section() {
        let lines = vec![
            line(vec![span(0, 10.0, 700.0, 10.0, true, "Experience")]),
            line(vec![span(0, 10.0, 680.0, 10.0, false, "• Built a thing")]),
        ];
        let classified = classify_lines(&lines);
        assert_eq!(classified[1].line_type, LineType::BulletText);
        assert_eq!(classified[1].section.as_deref(), Some("experience"));
    }

    #[test]
    fn test_skill_content_requires_bold_and_regular() {
        let lines = vec![
            line(vec![span(0, 10.0, 700.0, 10.0, true, "Skills")]),
            line(vec![
                span(0, 10.0, 680.0, 10.0, true, "Languages: "),
                span(0, 60.0, 680.0, 10.0, false, "Rust, Python"),
            ]),
        ];
        let classified = classify_lines(&lines);
        assert_eq!(classified[1].line_type, LineType::SkillContent);
    }

    #[test]
    fn test_plain_structure_outside_any_special_section() {
        let lines = vec![line(vec![span(0, 10.0, 700.0, 10.0, false, "John Doe")])];
        let classified = classify_lines(&lines);
        assert_eq!(classified[0].line_type, LineType::Structure);
    }
}
