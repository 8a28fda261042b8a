//! Form-map & edit driver (§4.J): the public surface of the pipeline.
//! `build_form_map` runs extraction through grouping and hands back a flat,
//! stable-id view an LLM (or any other caller) can read and propose edits
//! against; `apply_edits` turns those edits into patched PDF bytes plus a
//! verification report.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::fonts::FontRegistry;
use crate::resume::budget::{average_glyph_width, char_budget, original_width, MAX_SLACK};
use crate::resume::classify::classify_lines;
use crate::resume::group::{group_semantic_elements, SemanticElement};
use crate::resume::lines::group_visual_lines;
use crate::resume::patch::{patch_content_stream, ReplacementItem, ReplacementSet};
use crate::resume::protected::is_protected;
use crate::resume::span::extract_page_spans;
use crate::resume::verify::{verify, VerificationReport};
use std::collections::HashMap;

/// What kind of semantic element a field wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Header,
    Bullet,
    Skill,
    Title,
}

/// One editable unit of the resume, addressed by a stable id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Field {
    pub id: String,
    pub field_type: FieldType,
    pub section: String,
    pub text: String,
    pub max_chars: usize,
    /// Number of physical lines this bullet originally wrapped across.
    /// `None` for non-bullet fields.
    pub line_count: Option<usize>,
    /// Per-line character budget, for bullets (mirrors `line_count`).
    pub char_per_line: Option<Vec<usize>>,
    /// Bold label prefix, for skill lines and title/tech-stack lines.
    pub label: Option<String>,
    /// `true` if this field's text contains protected content (dates,
    /// emails, locations) and should not be rewritten at all.
    pub protected: bool,
}

/// The public, flattened view of a document's editable fields.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FormMap {
    pub fields: Vec<Field>,
    /// Fraction of fonts in the document with a usable ToUnicode CMap.
    pub font_quality: f32,
    /// Fraction of the document's decoded characters this font set can
    /// re-encode (used to warn a caller up front about likely drops).
    pub font_coverage_pct: f32,
    /// Internal field id -> (page index, element), not part of the public
    /// API but needed to locate the element again for `apply_edits`.
    #[serde(skip)]
    elements: HashMap<String, InternalElement>,
}

#[derive(Debug, Clone)]
enum InternalElement {
    Header { page: usize, origin: (f32, f32) },
    Bullet { page: usize, origin: (f32, f32), line_texts: Vec<String> },
    Skill { page: usize, origin: (f32, f32), label: String, content: String },
    Title { page: usize, origin: (f32, f32), title_part: String, skills_part: Vec<String> },
}

/// A proposed replacement for one field, keyed the same way `Field::id` is.
///
/// This is the validated shape an external LLM's JSON response is parsed
/// into before it ever reaches the patcher (§9): a malformed or
/// type-mismatched response fails deserialization and is discarded by the
/// caller, rather than being guessed at.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Edit {
    Header { text: String },
    Bullet { lines: Vec<String> },
    Skill { content: String },
    Title { skills: Vec<String> },
}

/// A record of what was actually changed for one field.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Change {
    pub field_id: String,
    pub original_text: String,
    pub new_text: String,
}

fn slugify(s: &str) -> String {
    let mut out = String::new();
    let mut last_was_hyphen = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            out.push('-');
            last_was_hyphen = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Average glyph width (glyph-space units) used only when a span's font
/// can't be resolved in the registry — a generic proportional-font average,
/// not tied to any specific typeface.
const FALLBACK_AVG_GLYPH_WIDTH: f32 = 550.0;

/// Average glyph width for the font behind a semantic element's spans
/// (§4.G), read from the page's font registry rather than assumed.
fn element_avg_glyph_width(spans: &[crate::resume::span::TextSpan], registry: &FontRegistry) -> f32 {
    spans
        .first()
        .and_then(|s| s.font_id)
        .and_then(|id| registry.get(id))
        .map(average_glyph_width)
        .unwrap_or(FALLBACK_AVG_GLYPH_WIDTH)
}

/// Build the form map for a loaded document: run extraction, line grouping,
/// classification, and semantic grouping over every page, and assign each
/// resulting element a stable field id.
pub fn build_form_map(doc: &PdfDocument) -> Result<FormMap> {
    let pages = doc.pages()?;
    let mut fields = Vec::new();
    let mut elements = HashMap::new();

    let mut header_counter = 0usize;
    let mut title_counter = 0usize;
    let mut skill_counter = 0usize;
    let mut section_bullet_counters: HashMap<String, usize> = HashMap::new();

    let mut fonts_total = 0usize;
    let mut fonts_with_tounicode = 0usize;
    let mut chars_total = 0usize;
    let mut chars_covered = 0usize;

    for page in &pages {
        let (registry, _) = doc.page_fonts(page)?;
        for font in registry.iter() {
            fonts_total += 1;
            if font.to_unicode.is_some() {
                fonts_with_tounicode += 1;
            }
        }

        let spans = extract_page_spans(doc, page)?;
        for span in &spans {
            if let Some(font) = span.font_id.and_then(|id| registry.get(id)) {
                let coverage = font.coverage();
                for ch in span.text.chars() {
                    chars_total += 1;
                    if coverage.contains(&ch) {
                        chars_covered += 1;
                    }
                }
            }
        }

        let visual_lines = group_visual_lines(&spans);
        let classified = classify_lines(&visual_lines);
        let semantic = group_semantic_elements(&classified);
        log::debug!(
            "page {}: {} spans, {} visual lines, {} semantic elements",
            page.index,
            spans.len(),
            visual_lines.len(),
            semantic.len()
        );

        for element in semantic {
            match element {
                SemanticElement::Header(text) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    let id = format!("header-{}", header_counter);
                    header_counter += 1;
                    let protected = is_protected(&text);
                    fields.push(Field {
                        id: id.clone(),
                        field_type: FieldType::Header,
                        section: String::new(),
                        text: text.clone(),
                        max_chars: text.chars().count(),
                        line_count: None,
                        char_per_line: None,
                        label: None,
                        protected,
                    });
                    elements.insert(
                        id,
                        InternalElement::Header {
                            page: page.index,
                            origin: first_origin(&classified, &text),
                        },
                    );
                },
                SemanticElement::Bullet(b) => {
                    let slug = slugify(&b.section);
                    let counter = section_bullet_counters.entry(slug.clone()).or_insert(0);
                    let id = format!("{}-b{}", slug, counter);
                    *counter += 1;

                    let text = b.line_texts.join(" ");
                    let protected = is_protected(&text);
                    let bboxes: Vec<_> = b.spans.iter().map(|s| s.bbox).collect();
                    let font_size = b.spans.first().map(|s| s.font_size).unwrap_or(10.0);
                    let avg_glyph_width = element_avg_glyph_width(&b.spans, &registry);
                    let max_chars = char_budget(original_width(&bboxes), font_size, avg_glyph_width, MAX_SLACK);

                    let origin = b.spans.first().map(|s| s.origin).unwrap_or((0.0, 0.0));
                    fields.push(Field {
                        id: id.clone(),
                        field_type: FieldType::Bullet,
                        section: b.section.clone(),
                        text: text.clone(),
                        max_chars,
                        line_count: Some(b.line_texts.len()),
                        char_per_line: Some(b.line_char_counts.clone()),
                        label: None,
                        protected,
                    });
                    elements.insert(
                        id,
                        InternalElement::Bullet {
                            page: page.index,
                            origin,
                            line_texts: b.line_texts,
                        },
                    );
                },
                SemanticElement::Skill(s) => {
                    let id = format!("skill-{}", skill_counter);
                    skill_counter += 1;
                    let combined = format!("{} {}", s.label, s.content);
                    let protected = is_protected(&combined);
                    let bboxes: Vec<_> = s.spans.iter().map(|sp| sp.bbox).collect();
                    let font_size = s.spans.first().map(|sp| sp.font_size).unwrap_or(10.0);
                    let avg_glyph_width = element_avg_glyph_width(&s.spans, &registry);
                    let max_chars = char_budget(original_width(&bboxes), font_size, avg_glyph_width, MAX_SLACK);
                    let origin = s.spans.first().map(|sp| sp.origin).unwrap_or((0.0, 0.0));

                    fields.push(Field {
                        id: id.clone(),
                        field_type: FieldType::Skill,
                        section: "skills".to_string(),
                        text: s.content.clone(),
                        max_chars,
                        line_count: None,
                        char_per_line: None,
                        label: Some(s.label.clone()),
                        protected,
                    });
                    elements.insert(
                        id,
                        InternalElement::Skill {
                            page: page.index,
                            origin,
                            label: s.label,
                            content: s.content,
                        },
                    );
                },
                SemanticElement::Title(t) => {
                    let id = format!("title-{}", title_counter);
                    title_counter += 1;
                    let text = t.skills_part.join(", ");
                    let origin = t.spans.first().map(|sp| sp.origin).unwrap_or((0.0, 0.0));
                    let bboxes: Vec<_> = t.spans.iter().map(|sp| sp.bbox).collect();
                    let font_size = t.spans.first().map(|sp| sp.font_size).unwrap_or(10.0);
                    let avg_glyph_width = element_avg_glyph_width(&t.spans, &registry);
                    let max_chars = char_budget(original_width(&bboxes), font_size, avg_glyph_width, MAX_SLACK);

                    fields.push(Field {
                        id: id.clone(),
                        field_type: FieldType::Title,
                        section: "experience".to_string(),
                        text: text.clone(),
                        max_chars,
                        line_count: None,
                        char_per_line: None,
                        label: Some(t.title_part.clone()),
                        protected: false,
                    });
                    elements.insert(
                        id,
                        InternalElement::Title {
                            page: page.index,
                            origin,
                            title_part: t.title_part,
                            skills_part: t.skills_part,
                        },
                    );
                },
            }
        }
    }

    let font_quality = if fonts_total > 0 {
        fonts_with_tounicode as f32 / fonts_total as f32
    } else {
        0.0
    };
    let font_coverage_pct = if chars_total > 0 {
        chars_covered as f32 / chars_total as f32 * 100.0
    } else {
        100.0
    };
    if font_quality < 0.5 {
        log::warn!(
            "only {:.0}% of fonts in this document carry a usable ToUnicode CMap; replacements may be dropped as unmappable",
            font_quality * 100.0
        );
    }

    Ok(FormMap {
        fields,
        font_quality,
        font_coverage_pct,
        elements,
    })
}

fn first_origin(classified: &[crate::resume::classify::ClassifiedLine], text: &str) -> (f32, f32) {
    classified
        .iter()
        .find(|cl| cl.line.text() == text)
        .and_then(|cl| cl.line.spans.first())
        .map(|s| s.origin)
        .unwrap_or((0.0, 0.0))
}

/// Apply a batch of edits: patch every page that has at least one targeted
/// field, write a new incremental revision, and verify the result.
pub fn apply_edits(
    doc: &PdfDocument,
    form_map: &FormMap,
    edits: &HashMap<String, Edit>,
) -> Result<(Vec<u8>, Vec<Change>, VerificationReport)> {
    let pages = doc.pages()?;
    let mut per_page_items: HashMap<usize, ReplacementSet> = HashMap::new();
    let mut changes = Vec::new();

    for (field_id, edit) in edits {
        let element = form_map
            .elements
            .get(field_id)
            .ok_or_else(|| Error::Font(format!("unknown field id {:?}", field_id)))?;

        let (page, origin, original_text, new_text) = match (element, edit) {
            (InternalElement::Header { page, origin }, Edit::Header { text }) => {
                (*page, *origin, String::new(), text.clone())
            },
            (InternalElement::Bullet { page, origin, line_texts }, Edit::Bullet { lines }) => {
                if lines.len() != line_texts.len() {
                    return Err(Error::StreamPatchFailed(format!(
                        "field {} has {} original lines but edit supplies {}",
                        field_id,
                        line_texts.len(),
                        lines.len()
                    )));
                }
                (*page, *origin, line_texts.join(" "), lines.join(" "))
            },
            (InternalElement::Skill { page, origin, label, content }, Edit::Skill { content: new_content }) => {
                (*page, *origin, format!("{} {}", label, content), format!("{} {}", label, new_content))
            },
            (InternalElement::Title { page, origin, title_part, skills_part }, Edit::Title { skills }) => {
                // Matches (and replaces) the whole "<title> (<skills>)" line rather
                // than scoping to just the parenthesized region: `title_part` and
                // `skills_part` come from a single regex split over the line's
                // decoded text (group.rs's RE_TITLE_SKILLS), not from distinct
                // spans, so there's no content-block boundary at the opening
                // paren to anchor a narrower match against. The prefix bytes are
                // therefore rewritten too even when `skills` is the only change.
                let original = format!("{} ({})", title_part, skills_part.join(", "));
                let new = format!("{} ({})", title_part, skills.join(", "));
                (*page, *origin, original, new)
            },
            _ => {
                return Err(Error::StreamPatchFailed(format!(
                    "edit variant does not match field {} type",
                    field_id
                )));
            },
        };

        per_page_items.entry(page).or_insert_with(ReplacementSet::default).items.push(ReplacementItem {
            origin,
            original_text: original_text.clone(),
            replacement_text: new_text.clone(),
        });
        changes.push(Change {
            field_id: field_id.clone(),
            original_text,
            new_text,
        });
    }

    let mut stream_patches = Vec::new();
    for page in &pages {
        let Some(replacement_set) = per_page_items.get(&page.index) else {
            continue;
        };
        if page.content_refs.len() != 1 {
            // Multi-stream pages are left untouched: splicing a patched,
            // concatenated buffer back into one of several stream objects
            // would duplicate or lose the others' content.
            log::warn!(
                "page {} has {} content streams, skipping patching entirely",
                page.index,
                page.content_refs.len()
            );
            continue;
        }
        let (registry, font_by_name) = doc.page_fonts(page)?;
        let content = doc.page_content(page)?;
        let (patched, _outcomes) = patch_content_stream(&content, &registry, &font_by_name, replacement_set);
        stream_patches.push((page.content_refs[0], patched));
    }

    let new_bytes = doc.save_with_patches(&stream_patches)?;
    let patched_doc = PdfDocument::from_bytes(new_bytes.clone())?;
    let report = verify(doc, &patched_doc)?;

    Ok((new_bytes, changes, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Work Experience"), "work-experience");
        assert_eq!(slugify("Honors & Awards"), "honors-awards");
    }

    #[test]
    fn test_slugify_trims_trailing_punctuation() {
        assert_eq!(slugify("Skills:"), "skills");
    }
}
