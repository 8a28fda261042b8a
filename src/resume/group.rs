//! Semantic grouper (§4.F): folds a run of classified lines into the
//! higher-level elements the rest of the pipeline edits — bullets, skill
//! lines, and title/tech-stack lines. This is where consecutive
//! `BULLET_TEXT` lines become one `BulletPoint`, consecutive
//! `SKILL_CONTENT` lines merge, and `STRUCTURE` lines inside
//! experience-family sections get a second look for the `<title>
//! (<skills>)` pattern.

use crate::resume::classify::{ClassifiedLine, LineType};
use crate::resume::span::TextSpan;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "Side Project (Rust, Actix, Postgres)" - title, then a parenthesized
    // comma list of at least two items.
    static ref RE_TITLE_SKILLS: Regex =
        Regex::new(r"^(?P<title>.+?)\s*\((?P<skills>[^()]+,[^()]+)\)\s*$").unwrap();
}

const EXPERIENCE_FAMILY: &[&str] = &[
    "experience",
    "work experience",
    "professional experience",
    "employment",
    "projects",
];

/// One bulleted item, possibly wrapped across several visual lines.
#[derive(Debug, Clone)]
pub struct BulletPoint {
    /// Decoded text of each constituent visual line, in order.
    pub line_texts: Vec<String>,
    /// Character count of each constituent line (mirrors `line_texts`).
    pub line_char_counts: Vec<usize>,
    /// Section this bullet belongs to.
    pub section: String,
    /// Spans making up the bullet, flattened across its lines, for the
    /// patcher to locate the matching content blocks.
    pub spans: Vec<TextSpan>,
}

/// A bold-label, regular-content skills line (e.g. "Languages: Rust, Go").
#[derive(Debug, Clone)]
pub struct SkillLine {
    /// Bold label prefix (e.g. "Languages:").
    pub label: String,
    /// Regular-weight content following the label.
    pub content: String,
    /// Spans making up this line.
    pub spans: Vec<TextSpan>,
}

/// A `<title> (<comma-separated tech stack>)` line found inside an
/// experience-family section's structure lines.
#[derive(Debug, Clone)]
pub struct TitleSkillLine {
    /// Text before the parenthesized list.
    pub title_part: String,
    /// The comma-separated items inside the parentheses, trimmed.
    pub skills_part: Vec<String>,
    /// Spans making up this line.
    pub spans: Vec<TextSpan>,
}

/// One semantic element recovered from the classified line stream.
#[derive(Debug, Clone)]
pub enum SemanticElement {
    Bullet(BulletPoint),
    Skill(SkillLine),
    Title(TitleSkillLine),
    /// A structure line carried through unedited (section header or plain
    /// heading), kept so downstream stages can still see section context.
    Header(String),
}

/// Fold a classified-line stream into semantic elements, flushing any
/// pending bullet at section boundaries and at end of document (§4.F).
pub fn group_semantic_elements(classified: &[ClassifiedLine]) -> Vec<SemanticElement> {
    let mut out = Vec::new();
    let mut pending_bullet: Option<BulletPoint> = None;
    let mut pending_skill: Option<SkillLine> = None;
    let mut last_section: Option<String> = None;

    let flush_bullet = |pending: &mut Option<BulletPoint>, out: &mut Vec<SemanticElement>| {
        if let Some(b) = pending.take() {
            out.push(SemanticElement::Bullet(b));
        }
    };
    let flush_skill = |pending: &mut Option<SkillLine>, out: &mut Vec<SemanticElement>| {
        if let Some(s) = pending.take() {
            out.push(SemanticElement::Skill(s));
        }
    };

    for cl in classified {
        let section_changed = cl.section != last_section;
        if section_changed {
            flush_bullet(&mut pending_bullet, &mut out);
            flush_skill(&mut pending_skill, &mut out);
            last_section = cl.section.clone();
        }

        match cl.line_type {
            LineType::BulletMarker => {
                flush_bullet(&mut pending_bullet, &mut out);
                pending_bullet = Some(BulletPoint {
                    line_texts: vec![cl.line.text()],
                    line_char_counts: vec![cl.line.text().chars().count()],
                    section: cl.section.clone().unwrap_or_default(),
                    spans: cl.line.spans.clone(),
                });
            },
            LineType::BulletText => {
                let starts_new = cl.line.text().trim_start().starts_with(['●', '•', '◦', '○', '■', '▪']);
                if starts_new || pending_bullet.is_none() {
                    flush_bullet(&mut pending_bullet, &mut out);
                    pending_bullet = Some(BulletPoint {
                        line_texts: vec![cl.line.text()],
                        line_char_counts: vec![cl.line.text().chars().count()],
                        section: cl.section.clone().unwrap_or_default(),
                        spans: cl.line.spans.clone(),
                    });
                } else if let Some(b) = pending_bullet.as_mut() {
                    b.line_texts.push(cl.line.text());
                    b.line_char_counts.push(cl.line.text().chars().count());
                    b.spans.extend(cl.line.spans.clone());
                }
            },
            LineType::SkillContent => {
                flush_bullet(&mut pending_bullet, &mut out);
                let (label, content) = split_bold_regular(cl);
                match pending_skill.as_mut() {
                    Some(s) if label.is_empty() => {
                        s.content.push(' ');
                        s.content.push_str(&content);
                        s.spans.extend(cl.line.spans.clone());
                    },
                    _ => {
                        flush_skill(&mut pending_skill, &mut out);
                        pending_skill = Some(SkillLine {
                            label,
                            content,
                            spans: cl.line.spans.clone(),
                        });
                    },
                }
            },
            LineType::ZwsPadding => {
                // Padding neither extends nor breaks a pending bullet/skill;
                // it's typeset filler between elements.
            },
            LineType::Structure => {
                flush_bullet(&mut pending_bullet, &mut out);
                flush_skill(&mut pending_skill, &mut out);

                let text = cl.line.text();
                let in_experience_family = cl
                    .section
                    .as_deref()
                    .map(|s| EXPERIENCE_FAMILY.contains(&s))
                    .unwrap_or(false);

                if in_experience_family {
                    if let Some(caps) = RE_TITLE_SKILLS.captures(text.trim()) {
                        let skills_part = caps["skills"]
                            .split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect::<Vec<_>>();
                        if skills_part.len() >= 2 {
                            out.push(SemanticElement::Title(TitleSkillLine {
                                title_part: caps["title"].trim().to_string(),
                                skills_part,
                                spans: cl.line.spans.clone(),
                            }));
                            continue;
                        }
                    }
                }
                out.push(SemanticElement::Header(text));
            },
        }
    }

    flush_bullet(&mut pending_bullet, &mut out);
    flush_skill(&mut pending_skill, &mut out);
    out
}

fn split_bold_regular(cl: &ClassifiedLine) -> (String, String) {
    let label: String = cl
        .line
        .spans
        .iter()
        .filter(|s| s.bold)
        .map(|s| s.text.as_str())
        .collect();
    let content: String = cl
        .line
        .spans
        .iter()
        .filter(|s| !s.bold)
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("");
    (label.trim().to_string(), content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontId;
    use crate::resume::classify::classify_lines;
    use crate::resume::lines::VisualLine;

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
    fn test_multi_line_bullet_merges() {
        let lines = vec![
            line(vec![span(0, 10.0, 700.0, 10.0, true, "Experience")]),
            line(vec![span(0, 10.0, 680.0, 10.0, false, "• First line of bullet")]),
            line(vec![span(0, 10.0, 665.0, 10.0, false, "continuation of bullet")]),
        ];
        let classified = classify_lines(&lines);
        let elements = group_semantic_elements(&classified);
        let bullets: Vec<_> = elements
            .iter()
            .filter_map(|e| match e {
                SemanticElement::Bullet(b) => Some(b),
                _ => None,
            })
            .collect();
        assert_eq!(bullets.len(), 1);
        assert_eq!(bullets[0].line_texts.len(), 2);
    }

    #[test]
    fn test_title_skill_line_detected_in_experience() {
        let lines = vec![
            line(vec![span(0, 10.0, 700.0, 10.0, true, "Experience")]),
            line(vec![span(
                0,
                10.0,
                680.0,
                10.0,
                false,
                "Backend Rewrite (Rust, Postgres, Kafka)",
            )]),
        ];
        let classified = classify_lines(&lines);
        let elements = group_semantic_elements(&classified);
        let titles: Vec<_> = elements
            .iter()
            .filter_map(|e| match e {
                SemanticElement::Title(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].title_part, "Backend Rewrite");
        assert_eq!(titles[0].skills_part, vec!["Rust", "Postgres", "Kafka"]);
    }

    #[test]
    fn test_skill_content_lines_merge() {
        let lines = vec![
            line(vec![span(0, 10.0, 700.0, 10.0, true, "Skills")]),
            line(vec![
                span(0, 10.0, 680.0, 10.0, true, "Languages:"),
                span(0, 60.0, 680.0, 10.0, false, "Rust, Python"),
            ]),
        ];
        let classified = classify_lines(&lines);
        let elements = group_semantic_elements(&classified);
        let skills: Vec<_> = elements
            .iter()
            .filter_map(|e| match e {
                SemanticElement::Skill(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].label, "Languages:");
        assert_eq!(skills[0].content, "Rust, Python");
    }
}
