//! Post-patch verifier (§4.I): re-opens the patched output and checks it
//! against the original along four axes. Advisory only — the engine never
//! rolls back a patch because of a failed check; the driver (§4.J) may
//! choose to retry with a smaller replacement set.

use crate::document::PdfDocument;
use crate::error::Result;
use crate::resume::protected::extract_protected;
use crate::resume::span::extract_spans;
use std::collections::HashMap;

/// One verification axis: pass/fail plus human-readable detail.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SubReport {
    pub pass: bool,
    pub warnings: Vec<String>,
    pub detail: HashMap<String, String>,
}

/// Full verification result: four sub-reports plus an overall pass flag
/// that is the logical AND of all four.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerificationReport {
    pub protected_content: SubReport,
    pub fonts: SubReport,
    pub garbled: SubReport,
    pub overflow: SubReport,
    pub pass: bool,
}

/// Tolerance added to the original's observed right margin before flagging
/// overflow, per §4.I.
const OVERFLOW_TOLERANCE: f32 = 0.5;

/// Known slash-compound tokens that look like isolated-punctuation garbling
/// but are legitimate resume vocabulary.
const SLASH_COMPOUND_WHITELIST: &[&str] = &["min/max", "i/o", "read/write", "ci/cd", "front/back"];

/// Re-open `patched` (already loaded by the caller) and verify it against
/// `original` along all four axes.
pub fn verify(original: &PdfDocument, patched: &PdfDocument) -> Result<VerificationReport> {
    let original_spans = extract_spans(original)?;
    let patched_spans = extract_spans(patched)?;

    let protected_content = check_protected_content(&original_spans, &patched_spans);
    let fonts = check_fonts(original, patched)?;
    let garbled = check_garbled(&original_spans, &patched_spans);
    let overflow = check_overflow(original, &original_spans, &patched_spans);

    let pass = protected_content.pass && fonts.pass && garbled.pass && overflow.pass;

    Ok(VerificationReport {
        protected_content,
        fonts,
        garbled,
        overflow,
        pass,
    })
}

fn full_text(spans: &[crate::resume::span::TextSpan], page: usize) -> String {
    spans
        .iter()
        .filter(|s| s.page == page)
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_protected_content(
    original_spans: &[crate::resume::span::TextSpan],
    patched_spans: &[crate::resume::span::TextSpan],
) -> SubReport {
    let max_page = original_spans.iter().map(|s| s.page).max().unwrap_or(0);
    let mut warnings = Vec::new();
    let mut detail = HashMap::new();

    for page in 0..=max_page {
        let original_text = full_text(original_spans, page);
        let patched_text = full_text(patched_spans, page);
        for token in extract_protected(&original_text) {
            if !patched_text.contains(&token) {
                warnings.push(format!("page {}: protected content {:?} missing from output", page, token));
            }
        }
    }
    detail.insert("pages_checked".to_string(), (max_page + 1).to_string());

    SubReport {
        pass: warnings.is_empty(),
        warnings,
        detail,
    }
}

fn check_fonts(original: &PdfDocument, patched: &PdfDocument) -> Result<SubReport> {
    let mut warnings = Vec::new();
    let original_pages = original.pages()?;
    let patched_pages = patched.pages()?;

    for (i, (orig_page, new_page)) in original_pages.iter().zip(patched_pages.iter()).enumerate() {
        let (orig_registry, _) = original.page_fonts(orig_page)?;
        let (new_registry, _) = patched.page_fonts(new_page)?;
        let mut orig_names: Vec<String> = orig_registry.iter().map(|f| f.base_font.clone()).collect();
        let mut new_names: Vec<String> = new_registry.iter().map(|f| f.base_font.clone()).collect();
        orig_names.sort();
        new_names.sort();
        if orig_names != new_names {
            warnings.push(format!(
                "page {}: font inventory changed (was {:?}, now {:?})",
                i, orig_names, new_names
            ));
        }
    }

    Ok(SubReport {
        pass: warnings.is_empty(),
        warnings,
        detail: HashMap::new(),
    })
}

fn check_garbled(
    original_spans: &[crate::resume::span::TextSpan],
    patched_spans: &[crate::resume::span::TextSpan],
) -> SubReport {
    let mut warnings = Vec::new();
    let vocabulary: std::collections::HashSet<&str> =
        original_spans.iter().flat_map(|s| s.text.split_whitespace()).collect();

    for span in patched_spans {
        if span.text.contains('\u{FFFD}') {
            warnings.push(format!(
                "page {} at ({:.1}, {:.1}): replacement character U+FFFD in {:?}",
                span.page, span.origin.0, span.origin.1, span.text
            ));
        }
        for token in span.text.split_whitespace() {
            if is_isolated_punctuation(token) {
                warnings.push(format!(
                    "page {} at ({:.1}, {:.1}): isolated punctuation token {:?}",
                    span.page, span.origin.0, span.origin.1, token
                ));
            }
            if has_midword_uppercase_boundary(token) && !vocabulary.contains(token) {
                warnings.push(format!(
                    "page {} at ({:.1}, {:.1}): unexpected mid-word capitalization in {:?}",
                    span.page, span.origin.0, span.origin.1, token
                ));
            }
        }
    }

    SubReport {
        pass: warnings.is_empty(),
        warnings,
        detail: HashMap::new(),
    }
}

/// A lowercase letter immediately followed by an uppercase letter, not at
/// the start of the token — the signature of a glyph substitution flipping
/// case mid-word. Legitimate mixed-case vocabulary (`PowerPoint`, `iPhone`)
/// is only flagged when it's new relative to `original_spans`.
fn has_midword_uppercase_boundary(token: &str) -> bool {
    let chars: Vec<char> = token.chars().collect();
    chars.windows(2).any(|w| w[0].is_lowercase() && w[1].is_uppercase())
}

fn is_isolated_punctuation(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    if SLASH_COMPOUND_WHITELIST.contains(&token.to_lowercase().as_str()) {
        return false;
    }
    token.chars().all(|c| !c.is_alphanumeric())
}

fn check_overflow(
    original: &PdfDocument,
    original_spans: &[crate::resume::span::TextSpan],
    patched_spans: &[crate::resume::span::TextSpan],
) -> SubReport {
    let mut warnings = Vec::new();
    let pages = match original.pages() {
        Ok(p) => p,
        Err(_) => return SubReport { pass: true, warnings, detail: HashMap::new() },
    };

    for page in &pages {
        let margin = original_spans
            .iter()
            .filter(|s| s.page == page.index)
            .map(|s| s.bbox.2)
            .fold(0.0f32, f32::max)
            + OVERFLOW_TOLERANCE;

        for span in patched_spans.iter().filter(|s| s.page == page.index) {
            if span.bbox.2 > margin {
                warnings.push(format!(
                    "page {}: text block right edge {:.1} exceeds margin {:.1}",
                    page.index, span.bbox.2, margin
                ));
            }
        }
    }

    SubReport {
        pass: warnings.is_empty(),
        warnings,
        detail: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_punctuation_detects_stray_tokens() {
        assert!(is_isolated_punctuation("--"));
        assert!(!is_isolated_punctuation("min/max"));
        assert!(!is_isolated_punctuation("Rust"));
    }

    #[test]
    fn test_whitelisted_slash_compound_not_flagged() {
        assert!(!is_isolated_punctuation("CI/CD"));
    }

    #[test]
    fn test_midword_uppercase_boundary_detects_new_word() {
        assert!(has_midword_uppercase_boundary("helloWORLD"));
        assert!(!has_midword_uppercase_boundary("PowerPoint"));
        assert!(!has_midword_uppercase_boundary("hello"));
    }

    fn span(page: usize, text: &str) -> crate::resume::span::TextSpan {
        crate::resume::span::TextSpan {
            page,
            origin: (0.0, 0.0),
            bbox: (0.0, 0.0, 0.0, 0.0),
            font_id: None,
            font_size: 10.0,
            color: 0,
            bold: false,
            italic: false,
            text: text.to_string(),
            byte_range: 0..0,
        }
    }

    #[test]
    fn test_check_garbled_flags_unseen_midword_capitalization() {
        let original = vec![span(0, "Senior Software Engineer")];
        let patched = vec![span(0, "Senior SoftwAre Engineer")];
        let report = check_garbled(&original, &patched);
        assert!(!report.pass);
        assert!(report.warnings.iter().any(|w| w.contains("SoftwAre")));
    }

    #[test]
    fn test_check_garbled_allows_midword_capitalization_from_original() {
        let original = vec![span(0, "Built with PowerPoint and SQL")];
        let patched = vec![span(0, "Built with PowerPoint and SQL")];
        let report = check_garbled(&original, &patched);
        assert!(report.pass);
    }
}
