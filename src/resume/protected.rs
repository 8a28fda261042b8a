//! Protected-content patterns (§4.H boundary guard, §4.I verification,
//! GLOSSARY "Protected content"): dates, emails, and a handful of other
//! patterns the patcher must never split across a replacement boundary and
//! the verifier must find preserved in the output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_EMAIL: Regex =
        Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").unwrap();

    // "January 2021", "Jan 2021", "01/2021", "2021-01", bare "2021".
    static ref RE_MONTH_YEAR: Regex = Regex::new(
        r"(?i)\b(jan(uary)?|feb(ruary)?|mar(ch)?|apr(il)?|may|jun(e)?|jul(y)?|aug(ust)?|sep(t(ember)?)?|oct(ober)?|nov(ember)?|dec(ember)?)\.?\s+\d{4}\b"
    ).unwrap();
    static ref RE_NUMERIC_DATE: Regex = Regex::new(r"\b\d{1,2}/\d{4}\b|\b\d{4}-\d{2}\b").unwrap();
    static ref RE_BARE_YEAR: Regex = Regex::new(r"\b(19|20)\d{2}\b").unwrap();

    static ref RE_PRESENT: Regex = Regex::new(r"(?i)\b(present|current|now)\b").unwrap();

    // "City, ST" - a capitalized word (or words), comma, two-letter state.
    static ref RE_LOCATION: Regex =
        Regex::new(r"\b[A-Z][a-zA-Z]+(?:\s[A-Z][a-zA-Z]+)*,\s[A-Z]{2}\b").unwrap();
}

/// `true` if `text` contains any pattern the patcher must treat as
/// protected: it may never extend a content-block match across such a
/// span, and the verifier checks these are preserved end to end.
pub fn is_protected(text: &str) -> bool {
    RE_EMAIL.is_match(text)
        || RE_MONTH_YEAR.is_match(text)
        || RE_NUMERIC_DATE.is_match(text)
        || RE_BARE_YEAR.is_match(text)
        || RE_PRESENT.is_match(text)
        || RE_LOCATION.is_match(text)
}

/// Extract every protected substring from `text`, used by the verifier to
/// build the original document's protected-content set (§4.I).
pub fn extract_protected(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for re in [&*RE_EMAIL, &*RE_MONTH_YEAR, &*RE_NUMERIC_DATE, &*RE_BARE_YEAR, &*RE_PRESENT, &*RE_LOCATION] {
        out.extend(re.find_iter(text).map(|m| m.as_str().to_string()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_protected() {
        assert!(is_protected("Reach me at jane.doe@example.com anytime"));
    }

    #[test]
    fn test_month_year_is_protected() {
        assert!(is_protected("January 2021 - March 2022"));
    }

    #[test]
    fn test_present_is_protected() {
        assert!(is_protected("June 2020 - Present"));
    }

    #[test]
    fn test_location_is_protected() {
        assert!(is_protected("Austin, TX"));
    }

    #[test]
    fn test_bare_year_is_protected() {
        assert!(is_protected("Graduated 2019"));
    }

    #[test]
    fn test_ordinary_text_is_not_protected() {
        assert!(!is_protected("Led a team of five engineers"));
    }

    #[test]
    fn test_extract_protected_finds_multiple() {
        let found = extract_protected("jane@example.com, Austin, TX, 2021");
        assert!(found.iter().any(|s| s == "jane@example.com"));
        assert!(found.iter().any(|s| s == "Austin, TX"));
    }
}
