//! Configuration for the resume editing pipeline.

/// Resume editing configuration.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Slack multiplier applied when turning a line's original width into
    /// an advisory character budget (§4.G). Clamped to `[1.00, 1.15]`.
    pub width_slack: f32,

    /// Reject a replacement whose measured width exceeds its budget by
    /// more than this many points (§4.H step 3, §8 width containment).
    pub width_tolerance_pt: f32,

    /// Run the post-patch verifier (§4.I) after `apply_edits`. Disabling
    /// this skips re-opening the patched PDF entirely; the patch itself is
    /// unaffected either way.
    pub verify_after_patch: bool,

    /// Treat any field whose text matches a protected-content pattern
    /// (dates, emails, locations) as non-editable in `build_form_map`,
    /// rather than merely flagging it.
    pub refuse_protected_fields: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self {
            width_slack: crate::resume::budget::MAX_SLACK,
            width_tolerance_pt: 0.5,
            verify_after_patch: true,
            refuse_protected_fields: false,
        }
    }

    /// Set the width-budget slack multiplier.
    pub fn with_width_slack(mut self, slack: f32) -> Self {
        self.width_slack = slack.clamp(crate::resume::budget::MIN_SLACK, crate::resume::budget::MAX_SLACK);
        self
    }

    /// Set the width tolerance applied when checking a replacement against
    /// its budget.
    pub fn with_width_tolerance(mut self, tolerance_pt: f32) -> Self {
        self.width_tolerance_pt = tolerance_pt;
        self
    }

    /// Toggle whether `apply_edits` runs the post-patch verifier.
    pub fn with_verify_after_patch(mut self, enable: bool) -> Self {
        self.verify_after_patch = enable;
        self
    }

    /// Toggle whether protected fields are refused outright rather than
    /// just flagged.
    pub fn with_refuse_protected_fields(mut self, enable: bool) -> Self {
        self.refuse_protected_fields = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_verifies_after_patch() {
        let config = EditorConfig::new();
        assert!(config.verify_after_patch);
    }

    #[test]
    fn test_width_slack_clamped_to_valid_range() {
        let config = EditorConfig::new().with_width_slack(5.0);
        assert_eq!(config.width_slack, crate::resume::budget::MAX_SLACK);
    }
}
