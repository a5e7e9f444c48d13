//! Segment URL templating.

use crate::config::ConfigError;

/// Placeholder substituted with the segment index.
pub const SEGMENT_PLACEHOLDER: &str = "segment";

/// Replaces the first `segment` placeholder in `pattern` with `index`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingPlaceholder`] if the placeholder is absent.
///
/// # Examples
///
/// ```
/// use segfetch_core::fetch::render;
///
/// assert_eq!(render("http://h/segment.ts", 5).unwrap(), "http://h/5.ts");
/// assert_eq!(render("http://h/segment.ts", 12).unwrap(), "http://h/12.ts");
/// ```
pub fn render(pattern: &str, index: u32) -> Result<String, ConfigError> {
    UrlTemplate::new(pattern).map(|template| template.render(index))
}

fn missing_placeholder(pattern: &str) -> ConfigError {
    ConfigError::MissingPlaceholder {
        pattern: pattern.to_string(),
        placeholder: SEGMENT_PLACEHOLDER,
    }
}

/// A validated URL pattern.
///
/// The stored pattern is never modified; every [`render`](Self::render)
/// starts from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    pattern: String,
    placeholder_at: usize,
}

impl UrlTemplate {
    /// Validates that `pattern` contains the placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPlaceholder`] if it does not.
    pub fn new(pattern: impl Into<String>) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        let placeholder_at = pattern
            .find(SEGMENT_PLACEHOLDER)
            .ok_or_else(|| missing_placeholder(&pattern))?;
        Ok(Self {
            pattern,
            placeholder_at,
        })
    }

    /// The original pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Renders the URL for segment `index`.
    #[must_use]
    pub fn render(&self, index: u32) -> String {
        let end = self.placeholder_at + SEGMENT_PLACEHOLDER.len();
        format!(
            "{}{index}{}",
            &self.pattern[..self.placeholder_at],
            &self.pattern[end..]
        )
    }
}
