//! Response classification against the redirect policy.

use std::fmt;

/// How a response status is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// 2xx.
    Success,
    /// 3xx while redirects count as success.
    RedirectSuccess,
    /// 3xx while redirects count as failure.
    RedirectFailure,
    /// Anything else.
    Failure,
}

impl Outcome {
    /// Classifies `status` under the given redirect policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use segfetch_core::fetch::Outcome;
    ///
    /// assert_eq!(Outcome::classify(204, false), Outcome::Success);
    /// assert_eq!(Outcome::classify(302, true), Outcome::RedirectSuccess);
    /// assert_eq!(Outcome::classify(302, false), Outcome::RedirectFailure);
    /// assert_eq!(Outcome::classify(404, true), Outcome::Failure);
    /// ```
    #[must_use]
    pub fn classify(status: u16, redirect_is_success: bool) -> Self {
        match status {
            200..=299 => Self::Success,
            300..=399 if redirect_is_success => Self::RedirectSuccess,
            300..=399 => Self::RedirectFailure,
            _ => Self::Failure,
        }
    }

    /// True for outcomes that end the run.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::RedirectFailure | Self::Failure)
    }

    /// True for redirect outcomes.
    #[must_use]
    pub fn is_redirect(self) -> bool {
        matches!(self, Self::RedirectSuccess | Self::RedirectFailure)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::RedirectSuccess => "redirect success",
            Self::RedirectFailure => "redirect failure",
            Self::Failure => "failure",
        };
        f.write_str(label)
    }
}
