// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// One execution of the inner service within a retry sequence.
///
/// The index is 0-based: the original call is attempt `0`, the first retry is attempt `1`.
/// `is_last` tells whether the retry budget allows another attempt after this one.
///
/// # Examples
///
/// ```
/// use airbag::Attempt;
///
/// let attempt = Attempt::new(0, false);
/// assert!(attempt.is_first());
/// assert!(!attempt.is_last());
///
/// let single_shot = Attempt::default();
/// assert!(single_shot.is_first());
/// assert!(single_shot.is_last());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attempt {
    index: u32,
    is_last: bool,
}

impl Default for Attempt {
    fn default() -> Self {
        Self::new(0, true)
    }
}

impl Attempt {
    /// Creates an attempt with the given index.
    #[must_use]
    pub fn new(index: u32, is_last: bool) -> Self {
        Self { index, is_last }
    }

    /// Returns `true` for the original call.
    #[must_use]
    pub fn is_first(self) -> bool {
        self.index == 0
    }

    /// Returns `true` when no further attempt is allowed.
    #[must_use]
    pub fn is_last(self) -> bool {
        self.is_last
    }

    /// The 0-based attempt index.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }

    pub(crate) fn first(max_attempts: MaxAttempts) -> Self {
        match max_attempts {
            MaxAttempts::Finite(total) => Self::new(0, total <= 1),
            MaxAttempts::Infinite => Self::new(0, false),
        }
    }

    /// Moves to the next attempt, or returns `None` once the budget is spent.
    #[cfg_attr(test, mutants::skip)] // causes test timeouts
    pub(crate) fn increment(self, max_attempts: MaxAttempts) -> Option<Self> {
        let next = self.index.saturating_add(1);

        match max_attempts {
            MaxAttempts::Finite(total) => {
                if next >= total {
                    return None;
                }

                Some(Self::new(next, next == total.saturating_sub(1)))
            }
            MaxAttempts::Infinite => Some(Self::new(next, false)),
        }
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.index.fmt(f)
    }
}

/// Total number of executions allowed, the original call included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MaxAttempts {
    Finite(u32),
    Infinite,
}

impl MaxAttempts {
    pub(crate) fn from_retries(max_retries: u32) -> Self {
        Self::Finite(max_retries.saturating_add(1))
    }
}
