// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

/// Source of uniform randomness in `[0, 1)` used for jitter.
///
/// Not cryptographically secure. Tests swap in a deterministic generator.
#[derive(Clone, Default)]
pub(crate) enum Rnd {
    #[default]
    Real,

    #[cfg(test)]
    Fixed(std::sync::Arc<dyn Fn() -> f64 + Send + Sync>),
}

impl Debug for Rnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => f.write_str("Real"),
            #[cfg(test)]
            Self::Fixed(_) => f.write_str("Fixed"),
        }
    }
}

impl Rnd {
    #[cfg(test)]
    pub(crate) fn new_fixed(value: f64) -> Self {
        Self::Fixed(std::sync::Arc::new(move || value))
    }

    pub(crate) fn next_f64(&self) -> f64 {
        match self {
            Self::Real => fastrand::f64(),
            #[cfg(test)]
            Self::Fixed(generator) => generator(),
        }
    }
}
