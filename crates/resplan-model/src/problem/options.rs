// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::problem::err::ValidationError;
use serde::{Deserialize, Serialize};

/// Global options carried by a problem definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemOptions {
    /// Boundary length modifier; scales the boundary term of the score.
    pub blm: f64,
    /// Number of replicate solver runs per portfolio.
    pub replicates: usize,
    /// Maximum number of solver attempts running at once.
    pub concurrency: usize,
    /// Iteration budget handed to the external solver.
    pub iterations: u64,
    /// Base seed from which per-replicate seeds are drawn.
    pub seed: u64,
}

impl Default for ProblemOptions {
    #[inline]
    fn default() -> Self {
        Self {
            blm: 0.0,
            replicates: 100,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            iterations: 1_000_000,
            seed: 42,
        }
    }
}

impl ProblemOptions {
    #[inline]
    pub fn with_blm(mut self, blm: f64) -> Self {
        self.blm = blm;
        self
    }

    #[inline]
    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    #[inline]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[inline]
    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    #[inline]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_blm(self.blm)?;
        if self.replicates == 0 {
            return Err(ValidationError::ZeroReplicates);
        }
        if self.concurrency == 0 {
            return Err(ValidationError::ZeroConcurrency);
        }
        Ok(())
    }
}

#[inline]
pub(crate) fn validate_blm(blm: f64) -> Result<(), ValidationError> {
    if !blm.is_finite() || blm < 0.0 {
        return Err(ValidationError::InvalidBlm(blm));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ProblemOptions::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let o = ProblemOptions::default();
        assert_eq!(
            o.with_blm(-1.0).validate(),
            Err(ValidationError::InvalidBlm(-1.0))
        );
        assert_eq!(
            o.with_replicates(0).validate(),
            Err(ValidationError::ZeroReplicates)
        );
        assert_eq!(
            o.with_concurrency(0).validate(),
            Err(ValidationError::ZeroConcurrency)
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let o: ProblemOptions = serde_json::from_str(r#"{"blm": 2.5}"#).unwrap();
        assert_eq!(o.blm, 2.5);
        assert_eq!(o.replicates, 100);
        assert_eq!(o.seed, 42);
    }
}
