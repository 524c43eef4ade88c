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

pub mod err;
pub mod portfolio;
pub mod score;
pub mod selection;

use crate::solution::{score::SolutionMetrics, selection::Selection};
use serde::{Deserialize, Serialize};

/// One replicate's selection with its memoized metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    replicate: usize,
    selection: Selection,
    metrics: SolutionMetrics,
}

impl Solution {
    #[inline]
    pub fn new(replicate: usize, selection: Selection, metrics: SolutionMetrics) -> Self {
        Self {
            replicate,
            selection,
            metrics,
        }
    }

    /// The submission slot this solution came from.
    #[inline]
    pub fn replicate(&self) -> usize {
        self.replicate
    }

    #[inline]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[inline]
    pub fn metrics(&self) -> &SolutionMetrics {
        &self.metrics
    }

    #[inline]
    pub fn cost(&self) -> f64 {
        self.metrics.cost
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.metrics.score
    }

    #[inline]
    pub fn shortfall(&self) -> &[f64] {
        &self.metrics.shortfall
    }
}

/// A replicate slot that produced no solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSlot {
    pub replicate: usize,
    pub attempts: u32,
    pub reason: String,
}

impl std::fmt::Display for FailedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Replicate {} failed after {} attempt(s): {}",
            self.replicate, self.attempts, self.reason
        )
    }
}
