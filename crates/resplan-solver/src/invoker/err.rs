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

use crate::cache::err::CacheError;
use resplan_model::prelude::ValidationError;

/// Too many replicate slots failed for the run to be useful.
#[derive(Debug, Clone, PartialEq)]
pub struct InsufficientSolutionsError {
    failed: usize,
    requested: usize,
    threshold: f64,
}

impl InsufficientSolutionsError {
    #[inline]
    pub fn new(failed: usize, requested: usize, threshold: f64) -> Self {
        Self {
            failed,
            requested,
            threshold,
        }
    }

    #[inline]
    pub fn failed(&self) -> usize {
        self.failed
    }

    #[inline]
    pub fn requested(&self) -> usize {
        self.requested
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl std::fmt::Display for InsufficientSolutionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} replicates failed, exceeding the allowed fraction {}",
            self.failed, self.requested, self.threshold
        )
    }
}

impl std::error::Error for InsufficientSolutionsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError {
    completed: usize,
    requested: usize,
}

impl CancelledError {
    #[inline]
    pub fn new(completed: usize, requested: usize) -> Self {
        Self {
            completed,
            requested,
        }
    }

    #[inline]
    pub fn completed(&self) -> usize {
        self.completed
    }

    #[inline]
    pub fn requested(&self) -> usize {
        self.requested
    }
}

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Run was cancelled after {} of {} replicates completed",
            self.completed, self.requested
        )
    }
}

impl std::error::Error for CancelledError {}

#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    Validation(ValidationError),
    Cache(CacheError),
    InsufficientSolutions(InsufficientSolutionsError),
    Cancelled(CancelledError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Validation(e) => write!(f, "Invalid run request: {}", e),
            RunError::Cache(e) => write!(f, "Preprocessing failed: {}", e),
            RunError::InsufficientSolutions(e) => write!(f, "{}", e),
            RunError::Cancelled(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Validation(e) => Some(e),
            RunError::Cache(e) => Some(e),
            RunError::InsufficientSolutions(e) => Some(e),
            RunError::Cancelled(e) => Some(e),
        }
    }
}

impl From<ValidationError> for RunError {
    #[inline]
    fn from(err: ValidationError) -> Self {
        RunError::Validation(err)
    }
}

impl From<CacheError> for RunError {
    #[inline]
    fn from(err: CacheError) -> Self {
        RunError::Cache(err)
    }
}

impl From<InsufficientSolutionsError> for RunError {
    #[inline]
    fn from(err: InsufficientSolutionsError) -> Self {
        RunError::InsufficientSolutions(err)
    }
}

impl From<CancelledError> for RunError {
    #[inline]
    fn from(err: CancelledError) -> Self {
        RunError::Cancelled(err)
    }
}
