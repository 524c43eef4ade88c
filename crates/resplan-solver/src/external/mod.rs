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
pub mod process;

use crate::{external::err::SolverAttemptError, monitor::stop::StopToken};
use resplan_model::prelude::{SolverBundle, UnitId};
use serde::{Deserialize, Serialize};

/// One isolated attempt at solving a replicate slot.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    /// Submission slot index.
    pub replicate: usize,
    /// Zero based retry counter for this slot.
    pub attempt: u32,
    pub seed: u64,
    pub bundle: &'a SolverBundle,
}

/// The selection produced by a successful attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverReply {
    pub selected: Vec<UnitId>,
    #[serde(default)]
    pub log: String,
}

impl SolverReply {
    #[inline]
    pub fn new(selected: Vec<UnitId>) -> Self {
        Self {
            selected,
            log: String::new(),
        }
    }

    #[inline]
    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }
}

/// An opaque, possibly failing, stochastic optimizer.
///
/// Implementations must not share mutable state between attempts and
/// should return [`SolverAttemptError::Cancelled`] promptly once `stop`
/// is set.
pub trait ExternalSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(
        &self,
        request: &SolveRequest<'_>,
        stop: &StopToken,
    ) -> Result<SolverReply, SolverAttemptError>;
}

impl<S: ExternalSolver + ?Sized> ExternalSolver for Box<S> {
    #[inline]
    fn name(&self) -> &str {
        (**self).name()
    }

    #[inline]
    fn solve(
        &self,
        request: &SolveRequest<'_>,
        stop: &StopToken,
    ) -> Result<SolverReply, SolverAttemptError> {
        (**self).solve(request, stop)
    }
}

impl<S: ExternalSolver + ?Sized> ExternalSolver for std::sync::Arc<S> {
    #[inline]
    fn name(&self) -> &str {
        (**self).name()
    }

    #[inline]
    fn solve(
        &self,
        request: &SolveRequest<'_>,
        stop: &StopToken,
    ) -> Result<SolverReply, SolverAttemptError> {
        (**self).solve(request, stop)
    }
}
