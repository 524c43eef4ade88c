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

use std::time::Duration;

/// Failure of a single solver attempt. Retried up to the configured bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverAttemptError {
    Spawn(String),
    NonZeroExit { code: Option<i32>, stderr: String },
    MalformedOutput(String),
    Timeout(Duration),
    Cancelled,
    Io(String),
    Failed(String),
}

impl SolverAttemptError {
    /// Whether another attempt could succeed.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SolverAttemptError::Cancelled)
    }
}

impl std::fmt::Display for SolverAttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverAttemptError::Spawn(e) => write!(f, "Failed to start solver: {}", e),
            SolverAttemptError::NonZeroExit { code, stderr } => match code {
                Some(c) => write!(f, "Solver exited with status {}: {}", c, stderr.trim()),
                None => write!(f, "Solver was terminated by a signal: {}", stderr.trim()),
            },
            SolverAttemptError::MalformedOutput(e) => write!(f, "Malformed solver output: {}", e),
            SolverAttemptError::Timeout(d) => write!(f, "Solver timed out after {:?}", d),
            SolverAttemptError::Cancelled => write!(f, "Solver attempt was cancelled"),
            SolverAttemptError::Io(e) => write!(f, "I/O error: {}", e),
            SolverAttemptError::Failed(e) => write!(f, "Solver failed: {}", e),
        }
    }
}

impl std::error::Error for SolverAttemptError {}

impl From<std::io::Error> for SolverAttemptError {
    #[inline]
    fn from(err: std::io::Error) -> Self {
        SolverAttemptError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SolverAttemptError {
    #[inline]
    fn from(err: serde_json::Error) -> Self {
        SolverAttemptError::MalformedOutput(err.to_string())
    }
}
