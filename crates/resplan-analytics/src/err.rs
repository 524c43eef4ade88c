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

/// Input for which an analysis is mathematically undefined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegenerateInputError {
    analysis: &'static str,
    reason: String,
}

impl DegenerateInputError {
    #[inline]
    pub fn new(analysis: &'static str, reason: impl Into<String>) -> Self {
        Self {
            analysis,
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn analysis(&self) -> &'static str {
        self.analysis
    }

    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::fmt::Display for DegenerateInputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Degenerate input for {}: {}", self.analysis, self.reason)
    }
}

impl std::error::Error for DegenerateInputError {}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    Degenerate(DegenerateInputError),
    /// Rows of the input have different lengths.
    RaggedInput { row: usize, expected: usize, found: usize },
    /// A distance matrix entry is negative, non-finite or asymmetric.
    InvalidDistance { row: usize, col: usize, value: f64 },
}

impl std::fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyticsError::Degenerate(e) => write!(f, "{}", e),
            AnalyticsError::RaggedInput {
                row,
                expected,
                found,
            } => write!(
                f,
                "Row {} has {} columns, expected {}",
                row, found, expected
            ),
            AnalyticsError::InvalidDistance { row, col, value } => {
                write!(f, "Invalid distance {} at ({}, {})", value, row, col)
            }
        }
    }
}

impl std::error::Error for AnalyticsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalyticsError::Degenerate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DegenerateInputError> for AnalyticsError {
    #[inline]
    fn from(err: DegenerateInputError) -> Self {
        AnalyticsError::Degenerate(err)
    }
}
