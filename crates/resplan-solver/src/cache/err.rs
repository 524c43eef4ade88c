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

use resplan_core::prelude::Fingerprint;
use resplan_model::prelude::ArtifactKind;

/// A failed artifact computation, shared by every caller that waited on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheComputationError {
    fingerprint: Fingerprint,
    label: String,
    message: String,
}

impl CacheComputationError {
    #[inline]
    pub fn new(fingerprint: Fingerprint, label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fingerprint,
            label: label.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CacheComputationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computing {} ({}) failed: {}",
            self.label,
            self.fingerprint.short(),
            self.message
        )
    }
}

impl std::error::Error for CacheComputationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache was closed; no further requests are served.
    Closed,
    Computation(CacheComputationError),
    /// An entry under this fingerprint holds a different artifact kind.
    KindMismatch {
        fingerprint: Fingerprint,
        expected: ArtifactKind,
        found: ArtifactKind,
    },
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Closed => write!(f, "The preprocessing cache is closed"),
            CacheError::Computation(e) => write!(f, "{}", e),
            CacheError::KindMismatch {
                fingerprint,
                expected,
                found,
            } => write!(
                f,
                "Entry {} holds a {} where a {} was expected",
                fingerprint.short(),
                found,
                expected
            ),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Computation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CacheComputationError> for CacheError {
    #[inline]
    fn from(err: CacheComputationError) -> Self {
        CacheError::Computation(err)
    }
}
