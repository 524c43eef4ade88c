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

use crate::problem::{
    feature::{FeatureId, Target},
    unit::UnitId,
};

/// Malformed assembly or overlay input. Never retried.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NoUnits,
    DuplicateUnit(UnitId),
    DuplicateFeature(FeatureId),
    UnknownUnit(UnitId),
    UnknownFeature(FeatureId),
    InvalidCost {
        unit: UnitId,
        cost: f64,
    },
    UnknownStatus {
        unit: UnitId,
        code: u8,
    },
    InvalidTarget {
        feature: FeatureId,
        target: Target,
    },
    InvalidSpf {
        feature: FeatureId,
        spf: f64,
    },
    IncidenceRowCount {
        expected: usize,
        found: usize,
    },
    IncidenceRowWidth {
        unit: UnitId,
        expected: usize,
        found: usize,
    },
    InvalidAmount {
        unit: UnitId,
        feature: FeatureId,
        amount: f64,
    },
    InvalidBoundary {
        a: UnitId,
        b: UnitId,
        length: f64,
    },
    InvalidBlm(f64),
    ZeroReplicates,
    ZeroConcurrency,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::NoUnits => write!(f, "The problem has no planning units"),
            ValidationError::DuplicateUnit(id) => write!(f, "Duplicate planning unit {}", id),
            ValidationError::DuplicateFeature(id) => write!(f, "Duplicate feature {}", id),
            ValidationError::UnknownUnit(id) => write!(f, "Unknown planning unit {}", id),
            ValidationError::UnknownFeature(id) => write!(f, "Unknown feature {}", id),
            ValidationError::InvalidCost { unit, cost } => {
                write!(f, "Planning unit {} has invalid cost {}", unit, cost)
            }
            ValidationError::UnknownStatus { unit, code } => {
                write!(f, "Planning unit {} has unknown status code {}", unit, code)
            }
            ValidationError::InvalidTarget { feature, target } => {
                write!(f, "Feature {} has out-of-range target {:?}", feature, target)
            }
            ValidationError::InvalidSpf { feature, spf } => {
                write!(f, "Feature {} has invalid penalty factor {}", feature, spf)
            }
            ValidationError::IncidenceRowCount { expected, found } => write!(
                f,
                "Incidence table has {} rows but there are {} planning units",
                found, expected
            ),
            ValidationError::IncidenceRowWidth {
                unit,
                expected,
                found,
            } => write!(
                f,
                "Incidence row for {} has {} columns but there are {} features",
                unit, found, expected
            ),
            ValidationError::InvalidAmount {
                unit,
                feature,
                amount,
            } => write!(
                f,
                "Invalid amount {} of {} in planning unit {}",
                amount, feature, unit
            ),
            ValidationError::InvalidBoundary { a, b, length } => {
                write!(f, "Invalid boundary length {} between {} and {}", length, a, b)
            }
            ValidationError::InvalidBlm(blm) => {
                write!(f, "Invalid boundary length modifier {}", blm)
            }
            ValidationError::ZeroReplicates => write!(f, "Replicate count must be at least 1"),
            ValidationError::ZeroConcurrency => write!(f, "Concurrency must be at least 1"),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub enum ProblemLoaderError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Validation(ValidationError),
}

impl std::fmt::Display for ProblemLoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemLoaderError::Io(e) => write!(f, "I/O error: {}", e),
            ProblemLoaderError::Parse(e) => write!(f, "Parse error: {}", e),
            ProblemLoaderError::Validation(e) => write!(f, "Validation error: {}", e),
        }
    }
}

impl std::error::Error for ProblemLoaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProblemLoaderError::Io(e) => Some(e),
            ProblemLoaderError::Parse(e) => Some(e),
            ProblemLoaderError::Validation(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ProblemLoaderError {
    fn from(err: std::io::Error) -> Self {
        ProblemLoaderError::Io(err)
    }
}

impl From<serde_json::Error> for ProblemLoaderError {
    fn from(err: serde_json::Error) -> Self {
        ProblemLoaderError::Parse(err)
    }
}

impl From<ValidationError> for ProblemLoaderError {
    fn from(err: ValidationError) -> Self {
        ProblemLoaderError::Validation(err)
    }
}
