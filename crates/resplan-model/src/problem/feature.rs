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

use crate::{
    common::{Identifier, IdentifierMarkerName},
    problem::err::ValidationError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureIdentifierMarker;

impl IdentifierMarkerName for FeatureIdentifierMarker {
    const NAME: &'static str = "FeatureId";
}

pub type FeatureId = Identifier<u32, FeatureIdentifierMarker>;

/// Representation target of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    /// An absolute amount of the feature.
    Absolute(f64),
    /// A fraction in `[0, 1]` of the feature's total amount.
    Proportion(f64),
}

impl Target {
    #[inline]
    pub fn is_valid(&self) -> bool {
        match *self {
            Target::Absolute(a) => a.is_finite() && a >= 0.0,
            Target::Proportion(p) => p.is_finite() && (0.0..=1.0).contains(&p),
        }
    }

    /// Resolves the target against the feature's total amount.
    #[inline]
    pub fn resolve(&self, total: f64) -> f64 {
        match *self {
            Target::Absolute(a) => a,
            Target::Proportion(p) => p * total,
        }
    }

    #[inline]
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            Target::Absolute(_) => "absolute",
            Target::Proportion(_) => "proportion",
        }
    }

    #[inline]
    pub(crate) fn raw(&self) -> f64 {
        match *self {
            Target::Absolute(v) | Target::Proportion(v) => v,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Absolute(a) => write!(f, "{}", a),
            Target::Proportion(p) => write!(f, "{}%", p * 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: FeatureId,
    name: String,
    target: Target,
    spf: f64,
}

impl Feature {
    pub fn new(
        id: FeatureId,
        name: impl Into<String>,
        target: Target,
        spf: f64,
    ) -> Result<Self, ValidationError> {
        validate_target(id, target)?;
        validate_spf(id, spf)?;
        Ok(Self {
            id,
            name: name.into(),
            target,
            spf,
        })
    }

    #[inline]
    pub fn id(&self) -> FeatureId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn target(&self) -> Target {
        self.target
    }

    #[inline]
    pub fn spf(&self) -> f64 {
        self.spf
    }

    #[inline]
    pub(crate) fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    #[inline]
    pub(crate) fn with_spf(mut self, spf: f64) -> Self {
        self.spf = spf;
        self
    }
}

#[inline]
pub(crate) fn validate_target(id: FeatureId, target: Target) -> Result<(), ValidationError> {
    if !target.is_valid() {
        return Err(ValidationError::InvalidTarget {
            feature: id,
            target,
        });
    }
    Ok(())
}

#[inline]
pub(crate) fn validate_spf(id: FeatureId, spf: f64) -> Result<(), ValidationError> {
    if !spf.is_finite() || spf < 0.0 {
        return Err(ValidationError::InvalidSpf { feature: id, spf });
    }
    Ok(())
}

/// A feature row as delivered by the spatial adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: u32,
    pub name: String,
    pub target: Target,
    #[serde(default = "FeatureRecord::default_spf")]
    pub spf: f64,
}

impl FeatureRecord {
    fn default_spf() -> f64 {
        1.0
    }

    #[inline]
    pub fn new(id: u32, name: impl Into<String>, target: Target, spf: f64) -> Self {
        Self {
            id,
            name: name.into(),
            target,
            spf,
        }
    }

    #[inline]
    pub fn into_feature(self) -> Result<Feature, ValidationError> {
        Feature::new(FeatureId::new(self.id), self.name, self.target, self.spf)
    }
}
