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

pub mod derive;

use crate::problem::{
    definition::ProblemDefinition,
    err::ValidationError,
    feature::{FeatureId, Target, validate_spf, validate_target},
    kind::{DeltaCategories, DeltaCategory},
    options::validate_blm,
    unit::{UnitId, UnitStatus, validate_cost},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named, sparse set of parameter overrides on a [`ProblemDefinition`].
///
/// Per-id fields merge by key and scalar fields by last write, so
/// `a.merge(&b).merge(&c) == a.merge(&b.merge(&c))`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterOverlay {
    name: String,
    feature_targets: BTreeMap<FeatureId, Target>,
    feature_spf: BTreeMap<FeatureId, f64>,
    unit_costs: BTreeMap<UnitId, f64>,
    unit_status: BTreeMap<UnitId, UnitStatus>,
    blm: Option<f64>,
    replicates: Option<usize>,
}

impl ParameterOverlay {
    #[inline]
    pub fn builder(name: impl Into<String>) -> ParameterOverlayBuilder {
        ParameterOverlayBuilder::new(name)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn feature_targets(&self) -> &BTreeMap<FeatureId, Target> {
        &self.feature_targets
    }

    #[inline]
    pub fn feature_spf(&self) -> &BTreeMap<FeatureId, f64> {
        &self.feature_spf
    }

    #[inline]
    pub fn unit_costs(&self) -> &BTreeMap<UnitId, f64> {
        &self.unit_costs
    }

    #[inline]
    pub fn unit_status(&self) -> &BTreeMap<UnitId, UnitStatus> {
        &self.unit_status
    }

    #[inline]
    pub fn blm(&self) -> Option<f64> {
        self.blm
    }

    #[inline]
    pub fn replicates(&self) -> Option<usize> {
        self.replicates
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.categories().is_empty()
    }

    /// The field groups this overlay touches.
    pub fn categories(&self) -> DeltaCategories {
        let mut c = DeltaCategories::EMPTY;
        if !self.unit_costs.is_empty() {
            c.insert(DeltaCategory::UnitCost);
        }
        if !self.unit_status.is_empty() {
            c.insert(DeltaCategory::UnitStatus);
        }
        if !self.feature_targets.is_empty() {
            c.insert(DeltaCategory::FeatureTarget);
        }
        if !self.feature_spf.is_empty() {
            c.insert(DeltaCategory::FeatureSpf);
        }
        if self.blm.is_some() {
            c.insert(DeltaCategory::Blm);
        }
        if self.replicates.is_some() {
            c.insert(DeltaCategory::ReplicateCount);
        }
        c
    }

    /// Composes `self` followed by `later`; `later` wins on conflicts.
    ///
    /// The composed overlay is named `"<self>+<later>"`.
    pub fn merge(&self, later: &ParameterOverlay) -> ParameterOverlay {
        fn join<K: Ord + Copy, V: Copy>(a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> BTreeMap<K, V> {
            let mut out = a.clone();
            out.extend(b.iter().map(|(k, v)| (*k, *v)));
            out
        }

        let name = match (self.name.is_empty(), later.name.is_empty()) {
            (true, _) => later.name.clone(),
            (_, true) => self.name.clone(),
            _ => format!("{}+{}", self.name, later.name),
        };

        ParameterOverlay {
            name,
            feature_targets: join(&self.feature_targets, &later.feature_targets),
            feature_spf: join(&self.feature_spf, &later.feature_spf),
            unit_costs: join(&self.unit_costs, &later.unit_costs),
            unit_status: join(&self.unit_status, &later.unit_status),
            blm: later.blm.or(self.blm),
            replicates: later.replicates.or(self.replicates),
        }
    }

    /// Checks every override against `base` without applying it.
    pub fn validate_against(&self, base: &ProblemDefinition) -> Result<(), ValidationError> {
        for (&id, &target) in &self.feature_targets {
            if base.features().position(id).is_none() {
                return Err(ValidationError::UnknownFeature(id));
            }
            validate_target(id, target)?;
        }
        for (&id, &spf) in &self.feature_spf {
            if base.features().position(id).is_none() {
                return Err(ValidationError::UnknownFeature(id));
            }
            validate_spf(id, spf)?;
        }
        for (&id, &cost) in &self.unit_costs {
            if base.units().position(id).is_none() {
                return Err(ValidationError::UnknownUnit(id));
            }
            validate_cost(id, cost)?;
        }
        for &id in self.unit_status.keys() {
            if base.units().position(id).is_none() {
                return Err(ValidationError::UnknownUnit(id));
            }
        }
        if let Some(blm) = self.blm {
            validate_blm(blm)?;
        }
        if self.replicates == Some(0) {
            return Err(ValidationError::ZeroReplicates);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterOverlayBuilder {
    overlay: ParameterOverlay,
}

impl ParameterOverlayBuilder {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            overlay: ParameterOverlay {
                name: name.into(),
                ..ParameterOverlay::default()
            },
        }
    }

    #[inline]
    pub fn feature_target(mut self, id: FeatureId, target: Target) -> Self {
        self.overlay.feature_targets.insert(id, target);
        self
    }

    #[inline]
    pub fn feature_spf(mut self, id: FeatureId, spf: f64) -> Self {
        self.overlay.feature_spf.insert(id, spf);
        self
    }

    #[inline]
    pub fn unit_cost(mut self, id: UnitId, cost: f64) -> Self {
        self.overlay.unit_costs.insert(id, cost);
        self
    }

    #[inline]
    pub fn unit_status(mut self, id: UnitId, status: UnitStatus) -> Self {
        self.overlay.unit_status.insert(id, status);
        self
    }

    #[inline]
    pub fn blm(mut self, blm: f64) -> Self {
        self.overlay.blm = Some(blm);
        self
    }

    #[inline]
    pub fn replicates(mut self, replicates: usize) -> Self {
        self.overlay.replicates = Some(replicates);
        self
    }

    #[inline]
    pub fn build(self) -> ParameterOverlay {
        self.overlay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(n: u32) -> FeatureId {
        FeatureId::new(n)
    }

    fn uid(n: u32) -> UnitId {
        UnitId::new(n)
    }

    #[test]
    fn categories_follow_touched_fields() {
        let o = ParameterOverlay::builder("o")
            .unit_cost(uid(1), 2.0)
            .blm(1.0)
            .build();
        let c = o.categories();
        assert!(c.contains(DeltaCategory::UnitCost));
        assert!(c.contains(DeltaCategory::Blm));
        assert!(!c.contains(DeltaCategory::FeatureTarget));
        assert!(ParameterOverlay::builder("empty").build().is_empty());
    }

    #[test]
    fn merge_is_last_write_wins() {
        let a = ParameterOverlay::builder("a")
            .unit_cost(uid(1), 1.0)
            .unit_cost(uid(2), 2.0)
            .blm(0.5)
            .build();
        let b = ParameterOverlay::builder("b")
            .unit_cost(uid(2), 9.0)
            .replicates(4)
            .build();
        let m = a.merge(&b);
        assert_eq!(m.name(), "a+b");
        assert_eq!(m.unit_costs()[&uid(1)], 1.0);
        assert_eq!(m.unit_costs()[&uid(2)], 9.0);
        assert_eq!(m.blm(), Some(0.5));
        assert_eq!(m.replicates(), Some(4));
    }

    #[test]
    fn merge_is_associative() {
        let a = ParameterOverlay::builder("a")
            .feature_target(fid(1), Target::Absolute(1.0))
            .blm(1.0)
            .build();
        let b = ParameterOverlay::builder("b")
            .feature_target(fid(1), Target::Proportion(0.2))
            .feature_spf(fid(2), 3.0)
            .build();
        let c = ParameterOverlay::builder("c")
            .feature_spf(fid(2), 4.0)
            .unit_status(uid(3), UnitStatus::LockedOut)
            .blm(2.0)
            .build();
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn builder_keeps_last_value_per_key() {
        let o = ParameterOverlay::builder("o")
            .feature_spf(fid(5), 1.0)
            .feature_spf(fid(5), 2.0)
            .build();
        assert_eq!(o.feature_spf().len(), 1);
        assert_eq!(o.feature_spf()[&fid(5)], 2.0);
    }
}
