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
    feature::FeatureId,
    kind::{ArtifactKind, FingerprintTable, ProblemParts},
    options::ProblemOptions,
    tables::{AmountTable, BoundaryTable, FeatureTable, UnitTable},
    unit::UnitId,
};
use resplan_core::prelude::Fingerprint;
use std::sync::Arc;

/// An immutable, canonicalized problem snapshot.
///
/// Created once by assembly and afterwards only by derivation. Components sit
/// behind `Arc`s so a derived definition shares every table its overlay did
/// not touch.
#[derive(Debug, Clone)]
pub struct ProblemDefinition {
    units: Arc<UnitTable>,
    features: Arc<FeatureTable>,
    amounts: Arc<AmountTable>,
    boundary: Arc<BoundaryTable>,
    options: ProblemOptions,
    fingerprints: FingerprintTable,
    lineage: Vec<String>,
}

impl ProblemDefinition {
    pub(crate) fn from_tables(
        units: Arc<UnitTable>,
        features: Arc<FeatureTable>,
        amounts: Arc<AmountTable>,
        boundary: Arc<BoundaryTable>,
        options: ProblemOptions,
    ) -> Self {
        let fingerprints = ProblemParts {
            units: &units,
            features: &features,
            amounts: &amounts,
            boundary: &boundary,
            options: &options,
        }
        .fingerprint_all();

        Self {
            units,
            features,
            amounts,
            boundary,
            options,
            fingerprints,
            lineage: Vec::new(),
        }
    }

    pub(crate) fn from_derived(
        units: Arc<UnitTable>,
        features: Arc<FeatureTable>,
        amounts: Arc<AmountTable>,
        boundary: Arc<BoundaryTable>,
        options: ProblemOptions,
        fingerprints: FingerprintTable,
        lineage: Vec<String>,
    ) -> Self {
        Self {
            units,
            features,
            amounts,
            boundary,
            options,
            fingerprints,
            lineage,
        }
    }

    #[inline]
    pub fn units(&self) -> &UnitTable {
        &self.units
    }

    #[inline]
    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    #[inline]
    pub fn amounts(&self) -> &AmountTable {
        &self.amounts
    }

    #[inline]
    pub fn boundary(&self) -> &BoundaryTable {
        &self.boundary
    }

    #[inline]
    pub fn options(&self) -> &ProblemOptions {
        &self.options
    }

    #[inline]
    pub fn fingerprints(&self) -> &FingerprintTable {
        &self.fingerprints
    }

    #[inline]
    pub fn fingerprint(&self, kind: ArtifactKind) -> Fingerprint {
        self.fingerprints.get(kind)
    }

    /// Names of the overlays applied since assembly, oldest first.
    #[inline]
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    #[inline]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.ids().collect()
    }

    #[inline]
    pub fn feature_ids(&self) -> Vec<FeatureId> {
        self.features.ids().collect()
    }

    #[inline]
    pub(crate) fn units_arc(&self) -> &Arc<UnitTable> {
        &self.units
    }

    #[inline]
    pub(crate) fn features_arc(&self) -> &Arc<FeatureTable> {
        &self.features
    }

    #[inline]
    pub(crate) fn amounts_arc(&self) -> &Arc<AmountTable> {
        &self.amounts
    }

    #[inline]
    pub(crate) fn boundary_arc(&self) -> &Arc<BoundaryTable> {
        &self.boundary
    }
}
