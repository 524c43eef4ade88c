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
    options::ProblemOptions,
    tables::{AmountTable, BoundaryTable, FeatureTable, UnitTable},
};
use resplan_core::prelude::{CanonicalEncoder, Fingerprint, normalize_f64};
use serde::{Deserialize, Serialize};

/// The kinds of derived artifacts held in the preprocessing cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    BoundaryMatrix,
    IncidenceMatrix,
    CostVector,
    TargetTable,
    SolverBundle,
}

impl ArtifactKind {
    pub const COUNT: usize = 5;

    /// All kinds, upstream artifacts first.
    pub const ALL: [ArtifactKind; Self::COUNT] = [
        ArtifactKind::BoundaryMatrix,
        ArtifactKind::IncidenceMatrix,
        ArtifactKind::CostVector,
        ArtifactKind::TargetTable,
        ArtifactKind::SolverBundle,
    ];

    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            ArtifactKind::BoundaryMatrix => "boundary-matrix",
            ArtifactKind::IncidenceMatrix => "incidence-matrix",
            ArtifactKind::CostVector => "cost-vector",
            ArtifactKind::TargetTable => "target-table",
            ArtifactKind::SolverBundle => "solver-bundle",
        }
    }

    #[inline]
    const fn slot(&self) -> usize {
        *self as usize
    }

    /// Overlay categories that can change this artifact's fingerprint.
    ///
    /// The boundary matrix holds raw lengths; BLM only scales them when a
    /// score is evaluated, so it is not a dependency. Incidence depends on
    /// unit and feature identity and amounts, none of which an overlay
    /// can touch.
    #[inline]
    pub const fn dependencies(&self) -> DeltaCategories {
        match self {
            ArtifactKind::BoundaryMatrix => DeltaCategories::EMPTY,
            ArtifactKind::IncidenceMatrix => DeltaCategories::EMPTY,
            ArtifactKind::CostVector => DeltaCategories::EMPTY
                .with(DeltaCategory::UnitCost)
                .with(DeltaCategory::UnitStatus),
            ArtifactKind::TargetTable => DeltaCategories::EMPTY
                .with(DeltaCategory::FeatureTarget)
                .with(DeltaCategory::FeatureSpf),
            ArtifactKind::SolverBundle => DeltaCategories::EMPTY
                .with(DeltaCategory::UnitCost)
                .with(DeltaCategory::UnitStatus)
                .with(DeltaCategory::FeatureTarget)
                .with(DeltaCategory::FeatureSpf)
                .with(DeltaCategory::Blm),
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A field group a parameter overlay can override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeltaCategory {
    UnitCost,
    UnitStatus,
    FeatureTarget,
    FeatureSpf,
    Blm,
    ReplicateCount,
}

impl DeltaCategory {
    pub const ALL: [DeltaCategory; 6] = [
        DeltaCategory::UnitCost,
        DeltaCategory::UnitStatus,
        DeltaCategory::FeatureTarget,
        DeltaCategory::FeatureSpf,
        DeltaCategory::Blm,
        DeltaCategory::ReplicateCount,
    ];

    #[inline]
    const fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// A small set of [`DeltaCategory`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeltaCategories(u8);

impl DeltaCategories {
    pub const EMPTY: DeltaCategories = DeltaCategories(0);

    #[inline]
    pub const fn with(self, category: DeltaCategory) -> Self {
        Self(self.0 | category.bit())
    }

    #[inline]
    pub fn insert(&mut self, category: DeltaCategory) {
        self.0 |= category.bit();
    }

    #[inline]
    pub const fn contains(&self, category: DeltaCategory) -> bool {
        self.0 & category.bit() != 0
    }

    #[inline]
    pub const fn intersects(&self, other: DeltaCategories) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = DeltaCategory> + '_ {
        DeltaCategory::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl FromIterator<DeltaCategory> for DeltaCategories {
    fn from_iter<T: IntoIterator<Item = DeltaCategory>>(iter: T) -> Self {
        let mut set = DeltaCategories::EMPTY;
        for c in iter {
            set.insert(c);
        }
        set
    }
}

/// Content fingerprint per artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerprintTable([Fingerprint; ArtifactKind::COUNT]);

impl FingerprintTable {
    #[inline]
    pub fn get(&self, kind: ArtifactKind) -> Fingerprint {
        self.0[kind.slot()]
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, Fingerprint)> + '_ {
        ArtifactKind::ALL.into_iter().map(|k| (k, self.get(k)))
    }

    #[inline]
    pub fn values(&self) -> impl Iterator<Item = Fingerprint> + '_ {
        self.0.iter().copied()
    }
}

/// Borrowed view over the canonical content of a problem.
pub(crate) struct ProblemParts<'a> {
    pub units: &'a UnitTable,
    pub features: &'a FeatureTable,
    pub amounts: &'a AmountTable,
    pub boundary: &'a BoundaryTable,
    pub options: &'a ProblemOptions,
}

impl<'a> ProblemParts<'a> {
    /// Fingerprints every artifact kind from scratch.
    pub fn fingerprint_all(&self) -> FingerprintTable {
        self.refingerprint(None, DeltaCategories::EMPTY)
    }

    /// Recomputes only the fingerprints whose dependencies intersect
    /// `touched`; all others are copied from `base`.
    pub fn refingerprint(
        &self,
        base: Option<&FingerprintTable>,
        touched: DeltaCategories,
    ) -> FingerprintTable {
        let mut out = [Fingerprint::from_bytes([0; 32]); ArtifactKind::COUNT];
        for kind in ArtifactKind::ALL {
            let fp = match base {
                Some(b) if !kind.dependencies().intersects(touched) => b.get(kind),
                _ => self.fingerprint(kind, &out),
            };
            out[kind.slot()] = fp;
        }
        FingerprintTable(out)
    }

    fn fingerprint(&self, kind: ArtifactKind, upstream: &[Fingerprint]) -> Fingerprint {
        let mut enc = CanonicalEncoder::new(kind.name());
        match kind {
            ArtifactKind::BoundaryMatrix => {
                self.encode_unit_ids(&mut enc);
                enc.seq(self.boundary.len());
                for e in self.boundary.iter() {
                    enc.u64(e.a as u64).u64(e.b as u64).f64(e.length);
                }
            }
            ArtifactKind::IncidenceMatrix => {
                self.encode_unit_ids(&mut enc);
                enc.seq(self.features.len());
                for id in self.features.ids() {
                    enc.u32(id.get());
                }
                for u in 0..self.amounts.units() {
                    for (f, &amount) in self.amounts.row(u).iter().enumerate() {
                        if normalize_f64(amount) != 0 {
                            enc.u64(u as u64).u64(f as u64).f64(amount);
                        }
                    }
                }
            }
            ArtifactKind::CostVector => {
                enc.seq(self.units.len());
                for unit in self.units.iter() {
                    enc.u32(unit.id().get())
                        .f64(unit.cost())
                        .u64(unit.status().code() as u64);
                }
            }
            ArtifactKind::TargetTable => {
                enc.fingerprint(&upstream[ArtifactKind::IncidenceMatrix.slot()]);
                enc.seq(self.features.len());
                for feature in self.features.iter() {
                    let target = feature.target();
                    enc.u32(feature.id().get())
                        .str(feature.name())
                        .str(target.tag())
                        .f64(target.raw())
                        .f64(feature.spf());
                }
            }
            ArtifactKind::SolverBundle => {
                for upstream_kind in [
                    ArtifactKind::BoundaryMatrix,
                    ArtifactKind::IncidenceMatrix,
                    ArtifactKind::CostVector,
                    ArtifactKind::TargetTable,
                ] {
                    enc.fingerprint(&upstream[upstream_kind.slot()]);
                }
                enc.f64(self.options.blm).u64(self.options.iterations);
            }
        }
        enc.finish()
    }

    fn encode_unit_ids(&self, enc: &mut CanonicalEncoder) {
        enc.seq(self.units.len());
        for id in self.units.ids() {
            enc.u32(id.get());
        }
    }
}
