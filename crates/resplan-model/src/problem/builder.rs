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
    definition::ProblemDefinition,
    err::ValidationError,
    feature::{Feature, FeatureRecord},
    options::ProblemOptions,
    tables::{AmountTable, BoundaryEdge, BoundaryTable, FeatureTable, UnitTable},
    unit::{BoundaryRecord, PlanningUnit, PlanningUnitRecord, UnitId},
};
use std::sync::Arc;

/// Collects raw adapter tables and assembles a [`ProblemDefinition`].
///
/// Incidence rows follow the order of the unit records, incidence columns
/// the order of the feature records. Assembly sorts both by id and permutes
/// the incidence table with them, so the resulting definition (and its
/// fingerprints) does not depend on input order.
#[derive(Debug, Clone, Default)]
pub struct ProblemAssembler {
    units: Vec<PlanningUnitRecord>,
    features: Vec<FeatureRecord>,
    incidence: Vec<Vec<f64>>,
    boundaries: Vec<BoundaryRecord>,
    options: ProblemOptions,
}

impl ProblemAssembler {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_units<I>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = PlanningUnitRecord>,
    {
        self.units.clear();
        self.units.extend(units);
        self
    }

    #[inline]
    pub fn with_features<I>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = FeatureRecord>,
    {
        self.features.clear();
        self.features.extend(features);
        self
    }

    #[inline]
    pub fn with_incidence<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<f64>>,
    {
        self.incidence.clear();
        self.incidence.extend(rows);
        self
    }

    #[inline]
    pub fn with_boundaries<I>(mut self, boundaries: I) -> Self
    where
        I: IntoIterator<Item = BoundaryRecord>,
    {
        self.boundaries.clear();
        self.boundaries.extend(boundaries);
        self
    }

    #[inline]
    pub fn with_options(mut self, options: ProblemOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a unit together with its incidence row.
    #[inline]
    pub fn add_unit(&mut self, unit: PlanningUnitRecord, incidence_row: Vec<f64>) -> &mut Self {
        self.units.push(unit);
        self.incidence.push(incidence_row);
        self
    }

    #[inline]
    pub fn add_feature(&mut self, feature: FeatureRecord) -> &mut Self {
        self.features.push(feature);
        self
    }

    #[inline]
    pub fn add_boundary(&mut self, boundary: BoundaryRecord) -> &mut Self {
        self.boundaries.push(boundary);
        self
    }

    #[tracing::instrument(level = "debug", skip(self), fields(units = self.units.len(), features = self.features.len()))]
    pub fn assemble(self) -> Result<ProblemDefinition, ValidationError> {
        self.options.validate()?;

        if self.units.is_empty() {
            return Err(ValidationError::NoUnits);
        }

        let units = self
            .units
            .into_iter()
            .map(PlanningUnitRecord::into_unit)
            .collect::<Result<Vec<PlanningUnit>, _>>()?;
        let features = self
            .features
            .into_iter()
            .map(FeatureRecord::into_feature)
            .collect::<Result<Vec<Feature>, _>>()?;

        if self.incidence.len() != units.len() {
            return Err(ValidationError::IncidenceRowCount {
                expected: units.len(),
                found: self.incidence.len(),
            });
        }
        for (unit, row) in units.iter().zip(self.incidence.iter()) {
            if row.len() != features.len() {
                return Err(ValidationError::IncidenceRowWidth {
                    unit: unit.id(),
                    expected: features.len(),
                    found: row.len(),
                });
            }
            for (feature, &amount) in features.iter().zip(row.iter()) {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(ValidationError::InvalidAmount {
                        unit: unit.id(),
                        feature: feature.id(),
                        amount,
                    });
                }
            }
        }

        let mut unit_order: Vec<usize> = (0..units.len()).collect();
        unit_order.sort_by_key(|&i| units[i].id());
        for w in unit_order.windows(2) {
            if units[w[0]].id() == units[w[1]].id() {
                return Err(ValidationError::DuplicateUnit(units[w[0]].id()));
            }
        }

        let mut feature_order: Vec<usize> = (0..features.len()).collect();
        feature_order.sort_by_key(|&j| features[j].id());
        for w in feature_order.windows(2) {
            if features[w[0]].id() == features[w[1]].id() {
                return Err(ValidationError::DuplicateFeature(features[w[0]].id()));
            }
        }

        let mut amounts = Vec::with_capacity(units.len() * features.len());
        for &i in &unit_order {
            let row = &self.incidence[i];
            amounts.extend(feature_order.iter().map(|&j| row[j]));
        }

        let unit_table = UnitTable::from_sorted(unit_order.iter().map(|&i| units[i]).collect());
        let feature_table =
            FeatureTable::from_sorted(feature_order.iter().map(|&j| features[j].clone()).collect());
        let amount_table = AmountTable::new(unit_table.len(), feature_table.len(), amounts);
        let boundary_table = canonical_boundaries(&unit_table, &self.boundaries)?;

        tracing::debug!(
            units = unit_table.len(),
            features = feature_table.len(),
            edges = boundary_table.len(),
            "Assembled problem"
        );

        Ok(ProblemDefinition::from_tables(
            Arc::new(unit_table),
            Arc::new(feature_table),
            Arc::new(amount_table),
            Arc::new(boundary_table),
            self.options,
        ))
    }
}

fn canonical_boundaries(
    units: &UnitTable,
    records: &[BoundaryRecord],
) -> Result<BoundaryTable, ValidationError> {
    let mut edges = Vec::with_capacity(records.len());
    for r in records {
        let (a_id, b_id) = (UnitId::new(r.a), UnitId::new(r.b));
        let a = units
            .position(a_id)
            .ok_or(ValidationError::UnknownUnit(a_id))?;
        let b = units
            .position(b_id)
            .ok_or(ValidationError::UnknownUnit(b_id))?;
        if !r.length.is_finite() || r.length < 0.0 {
            return Err(ValidationError::InvalidBoundary {
                a: a_id,
                b: b_id,
                length: r.length,
            });
        }
        edges.push(BoundaryEdge {
            a,
            b,
            length: r.length,
        });
    }
    Ok(BoundaryTable::from_edges(edges))
}

/// Assembles a problem from raw adapter tables.
#[inline]
pub fn assemble(
    units: Vec<PlanningUnitRecord>,
    features: Vec<FeatureRecord>,
    incidence: Vec<Vec<f64>>,
    boundaries: Vec<BoundaryRecord>,
    options: ProblemOptions,
) -> Result<ProblemDefinition, ValidationError> {
    ProblemAssembler::new()
        .with_units(units)
        .with_features(features)
        .with_incidence(incidence)
        .with_boundaries(boundaries)
        .with_options(options)
        .assemble()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{
        feature::{FeatureId, Target},
        kind::ArtifactKind,
        unit::UnitStatus,
    };

    fn unit(id: u32, cost: f64) -> PlanningUnitRecord {
        PlanningUnitRecord::new(id, cost, 0)
    }

    fn feature(id: u32, target: Target) -> FeatureRecord {
        FeatureRecord::new(id, format!("f{}", id), target, 1.0)
    }

    fn opts() -> ProblemOptions {
        ProblemOptions::default()
            .with_replicates(4)
            .with_concurrency(2)
    }

    fn base_assembler() -> ProblemAssembler {
        ProblemAssembler::new()
            .with_units([unit(1, 1.0), unit(2, 2.0), unit(3, 3.0)])
            .with_features([feature(10, Target::Absolute(2.0)), feature(20, Target::Proportion(0.5))])
            .with_incidence([vec![1.0, 0.0], vec![1.0, 4.0], vec![1.0, 2.0]])
            .with_boundaries([BoundaryRecord::new(1, 2, 1.0), BoundaryRecord::new(2, 3, 1.0)])
            .with_options(opts())
    }

    #[test]
    fn assembles_canonical_tables() {
        let p = base_assembler().assemble().unwrap();
        assert_eq!(p.unit_count(), 3);
        assert_eq!(p.feature_count(), 2);
        assert_eq!(p.amounts().row(1), &[1.0, 4.0]);
        assert_eq!(p.boundary().len(), 2);
        assert!(p.lineage().is_empty());
    }

    #[test]
    fn fingerprints_ignore_input_order() {
        let a = base_assembler().assemble().unwrap();
        let b = ProblemAssembler::new()
            .with_units([unit(3, 3.0), unit(1, 1.0), unit(2, 2.0)])
            .with_features([feature(20, Target::Proportion(0.5)), feature(10, Target::Absolute(2.0))])
            .with_incidence([vec![2.0, 1.0], vec![0.0, 1.0], vec![4.0, 1.0]])
            .with_boundaries([BoundaryRecord::new(3, 2, 1.0), BoundaryRecord::new(2, 1, 1.0)])
            .with_options(opts())
            .assemble()
            .unwrap();

        assert_eq!(a.fingerprints(), b.fingerprints());
        assert_eq!(a.amounts(), b.amounts());
    }

    #[test]
    fn fingerprints_track_content() {
        let a = base_assembler().assemble().unwrap();
        let b = base_assembler()
            .with_units([unit(1, 1.0), unit(2, 2.5), unit(3, 3.0)])
            .assemble()
            .unwrap();
        assert_ne!(
            a.fingerprint(ArtifactKind::CostVector),
            b.fingerprint(ArtifactKind::CostVector)
        );
        assert_eq!(
            a.fingerprint(ArtifactKind::IncidenceMatrix),
            b.fingerprint(ArtifactKind::IncidenceMatrix)
        );
        assert_eq!(
            a.fingerprint(ArtifactKind::BoundaryMatrix),
            b.fingerprint(ArtifactKind::BoundaryMatrix)
        );
    }

    #[test]
    fn large_values_fingerprint_apart() {
        let large = |amount: f64, cost: f64| {
            ProblemAssembler::new()
                .with_units([unit(1, cost), unit(2, 2.0)])
                .with_features([feature(10, Target::Absolute(1.0))])
                .with_incidence([vec![amount], vec![1.0]])
                .with_options(opts())
                .assemble()
                .unwrap()
        };
        let a = large(1e10, 1e10);
        let b = large(5e10, 9e12);

        for kind in [
            ArtifactKind::IncidenceMatrix,
            ArtifactKind::CostVector,
            ArtifactKind::SolverBundle,
        ] {
            assert_ne!(a.fingerprint(kind), b.fingerprint(kind), "{}", kind);
        }
        assert_eq!(
            a.fingerprint(ArtifactKind::BoundaryMatrix),
            b.fingerprint(ArtifactKind::BoundaryMatrix)
        );
    }

    #[test]
    fn rejects_duplicate_unit_ids() {
        let err = base_assembler()
            .with_units([unit(1, 1.0), unit(2, 2.0), unit(1, 3.0)])
            .assemble()
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateUnit(UnitId::new(1)));
    }

    #[test]
    fn rejects_duplicate_feature_ids() {
        let err = base_assembler()
            .with_features([feature(10, Target::Absolute(1.0)), feature(10, Target::Absolute(2.0))])
            .assemble()
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateFeature(FeatureId::new(10)));
    }

    #[test]
    fn rejects_negative_cost() {
        let err = base_assembler()
            .with_units([unit(1, 1.0), unit(2, -2.0), unit(3, 3.0)])
            .assemble()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCost { .. }));
    }

    #[test]
    fn rejects_unknown_status() {
        let err = base_assembler()
            .with_units([unit(1, 1.0), PlanningUnitRecord::new(2, 2.0, 7), unit(3, 3.0)])
            .assemble()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownStatus {
                unit: UnitId::new(2),
                code: 7
            }
        );
    }

    #[test]
    fn rejects_out_of_range_targets() {
        let err = base_assembler()
            .with_features([feature(10, Target::Proportion(1.5)), feature(20, Target::Absolute(1.0))])
            .assemble()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTarget { .. }));

        let err = base_assembler()
            .with_features([feature(10, Target::Absolute(-1.0)), feature(20, Target::Absolute(1.0))])
            .assemble()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTarget { .. }));
    }

    #[test]
    fn rejects_incidence_row_count_mismatch() {
        let err = base_assembler()
            .with_incidence([vec![1.0, 0.0], vec![1.0, 4.0]])
            .assemble()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::IncidenceRowCount {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn rejects_incidence_row_width_mismatch() {
        let err = base_assembler()
            .with_incidence([vec![1.0, 0.0], vec![1.0], vec![1.0, 2.0]])
            .assemble()
            .unwrap_err();
        assert!(matches!(err, ValidationError::IncidenceRowWidth { found: 1, .. }));
    }

    #[test]
    fn rejects_boundary_to_unknown_unit() {
        let err = base_assembler()
            .with_boundaries([BoundaryRecord::new(1, 99, 1.0)])
            .assemble()
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownUnit(UnitId::new(99)));
    }

    #[test]
    fn rejects_empty_problem() {
        let err = ProblemAssembler::new()
            .with_options(opts())
            .assemble()
            .unwrap_err();
        assert_eq!(err, ValidationError::NoUnits);
    }

    #[test]
    fn incremental_add_matches_bulk() {
        let mut b = ProblemAssembler::new().with_options(opts());
        b.add_unit(unit(2, 2.0), vec![1.0, 4.0])
            .add_unit(unit(1, 1.0), vec![1.0, 0.0])
            .add_unit(unit(3, 3.0), vec![1.0, 2.0])
            .add_feature(feature(10, Target::Absolute(2.0)))
            .add_feature(feature(20, Target::Proportion(0.5)))
            .add_boundary(BoundaryRecord::new(1, 2, 1.0))
            .add_boundary(BoundaryRecord::new(2, 3, 1.0));
        let p = b.assemble().unwrap();
        let q = base_assembler().assemble().unwrap();
        assert_eq!(p.fingerprints(), q.fingerprints());
        assert_eq!(p.units().by_id(UnitId::new(1)).unwrap().status(), UnitStatus::Available);
    }

    #[test]
    fn free_function_matches_builder() {
        let p = assemble(
            vec![unit(1, 1.0)],
            vec![feature(10, Target::Absolute(1.0))],
            vec![vec![1.0]],
            vec![],
            opts(),
        )
        .unwrap();
        assert_eq!(p.unit_count(), 1);
    }
}
