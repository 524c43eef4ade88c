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
    problem::{
        definition::ProblemDefinition,
        unit::{UnitId, UnitStatus},
    },
    solution::err::SelectionError,
};
use fixedbitset::FixedBitSet;

/// Selected planning units, one bit per canonical unit position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selection(FixedBitSet);

impl Selection {
    #[inline]
    pub fn empty(units: usize) -> Self {
        Self(FixedBitSet::with_capacity(units))
    }

    /// Builds a selection from unit ids, rejecting unknown ids, duplicates
    /// and lock violations.
    pub fn from_unit_ids(problem: &ProblemDefinition, ids: &[UnitId]) -> Result<Self, SelectionError> {
        let units = problem.units();
        let mut bits = FixedBitSet::with_capacity(units.len());
        for &id in ids {
            let pos = units.position(id).ok_or(SelectionError::UnknownUnit(id))?;
            if bits.put(pos) {
                return Err(SelectionError::DuplicateUnit(id));
            }
        }
        for (pos, unit) in units.iter().enumerate() {
            let selected = bits.contains(pos);
            let violated = match unit.status() {
                UnitStatus::LockedIn => !selected,
                UnitStatus::LockedOut => selected,
                UnitStatus::Available => false,
            };
            if violated {
                return Err(SelectionError::LockViolation {
                    unit: unit.id(),
                    status: unit.status(),
                });
            }
        }
        Ok(Self(bits))
    }

    #[inline]
    pub fn from_positions(units: usize, positions: impl IntoIterator<Item = usize>) -> Self {
        let mut bits = FixedBitSet::with_capacity(units);
        bits.extend(positions);
        Self(bits)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.len() == 0
    }

    #[inline]
    pub fn contains(&self, position: usize) -> bool {
        self.0.contains(position)
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.0.count_ones(..)
    }

    #[inline]
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.ones()
    }

    /// The selection as a dense 0/1 vector.
    pub fn to_vector(&self) -> Vec<f64> {
        (0..self.0.len())
            .map(|i| if self.0.contains(i) { 1.0 } else { 0.0 })
            .collect()
    }

    #[inline]
    pub fn as_bitset(&self) -> &FixedBitSet {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{
        builder::ProblemAssembler,
        feature::{FeatureRecord, Target},
        options::ProblemOptions,
        unit::PlanningUnitRecord,
    };

    fn problem() -> ProblemDefinition {
        ProblemAssembler::new()
            .with_units([
                PlanningUnitRecord::new(10, 1.0, 0),
                PlanningUnitRecord::new(20, 1.0, 2),
                PlanningUnitRecord::new(30, 1.0, 3),
            ])
            .with_features([FeatureRecord::new(1, "a", Target::Absolute(1.0), 1.0)])
            .with_incidence([vec![1.0], vec![1.0], vec![1.0]])
            .with_options(ProblemOptions::default())
            .assemble()
            .unwrap()
    }

    #[test]
    fn maps_ids_to_positions() {
        let p = problem();
        let s = Selection::from_unit_ids(&p, &[UnitId::new(20), UnitId::new(10)]).unwrap();
        assert_eq!(s.positions().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(s.to_vector(), vec![1.0, 1.0, 0.0]);
        assert_eq!(s.count(), 2);
    }

    #[test]
    fn rejects_malformed_replies() {
        let p = problem();
        assert_eq!(
            Selection::from_unit_ids(&p, &[UnitId::new(20), UnitId::new(99)]).unwrap_err(),
            SelectionError::UnknownUnit(UnitId::new(99))
        );
        assert_eq!(
            Selection::from_unit_ids(&p, &[UnitId::new(20), UnitId::new(20)]).unwrap_err(),
            SelectionError::DuplicateUnit(UnitId::new(20))
        );
        assert_eq!(
            Selection::from_unit_ids(&p, &[UnitId::new(10)]).unwrap_err(),
            SelectionError::LockViolation {
                unit: UnitId::new(20),
                status: UnitStatus::LockedIn
            }
        );
        assert!(matches!(
            Selection::from_unit_ids(&p, &[UnitId::new(20), UnitId::new(30)]).unwrap_err(),
            SelectionError::LockViolation { .. }
        ));
    }
}
