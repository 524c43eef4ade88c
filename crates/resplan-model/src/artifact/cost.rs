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

use crate::problem::{tables::UnitTable, unit::UnitStatus};
use fixedbitset::FixedBitSet;

/// Unit costs and lock statuses in canonical unit order.
#[derive(Debug, Clone, PartialEq)]
pub struct CostVector {
    costs: Vec<f64>,
    statuses: Vec<UnitStatus>,
}

impl CostVector {
    pub fn from_units(units: &UnitTable) -> Self {
        Self {
            costs: units.iter().map(|u| u.cost()).collect(),
            statuses: units.iter().map(|u| u.status()).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    #[inline]
    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    #[inline]
    pub fn statuses(&self) -> &[UnitStatus] {
        &self.statuses
    }

    #[inline]
    pub fn total(&self, selection: &FixedBitSet) -> f64 {
        selection.ones().map(|u| self.costs[u]).sum()
    }

    /// First unit position whose lock the selection violates.
    pub fn lock_violation(&self, selection: &FixedBitSet) -> Option<usize> {
        self.statuses
            .iter()
            .enumerate()
            .find(|(u, s)| match s {
                UnitStatus::LockedIn => !selection.contains(*u),
                UnitStatus::LockedOut => selection.contains(*u),
                UnitStatus::Available => false,
            })
            .map(|(u, _)| u)
    }

    #[inline]
    pub fn approx_bytes(&self) -> usize {
        self.costs.len() * (std::mem::size_of::<f64>() + std::mem::size_of::<UnitStatus>())
    }
}
