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
pub struct UnitIdentifierMarker;

impl IdentifierMarkerName for UnitIdentifierMarker {
    const NAME: &'static str = "UnitId";
}

pub type UnitId = Identifier<u32, UnitIdentifierMarker>;

/// Opaque handle to geometry owned by the spatial adapter.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeometryHandle(u64);

impl GeometryHandle {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    LockedIn,
    LockedOut,
}

impl UnitStatus {
    /// Decodes the numeric status column of adapter tables.
    ///
    /// `1` marks a unit as part of an initial reserve; it is only a starting
    /// hint for the solver and carries no lock.
    #[inline]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 | 1 => Some(UnitStatus::Available),
            2 => Some(UnitStatus::LockedIn),
            3 => Some(UnitStatus::LockedOut),
            _ => None,
        }
    }

    #[inline]
    pub fn code(&self) -> u8 {
        match self {
            UnitStatus::Available => 0,
            UnitStatus::LockedIn => 2,
            UnitStatus::LockedOut => 3,
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        !matches!(self, UnitStatus::Available)
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitStatus::Available => write!(f, "available"),
            UnitStatus::LockedIn => write!(f, "locked-in"),
            UnitStatus::LockedOut => write!(f, "locked-out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanningUnit {
    id: UnitId,
    cost: f64,
    status: UnitStatus,
    geometry: Option<GeometryHandle>,
}

impl PlanningUnit {
    #[inline]
    pub fn new(
        id: UnitId,
        cost: f64,
        status: UnitStatus,
        geometry: Option<GeometryHandle>,
    ) -> Result<Self, ValidationError> {
        validate_cost(id, cost)?;
        Ok(Self {
            id,
            cost,
            status,
            geometry,
        })
    }

    #[inline]
    pub fn id(&self) -> UnitId {
        self.id
    }

    #[inline]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    #[inline]
    pub fn status(&self) -> UnitStatus {
        self.status
    }

    #[inline]
    pub fn geometry(&self) -> Option<GeometryHandle> {
        self.geometry
    }

    #[inline]
    pub(crate) fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    #[inline]
    pub(crate) fn with_status(mut self, status: UnitStatus) -> Self {
        self.status = status;
        self
    }
}

#[inline]
pub(crate) fn validate_cost(id: UnitId, cost: f64) -> Result<(), ValidationError> {
    if !cost.is_finite() || cost < 0.0 {
        return Err(ValidationError::InvalidCost { unit: id, cost });
    }
    Ok(())
}

/// A planning unit row as delivered by the spatial adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanningUnitRecord {
    pub id: u32,
    pub cost: f64,
    #[serde(default)]
    pub status: u8,
    #[serde(default)]
    pub geometry: Option<u64>,
}

impl PlanningUnitRecord {
    #[inline]
    pub fn new(id: u32, cost: f64, status: u8) -> Self {
        Self {
            id,
            cost,
            status,
            geometry: None,
        }
    }

    pub fn into_unit(self) -> Result<PlanningUnit, ValidationError> {
        let id = UnitId::new(self.id);
        let status = UnitStatus::from_code(self.status).ok_or(ValidationError::UnknownStatus {
            unit: id,
            code: self.status,
        })?;
        PlanningUnit::new(id, self.cost, status, self.geometry.map(GeometryHandle::new))
    }
}

/// Shared boundary between two units. `a == b` is a unit's exterior boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRecord {
    pub a: u32,
    pub b: u32,
    pub length: f64,
}

impl BoundaryRecord {
    #[inline]
    pub fn new(a: u32, b: u32, length: f64) -> Self {
        Self { a, b, length }
    }
}
