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
    builder::ProblemAssembler,
    definition::ProblemDefinition,
    err::ProblemLoaderError,
    feature::FeatureRecord,
    options::ProblemOptions,
    unit::{BoundaryRecord, PlanningUnitRecord},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

/// The on-disk shape of the adapter tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDocument {
    pub units: Vec<PlanningUnitRecord>,
    pub features: Vec<FeatureRecord>,
    pub incidence: Vec<Vec<f64>>,
    #[serde(default)]
    pub boundaries: Vec<BoundaryRecord>,
    #[serde(default)]
    pub options: ProblemOptions,
}

impl ProblemDocument {
    #[inline]
    pub fn into_assembler(self) -> ProblemAssembler {
        ProblemAssembler::new()
            .with_units(self.units)
            .with_features(self.features)
            .with_incidence(self.incidence)
            .with_boundaries(self.boundaries)
            .with_options(self.options)
    }
}

/// Reads a [`ProblemDocument`] from JSON and assembles it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProblemLoader;

impl ProblemLoader {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    pub fn from_reader<R: Read>(&self, r: R) -> Result<ProblemDefinition, ProblemLoaderError> {
        let doc: ProblemDocument = serde_json::from_reader(BufReader::new(r))?;
        Ok(doc.into_assembler().assemble()?)
    }

    #[inline]
    pub fn from_path(&self, path: impl AsRef<Path>) -> Result<ProblemDefinition, ProblemLoaderError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading problem");
        let file = File::open(path)?;
        self.from_reader(file)
    }

    #[inline]
    pub fn from_str(&self, s: &str) -> Result<ProblemDefinition, ProblemLoaderError> {
        self.from_reader(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{err::ValidationError, feature::FeatureId, unit::UnitStatus};
    use std::io::Write;

    const DOC: &str = r#"{
        "units": [
            {"id": 2, "cost": 4.0, "status": 2},
            {"id": 1, "cost": 1.5}
        ],
        "features": [
            {"id": 7, "name": "wetland", "target": {"kind": "proportion", "value": 0.5}}
        ],
        "incidence": [[3.0], [1.0]],
        "boundaries": [{"a": 1, "b": 2, "length": 2.0}],
        "options": {"blm": 0.5, "replicates": 8}
    }"#;

    #[test]
    fn loads_document_with_defaults() {
        let p = ProblemLoader::new().from_str(DOC).unwrap();
        assert_eq!(p.unit_count(), 2);
        assert_eq!(p.units().get(0).unwrap().cost(), 1.5);
        assert_eq!(p.units().get(1).unwrap().status(), UnitStatus::LockedIn);
        assert_eq!(p.features().by_id(FeatureId::new(7)).unwrap().spf(), 1.0);
        assert_eq!(p.options().blm, 0.5);
        assert_eq!(p.options().replicates, 8);
        assert_eq!(p.options().seed, 42);
    }

    #[test]
    fn loads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();
        let p = ProblemLoader::new().from_path(file.path()).unwrap();
        assert_eq!(p.feature_count(), 1);
    }

    #[test]
    fn reports_parse_errors() {
        let err = ProblemLoader::new().from_str("{ not json").unwrap_err();
        assert!(matches!(err, ProblemLoaderError::Parse(_)));
    }

    #[test]
    fn reports_validation_errors() {
        let doc = r#"{"units": [], "features": [], "incidence": []}"#;
        let err = ProblemLoader::new().from_str(doc).unwrap_err();
        assert!(matches!(
            err,
            ProblemLoaderError::Validation(ValidationError::NoUnits)
        ));
    }

    #[test]
    fn reports_missing_files() {
        let err = ProblemLoader::new()
            .from_path("/definitely/not/here.json")
            .unwrap_err();
        assert!(matches!(err, ProblemLoaderError::Io(_)));
    }
}
