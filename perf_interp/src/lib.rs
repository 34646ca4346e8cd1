//! Core aircraft-performance interpolation library.
//!
//! Turns a sparse set of digitized chart points into a queryable
//! performance model and applies the ISA atmosphere correction when no
//! measured curve covers the requested condition. Purely functional over
//! immutable inputs; callers that mutate points must publish a new model
//! snapshot rather than mutate one that queries are running against.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod confidence;
pub mod correction;
pub mod group;
pub mod interp;

pub use correction::{correct_distance, isa_temperature, CorrectionResult};
pub use interp::{interpolate, InterpolationResult};

#[derive(Error, Debug)]
pub enum PerfError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("insufficient data: at least 2 reference points are required")]
    InsufficientData,
    #[error("query outside covered range on axis {axis}: {value} not in [{min}, {max}]")]
    OutOfDomain {
        axis: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("model configuration invalid: {0}")]
    Configuration(String),
}

/// One named, bounded input dimension of a performance model.
///
/// `normalization_scale` is the divisor applied to this axis when computing
/// multi-axis distances, so that axes with very different numeric ranges
/// contribute comparably (e.g. 30 for temperature in degrees C, 2000 for
/// pressure altitude in feet).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Axis {
    pub name: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    pub normalization_scale: f64,
}

impl Axis {
    fn validate(&self) -> Result<(), PerfError> {
        if self.name.is_empty() {
            return Err(PerfError::Validation("axis name must not be empty".into()));
        }
        if !self.min.is_finite() || !self.max.is_finite() || self.min >= self.max {
            return Err(PerfError::Validation(format!(
                "axis {}: range [{}, {}] is invalid",
                self.name, self.min, self.max
            )));
        }
        if !self.normalization_scale.is_finite() || self.normalization_scale <= 0.0 {
            return Err(PerfError::Validation(format!(
                "axis {}: normalization scale {} must be positive",
                self.name, self.normalization_scale
            )));
        }
        Ok(())
    }
}

/// The declared axes (in canonical coordinate order) plus output names.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub axes: Vec<Axis>,
    pub outputs: Vec<String>,
}

impl ParameterSpace {
    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    pub fn validate(&self) -> Result<(), PerfError> {
        if self.axes.is_empty() {
            return Err(PerfError::Validation(
                "parameter space declares no axes".into(),
            ));
        }
        if self.outputs.is_empty() {
            return Err(PerfError::Validation(
                "parameter space declares no outputs".into(),
            ));
        }
        for axis in &self.axes {
            axis.validate()?;
        }
        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(PerfError::Validation(format!(
                    "duplicate axis name: {}",
                    axis.name
                )));
            }
        }
        for (i, output) in self.outputs.iter().enumerate() {
            if output.is_empty() || self.outputs[..i].contains(output) {
                return Err(PerfError::Validation(format!(
                    "output name {:?} is empty or duplicated",
                    output
                )));
            }
        }
        Ok(())
    }
}

fn default_manual() -> bool {
    true
}

/// One measured (or derived) sample: a full coordinate vector plus one
/// value per declared output. Derived points (`is_interpolated`) are
/// regenerated wholesale whenever the manual points change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferencePoint {
    #[serde(default)]
    pub id: u64,
    pub values: BTreeMap<String, f64>,
    pub outputs: BTreeMap<String, f64>,
    #[serde(default)]
    pub is_interpolated: bool,
    #[serde(default = "default_manual")]
    pub is_manual: bool,
}

/// A full vector of axis values representing the flight condition to
/// evaluate. Must name every axis of the active parameter space.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryCondition {
    pub values: BTreeMap<String, f64>,
}

impl QueryCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, axis: &str, value: f64) -> Self {
        self.values.insert(axis.to_string(), value);
        self
    }
}

/// Interpolation strategy, with the axis parameters each strategy needs.
///
/// Selection is explicit, never auto-detected: the methods differ in
/// extrapolation policy (linear/cubic refuse to leave the covered range,
/// IDW and bilinear always answer, at reduced confidence).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Method {
    /// Bracketing-pair linear blend along one free axis; all other axes
    /// must match the query exactly.
    Linear { axis: String },
    /// Same bracketing as `Linear` with a smoothstep blend (endpoint-exact,
    /// zero slope at both ends).
    Cubic { axis: String },
    /// Inverse-distance weighting over the nearest points in the full
    /// normalized parameter space.
    Idw,
    /// Implicit 2-axis grid with nearest-point fallback when the data is
    /// too irregular to form a cell.
    Bilinear { x_axis: String, y_axis: String },
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Linear { .. } => "linear",
            Method::Cubic { .. } => "cubic",
            Method::Idw => "idw",
            Method::Bilinear { .. } => "bilinear",
        }
    }

    fn validate(&self, space: &ParameterSpace) -> Result<(), PerfError> {
        match self {
            Method::Linear { axis } | Method::Cubic { axis } => {
                if space.axis(axis).is_none() {
                    return Err(PerfError::Configuration(format!(
                        "{} method references unknown axis {}",
                        self.name(),
                        axis
                    )));
                }
            }
            Method::Idw => {}
            Method::Bilinear { x_axis, y_axis } => {
                if space.axes.len() < 2 {
                    return Err(PerfError::Configuration(
                        "bilinear requires a parameter space with at least 2 axes".into(),
                    ));
                }
                if x_axis == y_axis {
                    return Err(PerfError::Configuration(format!(
                        "bilinear grid axes must differ (both are {})",
                        x_axis
                    )));
                }
                for axis in [x_axis, y_axis] {
                    if space.axis(axis).is_none() {
                        return Err(PerfError::Configuration(format!(
                            "bilinear references unknown axis {}",
                            axis
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Aggregate of a parameter space, its reference points, and the selected
/// interpolation method. Points are mutated only through `add_point` /
/// `remove_point`, which keep the derived-point invariant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "PerformanceModelRepr")]
pub struct PerformanceModel {
    pub space: ParameterSpace,
    pub method: Method,
    pub(crate) points: Vec<ReferencePoint>,
    next_id: u64,
}

/// Wire shape for deserialization. Hand-authored model JSON routinely
/// omits point ids, which would leave every point at id 0; colliding ids
/// are renumbered on load so point identity stays unambiguous.
#[derive(Deserialize)]
struct PerformanceModelRepr {
    space: ParameterSpace,
    method: Method,
    points: Vec<ReferencePoint>,
    #[serde(default)]
    next_id: u64,
}

impl From<PerformanceModelRepr> for PerformanceModel {
    fn from(repr: PerformanceModelRepr) -> Self {
        let mut model = Self {
            space: repr.space,
            method: repr.method,
            points: repr.points,
            next_id: repr.next_id,
        };
        model.renumber_duplicate_ids();
        model
    }
}

impl PerformanceModel {
    pub fn new(space: ParameterSpace, method: Method) -> Result<Self, PerfError> {
        space.validate()?;
        method.validate(&space)?;
        Ok(Self {
            space,
            method,
            points: Vec::new(),
            next_id: 0,
        })
    }

    /// Points in insertion order. Order is preserved for display purposes
    /// only; no interpolation result depends on it.
    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    /// Add a manually digitized point. Discards any derived points, since
    /// they are no longer consistent with the ground truth.
    pub fn add_point(
        &mut self,
        values: BTreeMap<String, f64>,
        outputs: BTreeMap<String, f64>,
    ) -> Result<u64, PerfError> {
        self.insert(values, outputs, false)
    }

    /// Add a derived point (e.g. from `group::densify`).
    pub fn add_interpolated_point(
        &mut self,
        values: BTreeMap<String, f64>,
        outputs: BTreeMap<String, f64>,
    ) -> Result<u64, PerfError> {
        self.insert(values, outputs, true)
    }

    fn insert(
        &mut self,
        values: BTreeMap<String, f64>,
        outputs: BTreeMap<String, f64>,
        is_interpolated: bool,
    ) -> Result<u64, PerfError> {
        validate_coords(&self.space, &values)?;
        validate_outputs(&self.space, &outputs)?;
        if !is_interpolated {
            // Manual ground truth changed; derived points must be regenerated.
            self.points.retain(|p| !p.is_interpolated);
        }
        let id = self
            .next_id
            .max(self.points.iter().map(|p| p.id + 1).max().unwrap_or(0));
        self.next_id = id + 1;
        self.points.push(ReferencePoint {
            id,
            values,
            outputs,
            is_interpolated,
            is_manual: !is_interpolated,
        });
        Ok(id)
    }

    /// Remove a point by id. Idempotent: an absent id is a no-op and
    /// returns `false`.
    pub fn remove_point(&mut self, id: u64) -> bool {
        match self.points.iter().position(|p| p.id == id) {
            Some(pos) => {
                let was_manual = self.points[pos].is_manual;
                self.points.remove(pos);
                if was_manual {
                    self.points.retain(|p| !p.is_interpolated);
                }
                true
            }
            None => false,
        }
    }

    pub fn clear_interpolated(&mut self) {
        self.points.retain(|p| !p.is_interpolated);
    }

    /// Reassign any id that collides with an earlier point's id, keeping
    /// explicit unique ids as authored, and advance `next_id` past every
    /// surviving id.
    fn renumber_duplicate_ids(&mut self) {
        let mut seen = BTreeSet::new();
        let mut next = self
            .next_id
            .max(self.points.iter().map(|p| p.id + 1).max().unwrap_or(0));
        for point in &mut self.points {
            if !seen.insert(point.id) {
                point.id = next;
                seen.insert(next);
                next += 1;
            }
        }
        self.next_id = next;
    }

    /// Re-check the invariants of a model that was not built through
    /// `new`/`add_point` (e.g. deserialized from JSON).
    pub fn validate(&self) -> Result<(), PerfError> {
        self.space.validate()?;
        self.method.validate(&self.space)?;
        self.ensure_coords()
    }

    pub fn validate_query(&self, query: &QueryCondition) -> Result<(), PerfError> {
        for name in query.values.keys() {
            if self.space.axis(name).is_none() {
                return Err(PerfError::Validation(format!(
                    "query names unknown axis {}",
                    name
                )));
            }
        }
        for axis in &self.space.axes {
            match query.values.get(&axis.name) {
                Some(v) if v.is_finite() => {}
                Some(v) => {
                    return Err(PerfError::Validation(format!(
                        "query value for axis {} is not finite: {}",
                        axis.name, v
                    )))
                }
                None => {
                    return Err(PerfError::Validation(format!(
                        "query is missing axis {}",
                        axis.name
                    )))
                }
            }
        }
        Ok(())
    }

    pub(crate) fn ensure_coords(&self) -> Result<(), PerfError> {
        for point in &self.points {
            validate_coords(&self.space, &point.values)?;
            validate_outputs(&self.space, &point.outputs)?;
        }
        Ok(())
    }

    pub(crate) fn ensure_usable(&self) -> Result<(), PerfError> {
        self.ensure_coords()?;
        if self.points.len() < 2 {
            return Err(PerfError::InsufficientData);
        }
        Ok(())
    }
}

fn validate_coords(space: &ParameterSpace, values: &BTreeMap<String, f64>) -> Result<(), PerfError> {
    for name in values.keys() {
        if space.axis(name).is_none() {
            return Err(PerfError::Validation(format!(
                "point names unknown axis {}",
                name
            )));
        }
    }
    for axis in &space.axes {
        match values.get(&axis.name) {
            Some(v) if v.is_finite() => {}
            Some(v) => {
                return Err(PerfError::Validation(format!(
                    "point value for axis {} is not finite: {}",
                    axis.name, v
                )))
            }
            None => {
                return Err(PerfError::Validation(format!(
                    "point is missing axis {}",
                    axis.name
                )))
            }
        }
    }
    Ok(())
}

fn validate_outputs(space: &ParameterSpace, outputs: &BTreeMap<String, f64>) -> Result<(), PerfError> {
    for name in outputs.keys() {
        if !space.has_output(name) {
            return Err(PerfError::Validation(format!(
                "point names unknown output {}",
                name
            )));
        }
    }
    for output in &space.outputs {
        match outputs.get(output) {
            Some(v) if v.is_finite() => {}
            Some(v) => {
                return Err(PerfError::Validation(format!(
                    "point output {} is not finite: {}",
                    output, v
                )))
            }
            None => {
                return Err(PerfError::Validation(format!(
                    "point is missing output {}",
                    output
                )))
            }
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    fn model(method: Method) -> PerformanceModel {
        PerformanceModel::new(takeoff_space(), method).unwrap()
    }

    #[test]
    fn test_add_point_missing_axis_rejected() {
        let mut m = model(Method::Idw);
        let mut values = coords(0.0, 0.0, 1000.0, 0.0);
        values.remove("wind");
        let err = m.add_point(values, distance(400.0)).unwrap_err();
        assert!(matches!(err, PerfError::Validation(_)));
        assert!(m.points().is_empty());
    }

    #[test]
    fn test_add_point_unknown_axis_rejected() {
        let mut m = model(Method::Idw);
        let mut values = coords(0.0, 0.0, 1000.0, 0.0);
        values.insert("humidity".into(), 50.0);
        assert!(matches!(
            m.add_point(values, distance(400.0)),
            Err(PerfError::Validation(_))
        ));
    }

    #[test]
    fn test_add_point_non_finite_rejected() {
        let mut m = model(Method::Idw);
        assert!(matches!(
            m.add_point(coords(f64::NAN, 0.0, 1000.0, 0.0), distance(400.0)),
            Err(PerfError::Validation(_))
        ));
        assert!(matches!(
            m.add_point(coords(0.0, 0.0, 1000.0, 0.0), distance(f64::INFINITY)),
            Err(PerfError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_coordinates_are_retained() {
        let mut m = model(Method::Idw);
        m.add_point(coords(0.0, 0.0, 1000.0, 0.0), distance(400.0))
            .unwrap();
        m.add_point(coords(0.0, 0.0, 1000.0, 0.0), distance(410.0))
            .unwrap();
        assert_eq!(m.points().len(), 2);
    }

    #[test]
    fn test_remove_point_is_idempotent() {
        let mut m = model(Method::Idw);
        let id = m
            .add_point(coords(0.0, 0.0, 1000.0, 0.0), distance(400.0))
            .unwrap();
        assert!(m.remove_point(id));
        assert!(!m.remove_point(id));
        assert!(!m.remove_point(999));
    }

    fn model_json(points: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "space": {
                "axes": [
                    { "name": "temperature", "unit": "C", "min": -20.0, "max": 45.0,
                      "normalization_scale": 30.0 }
                ],
                "outputs": ["distance"]
            },
            "method": { "method": "linear", "params": { "axis": "temperature" } },
            "points": points
        })
    }

    #[test]
    fn test_deserialized_points_without_ids_are_renumbered() {
        // Hand-authored model JSON typically omits point ids entirely.
        let value = model_json(serde_json::json!([
            { "values": { "temperature": 0.0 }, "outputs": { "distance": 400.0 } },
            { "values": { "temperature": 30.0 }, "outputs": { "distance": 600.0 } }
        ]));
        let mut m: PerformanceModel = serde_json::from_value(value).unwrap();
        m.validate().unwrap();

        let ids: Vec<u64> = m.points().iter().map(|p| p.id).collect();
        assert_ne!(ids[0], ids[1]);

        // Removal by id targets exactly one well-defined point.
        assert!(m.remove_point(ids[1]));
        assert_eq!(m.points().len(), 1);
        assert_eq!(m.points()[0].id, ids[0]);
        assert_eq!(m.points()[0].values["temperature"], 0.0);

        // Fresh inserts never reuse a surviving id.
        let mut values = BTreeMap::new();
        values.insert("temperature".to_string(), 15.0);
        let mut outputs = BTreeMap::new();
        outputs.insert("distance".to_string(), 500.0);
        let new_id = m.add_point(values, outputs).unwrap();
        assert_ne!(new_id, ids[0]);
    }

    #[test]
    fn test_deserialized_id_collisions_keep_first_occurrence() {
        let value = model_json(serde_json::json!([
            { "id": 7, "values": { "temperature": 0.0 }, "outputs": { "distance": 400.0 } },
            { "id": 7, "values": { "temperature": 30.0 }, "outputs": { "distance": 600.0 } },
            { "id": 3, "values": { "temperature": 15.0 }, "outputs": { "distance": 500.0 } }
        ]));
        let m: PerformanceModel = serde_json::from_value(value).unwrap();
        let ids: Vec<u64> = m.points().iter().map(|p| p.id).collect();
        assert_eq!(ids[0], 7);
        assert_eq!(ids[2], 3);
        // The colliding point gets the next free id past the authored ones.
        assert_eq!(ids[1], 8);
    }

    #[test]
    fn test_manual_mutation_discards_interpolated_points() {
        let mut m = model(Method::Idw);
        m.add_point(coords(0.0, 0.0, 1000.0, 0.0), distance(400.0))
            .unwrap();
        let manual = m
            .add_point(coords(30.0, 0.0, 1000.0, 0.0), distance(600.0))
            .unwrap();
        m.add_interpolated_point(coords(15.0, 0.0, 1000.0, 0.0), distance(500.0))
            .unwrap();
        assert_eq!(m.points().len(), 3);

        // Adding a manual point drops the derived one.
        m.add_point(coords(10.0, 0.0, 1000.0, 0.0), distance(460.0))
            .unwrap();
        assert!(m.points().iter().all(|p| !p.is_interpolated));

        // Removing a manual point drops derived points again.
        m.add_interpolated_point(coords(20.0, 0.0, 1000.0, 0.0), distance(530.0))
            .unwrap();
        assert!(m.remove_point(manual));
        assert!(m.points().iter().all(|p| !p.is_interpolated));
    }

    #[test]
    fn test_removing_interpolated_point_keeps_others() {
        let mut m = model(Method::Idw);
        m.add_point(coords(0.0, 0.0, 1000.0, 0.0), distance(400.0))
            .unwrap();
        let a = m
            .add_interpolated_point(coords(5.0, 0.0, 1000.0, 0.0), distance(430.0))
            .unwrap();
        m.add_interpolated_point(coords(10.0, 0.0, 1000.0, 0.0), distance(460.0))
            .unwrap();
        assert!(m.remove_point(a));
        assert_eq!(
            m.points().iter().filter(|p| p.is_interpolated).count(),
            1
        );
    }

    #[test]
    fn test_query_validation() {
        let m = model(Method::Idw);
        let mut q = query(15.0, 0.0, 1000.0, 0.0);
        q.values.remove("mass");
        assert!(matches!(
            m.validate_query(&q),
            Err(PerfError::Validation(_))
        ));

        let q = query(15.0, 0.0, 1000.0, 0.0).with("bogus", 1.0);
        assert!(matches!(
            m.validate_query(&q),
            Err(PerfError::Validation(_))
        ));

        let q = query(f64::NAN, 0.0, 1000.0, 0.0);
        assert!(matches!(
            m.validate_query(&q),
            Err(PerfError::Validation(_))
        ));

        assert!(m.validate_query(&query(15.0, 0.0, 1000.0, 0.0)).is_ok());
    }

    #[test]
    fn test_method_configuration_checks() {
        let space = ParameterSpace {
            axes: vec![Axis {
                name: "temperature".into(),
                unit: "C".into(),
                min: -20.0,
                max: 45.0,
                normalization_scale: 30.0,
            }],
            outputs: vec!["distance".into()],
        };
        assert!(matches!(
            PerformanceModel::new(
                space.clone(),
                Method::Bilinear {
                    x_axis: "temperature".into(),
                    y_axis: "pressure_altitude".into(),
                },
            ),
            Err(PerfError::Configuration(_))
        ));
        assert!(matches!(
            PerformanceModel::new(
                space,
                Method::Linear {
                    axis: "pressure_altitude".into(),
                },
            ),
            Err(PerfError::Configuration(_))
        ));
    }

    #[test]
    fn test_axis_invariants() {
        let mut space = takeoff_space();
        space.axes[0].min = 50.0; // min >= max
        assert!(space.validate().is_err());

        let mut space = takeoff_space();
        space.axes[1].normalization_scale = 0.0;
        assert!(space.validate().is_err());

        let mut space = takeoff_space();
        space.axes[1].name = "temperature".into();
        assert!(space.validate().is_err());
    }
}
