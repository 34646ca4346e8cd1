//! Interpolation engine over a reference point store.
//!
//! Four interchangeable strategies with deliberately different
//! extrapolation policies: pairwise linear and cubic refuse to leave the
//! covered range (`OutOfDomain`), while IDW and bilinear-with-fallback
//! always produce a value and let the confidence score degrade instead.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use ndarray::Array1;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    confidence, Method, ParameterSpace, PerfError, PerformanceModel, QueryCondition,
    ReferencePoint,
};

/// Neighbors considered by inverse-distance weighting.
const IDW_NEIGHBORS: usize = 4;
/// Denominator correction avoiding division by zero on exact matches.
const IDW_EPSILON: f64 = 1e-3;

/// The outcome of one interpolation, carrying the contributing points for
/// auditability and trajectory overlays.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InterpolationResult {
    pub value: f64,
    /// 0-100; see the `confidence` module.
    pub confidence: f64,
    pub used_points: Vec<ReferencePoint>,
    pub method: Method,
    /// Set when bilinear could not form a 2x2 cell and degraded to a
    /// nearest-point lookup.
    pub is_fallback: bool,
}

/// Evaluate the model at one flight condition using its configured method.
pub fn interpolate(
    model: &PerformanceModel,
    query: &QueryCondition,
    output: &str,
) -> Result<InterpolationResult, PerfError> {
    model.ensure_usable()?;
    model.validate_query(query)?;
    if !model.space.has_output(output) {
        return Err(PerfError::Configuration(format!(
            "model declares no output named {}",
            output
        )));
    }

    match &model.method {
        Method::Linear { axis } => pairwise(model, query, output, axis, false),
        Method::Cubic { axis } => pairwise(model, query, output, axis, true),
        Method::Idw => idw(model, query, output),
        Method::Bilinear { x_axis, y_axis } => bilinear(model, query, output, x_axis, y_axis),
    }
}

/// Bracketing-pair interpolation along `axis` within the curve group that
/// matches the query exactly on every other axis.
fn pairwise(
    model: &PerformanceModel,
    query: &QueryCondition,
    output: &str,
    axis: &str,
    cubic: bool,
) -> Result<InterpolationResult, PerfError> {
    let mut group: Vec<&ReferencePoint> = model
        .points()
        .iter()
        .filter(|p| {
            model
                .space
                .axes
                .iter()
                .filter(|a| a.name != axis)
                .all(|a| p.values[a.name.as_str()] == query.values[a.name.as_str()])
        })
        .collect();
    if group.len() < 2 {
        return Err(PerfError::InsufficientData);
    }
    group.sort_by(|a, b| {
        a.values[axis]
            .partial_cmp(&b.values[axis])
            .unwrap_or(Ordering::Equal)
    });

    let qa = query.values[axis];
    let min = group[0].values[axis];
    let max = group[group.len() - 1].values[axis];
    if qa < min || qa > max {
        return Err(PerfError::OutOfDomain {
            axis: axis.to_string(),
            value: qa,
            min,
            max,
        });
    }

    // qa <= max, so the search always finds an upper neighbor; the final
    // pair is a safe bracket against float comparison quirks either way.
    let hi = (1..group.len())
        .find(|&i| group[i].values[axis] >= qa)
        .unwrap_or(group.len() - 1);
    let (p1, p2) = (group[hi - 1], group[hi]);
    let (x1, x2) = (p1.values[axis], p2.values[axis]);
    let value = blend(x1, p1.outputs[output], x2, p2.outputs[output], qa, cubic);
    Ok(InterpolationResult {
        value,
        confidence: confidence::from_domain_excess(0.0),
        used_points: vec![p1.clone(), p2.clone()],
        method: model.method.clone(),
        is_fallback: false,
    })
}

fn idw(
    model: &PerformanceModel,
    query: &QueryCondition,
    output: &str,
) -> Result<InterpolationResult, PerfError> {
    let q = normalized_coords(&model.space, query);
    let mut scored: Vec<(f64, &ReferencePoint)> = model
        .points()
        .iter()
        .map(|p| (normalized_distance(&model.space, p, &q), p))
        .collect();
    // Stable sort: equidistant points keep insertion order.
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    scored.truncate(IDW_NEIGHBORS);

    let mut weight_sum = 0.0;
    let mut weighted = 0.0;
    for (d, p) in &scored {
        let w = 1.0 / (d + IDW_EPSILON);
        weight_sum += w;
        weighted += w * p.outputs[output];
    }

    Ok(InterpolationResult {
        value: weighted / weight_sum,
        confidence: confidence::from_nearest_distance(scored[0].0),
        used_points: scored.iter().map(|(_, p)| (*p).clone()).collect(),
        method: model.method.clone(),
        is_fallback: false,
    })
}

fn bilinear(
    model: &PerformanceModel,
    query: &QueryCondition,
    output: &str,
    x_axis: &str,
    y_axis: &str,
) -> Result<InterpolationResult, PerfError> {
    let qx = query.values[x_axis];
    let qy = query.values[y_axis];

    // Implicit grid from the distinct values observed on each axis. Axes
    // other than the two grid axes are ignored; digitized 2-D tables carry
    // no further coordinates.
    let xs: BTreeSet<OrderedFloat<f64>> = model
        .points()
        .iter()
        .map(|p| OrderedFloat(p.values[x_axis]))
        .collect();
    let ys: BTreeSet<OrderedFloat<f64>> = model
        .points()
        .iter()
        .map(|p| OrderedFloat(p.values[y_axis]))
        .collect();

    let cell = match (grid_bracket(&xs, qx), grid_bracket(&ys, qy)) {
        (Some((x0, x1)), Some((y0, y1))) => {
            let corner = |x: f64, y: f64| {
                model
                    .points()
                    .iter()
                    .find(|p| p.values[x_axis] == x && p.values[y_axis] == y)
            };
            match (
                corner(x0, y0),
                corner(x0, y1),
                corner(x1, y0),
                corner(x1, y1),
            ) {
                (Some(p00), Some(p01), Some(p10), Some(p11)) => {
                    Some(((x0, x1), (y0, y1), [p00, p01, p10, p11]))
                }
                _ => None,
            }
        }
        _ => None,
    };

    let Some(((x0, x1), (y0, y1), corners)) = cell else {
        // Irregular sampling is expected, not exceptional: degrade to the
        // single closest point rather than failing.
        return nearest_fallback(model, query, output);
    };

    let [p00, p01, p10, p11] = corners;
    // Degenerate brackets (query exactly on a grid line) collapse to plain
    // linear interpolation along the remaining axis, so a query on a
    // boundary yields the exact edge value from either adjacent cell.
    let v0 = blend(y0, p00.outputs[output], y1, p01.outputs[output], qy, false);
    let v1 = blend(y0, p10.outputs[output], y1, p11.outputs[output], qy, false);
    let value = blend(x0, v0, x1, v1, qx, false);

    let mut used_points: Vec<ReferencePoint> = Vec::with_capacity(4);
    for p in [p00, p01, p10, p11] {
        if !used_points.iter().any(|u| u.id == p.id) {
            used_points.push(p.clone());
        }
    }

    Ok(InterpolationResult {
        value,
        confidence: confidence::from_domain_excess(0.0),
        used_points,
        method: model.method.clone(),
        is_fallback: false,
    })
}

fn nearest_fallback(
    model: &PerformanceModel,
    query: &QueryCondition,
    output: &str,
) -> Result<InterpolationResult, PerfError> {
    let q = normalized_coords(&model.space, query);
    let mut best: Option<(f64, &ReferencePoint)> = None;
    for p in model.points() {
        let d = normalized_distance(&model.space, p, &q);
        match best {
            Some((bd, _)) if bd <= d => {}
            _ => best = Some((d, p)),
        }
    }
    // ensure_usable guarantees at least 2 points.
    let (d, p) = best.ok_or(PerfError::InsufficientData)?;
    Ok(InterpolationResult {
        value: p.outputs[output],
        confidence: confidence::from_nearest_distance(d),
        used_points: vec![p.clone()],
        method: model.method.clone(),
        is_fallback: true,
    })
}

fn normalized_coords(space: &ParameterSpace, query: &QueryCondition) -> Array1<f64> {
    space
        .axes
        .iter()
        .map(|a| query.values[a.name.as_str()] / a.normalization_scale)
        .collect()
}

fn normalized_distance(space: &ParameterSpace, point: &ReferencePoint, q: &Array1<f64>) -> f64 {
    let v: Array1<f64> = space
        .axes
        .iter()
        .map(|a| point.values[a.name.as_str()] / a.normalization_scale)
        .collect();
    (&v - q).mapv(|d| d * d).sum().sqrt()
}

fn grid_bracket(values: &BTreeSet<OrderedFloat<f64>>, q: f64) -> Option<(f64, f64)> {
    let q = OrderedFloat(q);
    let lo = values.range(..=q).next_back()?;
    let hi = values.range(q..).next()?;
    Some((lo.into_inner(), hi.into_inner()))
}

/// Blend between a bracketing pair. `t = 0` yields `y1` and `t = 1` yields
/// `y2` exactly in both modes; the cubic smoothstep additionally has zero
/// slope at both ends.
fn blend(x1: f64, y1: f64, x2: f64, y2: f64, x: f64, cubic: bool) -> f64 {
    if x1 == x2 {
        return y1;
    }
    let t = (x - x1) / (x2 - x1);
    if cubic {
        let t2 = t * t;
        let t3 = t2 * t;
        y1 * (2.0 * t3 - 3.0 * t2 + 1.0) + y2 * (-2.0 * t3 + 3.0 * t2)
    } else {
        y1 + (y2 - y1) * t
    }
}

/// Evaluate a sorted polyline at `x` (assumed within its range). Shared
/// with curve sampling in the `group` module.
pub(crate) fn eval_polyline(xs: &[f64], ys: &[f64], x: f64, cubic: bool) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if x <= xs[0] {
        return ys[0];
    }
    for i in 1..xs.len() {
        if x <= xs[i] {
            return blend(xs[i - 1], ys[i - 1], xs[i], ys[i], x, cubic);
        }
    }
    ys[ys.len() - 1]
}
