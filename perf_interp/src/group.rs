//! Curve grouping: partitions the point store into ordered sequences
//! sharing a discrete grouping-axis value (e.g. one curve per
//! pressure-altitude band). Purely a view over the store; used by the
//! pairwise methods' curve boundaries, by chart legends, and by
//! densification of derived points.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::{interp, Method, PerfError, PerformanceModel, ReferencePoint};

fn require_axes(
    model: &PerformanceModel,
    group_axis: &str,
    along_axis: &str,
) -> Result<(), PerfError> {
    for axis in [group_axis, along_axis] {
        if model.space.axis(axis).is_none() {
            return Err(PerfError::Configuration(format!(
                "unknown axis {}",
                axis
            )));
        }
    }
    if group_axis == along_axis {
        return Err(PerfError::Configuration(format!(
            "group axis and along axis must differ (both are {})",
            group_axis
        )));
    }
    Ok(())
}

/// Map each distinct `group_axis` value to its points, each subsequence
/// sorted ascending by `along_axis`. Points with equal along-values keep
/// their insertion order (stable sort). Does not mutate the store.
pub fn group_by(
    model: &PerformanceModel,
    group_axis: &str,
    along_axis: &str,
) -> Result<BTreeMap<OrderedFloat<f64>, Vec<ReferencePoint>>, PerfError> {
    require_axes(model, group_axis, along_axis)?;
    model.ensure_coords()?;

    let mut groups: BTreeMap<OrderedFloat<f64>, Vec<ReferencePoint>> = BTreeMap::new();
    for point in model.points() {
        groups
            .entry(OrderedFloat(point.values[group_axis]))
            .or_default()
            .push(point.clone());
    }
    for sequence in groups.values_mut() {
        sequence.sort_by(|a, b| {
            a.values[along_axis]
                .partial_cmp(&b.values[along_axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    Ok(groups)
}

/// Sample one curve group as a dense polyline across its along-axis range,
/// using the model's pairwise blend (cubic for `Cubic` models, linear
/// otherwise). Feeds chart overlays and `densify`.
pub fn sample_curve(
    model: &PerformanceModel,
    group_axis: &str,
    group_value: f64,
    along_axis: &str,
    output: &str,
    steps: usize,
) -> Result<Vec<(f64, f64)>, PerfError> {
    require_axes(model, group_axis, along_axis)?;
    if !model.space.has_output(output) {
        return Err(PerfError::Configuration(format!(
            "model declares no output named {}",
            output
        )));
    }
    if steps < 2 {
        return Err(PerfError::Configuration(
            "curve sampling requires at least 2 steps".into(),
        ));
    }
    model.ensure_coords()?;

    let mut sequence: Vec<&ReferencePoint> = model
        .points()
        .iter()
        .filter(|p| p.values[group_axis] == group_value)
        .collect();
    sequence.sort_by(|a, b| {
        a.values[along_axis]
            .partial_cmp(&b.values[along_axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if sequence.len() < 2 {
        return Err(PerfError::InsufficientData);
    }

    let xs: Vec<f64> = sequence.iter().map(|p| p.values[along_axis]).collect();
    let ys: Vec<f64> = sequence.iter().map(|p| p.outputs[output]).collect();
    let (x_min, x_max) = (xs[0], xs[xs.len() - 1]);
    if x_min == x_max {
        return Err(PerfError::InsufficientData);
    }

    let cubic = matches!(model.method, Method::Cubic { .. });
    let mut samples = Vec::with_capacity(steps);
    for i in 0..steps {
        let x = x_min + (x_max - x_min) * i as f64 / (steps - 1) as f64;
        samples.push((x, interp::eval_polyline(&xs, &ys, x, cubic)));
    }
    Ok(samples)
}

/// Regenerate the model's derived points: drop all `is_interpolated`
/// points, then sample every curve group at `steps` evenly spaced
/// along-axis positions. Groups with fewer than 2 points are skipped.
///
/// Fails if a group varies on any axis other than the two named ones; a
/// curve must be one-dimensional for its samples to have well-defined
/// coordinates.
pub fn densify(
    model: &mut PerformanceModel,
    group_axis: &str,
    along_axis: &str,
    steps: usize,
) -> Result<usize, PerfError> {
    require_axes(model, group_axis, along_axis)?;
    if steps < 2 {
        return Err(PerfError::Configuration(
            "densify requires at least 2 steps".into(),
        ));
    }
    model.ensure_coords()?;
    model.clear_interpolated();

    let groups = group_by(model, group_axis, along_axis)?;
    let cubic = matches!(model.method, Method::Cubic { .. });
    let mut generated = Vec::new();

    for sequence in groups.values() {
        if sequence.len() < 2 {
            continue;
        }
        for axis in &model.space.axes {
            if axis.name == group_axis || axis.name == along_axis {
                continue;
            }
            let first = sequence[0].values[axis.name.as_str()];
            if sequence
                .iter()
                .any(|p| p.values[axis.name.as_str()] != first)
            {
                return Err(PerfError::Validation(format!(
                    "curve group {}={} varies on axis {}; cannot densify",
                    group_axis, sequence[0].values[group_axis], axis.name
                )));
            }
        }

        let xs: Vec<f64> = sequence.iter().map(|p| p.values[along_axis]).collect();
        let (x_min, x_max) = (xs[0], xs[xs.len() - 1]);
        if x_min == x_max {
            continue;
        }

        for i in 0..steps {
            let x = x_min + (x_max - x_min) * i as f64 / (steps - 1) as f64;
            let mut values = sequence[0].values.clone();
            values.insert(along_axis.to_string(), x);
            let mut outputs = BTreeMap::new();
            for output in &model.space.outputs {
                let ys: Vec<f64> = sequence
                    .iter()
                    .map(|p| p.outputs[output.as_str()])
                    .collect();
                outputs.insert(output.clone(), interp::eval_polyline(&xs, &ys, x, cubic));
            }
            generated.push((values, outputs));
        }
    }

    let count = generated.len();
    for (values, outputs) in generated {
        model.add_interpolated_point(values, outputs)?;
    }
    Ok(count)
}
