//! Weighted averaging over labeled dimensions
//!
//! This module provides the two weighted reductions used in PPE
//! post-processing: land-area-weighted spatial means over the sparse grid,
//! and days-in-month-weighted annual means over a monthly time axis. Both
//! run the reduction kernel in parallel with Rayon.

use crate::array::{CoordinateValues, DataArray, LandArea, GRIDCELL_DIM, TIME_DIM};
use crate::errors::{PpePostError, Result};
use ndarray::{ArrayD, Axis};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Name given to the annual dimension produced by [`yearly_weighted_average`]
pub const YEAR_DIM: &str = "year";

/// Weighted mean along `axis`, restricted to the `(index, weight)` entries.
///
/// For every remaining coordinate the kernel computes
/// `sum(value * weight) / sum(weight)` over the listed axis positions.
/// Non-finite values are excluded together with their weights; a cell with
/// no contributing values becomes NaN.
fn weighted_mean_axis_subset(
    data: &ArrayD<f64>,
    axis: usize,
    entries: &[(usize, f64)],
) -> Result<ArrayD<f64>> {
    if axis >= data.ndim() {
        return Err(PpePostError::Generic(format!(
            "Axis {} is out of bounds for array with {} dimensions",
            axis,
            data.ndim()
        )));
    }

    let original_shape = data.shape().to_vec();
    let mut new_shape = original_shape.clone();
    new_shape.remove(axis);
    let output_size: usize = new_shape.iter().product();

    let result: Vec<f64> = (0..output_size)
        .into_par_iter()
        .map(|flat_idx| {
            // Convert flat output index back to multi-dimensional coordinates,
            // skipping the axis being reduced
            let mut coords = vec![0; original_shape.len()];
            let mut remaining = flat_idx;
            let mut coord_idx = 0;
            for dim_idx in 0..original_shape.len() {
                if dim_idx != axis {
                    let stride: usize = new_shape[coord_idx + 1..].iter().product();
                    coords[dim_idx] = remaining / stride;
                    remaining %= stride;
                    coord_idx += 1;
                }
            }

            let mut weighted_sum = 0.0f64;
            let mut weight_total = 0.0f64;
            for &(idx, weight) in entries {
                coords[axis] = idx;
                if let Some(&value) = data.get(coords.as_slice()) {
                    if value.is_finite() {
                        weighted_sum += value * weight;
                        weight_total += weight;
                    }
                }
            }

            if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(ArrayD::from_shape_vec(new_shape, result)?)
}

/// Land-area-weighted mean over the `gridcell` dimension.
///
/// For every remaining coordinate (each time step, level, ...) computes the
/// weighted mean `sum(value_i * area_i) / sum(area_i)` over gridcells. The
/// weight vector must cover exactly the array's gridcells; when both carry
/// explicit gridcell identifiers the identifier sets must match.
pub fn weight_landarea_gridcells(da: &DataArray, landarea: &LandArea) -> Result<DataArray> {
    let axis = da.axis_of(GRIDCELL_DIM)?;
    let n_cells = da.shape()[axis];

    if landarea.len() != n_cells {
        return Err(PpePostError::WeightError(format!(
            "array '{}' has {} gridcells but {} area weights were supplied",
            da.name(),
            n_cells,
            landarea.len()
        )));
    }
    if let Some(ids) = da.index_coord(GRIDCELL_DIM) {
        if ids != landarea.gridcells() {
            return Err(PpePostError::WeightError(format!(
                "gridcell identifiers of '{}' do not match the land-area weights",
                da.name()
            )));
        }
    }

    println!(
        "⚡ Computing land-area-weighted mean over '{}' across {} CPU cores",
        GRIDCELL_DIM,
        rayon::current_num_threads()
    );

    let entries: Vec<(usize, f64)> = landarea.areas().iter().copied().enumerate().collect();
    let result = weighted_mean_axis_subset(da.data(), axis, &entries)?;

    let kept_dims: Vec<String> = da
        .dims()
        .iter()
        .filter(|d| d.as_str() != GRIDCELL_DIM)
        .cloned()
        .collect();

    let new_name = format!("{}_weighted_mean_over_{}", da.name(), GRIDCELL_DIM);
    let mut out = DataArray::new(&new_name, result, kept_dims)?;
    for dim in da.dims() {
        if dim != GRIDCELL_DIM {
            if let Some(coord) = da.coord(dim) {
                out.set_coord(dim, coord.clone())?;
            }
        }
    }
    for (key, value) in da.attributes() {
        out = out.with_attribute(key, value.clone());
    }
    Ok(out)
}

/// Days-in-month-weighted annual mean over a monthly `time` axis.
///
/// For each calendar year present, computes
/// `sum_m(value_m * days_in_month_m) / sum_m(days_in_month_m)` for every
/// remaining coordinate. The `time` dimension is replaced by a `year`
/// dimension labeled with the (sorted) calendar years. Years with missing
/// months are averaged over the months present.
pub fn yearly_weighted_average(da: &DataArray) -> Result<DataArray> {
    let axis = da.axis_of(TIME_DIM)?;
    let times = da.time_coord()?.to_vec();

    // Group time indices by calendar year, weighting each month by its
    // noleap length
    let mut groups: BTreeMap<i32, Vec<(usize, f64)>> = BTreeMap::new();
    for (idx, date) in times.iter().enumerate() {
        groups
            .entry(date.year())
            .or_default()
            .push((idx, date.days_in_month() as f64));
    }

    let new_name = format!("{}_annual_mean", da.name());
    let mut new_dims = da.dims().to_vec();
    new_dims[axis] = YEAR_DIM.to_string();

    if groups.is_empty() {
        // Empty time axis: keep the remaining dimensions, zero-length years
        let mut empty_shape = da.shape().to_vec();
        empty_shape[axis] = 0;
        let empty = ArrayD::from_shape_vec(empty_shape, Vec::new())?;
        let mut out = DataArray::new(&new_name, empty, new_dims)?;
        out.set_coord(YEAR_DIM, CoordinateValues::Index(Vec::new()))?;
        return Ok(out);
    }

    println!(
        "⚡ Computing day-weighted annual means for {} year(s) across {} CPU cores",
        groups.len(),
        rayon::current_num_threads()
    );

    let mut annual = Vec::with_capacity(groups.len());
    for entries in groups.values() {
        annual.push(weighted_mean_axis_subset(da.data(), axis, entries)?);
    }

    let views: Vec<_> = annual.iter().map(|a| a.view()).collect();
    let stacked = ndarray::stack(Axis(axis), &views)?;

    let mut out = DataArray::new(&new_name, stacked, new_dims)?;
    let years: Vec<i64> = groups.keys().map(|&y| y as i64).collect();
    out.set_coord(YEAR_DIM, CoordinateValues::Index(years))?;
    for dim in da.dims() {
        if dim != TIME_DIM {
            if let Some(coord) = da.coord(dim) {
                out.set_coord(dim, coord.clone())?;
            }
        }
    }
    for (key, value) in da.attributes() {
        out = out.with_attribute(key, value.clone());
    }
    Ok(out)
}
