//! Labeled array types for gridded model output
//!
//! A [`DataArray`] couples an n-dimensional value array with named
//! dimensions, optional per-dimension coordinate labels, and free-form
//! attributes, mirroring how history variables are laid out on disk.
//! [`LandArea`] is the validated 1-D weight vector used for area-weighted
//! spatial means.

use crate::calendar::NoLeapDate;
use crate::errors::{PpePostError, Result};
use ndarray::{Array1, ArrayD};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Canonical name of the time dimension in history output
pub const TIME_DIM: &str = "time";

/// Canonical name of the sparse-grid spatial dimension
pub const GRIDCELL_DIM: &str = "gridcell";

/// Coordinate labels attached to one dimension
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateValues {
    /// Calendar timestamps (noleap), one per sample
    Time(Vec<NoLeapDate>),
    /// Opaque integer identifiers (gridcell ids, years)
    Index(Vec<i64>),
    /// Plain numeric labels (levels, latitudes, ...)
    Numeric(Vec<f64>),
}

impl CoordinateValues {
    pub fn len(&self) -> usize {
        match self {
            CoordinateValues::Time(v) => v.len(),
            CoordinateValues::Index(v) => v.len(),
            CoordinateValues::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An n-dimensional variable with named, labeled axes.
#[derive(Debug, Clone)]
pub struct DataArray {
    name: String,
    data: ArrayD<f64>,
    dims: Vec<String>,
    coords: HashMap<String, CoordinateValues>,
    attributes: HashMap<String, JsonValue>,
}

impl DataArray {
    /// Create an array from values and dimension names.
    ///
    /// The number of dimension names must match the array rank.
    pub fn new(name: &str, data: ArrayD<f64>, dims: Vec<String>) -> Result<Self> {
        if dims.len() != data.ndim() {
            return Err(PpePostError::Generic(format!(
                "Array '{}' has {} dimensions but {} dimension names were given",
                name,
                data.ndim(),
                dims.len()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            data,
            dims,
            coords: HashMap::new(),
            attributes: HashMap::new(),
        })
    }

    /// Attach coordinate labels to a dimension (builder style).
    pub fn with_coord(mut self, dim: &str, coord: CoordinateValues) -> Result<Self> {
        self.set_coord(dim, coord)?;
        Ok(self)
    }

    /// Attach coordinate labels to a dimension.
    pub fn set_coord(&mut self, dim: &str, coord: CoordinateValues) -> Result<()> {
        let expected = self.len_of(dim)?;
        if coord.len() != expected {
            return Err(PpePostError::CoordinateMismatch {
                dim: dim.to_string(),
                expected,
                actual: coord.len(),
            });
        }
        self.coords.insert(dim.to_string(), coord);
        Ok(())
    }

    /// Attach a free-form attribute (builder style).
    pub fn with_attribute(mut self, key: &str, value: JsonValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn attributes(&self) -> &HashMap<String, JsonValue> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&JsonValue> {
        self.attributes.get(key)
    }

    /// Coordinate labels for a dimension, if any were attached.
    pub fn coord(&self, dim: &str) -> Option<&CoordinateValues> {
        self.coords.get(dim)
    }

    /// Axis position of a named dimension.
    pub fn axis_of(&self, dim: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| PpePostError::DimensionNotFound {
                var: self.name.clone(),
                dim: dim.to_string(),
            })
    }

    /// Length of a named dimension.
    pub fn len_of(&self, dim: &str) -> Result<usize> {
        let axis = self.axis_of(dim)?;
        Ok(self.data.shape()[axis])
    }

    /// The decoded time coordinate, required by the time-aware operations.
    pub fn time_coord(&self) -> Result<&[NoLeapDate]> {
        match self.coords.get(TIME_DIM) {
            Some(CoordinateValues::Time(values)) => Ok(values),
            Some(_) => Err(PpePostError::TimeDecodeError(format!(
                "'{}' coordinate of '{}' is not a decoded calendar axis",
                TIME_DIM, self.name
            ))),
            None => Err(PpePostError::TimeDecodeError(format!(
                "array '{}' has no '{}' coordinate",
                self.name, TIME_DIM
            ))),
        }
    }

    /// Replace the time coordinate with a new set of timestamps.
    pub fn set_time_coord(&mut self, values: Vec<NoLeapDate>) -> Result<()> {
        self.set_coord(TIME_DIM, CoordinateValues::Time(values))
    }

    /// Integer identifier labels for a dimension, if attached.
    pub fn index_coord(&self, dim: &str) -> Option<&[i64]> {
        match self.coords.get(dim) {
            Some(CoordinateValues::Index(values)) => Some(values),
            _ => None,
        }
    }
}

/// Per-gridcell land surface areas used as spatial averaging weights.
///
/// One weight per gridcell; every weight is finite and non-negative.
#[derive(Debug, Clone)]
pub struct LandArea {
    areas: Array1<f64>,
    gridcells: Vec<i64>,
}

impl LandArea {
    /// Build a weight vector, validating the weight invariants.
    pub fn new(areas: Array1<f64>, gridcells: Vec<i64>) -> Result<Self> {
        if areas.len() != gridcells.len() {
            return Err(PpePostError::WeightError(format!(
                "{} areas for {} gridcells",
                areas.len(),
                gridcells.len()
            )));
        }
        if let Some(bad) = areas.iter().find(|a| !a.is_finite() || **a < 0.0) {
            return Err(PpePostError::WeightError(format!(
                "area weights must be finite and non-negative, found {}",
                bad
            )));
        }
        Ok(Self { areas, gridcells })
    }

    /// Extract the weight vector from a loaded 1-D `landarea` variable.
    ///
    /// Gridcells without explicit identifier labels get sequential ids.
    pub fn from_data_array(da: &DataArray) -> Result<Self> {
        let axis = da.axis_of(GRIDCELL_DIM)?;
        if da.data().ndim() != 1 {
            return Err(PpePostError::WeightError(format!(
                "land-area variable '{}' must be 1-D over '{}', got {} dimensions",
                da.name(),
                GRIDCELL_DIM,
                da.data().ndim()
            )));
        }
        let n = da.shape()[axis];
        let gridcells = match da.index_coord(GRIDCELL_DIM) {
            Some(ids) => ids.to_vec(),
            None => (0..n as i64).collect(),
        };
        let areas = Array1::from_iter(da.data().iter().copied());
        Self::new(areas, gridcells)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn areas(&self) -> &Array1<f64> {
        &self.areas
    }

    pub fn gridcells(&self) -> &[i64] {
        &self.gridcells
    }
}
