//! NetCDF I/O: loading history variables into labeled arrays and writing
//! computed results back out
//!
//! Loading decodes dimension coordinates as it goes: the `time` dimension is
//! decoded from its `units = "days since <date>"` attribute in the noleap
//! calendar, the `gridcell` dimension becomes integer identifiers, and any
//! other coordinate is kept as plain numeric labels. `_FillValue` sentinels
//! are replaced with NaN so the reduction kernels skip them.

use crate::array::{CoordinateValues, DataArray, LandArea, GRIDCELL_DIM, TIME_DIM};
use crate::calendar::NoLeapDate;
use crate::errors::{PpePostError, Result};
use chrono::Utc;
use ndarray::{Array1, ArrayD};
use netcdf::{create, AttributeValue, File};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

/// Sparse-grid land areas shipped with the PPE helper data
pub const LANDAREA_FILE: &str =
    "/glade/campaign/cgd/tss/projects/PPE/helpers/sparsegrid_landarea.nc";

/// Control-run monthly history file used as the sample dataset
pub const SAMPLE_HIST_FILE: &str = "/glade/campaign/cgd/tss/projects/PPE/PPEn11_OAAT/CTL2010/hist/PPEn11_CTL2010_OAAT0000.clm2.h0.2005-02-01-00000.nc";

/// Variable holding the per-gridcell land areas
pub const LANDAREA_VAR: &str = "landarea";

/// Default sample variable (leaf nitrogen concentration)
pub const SAMPLE_VAR: &str = "LNC";

/// Open a NetCDF dataset for reading.
pub fn open_dataset<P: AsRef<Path>>(path: P) -> Result<File> {
    Ok(netcdf::open(path)?)
}

/// Paths to the shared helper datasets, resolved lazily.
///
/// Nothing is opened until one of the load methods is called, so importing
/// the crate never touches the filesystem.
#[derive(Debug, Clone)]
pub struct DataCatalog {
    landarea_path: PathBuf,
    sample_path: PathBuf,
    sample_variable: String,
}

impl Default for DataCatalog {
    fn default() -> Self {
        Self {
            landarea_path: PathBuf::from(LANDAREA_FILE),
            sample_path: PathBuf::from(SAMPLE_HIST_FILE),
            sample_variable: SAMPLE_VAR.to_string(),
        }
    }
}

impl DataCatalog {
    /// Catalog with explicit paths instead of the campaign-store defaults.
    pub fn new<P: AsRef<Path>>(landarea_path: P, sample_path: P, sample_variable: &str) -> Self {
        Self {
            landarea_path: landarea_path.as_ref().to_path_buf(),
            sample_path: sample_path.as_ref().to_path_buf(),
            sample_variable: sample_variable.to_string(),
        }
    }

    pub fn landarea_path(&self) -> &Path {
        &self.landarea_path
    }

    pub fn sample_path(&self) -> &Path {
        &self.sample_path
    }

    /// Load the per-gridcell land-area weights.
    pub fn load_landarea(&self) -> Result<LandArea> {
        let file = open_dataset(&self.landarea_path)?;
        load_landarea(&file)
    }

    /// Load the sample history variable.
    pub fn load_sample(&self) -> Result<DataArray> {
        let file = open_dataset(&self.sample_path)?;
        load_data_array(&file, &self.sample_variable)
    }
}

/// Read a variable and its dimension coordinates into a [`DataArray`].
pub fn load_data_array(file: &File, var_name: &str) -> Result<DataArray> {
    let var = file
        .variable(var_name)
        .ok_or_else(|| PpePostError::VariableNotFound {
            var: var_name.to_string(),
        })?;

    let dim_names: Vec<String> = var
        .dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let mut data_vec = var.get_values::<f64, _>(..)?;

    // Replace fill sentinels with NaN so reductions skip them
    let fill_value = var
        .attribute("_FillValue")
        .and_then(|attr| match attr.value().ok()? {
            AttributeValue::Float(v) => Some(v as f64),
            AttributeValue::Double(v) => Some(v),
            AttributeValue::Short(v) => Some(v as f64),
            _ => None,
        });
    if let Some(fill) = fill_value {
        for value in &mut data_vec {
            if *value == fill {
                *value = f64::NAN;
            }
        }
    }

    let data = ArrayD::from_shape_vec(shape, data_vec)?;
    let mut da = DataArray::new(var_name, data, dim_names.clone())?;

    for dim_name in &dim_names {
        if let Some(coord_var) = file.variable(dim_name) {
            let coord = decode_coordinate(dim_name, &coord_var)?;
            da.set_coord(dim_name, coord)?;
        }
    }

    for attr in var.attributes().filter(|a| a.name() != "_FillValue") {
        if let Some(value) = attribute_to_json(attr.value()?) {
            da = da.with_attribute(attr.name(), value);
        }
    }

    Ok(da)
}

/// Load and validate the 1-D land-area weight variable.
pub fn load_landarea(file: &File) -> Result<LandArea> {
    let da = load_data_array(file, LANDAREA_VAR)?;
    LandArea::from_data_array(&da)
}

fn decode_coordinate(dim_name: &str, coord_var: &netcdf::Variable) -> Result<CoordinateValues> {
    let raw = coord_var.get_values::<f64, _>(..)?;
    match dim_name {
        TIME_DIM => {
            let epoch = parse_time_units(coord_var)?;
            let dates = raw
                .into_iter()
                .map(|days| NoLeapDate::from_days_since(epoch, days.floor() as i64))
                .collect();
            Ok(CoordinateValues::Time(dates))
        }
        GRIDCELL_DIM => Ok(CoordinateValues::Index(
            raw.into_iter().map(|v| v as i64).collect(),
        )),
        _ => Ok(CoordinateValues::Numeric(raw)),
    }
}

/// Parse the epoch out of a time coordinate's `units` attribute.
///
/// Expects the CF form `days since YYYY-MM-DD [hh:mm:ss]`. A `calendar`
/// attribute, if present, must name the noleap calendar.
fn parse_time_units(coord_var: &netcdf::Variable) -> Result<NoLeapDate> {
    if let Some(attr) = coord_var.attribute("calendar") {
        if let AttributeValue::Str(calendar) = attr.value()? {
            if calendar != "noleap" && calendar != "365_day" {
                return Err(PpePostError::TimeDecodeError(format!(
                    "unsupported calendar '{}', expected noleap",
                    calendar
                )));
            }
        }
    }

    let units = coord_var
        .attribute("units")
        .and_then(|attr| match attr.value().ok()? {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        })
        .ok_or_else(|| {
            PpePostError::TimeDecodeError("time coordinate has no 'units' attribute".to_string())
        })?;

    let tokens: Vec<&str> = units.split_whitespace().collect();
    if tokens.len() < 3 || tokens[0] != "days" || tokens[1] != "since" {
        return Err(PpePostError::TimeDecodeError(format!(
            "unsupported time units '{}', expected 'days since <date>'",
            units
        )));
    }

    let parts: Vec<&str> = tokens[2].split('-').collect();
    if parts.len() != 3 {
        return Err(PpePostError::TimeDecodeError(format!(
            "malformed epoch date '{}' in time units",
            tokens[2]
        )));
    }
    let year = parts[0].parse::<i32>();
    let month = parts[1].parse::<u32>();
    let day = parts[2].parse::<u32>();
    match (year, month, day) {
        (Ok(y), Ok(m), Ok(d)) => NoLeapDate::new(y, m, d),
        _ => Err(PpePostError::TimeDecodeError(format!(
            "malformed epoch date '{}' in time units",
            tokens[2]
        ))),
    }
}

fn attribute_to_json(value: AttributeValue) -> Option<JsonValue> {
    match value {
        AttributeValue::Str(s) => Some(JsonValue::String(s)),
        AttributeValue::Float(v) => serde_json::Number::from_f64(v as f64).map(JsonValue::Number),
        AttributeValue::Double(v) => serde_json::Number::from_f64(v).map(JsonValue::Number),
        AttributeValue::Int(v) => Some(JsonValue::from(v)),
        AttributeValue::Short(v) => Some(JsonValue::from(v)),
        _ => None,
    }
}

/// Unified NetCDF writer for computed results
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    /// Create a new NetCDF writer
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Write a labeled array, its coordinates, and its attributes to a new
    /// NetCDF file.
    pub fn write_result(&self, da: &DataArray) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;

        // Define dimensions
        for (dim_name, &dim_len) in da.dims().iter().zip(da.shape()) {
            file.add_dimension(dim_name, dim_len)?;
        }

        // Coordinate variables
        for dim_name in da.dims() {
            match da.coord(dim_name) {
                Some(CoordinateValues::Time(dates)) => {
                    let epoch = dates
                        .first()
                        .copied()
                        .unwrap_or(NoLeapDate::new(1, 1, 1)?);
                    let encoded: Vec<f64> = dates
                        .iter()
                        .map(|d| d.days_since(epoch) as f64)
                        .collect();
                    let mut coord_var =
                        file.add_variable::<f64>(dim_name, &[dim_name.as_str()])?;
                    coord_var.put_attribute("units", format!("days since {}", epoch))?;
                    coord_var.put_attribute("calendar", "noleap")?;
                    coord_var.put(Array1::from_vec(encoded).view(), ..)?;
                }
                Some(CoordinateValues::Index(ids)) => {
                    let mut coord_var =
                        file.add_variable::<i64>(dim_name, &[dim_name.as_str()])?;
                    coord_var.put(Array1::from_vec(ids.clone()).view(), ..)?;
                }
                Some(CoordinateValues::Numeric(values)) => {
                    let mut coord_var =
                        file.add_variable::<f64>(dim_name, &[dim_name.as_str()])?;
                    coord_var.put(Array1::from_vec(values.clone()).view(), ..)?;
                }
                None => {}
            }
        }

        let dim_refs: Vec<&str> = da.dims().iter().map(|s| s.as_str()).collect();
        let mut new_var = file.add_variable::<f64>(da.name(), &dim_refs)?;
        new_var.put(da.data().view(), ..)?;

        for (key, value) in da.attributes() {
            match value {
                JsonValue::String(s) => new_var.put_attribute(key, s.as_str())?,
                JsonValue::Number(n) => {
                    if let Some(v) = n.as_f64() {
                        new_var.put_attribute(key, v)?
                    } else {
                        continue;
                    }
                }
                _ => continue,
            };
        }

        // Add history attribute
        file.add_attribute(
            "history",
            format!("Created by PPEPost on {}", Utc::now().to_rfc3339()),
        )?;

        Ok(())
    }
}

/// Write a labeled array to a new NetCDF file at `output_path`.
pub fn write_data_array(da: &DataArray, output_path: &Path) -> Result<()> {
    let writer = NetCDFWriter::new(output_path);
    writer.write_result(da)
}
