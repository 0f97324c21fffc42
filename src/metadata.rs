//! File and array inspection
//!
//! Helpers for examining NetCDF file structure and for printing quick
//! summaries of loaded arrays before or after processing.

use crate::array::{CoordinateValues, DataArray};
use crate::errors::Result;
use netcdf::File;

/// Prints global attributes, dimensions, and variables of a NetCDF file.
pub fn print_metadata(file: &File) -> Result<()> {
    println!("\n===== Global Attributes =====");
    for attr in file.attributes() {
        println!("- {}: {:?}", attr.name(), attr.value()?);
    }

    println!("\n===== Dimensions =====");
    for dim in file.dimensions() {
        println!("- {} = {}", dim.name(), dim.len());
    }

    println!("\n===== Variables =====");
    for var in file.variables() {
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| format!("{}[{}]", d.name(), d.len()))
            .collect();
        println!("- {} ({})", var.name(), dims.join(", "));
    }

    Ok(())
}

/// Prints the dimensions, coordinate ranges, and attribute count of an array.
pub fn describe_data_array(da: &DataArray) {
    let dims: Vec<String> = da
        .dims()
        .iter()
        .zip(da.shape())
        .map(|(name, len)| format!("{}[{}]", name, len))
        .collect();
    println!("\n Array: {}", da.name());
    println!("================================");
    println!("   Dimensions: ({})", dims.join(" × "));

    for dim in da.dims() {
        match da.coord(dim) {
            Some(CoordinateValues::Time(dates)) => {
                if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
                    println!("   {}: {} .. {} ({} samples)", dim, first, last, dates.len());
                } else {
                    println!("   {}: (empty)", dim);
                }
            }
            Some(CoordinateValues::Index(ids)) => {
                if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
                    println!("   {}: {} .. {} ({} labels)", dim, first, last, ids.len());
                } else {
                    println!("   {}: (empty)", dim);
                }
            }
            Some(CoordinateValues::Numeric(values)) => {
                println!("   {}: {} numeric labels", dim, values.len());
            }
            None => println!("   {}: (no coordinate)", dim),
        }
    }
    println!("   Attributes: {}", da.attributes().len());
}

/// Prints quick statistics (min/mean/max) over the finite values of an array.
pub fn summarize_data_array(da: &DataArray) {
    let valid: Vec<f64> = da.data().iter().copied().filter(|v| v.is_finite()).collect();

    println!("\n Summary for: {}", da.name());
    println!("================================");
    if valid.is_empty() {
        println!("   (no finite values)");
        return;
    }

    let min = valid.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = valid.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean: f64 = valid.iter().sum::<f64>() / valid.len() as f64;

    println!("   Min: {}", min);
    println!("   Max: {}", max);
    println!("   Mean: {:.4}", mean);
    println!(
        "   Valid elements: {} / {}",
        valid.len(),
        da.data().len()
    );
}
