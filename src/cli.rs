//! Defines command-line interface options using `clap` for the PPEPost application.

use clap::Parser;
use std::path::PathBuf;

/// A CLI tool for post-processing CLM PPE history output
#[derive(Parser, Debug)]
#[command(
    version,
    name = "PPEPost",
    about = "App for post-processing CLM PPE NetCDF output"
)]
pub struct Args {
    /// Path to the monthly history NetCDF file
    #[arg(short, long)]
    pub file: PathBuf,

    /// History variable to process
    #[arg(short = 'V', long, default_value = "LNC")]
    pub variable: String,

    /// Path to the sparse-grid land-area NetCDF file. Defaults to the
    /// campaign-store helper file.
    #[arg(long)]
    pub landarea: Option<PathBuf>,

    /// Rebuild the monthly time axis before averaging
    #[arg(long, default_value_t = false)]
    pub fix_time: bool,

    /// Compute the land-area-weighted mean over gridcells
    #[arg(long, default_value_t = false)]
    pub area_mean: bool,

    /// Compute day-weighted annual means over the time axis
    #[arg(long, default_value_t = false)]
    pub annual_mean: bool,

    /// Path to save the result as NetCDF. If not set, prints to terminal.
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// Number of threads to use for parallel reductions. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// List all variables and dimensions in the NetCDF file and exit
    #[arg(long)]
    pub list_vars: bool,

    /// Print quick statistics (min/mean/max) of the processed variable
    #[arg(long, default_value_t = false)]
    pub summary: bool,

    /// Project account for spinning up a batch worker pool
    #[arg(long)]
    pub account: Option<String>,

    /// Number of batch workers to request. Defaults to 30.
    #[arg(long)]
    pub workers: Option<usize>,
}
