//! PPEPost: CLM perturbed-parameter-ensemble post-processing
//!
//! A Rust library for post-processing monthly NetCDF output of large CLM
//! perturbed-parameter ensembles. PPEPost loads history variables and
//! per-gridcell land-area weights into labeled arrays, corrects the known
//! monthly time-axis decoding defect, and computes area-weighted and
//! day-weighted averages using parallel processing. Heavy runs can request
//! a pool of batch workers from the site's PBS scheduler.
//!
//! ## Key Features
//!
//! - **Labeled Arrays**: Named dimensions with typed coordinates (noleap
//!   timestamps, gridcell identifiers)
//! - **Time Axis Correction**: Rebuilds mis-decoded monthly axes in the
//!   model's 365-day calendar
//! - **Weighted Averaging**: Land-area-weighted spatial means and
//!   days-in-month-weighted annual means, parallelized with Rayon
//! - **Batch Cluster Support**: Worker pool provisioning through an external
//!   PBS scheduler behind an async interface
//! - **NetCDF I/O**: Coordinate-aware loading and result writing
//!
//! ## Module Organization
//!
//! - [`array`]: Labeled array and land-area weight types
//! - [`calendar`]: Noleap calendar dates and monthly axis generation
//! - [`time_axis`]: Monthly time axis correction
//! - [`weighting`]: Area-weighted and day-weighted reductions
//! - [`netcdf_io`]: NetCDF loading, the dataset catalog, and result writing
//! - [`cluster`]: Batch worker pool provisioning
//! - [`parallel`]: Reduction thread pool configuration
//! - [`metadata`]: File and array inspection
//! - [`errors`]: Centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ppe_post::prelude::*;
//!
//! // Resolve the shared helper datasets (nothing is opened yet)
//! let catalog = DataCatalog::default();
//! let landarea = catalog.load_landarea().unwrap();
//! let sample = catalog.load_sample().unwrap();
//!
//! // Correct the monthly time axis, then average
//! let sample = fix_time(sample).unwrap();
//! let spatial = weight_landarea_gridcells(&sample, &landarea).unwrap();
//! let annual = yearly_weighted_average(&spatial).unwrap();
//! ```
//!
//! The library holds no global state; datasets are loaded on demand and all
//! results are plain values owned by the caller.

// Core modules
pub mod array;
pub mod calendar;
pub mod cli;
pub mod cluster;
pub mod errors;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod time_axis;
pub mod weighting;

// Direct re-exports for the public API
pub use array::*;
pub use calendar::*;
pub use cluster::*;
pub use errors::*;
pub use metadata::*;
pub use netcdf_io::*;
pub use parallel::*;
pub use time_axis::*;
pub use weighting::*;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::array::{
        CoordinateValues, DataArray, LandArea, GRIDCELL_DIM, TIME_DIM,
    };
    pub use crate::calendar::{days_in_month, monthly_range, NoLeapDate};
    pub use crate::cluster::{
        get_cluster, ClusterClient, ClusterConfig, ClusterProvisioner, PbsScheduler, WorkerState,
    };
    pub use crate::errors::{PpePostError, Result};
    pub use crate::netcdf_io::{
        load_data_array, load_landarea, open_dataset, write_data_array, DataCatalog, NetCDFWriter,
    };
    pub use crate::parallel::ParallelConfig;
    pub use crate::time_axis::fix_time;
    pub use crate::weighting::{
        weight_landarea_gridcells, yearly_weighted_average, YEAR_DIM,
    };
}
