//! Monthly time axis correction
//!
//! Monthly CLM history files stamp each sample with the first instant of the
//! *following* month, so a naively decoded time axis is shifted by one month
//! and starts in the wrong position within the year. The fix rebuilds the
//! axis from scratch: keep the first sample's year, then regenerate month
//! starts in the noleap calendar for the full length of the axis.

use crate::array::{DataArray, TIME_DIM};
use crate::calendar::monthly_range;
use crate::errors::Result;

/// Replace a mis-decoded monthly time axis with regenerated month starts.
///
/// Reads the year of the first time label and rebuilds the coordinate as
/// consecutive noleap month starts of the same length, beginning at January
/// of that year. Values are untouched; only the time coordinate changes.
///
/// A zero-length time axis regenerates an empty coordinate. Applying the fix
/// to an already-fixed array yields the same axis again.
pub fn fix_time(mut da: DataArray) -> Result<DataArray> {
    let len = da.len_of(TIME_DIM)?;
    if len == 0 {
        da.set_time_coord(Vec::new())?;
        return Ok(da);
    }

    let start_year = da.time_coord()?[0].year();
    da.set_time_coord(monthly_range(start_year, len))?;
    Ok(da)
}
