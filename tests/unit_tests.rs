//! Comprehensive unit tests for PPEPost modules
//!
//! These tests cover the calendar arithmetic, time axis correction, and
//! weighted averaging kernels to ensure reliability and prevent regressions.

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use ppe_post::{
    array::{CoordinateValues, DataArray, LandArea, GRIDCELL_DIM, TIME_DIM},
    calendar::{days_in_month, monthly_range, NoLeapDate, DAYS_PER_MONTH},
    cluster::{
        parse_qstat_state, ClusterClient, ClusterConfig, ClusterProvisioner, WorkerState,
    },
    errors::{PpePostError, Result},
    parallel::ParallelConfig,
    time_axis::fix_time,
    weighting::{weight_landarea_gridcells, yearly_weighted_average, YEAR_DIM},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[test]
fn test_error_types() {
    let var_err = PpePostError::VariableNotFound {
        var: "LNC".to_string(),
    };
    assert!(format!("{}", var_err).contains("Variable 'LNC' not found"));

    let dim_err = PpePostError::DimensionNotFound {
        var: "LNC".to_string(),
        dim: "gridcell".to_string(),
    };
    assert!(format!("{}", dim_err).contains("Dimension 'gridcell' not found in array 'LNC'"));

    let date_err = PpePostError::InvalidDate {
        year: 2005,
        month: 2,
        day: 29,
    };
    assert!(format!("{}", date_err).contains("2005-02-29"));

    let generic_err = PpePostError::Generic("Test error".to_string());
    assert_eq!(format!("{}", generic_err), "Test error");
}

#[test]
fn test_days_in_month() {
    // February never has a leap day in the noleap calendar
    assert_eq!(days_in_month(2).unwrap(), 28);
    assert_eq!(days_in_month(1).unwrap(), 31);
    assert_eq!(days_in_month(12).unwrap(), 31);
    assert_eq!(DAYS_PER_MONTH.iter().sum::<u32>(), 365);

    assert!(days_in_month(0).is_err());
    assert!(days_in_month(13).is_err());
}

#[test]
fn test_noleap_date_validation() {
    assert!(NoLeapDate::new(2005, 2, 28).is_ok());
    assert!(NoLeapDate::new(2005, 2, 29).is_err());
    assert!(NoLeapDate::new(2005, 13, 1).is_err());
    assert!(NoLeapDate::new(2005, 1, 0).is_err());

    let date = NoLeapDate::new(2005, 2, 1).unwrap();
    assert_eq!(format!("{}", date), "2005-02-01");
    assert_eq!(date.year(), 2005);
    assert_eq!(date.month(), 2);
    assert_eq!(date.day(), 1);
    assert_eq!(date.days_in_month(), 28);
}

#[test]
fn test_noleap_ordinal_and_days_since() {
    let jan1 = NoLeapDate::new(2005, 1, 1).unwrap();
    let mar1 = NoLeapDate::new(2005, 3, 1).unwrap();
    assert_eq!(jan1.ordinal(), 0);
    assert_eq!(mar1.ordinal(), 59); // 31 + 28

    assert_eq!(NoLeapDate::from_days_since(jan1, 0), jan1);
    assert_eq!(
        NoLeapDate::from_days_since(jan1, 31),
        NoLeapDate::new(2005, 2, 1).unwrap()
    );
    assert_eq!(
        NoLeapDate::from_days_since(jan1, 365),
        NoLeapDate::new(2006, 1, 1).unwrap()
    );
    assert_eq!(
        NoLeapDate::from_days_since(jan1, -1),
        NoLeapDate::new(2004, 12, 31).unwrap()
    );

    // days_since is the inverse of from_days_since
    for days in [-400i64, -1, 0, 27, 31, 59, 364, 365, 730, 1000] {
        let date = NoLeapDate::from_days_since(jan1, days);
        assert_eq!(date.days_since(jan1), days);
    }
}

#[test]
fn test_monthly_range() {
    let axis = monthly_range(2005, 12);
    assert_eq!(axis.len(), 12);
    assert_eq!(axis[0], NoLeapDate::new(2005, 1, 1).unwrap());
    assert_eq!(axis[11], NoLeapDate::new(2005, 12, 1).unwrap());

    let spanning = monthly_range(2005, 14);
    assert_eq!(spanning[12], NoLeapDate::new(2006, 1, 1).unwrap());
    assert_eq!(spanning[13], NoLeapDate::new(2006, 2, 1).unwrap());

    assert!(monthly_range(2005, 0).is_empty());
}

fn monthly_array(start_year: i32, values: Vec<f64>) -> DataArray {
    let n = values.len();
    let data = Array1::from_vec(values).into_dyn();
    DataArray::new("LNC", data, vec![TIME_DIM.to_string()])
        .unwrap()
        .with_coord(
            TIME_DIM,
            CoordinateValues::Time(monthly_range(start_year, n)),
        )
        .unwrap()
}

#[test]
fn test_data_array_construction() {
    let data = Array1::from_vec(vec![1.0, 2.0, 3.0]).into_dyn();
    assert!(DataArray::new("bad", data.clone(), vec![]).is_err());

    let da = DataArray::new("ok", data, vec![GRIDCELL_DIM.to_string()]).unwrap();
    assert_eq!(da.axis_of(GRIDCELL_DIM).unwrap(), 0);
    assert_eq!(da.len_of(GRIDCELL_DIM).unwrap(), 3);
    assert!(da.axis_of(TIME_DIM).is_err());
    assert!(da.time_coord().is_err());

    // Coordinate length must match the dimension length
    let data = Array1::from_vec(vec![1.0, 2.0, 3.0]).into_dyn();
    let da = DataArray::new("ok", data, vec![GRIDCELL_DIM.to_string()]).unwrap();
    let result = da.with_coord(GRIDCELL_DIM, CoordinateValues::Index(vec![0, 1]));
    assert!(matches!(
        result,
        Err(PpePostError::CoordinateMismatch { .. })
    ));
}

#[test]
fn test_fix_time_rebuilds_monthly_axis() -> Result<()> {
    // Simulate the decoding defect: monthly samples stamped one month late
    let buggy: Vec<NoLeapDate> = monthly_range(2005, 25)[1..].to_vec();
    let data = Array1::from_iter((0..24).map(|i| i as f64)).into_dyn();
    let da = DataArray::new("LNC", data, vec![TIME_DIM.to_string()])?
        .with_coord(TIME_DIM, CoordinateValues::Time(buggy.clone()))?;

    let fixed = fix_time(da)?;
    let axis = fixed.time_coord()?;
    assert_eq!(axis.len(), 24);
    assert_eq!(axis[0], NoLeapDate::new(2005, 1, 1)?);
    assert_eq!(axis[23], NoLeapDate::new(2006, 12, 1)?);
    assert_eq!(axis, monthly_range(2005, 24).as_slice());

    // Every corrected label differs from its buggy counterpart
    for (corrected, original) in axis.iter().zip(&buggy) {
        assert_ne!(corrected, original);
    }

    // Values are untouched
    assert_eq!(fixed.data().iter().copied().collect::<Vec<_>>()[5], 5.0);
    Ok(())
}

#[test]
fn test_fix_time_idempotent() -> Result<()> {
    let da = monthly_array(1987, (0..30).map(|i| i as f64).collect());
    let once = fix_time(da)?;
    let axis_once = once.time_coord()?.to_vec();
    let twice = fix_time(once)?;
    assert_eq!(twice.time_coord()?, axis_once.as_slice());
    Ok(())
}

#[test]
fn test_fix_time_empty_axis() -> Result<()> {
    let data = Array1::from_vec(Vec::<f64>::new()).into_dyn();
    let da = DataArray::new("LNC", data, vec![TIME_DIM.to_string()])?
        .with_coord(TIME_DIM, CoordinateValues::Time(Vec::new()))?;
    let fixed = fix_time(da)?;
    assert!(fixed.time_coord()?.is_empty());
    Ok(())
}

#[test]
fn test_land_area_validation() {
    assert!(LandArea::new(Array1::from_vec(vec![1.0, -2.0]), vec![0, 1]).is_err());
    assert!(LandArea::new(Array1::from_vec(vec![1.0, f64::NAN]), vec![0, 1]).is_err());
    assert!(LandArea::new(Array1::from_vec(vec![1.0, 2.0]), vec![0]).is_err());

    let landarea = LandArea::new(Array1::from_vec(vec![1.0, 2.0]), vec![10, 20]).unwrap();
    assert_eq!(landarea.len(), 2);
    assert_eq!(landarea.gridcells(), &[10, 20]);
}

fn gridcell_array(values: Vec<f64>) -> DataArray {
    let n = values.len();
    let data = Array1::from_vec(values).into_dyn();
    DataArray::new("LNC", data, vec![GRIDCELL_DIM.to_string()])
        .unwrap()
        .with_coord(
            GRIDCELL_DIM,
            CoordinateValues::Index((0..n as i64).collect()),
        )
        .unwrap()
}

#[test]
fn test_area_weighted_mean_uniform_weights_is_arithmetic_mean() -> Result<()> {
    let da = gridcell_array(vec![10.0, 20.0, 30.0]);
    let landarea = LandArea::new(Array1::from_vec(vec![2.0, 2.0, 2.0]), vec![0, 1, 2])?;
    let result = weight_landarea_gridcells(&da, &landarea)?;
    assert_eq!(result.data().ndim(), 0);
    assert_eq!(*result.data().first().unwrap(), 20.0);
    Ok(())
}

#[test]
fn test_area_weighted_mean_one_hot_weights_select_cell() -> Result<()> {
    let da = gridcell_array(vec![10.0, 42.0, 30.0]);
    let landarea = LandArea::new(Array1::from_vec(vec![0.0, 1.0, 0.0]), vec![0, 1, 2])?;
    let result = weight_landarea_gridcells(&da, &landarea)?;
    assert_eq!(*result.data().first().unwrap(), 42.0);
    Ok(())
}

#[test]
fn test_area_weighted_mean_uniform_values_weight_invariant() -> Result<()> {
    // Weights [1,2,3] with uniform values must return exactly 10.0
    let da = gridcell_array(vec![10.0, 10.0, 10.0]);
    let landarea = LandArea::new(Array1::from_vec(vec![1.0, 2.0, 3.0]), vec![0, 1, 2])?;
    let result = weight_landarea_gridcells(&da, &landarea)?;
    assert_eq!(*result.data().first().unwrap(), 10.0);
    Ok(())
}

#[test]
fn test_area_weighted_mean_keeps_time_dimension() -> Result<()> {
    let data = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0])
        .unwrap()
        .into_dyn();
    let da = DataArray::new(
        "LNC",
        data,
        vec![TIME_DIM.to_string(), GRIDCELL_DIM.to_string()],
    )?
    .with_coord(TIME_DIM, CoordinateValues::Time(monthly_range(2005, 2)))?
    .with_coord(GRIDCELL_DIM, CoordinateValues::Index(vec![0, 1, 2]))?;

    let landarea = LandArea::new(Array1::from_vec(vec![1.0, 1.0, 2.0]), vec![0, 1, 2])?;
    let result = weight_landarea_gridcells(&da, &landarea)?;

    assert_eq!(result.dims(), &[TIME_DIM.to_string()]);
    assert_eq!(result.shape(), &[2]);
    assert_eq!(result.time_coord()?.len(), 2);

    // (1 + 2 + 3*2) / 4 = 2.25 and (10 + 20 + 30*2) / 4 = 22.5
    let values: Vec<f64> = result.data().iter().copied().collect();
    assert_eq!(values, vec![2.25, 22.5]);
    Ok(())
}

#[test]
fn test_area_weighted_mean_skips_nan_values() -> Result<()> {
    let da = gridcell_array(vec![10.0, f64::NAN, 30.0]);
    let landarea = LandArea::new(Array1::from_vec(vec![1.0, 5.0, 3.0]), vec![0, 1, 2])?;
    let result = weight_landarea_gridcells(&da, &landarea)?;
    // NaN cell and its weight are excluded: (10*1 + 30*3) / 4 = 25.0
    assert_eq!(*result.data().first().unwrap(), 25.0);
    Ok(())
}

#[test]
fn test_area_weighted_mean_rejects_mismatched_gridcells() -> Result<()> {
    let da = gridcell_array(vec![10.0, 20.0, 30.0]);

    let wrong_len = LandArea::new(Array1::from_vec(vec![1.0, 2.0]), vec![0, 1])?;
    assert!(weight_landarea_gridcells(&da, &wrong_len).is_err());

    let wrong_ids = LandArea::new(Array1::from_vec(vec![1.0, 2.0, 3.0]), vec![0, 1, 7])?;
    assert!(weight_landarea_gridcells(&da, &wrong_ids).is_err());
    Ok(())
}

#[test]
fn test_yearly_weighted_average_full_year() -> Result<()> {
    // Monthly values 1..=12 weighted by noleap month lengths
    let da = monthly_array(2005, (1..=12).map(|m| m as f64).collect());
    let result = yearly_weighted_average(&da)?;

    assert_eq!(result.dims(), &[YEAR_DIM.to_string()]);
    assert_eq!(result.shape(), &[1]);
    assert_eq!(result.index_coord(YEAR_DIM), Some(&[2005i64][..]));

    let mut expected = 0.0f64;
    for (month, &days) in DAYS_PER_MONTH.iter().enumerate() {
        expected += (month as f64 + 1.0) * days as f64;
    }
    expected /= 365.0;

    let value = *result.data().first().unwrap();
    assert!((value - expected).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_yearly_weighted_average_single_month_year() -> Result<()> {
    let data = Array1::from_vec(vec![42.0]).into_dyn();
    let da = DataArray::new("LNC", data, vec![TIME_DIM.to_string()])?.with_coord(
        TIME_DIM,
        CoordinateValues::Time(vec![NoLeapDate::new(2005, 7, 1)?]),
    )?;

    let result = yearly_weighted_average(&da)?;
    assert_eq!(result.shape(), &[1]);
    assert_eq!(*result.data().first().unwrap(), 42.0);
    assert_eq!(result.index_coord(YEAR_DIM), Some(&[2005i64][..]));
    Ok(())
}

#[test]
fn test_yearly_weighted_average_groups_years() -> Result<()> {
    let da = monthly_array(2005, (0..24).map(|i| i as f64).collect());
    let result = yearly_weighted_average(&da)?;

    assert_eq!(result.shape(), &[2]);
    assert_eq!(result.index_coord(YEAR_DIM), Some(&[2005i64, 2006][..]));

    // Both years hold a full noleap year of samples
    let values: Vec<f64> = result.data().iter().copied().collect();
    assert!(values[0] < values[1]);
    Ok(())
}

#[test]
fn test_yearly_weighted_average_keeps_other_dimensions() -> Result<()> {
    let data = Array2::from_shape_vec((12, 2), (0..24).map(|i| i as f64).collect())
        .unwrap()
        .into_dyn();
    let da = DataArray::new(
        "LNC",
        data,
        vec![TIME_DIM.to_string(), GRIDCELL_DIM.to_string()],
    )?
    .with_coord(TIME_DIM, CoordinateValues::Time(monthly_range(2005, 12)))?
    .with_coord(GRIDCELL_DIM, CoordinateValues::Index(vec![100, 200]))?;

    let result = yearly_weighted_average(&da)?;
    assert_eq!(
        result.dims(),
        &[YEAR_DIM.to_string(), GRIDCELL_DIM.to_string()]
    );
    assert_eq!(result.shape(), &[1, 2]);
    assert_eq!(result.index_coord(GRIDCELL_DIM), Some(&[100i64, 200][..]));
    Ok(())
}

#[test]
fn test_parallel_config() {
    let default_config = ParallelConfig::new(None);
    assert!(default_config.num_threads.is_none());

    let config_4 = ParallelConfig::with_threads(4);
    assert_eq!(config_4.num_threads, Some(4));

    let all_cores_config = ParallelConfig::all_cores();
    assert!(all_cores_config.num_threads.unwrap() > 0);

    assert!(default_config.current_threads() > 0);
}

#[test]
fn test_cluster_config_defaults() {
    let config = ClusterConfig::new("UCSB0021");
    assert_eq!(config.account, "UCSB0021");
    assert_eq!(config.queue, "casper");
    assert_eq!(config.cores_per_worker, 1);
    assert_eq!(config.processes_per_worker, 1);
    assert_eq!(config.memory, "10GB");
    assert_eq!(config.walltime, "02:00:00");
    assert_eq!(config.local_directory, "$TMPDIR");

    assert_eq!(config.resource_spec(), "select=1:ncpus=1:mem=10GB");

    let args = config.submit_args();
    assert!(args.contains(&"-A".to_string()));
    assert!(args.contains(&"UCSB0021".to_string()));
    assert!(args.contains(&"casper".to_string()));
    assert!(args.contains(&"walltime=02:00:00".to_string()));
    assert!(args.contains(&"select=1:ncpus=1:mem=10GB".to_string()));
}

#[test]
fn test_parse_qstat_state() {
    let output = "\
Job id            Name             User              Time Use S Queue
----------------  ---------------- ----------------  -------- - -----
123456.casper     ppe-worker       someuser          00:00:00 R casper
123457.casper     ppe-worker       someuser          00:00:00 Q casper
";
    assert_eq!(
        parse_qstat_state(output, "123456.casper").unwrap(),
        WorkerState::Running
    );
    assert_eq!(
        parse_qstat_state(output, "123457.casper").unwrap(),
        WorkerState::Queued
    );
    assert!(parse_qstat_state(output, "999999.casper").is_err());
}

/// In-memory provisioner recording submissions and releases
#[derive(Clone, Default)]
struct MockProvisioner {
    next_id: std::sync::Arc<AtomicUsize>,
    released: std::sync::Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ClusterProvisioner for MockProvisioner {
    async fn submit_worker(&self, config: &ClusterConfig) -> Result<String> {
        assert_eq!(config.queue, "casper");
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}.mock", id))
    }

    async fn release_worker(&self, job_id: &str) -> Result<()> {
        self.released.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn poll_worker(&self, _job_id: &str) -> Result<WorkerState> {
        Ok(WorkerState::Queued)
    }
}

#[tokio::test]
async fn test_cluster_client_scale_and_close() {
    let provisioner = MockProvisioner::default();
    let config = ClusterConfig::new("UCSB0021");
    let mut client = ClusterClient::new(provisioner.clone(), config);

    client.scale(3).await.unwrap();
    assert_eq!(client.num_workers(), 3);
    assert_eq!(client.job_ids().len(), 3);

    // Shrinking releases the excess jobs
    client.scale(1).await.unwrap();
    assert_eq!(client.num_workers(), 1);
    assert_eq!(provisioner.released.lock().unwrap().len(), 2);

    client.close().await.unwrap();
    assert_eq!(provisioner.released.lock().unwrap().len(), 3);
}

#[test]
fn test_cluster_worker_state_stream() {
    use futures::StreamExt;

    tokio_test::block_on(async {
        let config = ClusterConfig::new("UCSB0021");
        let mut client = ClusterClient::new(MockProvisioner::default(), config);
        client.scale(2).await.unwrap();

        let states: Vec<_> = client.worker_states().collect().await;
        assert_eq!(states.len(), 2);
        for state in states {
            let (_, worker_state) = state.unwrap();
            assert_eq!(worker_state, WorkerState::Queued);
        }

        client.close().await.unwrap();
    });
}
