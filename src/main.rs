//! Entry point for the PPEPost application.
//! Handles CLI parsing, dataset loading, and dispatches post-processing steps
//! like time-axis correction and weighted averaging.

use clap::Parser;
use futures::StreamExt;
use std::path::PathBuf;

use ppe_post::array::TIME_DIM;
use ppe_post::cli::Args;
use ppe_post::cluster::get_cluster;
use ppe_post::metadata::{describe_data_array, print_metadata, summarize_data_array};
use ppe_post::netcdf_io::{
    load_data_array, load_landarea, open_dataset, write_data_array, LANDAREA_FILE,
};
use ppe_post::parallel::ParallelConfig;
use ppe_post::time_axis::fix_time;
use ppe_post::weighting::{weight_landarea_gridcells, yearly_weighted_average};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();

    println!(
        r#"
------------------------------------------------------------------
            ______ ______ _____ ______          _
            | ___ \| ___ \  ___|| ___ \        | |
            | |_/ /| |_/ / |__  | |_/ /__  ___ | |_
            |  __/ |  __/|  __| |  __/ _ \/ __|| __|
            | |    | |   | |___ | | | (_) \__ \| |_
            \_|    \_|   \____/ \_|  \___/|___/ \__|
                CLM PPE post-processing tool
------------------------------------------------------------------
                        "#
    );

    // Configure the reduction thread pool
    ParallelConfig::new(args.threads).setup_global_pool()?;

    // Spin up a batch worker pool when an account is given. The allocation
    // is released explicitly at the end of the run.
    let runtime = if args.account.is_some() {
        Some(tokio::runtime::Runtime::new()?)
    } else {
        None
    };
    let mut cluster = None;
    if let (Some(account), Some(rt)) = (&args.account, &runtime) {
        let client = rt.block_on(get_cluster(account, args.workers))?;
        rt.block_on(async {
            let mut states = client.worker_states();
            while let Some(item) = states.next().await {
                match item {
                    Ok((job_id, state)) => println!("   {} -> {:?}", job_id, state),
                    Err(e) => println!("⚠ {}", e),
                }
            }
        });
        cluster = Some(client);
    }

    // Open NetCDF file
    let file = open_dataset(&args.file)?;
    println!("Successfully opened NetCDF file: {}", args.file.display());

    if args.list_vars {
        print_metadata(&file)?;
    } else {
        let mut da = load_data_array(&file, &args.variable)?;

        if args.fix_time {
            da = fix_time(da)?;
            println!(
                "✅ Rebuilt monthly time axis ({} samples)",
                da.len_of(TIME_DIM)?
            );
        }

        if args.area_mean {
            let landarea_path = args
                .landarea
                .clone()
                .unwrap_or_else(|| PathBuf::from(LANDAREA_FILE));
            let weights_file = open_dataset(&landarea_path)?;
            let landarea = load_landarea(&weights_file)?;
            da = weight_landarea_gridcells(&da, &landarea)?;
        }

        if args.annual_mean {
            da = yearly_weighted_average(&da)?;
        }

        if args.summary {
            summarize_data_array(&da);
        }

        if let Some(output_path) = args.output_netcdf {
            write_data_array(&da, &output_path)?;
            println!("✅ Saved result to {}", output_path.display());
        } else {
            describe_data_array(&da);
        }
    }

    // Release the worker allocation before exiting
    if let (Some(client), Some(rt)) = (cluster.take(), &runtime) {
        rt.block_on(client.close())?;
    }

    Ok(())
}
