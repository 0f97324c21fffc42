//! Parallel processing configuration
//!
//! The weighted reductions run on Rayon's global thread pool. This module
//! configures that pool once, before any reduction is dispatched.

use crate::errors::{PpePostError, Result};
use rayon::ThreadPoolBuilder;

/// Configuration for the local reduction thread pool
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Configuration using a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Configuration using all available CPU cores
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    /// Set up the global Rayon thread pool with this configuration
    pub fn setup_global_pool(&self) -> Result<()> {
        if let Some(num_threads) = self.num_threads {
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| {
                    PpePostError::ThreadPoolError(format!(
                        "Failed to initialize thread pool with {} threads: {}",
                        num_threads, e
                    ))
                })?;

            println!(
                "✅ Configured parallel processing with {} threads",
                num_threads
            );
        } else {
            println!("✅ Using default thread pool configuration");
        }

        Ok(())
    }

    /// Number of threads the pool is currently running
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}
