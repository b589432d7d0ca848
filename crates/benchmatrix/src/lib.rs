//! Benchmark matrix runner.
//!
//! Runs every benchmark suite under every compiler configuration, collects
//! the libtest `ns/iter` results of several rounds, and reduces them to
//! per-configuration statistics and baseline-relative speedups.
//!
//! Data flows one way: [`matrix::MatrixController`] executes cells through a
//! [`matrix::CellExecutor`], feeds bench output through [`parser`] into a
//! [`store::ResultStore`], and once the matrix is done [`report`] renders the
//! store using [`aggregate`] and [`compare`].

pub use benchmatrix_error as error;
pub use benchmatrix_error::{MatrixError, MatrixResult};

pub mod aggregate;
pub mod anomaly;
pub mod compare;
pub mod config;
pub mod exec;
pub mod linecount;
pub mod logging;
pub mod matrix;
pub mod parser;
pub mod provision;
pub mod report;
pub mod run_meta;
pub mod sample;
pub mod store;
pub mod suite;
pub mod toolchain;
