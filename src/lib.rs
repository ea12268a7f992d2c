//! # daily-sales-etl
//!
//! Batch job that turns the transactional tables of an online sports store
//! into a daily per-product sales report.
//!
//! ## Flow
//!
//! | Stage     | Module                 | Does                                       |
//! |-----------|------------------------|--------------------------------------------|
//! | Extract   | [`extract`]            | `SELECT *` from the six source relations   |
//! | Transform | [`transform`]          | inner join chain + daily aggregation       |
//! | Load      | [`load`]               | drop, create and fill `ventas_diarias_productos` |
//! | Run       | [`pipeline`]           | sequences the stages, always closes the connection |
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use daily_sales_etl::prelude::*;
//!
//! let config = EtlConfig::from_file("etl.toml".as_ref())?;
//! let report = Pipeline::new(config).run().await;
//! assert!(report.succeeded());
//! ```

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod transform;
pub mod value;

pub mod prelude {
    pub use crate::config::{DbConfig, EtlConfig, LoadConfig};
    pub use crate::dataset::Dataset;
    pub use crate::engine::{Dialect, SalesDb};
    pub use crate::error::*;
    pub use crate::extract::{Entity, Extraction, extract};
    pub use crate::load::{LoadReport, load};
    pub use crate::pipeline::{Mode, Pipeline, RunReport, Stage};
    pub use crate::transform::{DailyProductSales, Transformation, transform};
    pub use crate::value::Value;
}

/// Run the full job with the given configuration.
///
/// # Example
///
/// ```rust,ignore
/// let report = daily_sales_etl::run(config).await;
/// println!("{:?}", report.path);
/// ```
pub async fn run(config: config::EtlConfig) -> pipeline::RunReport {
    pipeline::Pipeline::new(config).run().await
}
