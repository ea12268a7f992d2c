//! Orchestrator: connect, extract, transform, load, close.
//!
//! ```text
//! Init -> Connected -> Extracted -> Transformed -> Loaded -> Closed
//!   |                      |             |
//!   +--> Closed            +--> Closed   +--> Closed
//! ```
//!
//! Every failure is logged and recorded in the [`RunReport`]; nothing
//! escapes [`Pipeline::run`]. Once connected, the connection is closed on
//! every path exactly once.

use crate::config::EtlConfig;
use crate::engine::SalesDb;
use crate::error::EtlError;
use crate::extract::{Entity, extract};
use crate::load::load;
use crate::transform::{DailyProductSales, transform};

use std::fmt;
use tracing::{error, info};

/// States of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Connected,
    Extracted,
    Transformed,
    Loaded,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Connected => "connected",
            Stage::Extracted => "extracted",
            Stage::Transformed => "transformed",
            Stage::Loaded => "loaded",
            Stage::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What happened during a run.
#[derive(Debug)]
pub struct RunReport {
    /// States visited, starting at `Init` and ending at `Closed`.
    pub path: Vec<Stage>,
    /// Rows read per source; `None` when that source failed.
    pub extracted: Vec<(Entity, Option<usize>)>,
    /// The computed summary, when the transform ran.
    pub summary: Option<Vec<DailyProductSales>>,
    /// Rows written to the destination.
    pub loaded_rows: Option<u64>,
    /// The failure that ended the run early, if any.
    pub failure: Option<EtlError>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            path: vec![Stage::Init],
            extracted: Vec::new(),
            summary: None,
            loaded_rows: None,
            failure: None,
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!(stage = %stage, "pipeline");
        self.path.push(stage);
    }

    fn fail(&mut self, err: EtlError) {
        error!("{}", err);
        self.failure = Some(err);
    }

    /// Last stage reached before closing.
    pub fn reached(&self) -> Stage {
        self.path
            .iter()
            .rev()
            .copied()
            .find(|s| *s != Stage::Closed)
            .unwrap_or(Stage::Init)
    }

    /// Number of summary rows, when the transform ran.
    pub fn summary_rows(&self) -> Option<usize> {
        self.summary.as_ref().map(Vec::len)
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.reached() == Stage::Loaded
    }
}

/// How far a run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Extract, transform and replace the destination table.
    #[default]
    Full,
    /// Stop after the transform; the destination is not touched.
    DryRun,
}

/// One ETL run over a configured database.
pub struct Pipeline {
    config: EtlConfig,
    mode: Mode,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> Self {
        Self {
            config,
            mode: Mode::Full,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Connect and run. A connection failure ends the run immediately.
    pub async fn run(&self) -> RunReport {
        info!(target_db = %self.config.database.target(), "connecting");
        match SalesDb::connect(&self.config.database).await {
            Ok(db) => self.run_with(db).await,
            Err(e) => {
                let mut report = RunReport::new();
                report.fail(e);
                report.enter(Stage::Closed);
                report
            }
        }
    }

    /// Run all stages on an open connection, then close it.
    pub async fn run_with(&self, db: SalesDb) -> RunReport {
        let mut report = RunReport::new();
        report.enter(Stage::Connected);

        self.run_stages(&db, &mut report).await;

        db.close().await;
        info!("connection closed");
        report.enter(Stage::Closed);
        report
    }

    async fn run_stages(&self, db: &SalesDb, report: &mut RunReport) {
        let extraction = extract(db).await;
        report.extracted = extraction.row_counts();
        report.enter(Stage::Extracted);

        let transformation = match transform(&extraction) {
            Ok(t) => t,
            Err(e) => {
                report.fail(e);
                return;
            }
        };
        report.enter(Stage::Transformed);

        if self.mode == Mode::DryRun {
            report.summary = Some(transformation.rows);
            return;
        }

        match load(db, &transformation.rows, &self.config.load).await {
            Ok(loaded) => {
                report.loaded_rows = Some(loaded.inserted);
                report.enter(Stage::Loaded);
            }
            Err(e) => report.fail(e),
        }
        report.summary = Some(transformation.rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reached_ignores_closed() {
        let mut report = RunReport::new();
        report.enter(Stage::Connected);
        report.enter(Stage::Extracted);
        report.enter(Stage::Closed);
        assert_eq!(report.reached(), Stage::Extracted);
        assert!(!report.succeeded());
        assert_eq!(report.summary_rows(), None);
    }

    #[tokio::test]
    async fn test_connection_failure_goes_straight_to_closed() {
        let mut config = EtlConfig::default();
        config.database.url = Some("oracle://nowhere".into());

        let report = Pipeline::new(config).run().await;
        assert_eq!(report.path, vec![Stage::Init, Stage::Closed]);
        assert!(matches!(report.failure, Some(EtlError::Connection(_))));
        assert!(report.extracted.is_empty());
    }
}
