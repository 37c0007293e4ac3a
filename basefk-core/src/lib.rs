//! basefk core - schema evolution pipeline for the expense tracker
//!
//! Replaces the legacy `base` text columns of `base_expenses` and
//! `purchase_entries` with `base_id` references to `bases`, and adds
//! `category_id` on `base_expenses` plus the `user_bases` link table.
//!
//! - **domain**: Schema targets, plans, reports, errors
//! - **ports**: The `SchemaPort` trait the services depend on
//! - **services**: Inspect, Extend, Backfill, Verify, Finalize
//! - **adapters**: MySQL implementation of the port

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;
pub mod sql;

use std::sync::Arc;

use adapters::mysql::MySqlRepository;
use config::Config;
use ports::SchemaPort;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{PlannedStep, Stage, StagePlan, StageReport, StepOutcome};

/// Main context for a migration run
///
/// Holds the configuration, the database port and one service per stage.
pub struct MigrationContext {
    pub config: Config,
    pub port: Arc<dyn SchemaPort>,
    pub inspect_service: InspectService,
    pub extend_service: ExtendService,
    pub backfill_service: BackfillService,
    pub verify_service: VerifyService,
    pub finalize_service: FinalizeService,
}

impl MigrationContext {
    /// Connect to MySQL and build the services
    pub fn connect(dsn: &str, config: Config) -> Result<Self> {
        let repository = MySqlRepository::connect(dsn)?;
        Ok(Self::new(Arc::new(repository), config))
    }

    /// Build the services over any port
    pub fn new(port: Arc<dyn SchemaPort>, config: Config) -> Self {
        let inspect_service = InspectService::new(Arc::clone(&port));
        let extend_service = ExtendService::new(Arc::clone(&port));
        let backfill_service = BackfillService::new(Arc::clone(&port), config.clone());
        let verify_service = VerifyService::new(Arc::clone(&port));
        let finalize_service = FinalizeService::new(Arc::clone(&port));

        Self {
            config,
            port,
            inspect_service,
            extend_service,
            backfill_service,
            verify_service,
            finalize_service,
        }
    }

    /// Name of the connected database
    pub fn database_name(&self) -> Result<String> {
        self.port.database_name()
    }
}
