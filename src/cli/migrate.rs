//! Migrate command implementation

use crate::config::Config;
use crate::store::PgTradeStore;
use clap::Args;

#[derive(Args, Debug)]
pub struct MigrateArgs {}

impl MigrateArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = PgTradeStore::connect(&config.store).await?;
        store.ensure_schema().await?;
        Ok(())
    }
}
