use anyhow::Context;
use clap::Parser;
use serde_json::json;

use stockroom_infra::{AppConfig, PostgresCatalogRepository};
use stockroom_reporter::{Cli, run_report};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("reading configuration")?;
    stockroom_observability::init(&config.log);

    let repository = PostgresCatalogRepository::connect(config.require_database_url()?)
        .await
        .context("connecting to postgres")?;

    let output = match cli.command.report() {
        Some(report) => run_report(report, repository, config.ledger).await?,
        None => {
            repository.ensure_schema().await?;
            tracing::info!("schema ready");
            json!({ "schema": "ready" })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
