use anyhow::Result;
use lsf_exporter::cli::{self, actions};

#[tokio::main]
async fn main() -> Result<()> {
    let (action, telemetry) = cli::start()?;

    let result = actions::run::handle(action).await;

    telemetry.shutdown();

    result
}
