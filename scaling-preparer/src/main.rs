use crate::config::load_scaling_config;
use crate::core::prepare_job_with_config;
use scaling_config::shared::ScalingConfig;
use scaling_telemetry::init_tracing;
use tracing::error;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    // Load scaling config
    let scaling_config = load_scaling_config()?;

    // Initialize tracing
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(scaling_config))?;

    Ok(())
}

async fn async_main(scaling_config: ScalingConfig) -> anyhow::Result<()> {
    if let Err(err) = prepare_job_with_config(scaling_config).await {
        error!("an error occurred while preparing the scaling job: {err:#}");

        return Err(err);
    }

    Ok(())
}
