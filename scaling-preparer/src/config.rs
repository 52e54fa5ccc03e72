use scaling_config::load_config;
use scaling_config::shared::ScalingConfig;

/// Loads the [`ScalingConfig`] and validates it.
pub fn load_scaling_config() -> anyhow::Result<ScalingConfig> {
    let config = load_config::<ScalingConfig>()?;
    config.validate()?;

    Ok(config)
}
