use anyhow::Context;
use serde::de::DeserializeOwned;

/// Loads layered config: `config/{run_mode}/base`, `config/{run_mode}/{app_name}`,
/// an optional `.local` override and finally `APP_`-prefixed environment variables.
pub fn load_config<T: DeserializeOwned>() -> anyhow::Result<T> {
    let app_name = std::env::var("APP_NAME").context("pass APP_NAME env to load correct config")?;
    let run_mode = std::env::var("APP_RUN_MODE").unwrap_or_else(|_| "dev".into());
    let base_path = format!("config/{}", run_mode);

    config::Config::builder()
        .add_source(config::File::with_name(&format!("{base_path}/base")).required(false))
        .add_source(config::File::with_name(&format!("{base_path}/{app_name}")).required(true))
        .add_source(
            config::File::with_name(&format!("{base_path}/{app_name}.local")).required(false),
        )
        .add_source(
            config::Environment::default()
                .prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("build layered config")?
        .try_deserialize::<T>()
        .context("deserialize config")
}
