mod app;
mod audio;

use std::path::PathBuf;

use chromacue_experiment::ExperimentConfig;
use tracing_subscriber::EnvFilter;

use app::App;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("chromacue.json"));
    let config = ExperimentConfig::load(&config_path)?;

    App::new(config)?.run()
}
