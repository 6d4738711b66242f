use std::process::ExitCode;

use texflock::{Settings, SimulationError, Simulation};

fn run() -> Result<(), SimulationError> {
    let settings = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading settings from {}", path);
            Settings::load_json(path)?
        }
        None => Settings::default(),
    };

    Simulation::new()
        .with_settings(settings)
        .with_fluid(true)
        .with_title("texflock")
        .run()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
