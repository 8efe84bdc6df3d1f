//! Wreckage Simulation - Main Entry
//!
//! Headless run of the default scenario. Pass a TOML file path to override
//! game parameters.

use bevy::log::LogPlugin;
use bevy::prelude::*;
use wreckage::render::FrameUploadPlugin;
use wreckage::simulation::{GameParameters, SimulationPlugin};
use wreckage::WreckageError;

fn main() -> AppExit {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins).add_plugins(LogPlugin::default());

    let parameters = match load_parameters() {
        Ok(parameters) => parameters,
        Err(err) => {
            error!("Failed to load game parameters: {}", err);
            return AppExit::error();
        }
    };

    app.insert_resource(parameters)
        .add_plugins(SimulationPlugin)
        .add_plugins(FrameUploadPlugin)
        .add_systems(Startup, setup_frame_counter)
        .add_systems(Update, log_frame);
    app.run()
}

fn load_parameters() -> Result<GameParameters, WreckageError> {
    match std::env::args().nth(1) {
        Some(path) => GameParameters::from_file(path),
        None => Ok(GameParameters::default()),
    }
}

fn setup_frame_counter(mut commands: Commands) {
    commands.insert_resource(FrameCounter(0));
}

/// Frame counter for logging
#[derive(Resource)]
struct FrameCounter(u32);

/// Log every N frames
fn log_frame(mut counter: ResMut<FrameCounter>) {
    counter.0 += 1;
    if counter.0 % 600 == 0 {
        info!("Frame {}: Simulation running...", counter.0);
    }
}
