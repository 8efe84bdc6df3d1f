//! Error types for content loading and ship construction.
//!
//! The per-step simulation never fails; only loading a material catalog,
//! parsing a parameter file or building a ship can.

use thiserror::Error;

/// Errors raised while loading or validating a material catalog.
#[derive(Error, Debug)]
pub enum MaterialError {
    #[error("cannot parse material catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("material \"{name}\" has an invalid color key \"{key}\"")]
    InvalidColorKey { name: String, key: String },
    #[error("color key {key} is used by both \"{first}\" and \"{second}\"")]
    DuplicateColorKey {
        key: String,
        first: String,
        second: String,
    },
    #[error("material \"{0}\" must have a positive mass")]
    NonPositiveMass(String),
    #[error("no structural material named \"{0}\"")]
    UnknownMaterialName(String),
}

/// Errors raised while turning a ship definition into simulation state.
#[derive(Error, Debug)]
pub enum ShipBuildError {
    #[error("structural layer has {actual} cells, expected {expected} for a {width}x{height} ship")]
    LayerSizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unrecognized structural material color {color} at ({x}, {y})")]
    UnrecognizedStructuralColor { color: String, x: usize, y: usize },
    #[error("unrecognized electrical material color {color} at ({x}, {y})")]
    UnrecognizedElectricalColor { color: String, x: usize, y: usize },
    #[error("electrical element at ({x}, {y}) has no structural point underneath")]
    ElectricalWithoutStructure { x: usize, y: usize },
    #[error("the ship definition contains no structural points")]
    NoPoints,
    #[error("point at ({x}, {y}) exceeds the maximum number of connected springs")]
    TooManySprings { x: usize, y: usize },
}

/// Errors raised while reading a `GameParameters` document.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot parse game parameters: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("parameter {name} = {value} is out of range")]
    OutOfRange { name: &'static str, value: f32 },
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum WreckageError {
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error(transparent)]
    ShipBuild(#[from] ShipBuildError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}
