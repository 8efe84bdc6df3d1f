//! Structural and electrical material catalogs.
//!
//! Materials are immutable once loaded and shared between points through
//! `Arc`. Ship definitions refer to them by `#rrggbb` color keys.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::Resource;
use serde::Deserialize;

use crate::error::MaterialError;

/// RGB color used to key materials in ship definitions.
pub type ColorKey = [u8; 3];

/// Parse a `#rrggbb` (or `rrggbb`) string.
pub fn parse_color_key(text: &str) -> Option<ColorKey> {
    let hex = text.strip_prefix('#').unwrap_or(text);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

pub fn format_color_key(key: ColorKey) -> String {
    format!("#{:02x}{:02x}{:02x}", key[0], key[1], key[2])
}

fn one() -> f32 {
    1.0
}

fn default_specific_heat() -> f32 {
    1000.0
}

fn default_thermal_conductivity() -> f32 {
    0.5
}

fn default_ignition_temperature() -> f32 {
    1000.0
}

fn default_water_diffusion_speed() -> f32 {
    0.5
}

fn default_render_color() -> [f32; 4] {
    [0.5, 0.5, 0.5, 1.0]
}

/// Physical properties of a structural material.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructuralMaterial {
    pub name: String,
    pub color_key: String,
    /// Mass of one particle of this material, in kg.
    pub mass: f32,
    pub strength: f32,
    #[serde(default = "one")]
    pub stiffness: f32,
    /// Hull points never take water in.
    #[serde(default)]
    pub is_hull: bool,
    #[serde(default)]
    pub is_rope: bool,
    /// Fraction of the particle volume that can hold water.
    #[serde(default)]
    pub water_volume_fill: f32,
    #[serde(default = "one")]
    pub water_intake: f32,
    #[serde(default)]
    pub water_restitution: f32,
    #[serde(default = "default_water_diffusion_speed")]
    pub water_diffusion_speed: f32,
    /// Fraction of the particle volume that displaces water.
    #[serde(default = "one")]
    pub buoyancy_volume_fill: f32,
    /// J/(kg*K)
    #[serde(default = "default_specific_heat")]
    pub specific_heat: f32,
    #[serde(default = "default_thermal_conductivity")]
    pub thermal_conductivity: f32,
    /// Kelvin
    #[serde(default = "default_ignition_temperature")]
    pub ignition_temperature: f32,
    #[serde(default)]
    pub rust_receptivity: f32,
    #[serde(default)]
    pub wind_receptivity: f32,
    #[serde(default = "default_render_color")]
    pub render_color: [f32; 4],
}

impl StructuralMaterial {
    /// Heat capacity of one particle, in J/K.
    pub fn heat_capacity(&self) -> f32 {
        self.specific_heat * self.mass
    }
}

/// Kinds of electrical elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ElectricalElementType {
    Cable,
    Generator,
    Lamp,
    OtherSink,
    Switch,
}

fn default_min_operating_temperature() -> f32 {
    233.15
}

fn default_max_operating_temperature() -> f32 {
    373.15
}

/// Properties of an electrical material.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElectricalMaterial {
    pub name: String,
    pub color_key: String,
    pub element_type: ElectricalElementType,
    #[serde(default)]
    pub is_self_powered: bool,
    #[serde(default)]
    pub luminiscence: f32,
    #[serde(default = "default_render_color")]
    pub light_color: [f32; 4],
    #[serde(default)]
    pub light_spread: f32,
    /// Expected failures per minute while wet.
    #[serde(default)]
    pub wet_failure_rate: f32,
    /// Heat produced while powered, in J/s.
    #[serde(default)]
    pub heat_generated: f32,
    #[serde(default = "default_min_operating_temperature")]
    pub min_operating_temperature: f32,
    #[serde(default = "default_max_operating_temperature")]
    pub max_operating_temperature: f32,
}

/// Both catalogs, keyed by color.
#[derive(Resource, Debug, Clone, Default)]
pub struct MaterialDatabase {
    structural: HashMap<ColorKey, Arc<StructuralMaterial>>,
    electrical: HashMap<ColorKey, Arc<ElectricalMaterial>>,
}

impl MaterialDatabase {
    /// Load both catalogs from JSON arrays of material objects.
    pub fn from_json(structural_json: &str, electrical_json: &str) -> Result<Self, MaterialError> {
        let structural: Vec<StructuralMaterial> = serde_json::from_str(structural_json)?;
        let electrical: Vec<ElectricalMaterial> = serde_json::from_str(electrical_json)?;
        Self::from_materials(structural, electrical)
    }

    pub fn from_materials(
        structural: Vec<StructuralMaterial>,
        electrical: Vec<ElectricalMaterial>,
    ) -> Result<Self, MaterialError> {
        let mut database = Self::default();

        for material in structural {
            if material.mass.is_nan() || material.mass <= 0.0 {
                return Err(MaterialError::NonPositiveMass(material.name));
            }
            let key = validated_key(&material.name, &material.color_key)?;
            if let Some(existing) = database.structural.get(&key) {
                return Err(MaterialError::DuplicateColorKey {
                    key: material.color_key.clone(),
                    first: existing.name.clone(),
                    second: material.name,
                });
            }
            database.structural.insert(key, Arc::new(material));
        }

        for material in electrical {
            let key = validated_key(&material.name, &material.color_key)?;
            if let Some(existing) = database.electrical.get(&key) {
                return Err(MaterialError::DuplicateColorKey {
                    key: material.color_key.clone(),
                    first: existing.name.clone(),
                    second: material.name,
                });
            }
            database.electrical.insert(key, Arc::new(material));
        }

        Ok(database)
    }

    pub fn structural(&self, key: ColorKey) -> Option<&Arc<StructuralMaterial>> {
        self.structural.get(&key)
    }

    pub fn electrical(&self, key: ColorKey) -> Option<&Arc<ElectricalMaterial>> {
        self.electrical.get(&key)
    }

    pub fn structural_by_name(&self, name: &str) -> Result<&Arc<StructuralMaterial>, MaterialError> {
        self.structural
            .values()
            .find(|m| m.name == name)
            .ok_or_else(|| MaterialError::UnknownMaterialName(name.to_string()))
    }

    pub fn structural_count(&self) -> usize {
        self.structural.len()
    }

    pub fn electrical_count(&self) -> usize {
        self.electrical.len()
    }

    /// The catalog shipped with the crate.
    pub fn builtin() -> Self {
        let mut database = Self::default();
        for material in builtin::structural() {
            if let Some(key) = parse_color_key(&material.color_key) {
                database.structural.insert(key, Arc::new(material));
            }
        }
        for material in builtin::electrical() {
            if let Some(key) = parse_color_key(&material.color_key) {
                database.electrical.insert(key, Arc::new(material));
            }
        }
        database
    }
}

fn validated_key(name: &str, key: &str) -> Result<ColorKey, MaterialError> {
    parse_color_key(key).ok_or_else(|| MaterialError::InvalidColorKey {
        name: name.to_string(),
        key: key.to_string(),
    })
}

// ==================== BUILT-IN CATALOG ====================

/// Color keys and names of the built-in materials.
pub mod builtin {
    use super::{ElectricalElementType, ElectricalMaterial, StructuralMaterial};
    use crate::simulation::physics_config::AIR_MASS;

    pub const IRON_HULL: [u8; 3] = [0x40, 0x40, 0x50];
    pub const WOOD: [u8; 3] = [0x8b, 0x5a, 0x2b];
    pub const ROPE: [u8; 3] = [0xc0, 0xa0, 0x80];
    pub const GLASS: [u8; 3] = [0xa0, 0xd0, 0xff];
    pub const CANVAS: [u8; 3] = [0xf0, 0xf0, 0xe0];

    pub const CABLE: [u8; 3] = [0xff, 0x80, 0x00];
    pub const GENERATOR: [u8; 3] = [0xff, 0x00, 0x00];
    pub const LAMP: [u8; 3] = [0xff, 0xff, 0x00];
    pub const SWITCH: [u8; 3] = [0x00, 0xff, 0x00];
    pub const ENGINE: [u8; 3] = [0x00, 0x00, 0xff];

    /// Material used for air bubbles.
    pub const AIR_BUBBLE_NAME: &str = "Air Bubble";

    #[allow(clippy::too_many_arguments)]
    fn structural_material(
        name: &str,
        color_key: &str,
        mass: f32,
        strength: f32,
        stiffness: f32,
        specific_heat: f32,
        ignition_temperature: f32,
        render_color: [f32; 4],
    ) -> StructuralMaterial {
        StructuralMaterial {
            name: name.to_string(),
            color_key: color_key.to_string(),
            mass,
            strength,
            stiffness,
            is_hull: false,
            is_rope: false,
            water_volume_fill: 0.0,
            water_intake: 1.0,
            water_restitution: 0.0,
            water_diffusion_speed: 0.5,
            buoyancy_volume_fill: 1.0,
            specific_heat,
            thermal_conductivity: 0.5,
            ignition_temperature,
            rust_receptivity: 0.0,
            wind_receptivity: 0.0,
            render_color,
        }
    }

    pub fn structural() -> Vec<StructuralMaterial> {
        vec![
            StructuralMaterial {
                is_hull: true,
                thermal_conductivity: 0.8,
                rust_receptivity: 1.0,
                ..structural_material("Iron Hull", "#404050", 750.0, 0.55, 1.0, 450.0, 1800.0, [0.25, 0.25, 0.31, 1.0])
            },
            StructuralMaterial {
                water_volume_fill: 0.5,
                water_restitution: 0.2,
                thermal_conductivity: 0.15,
                ..structural_material("Wood", "#8b5a2b", 500.0, 0.3, 0.8, 1700.0, 573.15, [0.55, 0.35, 0.17, 1.0])
            },
            StructuralMaterial {
                is_rope: true,
                water_volume_fill: 0.3,
                wind_receptivity: 0.2,
                thermal_conductivity: 0.1,
                ..structural_material("Rope", "#c0a080", 300.0, 0.6, 0.5, 1700.0, 533.15, [0.75, 0.63, 0.5, 1.0])
            },
            StructuralMaterial {
                is_hull: true,
                thermal_conductivity: 0.3,
                ..structural_material("Glass", "#a0d0ff", 2500.0, 0.1, 1.0, 840.0, 2000.0, [0.63, 0.82, 1.0, 0.5])
            },
            StructuralMaterial {
                water_volume_fill: 0.2,
                wind_receptivity: 1.0,
                thermal_conductivity: 0.05,
                ..structural_material("Canvas", "#f0f0e0", 50.0, 0.4, 0.6, 1300.0, 500.0, [0.94, 0.94, 0.88, 1.0])
            },
            air_bubble(),
        ]
    }

    /// Material of the air bubbles leaking points emit; ships fall back to
    /// it when a catalog does not define one.
    pub fn air_bubble() -> StructuralMaterial {
        StructuralMaterial {
            water_intake: 0.0,
            buoyancy_volume_fill: 0.01,
            thermal_conductivity: 0.0,
            ..structural_material(AIR_BUBBLE_NAME, "#fefefe", AIR_MASS, 0.0, 0.0, 1005.0, 100_000.0, [1.0, 1.0, 1.0, 0.5])
        }
    }

    fn electrical_material(name: &str, color_key: &str, element_type: ElectricalElementType) -> ElectricalMaterial {
        ElectricalMaterial {
            name: name.to_string(),
            color_key: color_key.to_string(),
            element_type,
            is_self_powered: false,
            luminiscence: 0.0,
            light_color: [1.0, 1.0, 1.0, 1.0],
            light_spread: 0.0,
            wet_failure_rate: 0.0,
            heat_generated: 0.0,
            min_operating_temperature: 233.15,
            max_operating_temperature: 373.15,
        }
    }

    pub fn electrical() -> Vec<ElectricalMaterial> {
        vec![
            electrical_material("Copper Cable", "#ff8000", ElectricalElementType::Cable),
            ElectricalMaterial {
                heat_generated: 200.0,
                max_operating_temperature: 473.15,
                ..electrical_material("Generator", "#ff0000", ElectricalElementType::Generator)
            },
            ElectricalMaterial {
                luminiscence: 1.0,
                light_color: [1.0, 0.95, 0.8, 1.0],
                light_spread: 10.0,
                wet_failure_rate: 1.0,
                heat_generated: 20.0,
                ..electrical_material("Lamp", "#ffff00", ElectricalElementType::Lamp)
            },
            electrical_material("Switch", "#00ff00", ElectricalElementType::Switch),
            ElectricalMaterial {
                heat_generated: 500.0,
                ..electrical_material("Engine", "#0000ff", ElectricalElementType::OtherSink)
            },
        ]
    }
}
