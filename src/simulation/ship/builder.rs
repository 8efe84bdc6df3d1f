//! Ship construction from a grid of material color keys.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::log::debug;
use bevy::prelude::Vec2;

use super::{Ship, ShipId};
use crate::error::ShipBuildError;
use crate::simulation::electrical::ElectricalElements;
use crate::simulation::events::SharedEventHandler;
use crate::simulation::materials::{builtin, format_color_key, ColorKey, MaterialDatabase, StructuralMaterial};
use crate::simulation::physics_config::{GameParameters, MAX_SPRINGS_PER_POINT};
use crate::simulation::points::{ElementIndex, Points};
use crate::simulation::springs::Springs;
use crate::simulation::triangles::Triangles;

/// Neighbor offsets that own a spring from the current cell; together with
/// their mirrors they cover all eight neighbors.
const SPRING_DIRECTIONS: [(isize, isize); 4] = [(1, 0), (1, 1), (0, 1), (-1, 1)];

/// A ship as a `width` x `height` grid of cells, bottom row first.
///
/// Each cell may carry a structural material, an electrical material on top
/// of it, and a leak override; without an override, non-hull points leak.
#[derive(Debug, Clone)]
pub struct ShipDefinition {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub structural_layer: Vec<Option<ColorKey>>,
    pub electrical_layer: Option<Vec<Option<ColorKey>>>,
    pub leak_overrides: HashMap<usize, bool>,
    /// World position of the bottom-center of the grid.
    pub offset: Vec2,
}

impl ShipDefinition {
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            structural_layer: vec![None; width * height],
            electrical_layer: None,
            leak_overrides: HashMap::new(),
            offset: Vec2::ZERO,
        }
    }

    /// Build from pre-filled layers, checking their sizes.
    pub fn from_layers(
        name: impl Into<String>,
        width: usize,
        height: usize,
        structural_layer: Vec<Option<ColorKey>>,
        electrical_layer: Option<Vec<Option<ColorKey>>>,
    ) -> Result<Self, ShipBuildError> {
        let definition = Self {
            structural_layer,
            electrical_layer,
            ..Self::new(name, width, height)
        };
        definition.validate_layers()?;
        Ok(definition)
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn set_structural(&mut self, x: usize, y: usize, key: ColorKey) {
        let cell = self.cell(x, y);
        self.structural_layer[cell] = Some(key);
    }

    pub fn set_electrical(&mut self, x: usize, y: usize, key: ColorKey) {
        let cell = self.cell(x, y);
        let cell_count = self.width * self.height;
        let layer = self.electrical_layer.get_or_insert_with(|| vec![None; cell_count]);
        layer[cell] = Some(key);
    }

    pub fn set_leaking(&mut self, x: usize, y: usize, is_leaking: bool) {
        let cell = self.cell(x, y);
        self.leak_overrides.insert(cell, is_leaking);
    }

    fn cell(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    fn validate_layers(&self) -> Result<(), ShipBuildError> {
        let expected = self.width * self.height;
        let layers = std::iter::once(&self.structural_layer).chain(self.electrical_layer.as_ref());
        for layer in layers {
            if layer.len() != expected {
                return Err(ShipBuildError::LayerSizeMismatch {
                    width: self.width,
                    height: self.height,
                    expected,
                    actual: layer.len(),
                });
            }
        }
        Ok(())
    }
}

/// Spring material between two points: ropes win, otherwise the weaker one.
fn spring_material(a: &Arc<StructuralMaterial>, b: &Arc<StructuralMaterial>) -> Arc<StructuralMaterial> {
    match (a.is_rope, b.is_rope) {
        (true, _) => Arc::clone(a),
        (false, true) => Arc::clone(b),
        _ if b.strength < a.strength => Arc::clone(b),
        _ => Arc::clone(a),
    }
}

impl Ship {
    /// Build the simulation state of a ship.
    ///
    /// Fails on malformed layers, unknown colors, or a grid without points;
    /// nothing outside the returned ship is touched.
    pub fn build(
        id: ShipId,
        definition: &ShipDefinition,
        materials: &MaterialDatabase,
        parameters: &GameParameters,
        events: SharedEventHandler,
        seed: u64,
    ) -> Result<Self, ShipBuildError> {
        definition.validate_layers()?;
        let width = definition.width;
        let height = definition.height;

        // Resolve materials first so that no partial state is built
        let mut cell_materials: Vec<Option<&Arc<StructuralMaterial>>> = Vec::with_capacity(width * height);
        for (cell, key) in definition.structural_layer.iter().enumerate() {
            let material = match key {
                Some(key) => Some(materials.structural(*key).ok_or_else(|| {
                    ShipBuildError::UnrecognizedStructuralColor {
                        color: format_color_key(*key),
                        x: cell % width,
                        y: cell / width,
                    }
                })?),
                None => None,
            };
            cell_materials.push(material);
        }

        let point_count = cell_materials.iter().flatten().count();
        if point_count == 0 {
            return Err(ShipBuildError::NoPoints);
        }

        // Points
        let mut points = Points::new(point_count, parameters, Arc::clone(&events), seed);
        let mut point_grid: Vec<Option<ElementIndex>> = vec![None; width * height];
        for (cell, material) in cell_materials.iter().enumerate() {
            let Some(material) = material else {
                continue;
            };
            let position = definition.offset
                + Vec2::new((cell % width) as f32 - width as f32 / 2.0, (cell / width) as f32);
            let is_leaking = definition
                .leak_overrides
                .get(&cell)
                .copied()
                .unwrap_or(!material.is_hull);
            point_grid[cell] = Some(points.add(position, material, is_leaking, parameters));
        }

        let point_at = |x: isize, y: isize| -> Option<ElementIndex> {
            if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
                return None;
            }
            point_grid[y as usize * width + x as usize]
        };

        // Springs
        let mut springs = Springs::new(parameters);
        let mut spring_lookup: HashMap<(ElementIndex, ElementIndex), ElementIndex> = HashMap::new();
        for y in 0..height as isize {
            for x in 0..width as isize {
                let Some(point_a) = point_at(x, y) else {
                    continue;
                };
                for (dx, dy) in SPRING_DIRECTIONS {
                    let Some(point_b) = point_at(x + dx, y + dy) else {
                        continue;
                    };
                    for (point, px, py) in [(point_a, x, y), (point_b, x + dx, y + dy)] {
                        if points.connected_springs(point).len() >= MAX_SPRINGS_PER_POINT {
                            return Err(ShipBuildError::TooManySprings {
                                x: px as usize,
                                y: py as usize,
                            });
                        }
                    }

                    let (Some(material_a), Some(material_b)) =
                        (points.structural_material(point_a), points.structural_material(point_b))
                    else {
                        continue;
                    };
                    let is_rope = material_a.is_rope || material_b.is_rope;
                    let material = spring_material(material_a, material_b);

                    let spring_index = springs.add(point_a, point_b, material, is_rope, &points);
                    points.connect_spring(point_a, spring_index, point_b, true);
                    points.connect_spring(point_b, spring_index, point_a, false);
                    points.add_factory_connected_spring(point_a, spring_index, point_b, true);
                    points.add_factory_connected_spring(point_b, spring_index, point_a, false);
                    spring_lookup.insert((point_a.min(point_b), point_a.max(point_b)), spring_index);
                }
            }
        }

        // Triangles
        let mut triangles = Triangles::new();
        let find_spring = |p: ElementIndex, q: ElementIndex| spring_lookup.get(&(p.min(q), p.max(q))).copied();
        for y in 0..height as isize - 1 {
            for x in 0..width as isize - 1 {
                let a = point_at(x, y);
                let b = point_at(x + 1, y);
                let c = point_at(x + 1, y + 1);
                let d = point_at(x, y + 1);

                let cell_triangles: Vec<[ElementIndex; 3]> = match (a, b, c, d) {
                    (Some(a), Some(b), Some(c), Some(d)) => vec![[a, b, c], [a, c, d]],
                    (Some(a), Some(b), None, Some(d)) => vec![[a, b, d]],
                    (None, Some(b), Some(c), Some(d)) => vec![[b, c, d]],
                    (Some(a), None, Some(c), Some(d)) => vec![[a, c, d]],
                    (Some(a), Some(b), Some(c), None) => vec![[a, b, c]],
                    _ => Vec::new(),
                };

                for triangle_points in cell_triangles {
                    let sub_springs = [0, 1, 2].map(|i| find_spring(triangle_points[i], triangle_points[(i + 1) % 3]));
                    let [Some(s0), Some(s1), Some(s2)] = sub_springs else {
                        continue;
                    };

                    let triangle_index = triangles.add(triangle_points, [s0, s1, s2]);
                    for (i, point_index) in triangle_points.into_iter().enumerate() {
                        points.connect_triangle(point_index, triangle_index, i == 0);
                        points.add_factory_connected_triangle(point_index, triangle_index, i == 0);
                    }
                    for spring_index in [s0, s1, s2] {
                        springs.add_super_triangle(spring_index, triangle_index);
                        springs.add_factory_super_triangle(spring_index, triangle_index);
                    }
                }
            }
        }

        // Electrical elements
        let mut electrical = ElectricalElements::new(seed.wrapping_add(1));
        if let Some(layer) = &definition.electrical_layer {
            for (cell, key) in layer.iter().enumerate() {
                let Some(key) = key else {
                    continue;
                };
                let (x, y) = (cell % width, cell / width);
                let material = materials
                    .electrical(*key)
                    .ok_or_else(|| ShipBuildError::UnrecognizedElectricalColor {
                        color: format_color_key(*key),
                        x,
                        y,
                    })?;
                let point_index = point_grid[cell].ok_or(ShipBuildError::ElectricalWithoutStructure { x, y })?;
                let element_index = electrical.add(point_index, Arc::clone(material));
                points.electrical_element[point_index] = Some(element_index);
            }

            for spring_index in 0..springs.len() {
                let (point_a, point_b) = springs.endpoints(spring_index);
                if let (Some(element_a), Some(element_b)) =
                    (points.electrical_element(point_a), points.electrical_element(point_b))
                {
                    electrical.add_factory_connection(element_a, element_b);
                }
            }
        }

        let air_bubble_material = materials
            .structural_by_name(builtin::AIR_BUBBLE_NAME)
            .cloned()
            .unwrap_or_else(|_| Arc::new(builtin::air_bubble()));

        debug!(
            "Built ship {} '{}': {} points, {} springs, {} triangles, {} electrical elements",
            id,
            definition.name,
            point_count,
            springs.len(),
            triangles.len(),
            electrical.len()
        );

        let mut ship = Ship {
            id,
            name: definition.name.clone(),
            points,
            springs,
            triangles,
            electrical,
            events,
            air_bubble_material,
            current_step: 0,
            current_connectivity_visit_sequence: 0,
            connected_component_count: 0,
            is_structure_dirty: true,
            is_sinking: false,
            temperature_scratch: Vec::with_capacity(point_count),
            water_scratch: Vec::with_capacity(point_count),
        };
        ship.run_connectivity_visit();
        ship.points.update_masses(parameters);

        Ok(ship)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::events::NullEventHandler;

    fn build(definition: &ShipDefinition) -> Result<Ship, ShipBuildError> {
        Ship::build(
            0,
            definition,
            &MaterialDatabase::builtin(),
            &GameParameters::default(),
            Arc::new(NullEventHandler),
            42,
        )
    }

    fn filled(width: usize, height: usize, key: ColorKey) -> ShipDefinition {
        let mut definition = ShipDefinition::new("block", width, height);
        for y in 0..height {
            for x in 0..width {
                definition.set_structural(x, y, key);
            }
        }
        definition
    }

    #[test]
    fn full_square_gets_eight_neighbor_springs_and_two_triangles() {
        let ship = build(&filled(2, 2, builtin::WOOD)).unwrap();
        assert_eq!(ship.points().ship_point_count(), 4);
        // Four sides plus two diagonals
        assert_eq!(ship.springs().len(), 6);
        assert_eq!(ship.triangles().len(), 2);
        assert_eq!(ship.connected_component_count(), 1);

        for triangle_index in ship.triangles().active() {
            let points = ship.triangles().points(triangle_index);
            for (i, spring_index) in ship.triangles().sub_springs(triangle_index).into_iter().enumerate() {
                let (a, b) = ship.springs().endpoints(spring_index);
                let expected = (points[i].min(points[(i + 1) % 3]), points[i].max(points[(i + 1) % 3]));
                assert_eq!((a.min(b), a.max(b)), expected);
                assert!(ship.springs().super_triangles(spring_index).contains(&triangle_index));
            }
        }
    }

    #[test]
    fn grid_interior_points_have_eight_springs() {
        let ship = build(&filled(3, 3, builtin::IRON_HULL)).unwrap();
        // Center cell is (1, 1) -> point 4
        assert_eq!(ship.points().connected_springs(4).len(), 8);
        assert_eq!(ship.triangles().len(), 8);
        assert!(!ship.points().is_leaking(4));
    }

    #[test]
    fn spring_takes_the_weaker_material_and_ropes_win() {
        let mut definition = ShipDefinition::new("mixed", 3, 1);
        definition.set_structural(0, 0, builtin::IRON_HULL);
        definition.set_structural(1, 0, builtin::WOOD);
        definition.set_structural(2, 0, builtin::ROPE);
        let ship = build(&definition).unwrap();

        assert_eq!(ship.springs().material(0).name, "Wood");
        assert!(ship.springs().is_rope(1));
        assert_eq!(ship.springs().material(1).name, "Rope");
    }

    #[test]
    fn leak_overrides_take_precedence() {
        let mut definition = filled(2, 1, builtin::WOOD);
        definition.set_leaking(1, 0, false);
        let ship = build(&definition).unwrap();
        assert!(ship.points().is_leaking(0));
        assert!(!ship.points().is_leaking(1));
    }

    #[test]
    fn disjoint_islands_are_separate_components() {
        let mut definition = ShipDefinition::new("islands", 5, 1);
        definition.set_structural(0, 0, builtin::WOOD);
        definition.set_structural(1, 0, builtin::WOOD);
        definition.set_structural(3, 0, builtin::WOOD);
        definition.set_structural(4, 0, builtin::WOOD);
        let ship = build(&definition).unwrap();

        assert_eq!(ship.connected_component_count(), 2);
        assert_eq!(ship.points().connected_component_id(0), ship.points().connected_component_id(1));
        assert_ne!(ship.points().connected_component_id(1), ship.points().connected_component_id(2));
    }

    #[test]
    fn electrical_elements_follow_springs() {
        let mut definition = filled(3, 1, builtin::IRON_HULL);
        definition.set_electrical(0, 0, builtin::GENERATOR);
        definition.set_electrical(1, 0, builtin::CABLE);
        definition.set_electrical(2, 0, builtin::LAMP);
        let ship = build(&definition).unwrap();

        assert_eq!(ship.electrical().len(), 3);
        let cable = ship.points().electrical_element(1).unwrap();
        assert_eq!(ship.electrical().connected(cable).len(), 2);
    }

    #[test]
    fn build_errors() {
        assert!(matches!(
            build(&ShipDefinition::new("empty", 2, 2)),
            Err(ShipBuildError::NoPoints)
        ));

        let mut unknown = ShipDefinition::new("unknown", 2, 1);
        unknown.set_structural(1, 0, [1, 2, 3]);
        assert!(matches!(
            build(&unknown),
            Err(ShipBuildError::UnrecognizedStructuralColor { x: 1, y: 0, .. })
        ));

        let mut floating_lamp = filled(1, 1, builtin::WOOD);
        floating_lamp.electrical_layer = Some(vec![Some(builtin::LAMP)]);
        assert!(build(&floating_lamp).is_ok());
        let mut dangling = ShipDefinition::new("dangling", 2, 1);
        dangling.set_structural(0, 0, builtin::WOOD);
        dangling.set_electrical(1, 0, builtin::LAMP);
        assert!(matches!(
            build(&dangling),
            Err(ShipBuildError::ElectricalWithoutStructure { x: 1, y: 0 })
        ));

        assert!(matches!(
            ShipDefinition::from_layers("bad", 2, 2, vec![None; 3], None),
            Err(ShipBuildError::LayerSizeMismatch { expected: 4, actual: 3, .. })
        ));
    }
}
