//! Render upload of a ship.

use super::Ship;
use crate::render::{RenderSink, ShipRenderData};
use crate::resources::{sprite_kind, EphemeralSprite, FlameInstance, PointVertex, SpringElement, TriangleElement};
use crate::simulation::points::{CombustionStateType, EphemeralState};

impl Ship {
    /// Push this ship's current state to the renderer.
    pub fn render(&self, wind_speed_magnitude: f32, sink: &mut dyn RenderSink) {
        let points = &self.points;
        let plane_of = |p: usize| points.plane_id(p).unwrap_or(0) as f32;

        let vertices: Vec<PointVertex> = (0..points.all_point_count())
            .map(|p| PointVertex {
                position: points.position(p).to_array(),
                color: points.color(p),
                light: points.light(p),
                water: points.water(p),
                decay: points.decay(p),
                temperature: points.temperature(p),
                plane_id: plane_of(p),
                _padding: 0.0,
            })
            .collect();

        // Orphaned points are drawn as dots
        let point_elements: Vec<u32> = points
            .ship_points()
            .filter(|&p| points.connected_springs(p).is_empty())
            .map(|p| p as u32)
            .collect();

        // Each spring is emitted once, by the endpoint that owns it; springs
        // covered by triangles are drawn by the triangles
        let mut springs = Vec::new();
        let mut ropes = Vec::new();
        for point_index in points.ship_points() {
            for connected in points.connected_springs(point_index).owned() {
                let element = SpringElement {
                    point_a: point_index as u32,
                    point_b: connected.other_endpoint_index as u32,
                };
                if self.springs.is_rope(connected.spring_index) {
                    ropes.push(element);
                } else if self.springs.super_triangles(connected.spring_index).is_empty() {
                    springs.push(element);
                }
            }
        }

        let triangles: Vec<TriangleElement> = self
            .triangles
            .active()
            .map(|t| {
                let [a, b, c] = self.triangles.points(t);
                TriangleElement {
                    point_a: a as u32,
                    point_b: b as u32,
                    point_c: c as u32,
                }
            })
            .collect();

        let flames: Vec<FlameInstance> = points
            .burning_points()
            .iter()
            .filter_map(|&p| {
                let combustion = points.combustion_state(p);
                (combustion.state != CombustionStateType::NotBurning).then(|| FlameInstance {
                    plane_id: plane_of(p),
                    position: points.position(p).to_array(),
                    flame_development: combustion.flame_development,
                    personality: combustion.personality,
                    is_on_chain: u32::from(points.connected_triangles(p).is_empty()),
                })
            })
            .collect();

        let ephemeral: Vec<EphemeralSprite> = points
            .ephemeral_points()
            .filter_map(|p| {
                let (kind, frame_index, scale, progress) = match *points.ephemeral_state(p) {
                    EphemeralState::None => return None,
                    EphemeralState::AirBubble(bubble) => {
                        (sprite_kind::AIR_BUBBLE, bubble.frame_index, bubble.initial_size, bubble.progress)
                    }
                    EphemeralState::Debris => (sprite_kind::DEBRIS, 0, 1.0, 0.0),
                    EphemeralState::Sparkle(sparkle) => (sprite_kind::SPARKLE, sparkle.frame_index, 1.0, sparkle.progress),
                };
                Some(EphemeralSprite {
                    kind,
                    frame_index,
                    plane_id: plane_of(p),
                    position: points.position(p).to_array(),
                    scale,
                    progress,
                    alpha: points.color(p)[3],
                })
            })
            .collect();

        sink.upload_ship(
            self.id,
            ShipRenderData {
                points: &vertices,
                point_elements: &point_elements,
                springs: &springs,
                ropes: &ropes,
                triangles: &triangles,
                flames: &flames,
                ephemeral: &ephemeral,
                wind_speed_magnitude,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bevy::prelude::Vec2;

    use crate::render::FrameBuffers;
    use crate::simulation::events::NullEventHandler;
    use crate::simulation::materials::{builtin, MaterialDatabase};
    use crate::simulation::physics_config::GameParameters;
    use crate::simulation::ship::{Ship, ShipDefinition};

    #[test]
    fn upload_separates_edges_ropes_and_triangles() {
        let mut definition = ShipDefinition::new("mast", 3, 2);
        definition.set_structural(0, 0, builtin::WOOD);
        definition.set_structural(1, 0, builtin::WOOD);
        definition.set_structural(0, 1, builtin::WOOD);
        definition.set_structural(1, 1, builtin::WOOD);
        definition.set_structural(2, 1, builtin::ROPE);
        let parameters = GameParameters {
            max_ephemeral_particles: 4,
            ..GameParameters::default()
        };
        let ship = Ship::build(
            5,
            &definition.with_offset(Vec2::new(0.0, 10.0)),
            &MaterialDatabase::builtin(),
            &parameters,
            Arc::new(NullEventHandler),
            1,
        )
        .unwrap();

        let mut frame = FrameBuffers::default();
        ship.render(0.0, &mut frame);
        let uploaded = frame.ship(5).unwrap();

        assert_eq!(uploaded.points.len(), 5 + 4);
        assert_eq!(uploaded.triangles.len(), 3);
        // (1,0)-(2,1) and (1,1)-(2,1) touch the rope point
        assert_eq!(uploaded.ropes.len(), 2);
        // Only the crossing diagonal of the full cell has no triangle
        assert_eq!(uploaded.springs, vec![crate::resources::SpringElement { point_a: 1, point_b: 2 }]);
        assert!(uploaded.point_elements.is_empty());
        assert!(uploaded.ephemeral.is_empty());
        assert_eq!(uploaded.point_bytes().len(), 9 * 48);
    }
}
