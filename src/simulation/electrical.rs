//! Electrical network layered over ship points.
//!
//! Current flows from operating generators through cables and closed
//! switches; lamps run a small flicker state machine on simulation time, and
//! their light is diffused onto points of the same connected component.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::events::GameEventHandler;
use super::materials::{ElectricalElementType, ElectricalMaterial};
use super::ocean_surface::OceanSurface;
use super::physics_config::GameParameters;
use super::points::{ElementIndex, Points};

/// Hysteresis around the operating temperature range, in Kelvin.
const OPERATING_TEMPERATURE_WATERMARK_OFFSET: f32 = 10.0;

const FLICKER_START_INTERVAL: f32 = 0.1;
const FLICKER_A_INTERVAL: f32 = 0.15;
const FLICKER_B_INTERVAL: f32 = 0.1;
const FLICKER_COUNT: u8 = 2;
const WET_FAILURE_CHECK_INTERVAL: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LampStateType {
    /// Not evaluated yet
    Initial,
    LightOn,
    FlickerA,
    FlickerB,
    LightOff,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LampState {
    pub state: LampStateType,
    /// Probability of failing within one second while wet.
    pub wet_failure_rate_cdf: f32,
    pub has_failed: bool,
    flicker_counter: u8,
    next_state_transition_time: f32,
    next_wet_failure_check_time: f32,
}

impl LampState {
    fn new(wet_failure_rate: f32) -> Self {
        Self {
            state: LampStateType::Initial,
            wet_failure_rate_cdf: 1.0 - (-wet_failure_rate / 60.0).exp(),
            has_failed: false,
            flicker_counter: 0,
            next_state_transition_time: 0.0,
            next_wet_failure_check_time: 0.0,
        }
    }
}

pub struct ElectricalElements {
    is_deleted: Vec<bool>,
    point_index: Vec<ElementIndex>,
    material: Vec<Arc<ElectricalMaterial>>,
    connected: Vec<Vec<ElementIndex>>,
    factory_connected: Vec<Vec<ElementIndex>>,

    switch_state: Vec<bool>,
    is_operating: Vec<bool>,
    is_powered: Vec<bool>,
    available_light: Vec<f32>,
    lamp_state: Vec<Option<LampState>>,

    generators: Vec<ElementIndex>,
    lamps: Vec<ElementIndex>,

    visit_sequence: Vec<u64>,
    current_visit_sequence: u64,

    rng: StdRng,
}

impl ElectricalElements {
    pub fn new(seed: u64) -> Self {
        Self {
            is_deleted: Vec::new(),
            point_index: Vec::new(),
            material: Vec::new(),
            connected: Vec::new(),
            factory_connected: Vec::new(),
            switch_state: Vec::new(),
            is_operating: Vec::new(),
            is_powered: Vec::new(),
            available_light: Vec::new(),
            lamp_state: Vec::new(),
            generators: Vec::new(),
            lamps: Vec::new(),
            visit_sequence: Vec::new(),
            current_visit_sequence: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn add(&mut self, point_index: ElementIndex, material: Arc<ElectricalMaterial>) -> ElementIndex {
        let element_index = self.is_deleted.len();

        match material.element_type {
            ElectricalElementType::Generator => self.generators.push(element_index),
            ElectricalElementType::Lamp => self.lamps.push(element_index),
            _ => {}
        }

        self.lamp_state.push(
            (material.element_type == ElectricalElementType::Lamp).then(|| LampState::new(material.wet_failure_rate)),
        );
        self.is_deleted.push(false);
        self.point_index.push(point_index);
        self.material.push(material);
        self.connected.push(Vec::new());
        self.factory_connected.push(Vec::new());
        self.switch_state.push(true);
        self.is_operating.push(true);
        self.is_powered.push(false);
        self.available_light.push(0.0);
        self.visit_sequence.push(0);

        element_index
    }

    pub fn len(&self) -> usize {
        self.is_deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_deleted.is_empty()
    }

    pub fn is_deleted(&self, element_index: ElementIndex) -> bool {
        self.is_deleted[element_index]
    }

    pub fn point_index(&self, element_index: ElementIndex) -> ElementIndex {
        self.point_index[element_index]
    }

    pub fn element_type(&self, element_index: ElementIndex) -> ElectricalElementType {
        self.material[element_index].element_type
    }

    pub fn connected(&self, element_index: ElementIndex) -> &[ElementIndex] {
        &self.connected[element_index]
    }

    pub fn is_powered(&self, element_index: ElementIndex) -> bool {
        self.is_powered[element_index]
    }

    pub fn is_operating(&self, element_index: ElementIndex) -> bool {
        self.is_operating[element_index]
    }

    pub fn available_light(&self, element_index: ElementIndex) -> f32 {
        self.available_light[element_index]
    }

    pub fn lamp_state(&self, element_index: ElementIndex) -> Option<&LampState> {
        self.lamp_state[element_index].as_ref()
    }

    pub fn lamps(&self) -> &[ElementIndex] {
        &self.lamps
    }

    pub fn switch_state(&self, element_index: ElementIndex) -> bool {
        self.switch_state[element_index]
    }

    /// Returns false when the element is not a switch.
    pub fn set_switch_state(&mut self, element_index: ElementIndex, is_on: bool) -> bool {
        if self.material[element_index].element_type != ElectricalElementType::Switch {
            return false;
        }
        self.switch_state[element_index] = is_on;
        true
    }

    // ==================== TOPOLOGY ====================

    pub(crate) fn add_factory_connection(&mut self, element_a: ElementIndex, element_b: ElementIndex) {
        self.factory_connected[element_a].push(element_b);
        self.factory_connected[element_b].push(element_a);
        self.connect(element_a, element_b);
    }

    pub(crate) fn connect(&mut self, element_a: ElementIndex, element_b: ElementIndex) {
        if !self.connected[element_a].contains(&element_b) {
            self.connected[element_a].push(element_b);
        }
        if !self.connected[element_b].contains(&element_a) {
            self.connected[element_b].push(element_a);
        }
    }

    pub(crate) fn disconnect(&mut self, element_a: ElementIndex, element_b: ElementIndex) {
        self.connected[element_a].retain(|&e| e != element_b);
        self.connected[element_b].retain(|&e| e != element_a);
    }

    /// Remove an element and all its connections.
    pub(crate) fn destroy(&mut self, element_index: ElementIndex) {
        if std::mem::replace(&mut self.is_deleted[element_index], true) {
            return;
        }
        let neighbors = std::mem::take(&mut self.connected[element_index]);
        for neighbor in neighbors {
            self.connected[neighbor].retain(|&e| e != element_index);
        }
        self.is_powered[element_index] = false;
        self.available_light[element_index] = 0.0;
    }

    /// Bring a destroyed element back, reconnecting to live factory neighbors.
    pub(crate) fn restore(&mut self, element_index: ElementIndex) {
        if !std::mem::replace(&mut self.is_deleted[element_index], false) {
            return;
        }
        for neighbor in self.factory_connected[element_index].clone() {
            if !self.is_deleted[neighbor] {
                self.connect(element_index, neighbor);
            }
        }
        if let Some(lamp) = self.lamp_state[element_index].as_mut() {
            lamp.state = LampStateType::Initial;
            lamp.flicker_counter = 0;
            lamp.has_failed = false;
        }
    }

    // ==================== UPDATE ====================

    pub fn update(
        &mut self,
        current_simulation_time: f32,
        dt: f32,
        points: &mut Points,
        ocean_surface: &OceanSurface,
        events: &dyn GameEventHandler,
    ) {
        self.update_operating_states(points);
        self.propagate_current(points, ocean_surface);
        self.update_sinks(current_simulation_time, points, ocean_surface, events);
        self.generate_heat(dt, points);
    }

    fn update_operating_states(&mut self, points: &Points) {
        for element_index in 0..self.len() {
            if self.is_deleted[element_index] {
                continue;
            }
            let material = &self.material[element_index];
            let temperature = points.temperature(self.point_index[element_index]);
            if self.is_operating[element_index] {
                let within_outer = temperature >= material.min_operating_temperature - OPERATING_TEMPERATURE_WATERMARK_OFFSET
                    && temperature <= material.max_operating_temperature + OPERATING_TEMPERATURE_WATERMARK_OFFSET;
                if !within_outer {
                    self.is_operating[element_index] = false;
                }
            } else {
                let within_inner = temperature >= material.min_operating_temperature + OPERATING_TEMPERATURE_WATERMARK_OFFSET
                    && temperature <= material.max_operating_temperature - OPERATING_TEMPERATURE_WATERMARK_OFFSET;
                if within_inner {
                    self.is_operating[element_index] = true;
                }
            }
        }
    }

    fn conducts(&self, element_index: ElementIndex) -> bool {
        !self.is_deleted[element_index] && self.is_operating[element_index] && self.switch_state[element_index]
    }

    fn propagate_current(&mut self, points: &Points, ocean_surface: &OceanSurface) {
        self.current_visit_sequence += 1;
        let sequence = self.current_visit_sequence;

        let mut queue = VecDeque::new();
        for &generator in &self.generators {
            if !self.conducts(generator)
                || self.visit_sequence[generator] == sequence
                || points.is_underwater(self.point_index[generator], ocean_surface)
            {
                continue;
            }

            self.visit_sequence[generator] = sequence;
            queue.push_back(generator);
            while let Some(element_index) = queue.pop_front() {
                for &neighbor in &self.connected[element_index] {
                    if self.visit_sequence[neighbor] != sequence && self.conducts(neighbor) {
                        self.visit_sequence[neighbor] = sequence;
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        for element_index in 0..self.len() {
            self.is_powered[element_index] = !self.is_deleted[element_index]
                && self.is_operating[element_index]
                && (self.visit_sequence[element_index] == sequence || self.material[element_index].is_self_powered);
        }
    }

    fn update_sinks(
        &mut self,
        current_simulation_time: f32,
        points: &Points,
        ocean_surface: &OceanSurface,
        events: &dyn GameEventHandler,
    ) {
        for lamp_index in 0..self.lamps.len() {
            let element_index = self.lamps[lamp_index];
            if self.is_deleted[element_index] {
                continue;
            }

            let point_index = self.point_index[element_index];
            let is_underwater = points.is_underwater(point_index, ocean_surface);
            let is_wet = is_underwater || points.water(point_index) > 0.0;
            let wet_failure_draw: f32 = self.rng.gen();
            let is_powered = self.is_powered[element_index];

            let Some(lamp) = self.lamp_state[element_index].as_mut() else {
                continue;
            };

            // Wet lamps may fail while lit, at most one check per second
            if lamp.state == LampStateType::LightOn
                && is_wet
                && !self.material[element_index].is_self_powered
                && current_simulation_time >= lamp.next_wet_failure_check_time
            {
                lamp.next_wet_failure_check_time = current_simulation_time + WET_FAILURE_CHECK_INTERVAL;
                if wet_failure_draw < lamp.wet_failure_rate_cdf {
                    lamp.has_failed = true;
                }
            }

            let is_powered = is_powered && !lamp.has_failed;
            let light = match lamp.state {
                LampStateType::Initial | LampStateType::LightOff => {
                    if is_powered {
                        lamp.state = LampStateType::LightOn;
                        lamp.next_wet_failure_check_time = current_simulation_time + WET_FAILURE_CHECK_INTERVAL;
                        1.0
                    } else {
                        lamp.state = LampStateType::LightOff;
                        0.0
                    }
                }
                LampStateType::LightOn => {
                    if is_powered {
                        1.0
                    } else {
                        lamp.state = LampStateType::FlickerA;
                        lamp.flicker_counter = 0;
                        lamp.next_state_transition_time = current_simulation_time + FLICKER_START_INTERVAL;
                        0.0
                    }
                }
                LampStateType::FlickerA => {
                    if is_powered {
                        lamp.state = LampStateType::LightOn;
                        1.0
                    } else if current_simulation_time >= lamp.next_state_transition_time {
                        lamp.flicker_counter += 1;
                        lamp.state = LampStateType::FlickerB;
                        lamp.next_state_transition_time = current_simulation_time + FLICKER_A_INTERVAL;
                        events.on_light_flicker(is_underwater);
                        1.0
                    } else {
                        0.0
                    }
                }
                LampStateType::FlickerB => {
                    if is_powered {
                        lamp.state = LampStateType::LightOn;
                        1.0
                    } else if current_simulation_time >= lamp.next_state_transition_time {
                        if lamp.flicker_counter >= FLICKER_COUNT {
                            lamp.state = LampStateType::LightOff;
                        } else {
                            lamp.state = LampStateType::FlickerA;
                            lamp.next_state_transition_time = current_simulation_time + FLICKER_B_INTERVAL;
                        }
                        0.0
                    } else {
                        1.0
                    }
                }
            };

            self.available_light[element_index] = light;
        }
    }

    fn generate_heat(&mut self, dt: f32, points: &mut Points) {
        for element_index in 0..self.len() {
            let heat_generated = self.material[element_index].heat_generated;
            if self.is_powered[element_index] && heat_generated > 0.0 {
                let point_index = self.point_index[element_index];
                let heat_capacity = points.material_heat_capacity[point_index];
                points.temperature[point_index] += heat_generated * dt / heat_capacity;
            }
        }
    }

    /// Light every ship point from the lamps in its connected component.
    pub fn diffuse_light(&self, points: &mut Points, parameters: &GameParameters) {
        for point_index in points.ship_points() {
            points.light[point_index] = 0.0;
        }

        for &lamp in &self.lamps {
            let available_light = self.available_light[lamp];
            if self.is_deleted[lamp] || available_light <= 0.0 {
                continue;
            }

            let material = &self.material[lamp];
            let lamp_point = self.point_index[lamp];
            let lamp_position = points.position(lamp_point);
            let Some(component) = points.connected_component_id(lamp_point) else {
                continue;
            };

            let spread_max_distance = material.light_spread * parameters.light_spread_adjustment + 0.5;
            let coefficient = available_light * material.luminiscence * parameters.luminiscence_adjustment
                / spread_max_distance;

            for point_index in points.ship_points() {
                if points.connected_component_id[point_index] != Some(component) {
                    continue;
                }
                let distance = (points.position[point_index] - lamp_position).length();
                let light = coefficient * (spread_max_distance - distance);
                if light > points.light[point_index] {
                    points.light[point_index] = light.min(1.0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy::prelude::Vec2;

    use super::*;
    use crate::simulation::events::{EventRecorder, GameEvent, NullEventHandler};
    use crate::simulation::materials::{builtin, MaterialDatabase};
    use crate::simulation::points::tests::{make_points, test_parameters};

    /// generator - cable - switch - cable - lamp, along the x axis
    fn circuit() -> (Points, ElectricalElements) {
        let parameters = test_parameters();
        let database = MaterialDatabase::builtin();
        let mut points = make_points(5, &parameters);
        let mut electrical = ElectricalElements::new(1);
        let keys = [builtin::GENERATOR, builtin::CABLE, builtin::SWITCH, builtin::CABLE, builtin::LAMP];
        for (point_index, key) in keys.iter().enumerate() {
            let element = electrical.add(point_index, database.electrical(*key).unwrap().clone());
            points.electrical_element[point_index] = Some(element);
            points.connected_component_id[point_index] = Some(1);
        }
        for element in 0..4 {
            electrical.add_factory_connection(element, element + 1);
        }
        (points, electrical)
    }

    fn step(electrical: &mut ElectricalElements, points: &mut Points, t: f32, events: &dyn GameEventHandler) {
        let ocean = OceanSurface::new();
        electrical.update(t, 0.02, points, &ocean, events);
    }

    #[test]
    fn generator_lights_lamp() {
        let (mut points, mut electrical) = circuit();
        step(&mut electrical, &mut points, 0.0, &NullEventHandler);
        assert!(electrical.is_powered(4));
        assert_eq!(electrical.lamp_state(4).unwrap().state, LampStateType::LightOn);
        assert_eq!(electrical.available_light(4), 1.0);
    }

    #[test]
    fn open_switch_flickers_then_darkens() {
        let (mut points, mut electrical) = circuit();
        let recorder = EventRecorder::new();
        step(&mut electrical, &mut points, 0.0, recorder.as_ref());
        assert!(electrical.set_switch_state(2, false));
        assert!(!electrical.set_switch_state(1, false));

        let mut t = 0.0;
        for _ in 0..100 {
            t += 0.02;
            step(&mut electrical, &mut points, t, recorder.as_ref());
        }
        assert!(!electrical.is_powered(4));
        assert_eq!(electrical.lamp_state(4).unwrap().state, LampStateType::LightOff);
        assert_eq!(electrical.available_light(4), 0.0);
        assert_eq!(recorder.count(|e| matches!(e, GameEvent::LightFlicker { .. })), 2);

        electrical.set_switch_state(2, true);
        step(&mut electrical, &mut points, t + 0.02, recorder.as_ref());
        assert_eq!(electrical.lamp_state(4).unwrap().state, LampStateType::LightOn);
    }

    #[test]
    fn overheated_element_stops_until_cooled_below_watermark() {
        let (mut points, mut electrical) = circuit();
        let max = MaterialDatabase::builtin()
            .electrical(builtin::CABLE)
            .unwrap()
            .max_operating_temperature;

        points.set_temperature(1, max + 11.0);
        step(&mut electrical, &mut points, 0.0, &NullEventHandler);
        assert!(!electrical.is_operating(1));
        assert!(!electrical.is_powered(4));

        // Between the watermarks: still off
        points.set_temperature(1, max - 5.0);
        step(&mut electrical, &mut points, 0.02, &NullEventHandler);
        assert!(!electrical.is_operating(1));

        points.set_temperature(1, max - 11.0);
        step(&mut electrical, &mut points, 0.04, &NullEventHandler);
        assert!(electrical.is_operating(1));
        assert!(electrical.is_powered(4));
    }

    #[test]
    fn destroyed_cable_cuts_power() {
        let (mut points, mut electrical) = circuit();
        electrical.destroy(3);
        step(&mut electrical, &mut points, 0.0, &NullEventHandler);
        assert!(electrical.connected(4).is_empty());
        assert!(!electrical.is_powered(4));
        electrical.restore(3);
        step(&mut electrical, &mut points, 0.02, &NullEventHandler);
        assert!(electrical.is_powered(4));
    }

    #[test]
    fn light_fades_with_distance_within_component() {
        let (mut points, mut electrical) = circuit();
        let parameters = test_parameters();
        step(&mut electrical, &mut points, 0.0, &NullEventHandler);
        points.connected_component_id[0] = Some(2);
        electrical.diffuse_light(&mut points, &parameters);

        assert_eq!(points.light(0), 0.0);
        assert!(points.light(4) > points.light(3));
        assert!(points.light(3) > points.light(1));
        assert!(points.light(4) <= 1.0);
        assert_eq!(points.position(4), Vec2::new(4.0, 10.0));
    }
}
