use bevy::prelude::{ButtonInput, KeyCode, Res, ResMut, Resource, Time};

/// Smoothed horizontal axis in [-1, 1], fed from A/D and the arrow keys.
///
/// The value ramps toward the pressed direction at `sensitivity` units per second
/// and falls back to zero at `gravity` units per second once keys are released.
#[derive(Debug, Clone, Copy, PartialEq, Resource)]
pub struct HorizontalAxis {
    pub value: f32,
    pub sensitivity: f32,
    pub gravity: f32,
    pub dead: f32,
    /// Reversing direction jumps through zero instead of ramping across it.
    pub snap: bool,
}

impl Default for HorizontalAxis {
    fn default() -> Self {
        Self {
            value: 0.0,
            sensitivity: 3.0,
            gravity: 3.0,
            dead: 0.001,
            snap: true,
        }
    }
}

impl HorizontalAxis {
    /// Current reading with the dead zone applied.
    pub fn get(&self) -> f32 {
        if self.value.abs() < self.dead {
            0.0
        } else {
            self.value
        }
    }

    pub fn step(&mut self, raw: f32, dt: f32) {
        let raw = raw.clamp(-1.0, 1.0);
        if raw != 0.0 {
            if self.snap && self.value != 0.0 && self.value.signum() != raw.signum() {
                self.value = 0.0;
            }
            self.value = move_towards(self.value, raw, self.sensitivity * dt);
        } else {
            self.value = move_towards(self.value, 0.0, self.gravity * dt);
        }
    }
}

fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta {
        target
    } else {
        current + delta.signum() * max_delta
    }
}

pub fn raw_horizontal(keys: &ButtonInput<KeyCode>) -> f32 {
    let mut raw = 0.0;
    if keys.any_pressed([KeyCode::KeyD, KeyCode::ArrowRight]) {
        raw += 1.0;
    }
    if keys.any_pressed([KeyCode::KeyA, KeyCode::ArrowLeft]) {
        raw -= 1.0;
    }
    raw
}

pub fn update_horizontal_axis(
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut axis: ResMut<HorizontalAxis>,
) {
    axis.step(raw_horizontal(&keys), time.delta_secs());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_up_then_saturates() {
        let mut axis = HorizontalAxis::default();
        axis.step(1.0, 0.1);
        assert!((axis.get() - 0.3).abs() < 1e-5);
        for _ in 0..10 {
            axis.step(1.0, 0.1);
        }
        assert_eq!(axis.get(), 1.0);
    }

    #[test]
    fn falls_back_to_zero_when_released() {
        let mut axis = HorizontalAxis { value: 0.5, ..Default::default() };
        axis.step(0.0, 0.1);
        assert!((axis.get() - 0.2).abs() < 1e-5);
        axis.step(0.0, 0.1);
        assert_eq!(axis.get(), 0.0);
    }

    #[test]
    fn snap_reverses_through_zero() {
        let mut axis = HorizontalAxis { value: 0.8, ..Default::default() };
        axis.step(-1.0, 0.1);
        assert!((axis.get() + 0.3).abs() < 1e-5);

        let mut no_snap = HorizontalAxis { value: 0.8, snap: false, ..Default::default() };
        no_snap.step(-1.0, 0.1);
        assert!((no_snap.get() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn dead_zone_reads_as_zero() {
        let axis = HorizontalAxis { value: 0.0005, ..Default::default() };
        assert_eq!(axis.get(), 0.0);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut keys = ButtonInput::<KeyCode>::default();
        keys.press(KeyCode::KeyA);
        assert_eq!(raw_horizontal(&keys), -1.0);
        keys.press(KeyCode::ArrowRight);
        assert_eq!(raw_horizontal(&keys), 0.0);
    }
}
