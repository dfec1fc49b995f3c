use serde::{Deserialize, Serialize};

pub const DEFAULT_SCALE: f32 = 1.2;
pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;
pub const SCALE_STEP: f32 = 0.2;

/// Ephemeral presentation state. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub scale: f32,
    /// Degrees clockwise, always one of 0, 90, 180, 270.
    pub rotation: u16,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            rotation: 0,
        }
    }
}

impl ViewState {
    pub fn zoom_in(&mut self) -> f32 {
        self.scale = round_scale((self.scale + SCALE_STEP).min(MAX_SCALE));
        self.scale
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.scale = round_scale((self.scale - SCALE_STEP).max(MIN_SCALE));
        self.scale
    }

    pub fn rotate(&mut self) -> u16 {
        self.rotation = (self.rotation + 90) % 360;
        self.rotation
    }
}

// Keeps repeated 0.2 steps from drifting (1.2 + 0.2 * 3 == 1.8, not 1.8000001).
fn round_scale(scale: f32) -> f32 {
    (scale * 10.0).round() / 10.0
}

/// Navigation requests outside `[1, total_pages]` are ignored rather than
/// clamped to the edge. Nothing is reachable before the document loads.
pub fn clamp_page(requested: i64, total_pages: u32) -> Option<u32> {
    if requested >= 1 && requested <= i64::from(total_pages) {
        u32::try_from(requested).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_bounded() {
        let mut view = ViewState::default();
        for _ in 0..20 {
            view.zoom_in();
        }
        assert_eq!(view.scale, MAX_SCALE);

        for _ in 0..20 {
            view.zoom_out();
        }
        assert_eq!(view.scale, MIN_SCALE);
    }

    #[test]
    fn zoom_steps_do_not_drift() {
        let mut view = ViewState::default();
        view.zoom_in();
        view.zoom_in();
        view.zoom_in();
        assert_eq!(view.scale, 1.8);
    }

    #[test]
    fn rotation_wraps_at_full_turn() {
        let mut view = ViewState::default();
        let angles: Vec<u16> = (0..5).map(|_| view.rotate()).collect();
        assert_eq!(angles, vec![90, 180, 270, 0, 90]);
    }

    #[test]
    fn out_of_range_pages_are_ignored() {
        assert_eq!(clamp_page(0, 10), None);
        assert_eq!(clamp_page(11, 10), None);
        assert_eq!(clamp_page(-3, 10), None);
        assert_eq!(clamp_page(1, 0), None);
        assert_eq!(clamp_page(10, 10), Some(10));
    }
}
