//! Standard view sets: cube faces and carousel frames

use crate::math::Orientation;

/// One of the six 90° faces of a cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    Front,
    Right,
    Back,
    Left,
    Up,
    Down,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Front,
        CubeFace::Right,
        CubeFace::Back,
        CubeFace::Left,
        CubeFace::Up,
        CubeFace::Down,
    ];

    /// Field of view of every cube face.
    pub const FOV: f64 = 90.0;

    /// Directory / file stem used for this face.
    pub fn name(self) -> &'static str {
        match self {
            CubeFace::Front => "face_f",
            CubeFace::Right => "face_r",
            CubeFace::Back => "face_b",
            CubeFace::Left => "face_l",
            CubeFace::Up => "face_u",
            CubeFace::Down => "face_d",
        }
    }

    pub fn view(self) -> Orientation {
        let (yaw, pitch) = match self {
            CubeFace::Front => (0.0, 0.0),
            CubeFace::Right => (90.0, 0.0),
            CubeFace::Back => (180.0, 0.0),
            CubeFace::Left => (-90.0, 0.0),
            CubeFace::Up => (0.0, 90.0),
            CubeFace::Down => (0.0, -90.0),
        };
        Orientation::new(yaw, pitch, 0.0)
    }
}

/// Views of a carousel with `steps` frames spread evenly around the horizon.
pub fn carousel_views(steps: u32) -> Vec<Orientation> {
    (0..steps)
        .map(|i| Orientation::new(i as f64 * 360.0 / steps as f64, 0.0, 0.0))
        .collect()
}
