/// 4 vertices × 2 floats, triangle-strip order (bottom-left, bottom-right, top-left, top-right).
pub type QuadBuffer = [f32; 8];

/// Full-screen quad in clip space.
pub const QUAD_POSITION: QuadBuffer = [
    -1.0, -1.0, //
    1.0, -1.0, //
    -1.0, 1.0, //
    1.0, 1.0,
];

/// Texture coordinates matching [`QUAD_POSITION`] with the image's first row at the top.
pub const QUAD_COORDINATE: QuadBuffer = [
    0.0, 1.0, //
    1.0, 1.0, //
    0.0, 0.0, //
    1.0, 0.0,
];
