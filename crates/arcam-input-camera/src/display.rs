//! Preview geometry: resolution negotiation, sensor/display orientation and cover-fit quads.

use crate::{CameraInfo, Facing, PreviewSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Snaps to the nearest lower quarter turn after normalizing into `0..360`.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) / 90 {
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            3 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Width and height trade places between sensor and screen.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Rotation relating the sensor image to the screen.
///
/// Front cameras are mirrored, so the display rotation adds instead of subtracting.
pub fn display_orientation(info: &CameraInfo, display: Rotation) -> Rotation {
    let mount = info.orientation as i32;
    let degrees = match info.facing {
        Facing::Front => (mount + display.degrees()) % 360,
        Facing::Back => (mount - display.degrees() + 360) % 360,
    };
    Rotation::from_degrees(degrees)
}

/// The viewport as the sensor sees it.
fn sensor_viewport(viewport: (i32, i32), rotation: Rotation) -> (i32, i32) {
    if rotation.swaps_axes() {
        (viewport.1, viewport.0)
    } else {
        viewport
    }
}

/// Pick the preview resolution for a viewport.
///
/// A candidate must fit inside the rotation-adjusted viewport on both axes. It replaces the
/// running best when it is at least as large on *either* axis, so later sizes win ties. This is
/// a greedy rule, not a true area maximum.
pub fn negotiate_preview_size(
    sizes: &[PreviewSize],
    viewport: (i32, i32),
    rotation: Rotation,
) -> Option<PreviewSize> {
    let (vw, vh) = sensor_viewport(viewport, rotation);
    if vw <= 0 || vh <= 0 {
        return None;
    }
    let (vw, vh) = (vw as u32, vh as u32);

    let mut best = PreviewSize::default();
    for size in sizes {
        if size.width <= vw
            && size.height <= vh
            && (size.width >= best.width || size.height >= best.height)
        {
            best = *size;
        }
    }
    (!best.is_empty()).then_some(best)
}

const COORDINATE_ROTATED_0: [f32; 8] = [
    0.0, 1.0, //
    1.0, 1.0, //
    0.0, 0.0, //
    1.0, 0.0,
];

const COORDINATE_ROTATED_90: [f32; 8] = [
    1.0, 1.0, //
    1.0, 0.0, //
    0.0, 1.0, //
    0.0, 0.0,
];

const COORDINATE_ROTATED_180: [f32; 8] = [
    1.0, 0.0, //
    0.0, 0.0, //
    1.0, 1.0, //
    0.0, 1.0,
];

const COORDINATE_ROTATED_270: [f32; 8] = [
    0.0, 0.0, //
    0.0, 1.0, //
    1.0, 0.0, //
    1.0, 1.0,
];

fn mirror(f: f32) -> f32 {
    if f == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Texture coordinates for the quad strip, rotated and optionally mirrored horizontally.
pub fn rotated_coordinates(rotation: Rotation, mirrored: bool) -> [f32; 8] {
    let mut coords = match rotation {
        Rotation::Deg0 => COORDINATE_ROTATED_0,
        Rotation::Deg90 => COORDINATE_ROTATED_90,
        Rotation::Deg180 => COORDINATE_ROTATED_180,
        Rotation::Deg270 => COORDINATE_ROTATED_270,
    };
    if mirrored {
        for x in coords.iter_mut().step_by(2) {
            *x = mirror(*x);
        }
    }
    coords
}

/// Quad geometry that shows a preview upright and cover-fit on the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayAlignment {
    pub rotation: Rotation,
    /// Uniform scale applied to the preview so it covers the viewport.
    pub scale: f32,
    pub position: [f32; 8],
    pub coordinate: [f32; 8],
}

/// Cover-fit: scale by the larger of the two axis ratios, crop the overflow.
///
/// Returns `None` until both the viewport and the preview have a positive size.
pub fn align_display(
    viewport: (i32, i32),
    preview: PreviewSize,
    rotation: Rotation,
    mirrored: bool,
) -> Option<DisplayAlignment> {
    let (ow, oh) = sensor_viewport(viewport, rotation);
    if ow <= 0 || oh <= 0 || preview.is_empty() {
        return None;
    }
    let (ow, oh) = (ow as f32, oh as f32);
    let (pw, ph) = (preview.width as f32, preview.height as f32);

    let scale = (ow / pw).max(oh / ph);
    let w_ratio = pw * scale / ow;
    let h_ratio = ph * scale / oh;

    // Sensor width runs along screen y when the axes are swapped.
    let (sx, sy) = if rotation.swaps_axes() {
        (h_ratio, w_ratio)
    } else {
        (w_ratio, h_ratio)
    };

    Some(DisplayAlignment {
        rotation,
        scale,
        position: [-sx, -sy, sx, -sy, -sx, sy, sx, sy],
        coordinate: rotated_coordinates(rotation, mirrored),
    })
}
