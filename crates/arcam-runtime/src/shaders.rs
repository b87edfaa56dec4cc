//! Built-in shader kernels.
//!
//! Naming contract shared with the stages:
//! - attributes `a_pos` (clip-space position) and `a_uv` (texture coordinate)
//! - sampler `iChannel0`, bound to the stage's texture unit

pub const ATTRIB_POSITION: &str = "a_pos";
pub const ATTRIB_COORDINATE: &str = "a_uv";
pub const UNIFORM_SAMPLER: &str = "iChannel0";

pub const UNIFORM_BLOCK_SIZE: &str = "uBlockSize";
pub const UNIFORM_INV_WIDTH: &str = "uInvWidth";
pub const UNIFORM_INV_HEIGHT: &str = "uInvHeight";

pub const QUAD_VERT: &str = r#"#version 330 core
in vec2 a_pos;
in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
"#;

pub const PASSTHROUGH_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 o;
uniform sampler2D iChannel0;
void main() { o = texture(iChannel0, v_uv); }
"#;

/// External images only exist on GLES, so this pair targets ESSL 3.00.
pub const QUAD_VERT_ES: &str = r#"#version 300 es
in vec2 a_pos;
in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
"#;

pub const EXTERNAL_FRAG: &str = r#"#version 300 es
#extension GL_OES_EGL_image_external_essl3 : require
precision mediump float;
in vec2 v_uv;
out vec4 o;
uniform samplerExternalOES iChannel0;
void main() { o = texture(iChannel0, v_uv); }
"#;

/// Block pixelation: snap the sample point to the corner of a `uBlockSize` pixel cell.
pub const PIXELATE_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 o;
uniform sampler2D iChannel0;
uniform float uBlockSize;
uniform float uInvWidth;
uniform float uInvHeight;
void main() {
    float dx = uBlockSize * uInvWidth;
    float dy = uBlockSize * uInvHeight;
    vec2 coord = vec2(dx * floor(v_uv.x / dx), dy * floor(v_uv.y / dy));
    o = vec4(texture(iChannel0, coord).rgb, 1.0);
}
"#;
