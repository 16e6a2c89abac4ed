//! Stacked-alpha composite shader sources and the CPU reference of the
//! same math.
//!
//! Input frames store RGB color in the top half and a grayscale alpha
//! mask in the bottom half. The fragment shader samples both halves at
//! the same horizontal position and emits premultiplied color. The WGSL
//! below and `composite_reference` must stay in lockstep: the fake
//! backend used in tests runs the reference so pixel output can be
//! asserted against the shader semantics.

/// Vertex shader for the two-triangle quad. Consumes the cached
/// position/texcoord buffers (triangle strip, 4 vertices).
pub const STACKED_ALPHA_VS: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs_main(@location(0) position: vec2f, @location(1) texcoord: vec2f) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4f(position, 0.0, 1.0);
    out.uv = texcoord;
    return out;
}
"#;

/// Fragment shader: split-sample the stacked frame and premultiply.
/// Color lives at (u, v*0.5), the alpha mask at (u, 0.5 + v*0.5).
pub const STACKED_ALPHA_FS: &str = r#"
@group(0) @binding(0) var frame: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4f {
    let color = textureSample(frame, frame_sampler, vec2f(in.uv.x, in.uv.y * 0.5));
    let alpha = textureSample(frame, frame_sampler, vec2f(in.uv.x, 0.5 + in.uv.y * 0.5)).r;
    return vec4f(color.rgb * alpha, alpha);
}
"#;

/// Clip-space quad positions, triangle strip order.
pub const QUAD_POSITIONS: [f32; 8] = [
    -1.0, -1.0, // bottom-left
    1.0, -1.0, // bottom-right
    -1.0, 1.0, // top-left
    1.0, 1.0, // top-right
];

/// Unit-square texture coordinates matching `QUAD_POSITIONS`.
/// v = 0 is the top of the color half.
pub const QUAD_TEXCOORDS: [f32; 8] = [
    0.0, 1.0, //
    1.0, 1.0, //
    0.0, 0.0, //
    1.0, 0.0, //
];

/// CPU statement of the fragment-shader math, over a full stacked RGBA8
/// frame (`height` includes both halves). Returns the composited
/// premultiplied RGBA8 image of `height / 2` rows.
///
/// Integer premultiply `(c * a + 127) / 255` is exact round-to-nearest
/// of `c * a / 255`, matching what an 8-bit GPU channel produces.
pub fn composite_reference(frame: &[u8], width: u32, height: u32) -> Vec<u8> {
    let content_h = height / 2;
    let w = width as usize;
    let mut out = vec![0u8; w * content_h as usize * 4];

    for y in 0..content_h as usize {
        for x in 0..w {
            let color_idx = (y * w + x) * 4;
            let alpha_idx = ((y + content_h as usize) * w + x) * 4;
            let a = frame[alpha_idx]; // grayscale mask, red channel
            let out_idx = (y * w + x) * 4;
            out[out_idx] = premultiply(frame[color_idx], a);
            out[out_idx + 1] = premultiply(frame[color_idx + 1], a);
            out[out_idx + 2] = premultiply(frame[color_idx + 2], a);
            out[out_idx + 3] = a;
        }
    }

    out
}

#[inline]
fn premultiply(c: u8, a: u8) -> u8 {
    ((c as u32 * a as u32 + 127) / 255) as u8
}

/// Build a stacked RGBA8 test frame: top half solid `(r, g, b)`, bottom
/// half solid gray `a`. `height` is the full stacked height.
pub fn solid_stacked_frame(width: u32, height: u32, r: u8, g: u8, b: u8, a: u8) -> Vec<u8> {
    let content_h = height / 2;
    let mut frame = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for _ in 0..width {
            if y < content_h {
                frame.extend_from_slice(&[r, g, b, 255]);
            } else {
                frame.extend_from_slice(&[a, a, a, 255]);
            }
        }
    }
    frame
}
