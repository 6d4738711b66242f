//! WGSL sources for every pass.
//!
//! Each pass module is the shared [`prelude`] followed by the uniform struct
//! it binds and its own entry points (`vs_main`/`fs_main`). The prelude holds
//! the functions that must agree across passes:
//!
//! - `decode_index(i, side) -> vec2<i32>`: agent index to texel, row-major
//! - `texel_center(texel, side) -> vec2<f32>`: normalized texel center
//! - `hash_coord(c) -> f32` / `stall_direction(c) -> vec2<f32>`: the
//!   deterministic kick for stalled agents
//! - `safe_normalize(v)`: zero for zero-length input
//! - `hsv_to_rgb(h, s, v)`: used by the velocity color mode
//!
//! Flock constants are spliced in from [`crate::settings`] so the CPU mirror
//! in [`crate::reference`] and the GPU agree on them.

use crate::pass::PassKind;
use crate::settings::{
    MAX_COMPONENT, PREDATOR_FORCE, PREDATOR_IMPULSE, STALL_KICK, STALL_SPEED,
};

const PRELUDE_FUNCTIONS: &str = r#"
fn decode_index(index: u32, side: u32) -> vec2<i32> {
    return vec2<i32>(i32(index % side), i32(index / side));
}

fn texel_center(texel: vec2<i32>, side: u32) -> vec2<f32> {
    return (vec2<f32>(texel) + 0.5) / f32(side);
}

fn hash_coord(c: vec2<f32>) -> f32 {
    return fract(sin(dot(c, vec2<f32>(12.9898, 78.233))) * 43758.5453);
}

fn stall_direction(c: vec2<f32>) -> vec2<f32> {
    let angle = hash_coord(c) * TAU;
    return vec2<f32>(cos(angle), sin(angle));
}

fn safe_normalize(v: vec2<f32>) -> vec2<f32> {
    let len = length(v);
    if len > 0.0 {
        return v / len;
    }
    return vec2<f32>(0.0);
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> vec3<f32> {
    let c = v * s;
    let hp = fract(h) * 6.0;
    let x = c * (1.0 - abs(hp % 2.0 - 1.0));
    let m = v - c;

    var rgb: vec3<f32>;
    if hp < 1.0 {
        rgb = vec3<f32>(c, x, 0.0);
    } else if hp < 2.0 {
        rgb = vec3<f32>(x, c, 0.0);
    } else if hp < 3.0 {
        rgb = vec3<f32>(0.0, c, x);
    } else if hp < 4.0 {
        rgb = vec3<f32>(0.0, x, c);
    } else if hp < 5.0 {
        rgb = vec3<f32>(x, 0.0, c);
    } else {
        rgb = vec3<f32>(c, 0.0, x);
    }
    return rgb + vec3<f32>(m);
}

// Oversized triangle; every texel of the target is rasterized exactly once.
fn fullscreen_position(vertex_index: u32) -> vec4<f32> {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    return vec4<f32>(positions[vertex_index], 0.0, 1.0);
}

// Corner of a two-triangle quad in [-1, 1]².
fn quad_corner(vertex_index: u32) -> vec2<f32> {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    return corners[vertex_index];
}
"#;

/// Shared constants and helper functions.
pub fn prelude() -> String {
    format!(
        "const TAU: f32 = 6.28318530718;\n\
         const MAX_COMPONENT: f32 = {MAX_COMPONENT:?};\n\
         const STALL_SPEED: f32 = {STALL_SPEED:?};\n\
         const STALL_KICK: f32 = {STALL_KICK:?};\n\
         const PREDATOR_FORCE: f32 = {PREDATOR_FORCE:?};\n\
         const PREDATOR_IMPULSE: f32 = {PREDATOR_IMPULSE:?};\n\
         {PRELUDE_FUNCTIONS}"
    )
}

/// Mirrors [`crate::uniforms::UpdateUniforms`]. Shared by reset and update.
const FLOCK_UNIFORMS: &str = r#"
struct FlockUniforms {
    predator_position: vec2<f32>,
    grid_size: u32,
    agent_count: u32,
    delta_time: f32,
    separation_weight: f32,
    alignment_weight: f32,
    cohesion_weight: f32,
    sight_radius: f32,
    predator_radius: f32,
    predator_weight: f32,
    wall_threshold: f32,
    wall_weight: f32,
    fluid_weight: f32,
    wrap: u32,
    fluid_enabled: u32,
    max_speed: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};
"#;

const RESET_BODY: &str = r#"
@group(0) @binding(0)
var<uniform> flock: FlockUniforms;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    return fullscreen_position(vertex_index);
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(floor(frag.xy));
    let index = u32(texel.y) * flock.grid_size + u32(texel.x);
    if index >= flock.agent_count {
        return vec4<f32>(0.0);
    }
    return vec4<f32>(texel_center(texel, flock.grid_size), 0.0, 0.0);
}
"#;

const UPDATE_BODY: &str = r#"
@group(0) @binding(0)
var<uniform> flock: FlockUniforms;
@group(0) @binding(1)
var state: texture_2d<f32>;
@group(0) @binding(2)
var fluid_velocity: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    return fullscreen_position(vertex_index);
}

// Fluid textures are laid out like the screen: row 0 is the top edge.
fn sample_fluid(position: vec2<f32>) -> vec2<f32> {
    let dims = vec2<i32>(textureDimensions(fluid_velocity));
    let uv = vec2<f32>(position.x, 1.0 - position.y);
    let texel = clamp(vec2<i32>(uv * vec2<f32>(dims)), vec2<i32>(0), dims - vec2<i32>(1));
    return textureLoad(fluid_velocity, texel, 0).xy;
}

// Away from the nearer wall on each axis; sign(0.0) leaves the midline alone.
fn wall_push(position: vec2<f32>) -> vec2<f32> {
    let near = min(position, vec2<f32>(1.0) - position) < vec2<f32>(flock.wall_threshold);
    return select(vec2<f32>(0.0), sign(vec2<f32>(0.5) - position), near);
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(floor(frag.xy));
    let me = textureLoad(state, texel, 0);
    let index = u32(texel.y) * flock.grid_size + u32(texel.x);
    if index >= flock.agent_count {
        return me;
    }

    var position = me.xy;
    var velocity = me.zw;

    if length(velocity) < STALL_SPEED {
        velocity += stall_direction(texel_center(texel, flock.grid_size)) * STALL_KICK;
    }

    var acceleration = vec2<f32>(0.0);

    let to_predator = position - flock.predator_position;
    let predator_dist = length(to_predator);
    if predator_dist < flock.predator_radius {
        var away = stall_direction(texel_center(texel, flock.grid_size));
        if predator_dist > 0.0 {
            away = to_predator / predator_dist;
        }
        let ramp = 1.0 - predator_dist / flock.predator_radius;
        let repulsion = away * ramp * ramp * PREDATOR_FORCE;
        velocity += repulsion * PREDATOR_IMPULSE;
        acceleration += repulsion * flock.predator_weight;
    }

    var separation = vec2<f32>(0.0);
    var alignment = vec2<f32>(0.0);
    var cohesion = vec2<f32>(0.0);
    var neighbors = 0u;
    for (var i = 0u; i < flock.agent_count; i += 1u) {
        if i == index {
            continue;
        }
        let other = textureLoad(state, decode_index(i, flock.grid_size), 0);
        let diff = position - other.xy;
        let dist = length(diff);
        if dist > 0.0 && dist < flock.sight_radius {
            separation += diff / dist / dist;
            alignment += other.zw;
            cohesion += other.xy;
            neighbors += 1u;
        }
    }

    if neighbors > 0u {
        let n = f32(neighbors);
        acceleration += safe_normalize(separation) * flock.separation_weight;
        acceleration += safe_normalize(alignment / n) * flock.alignment_weight;
        acceleration += safe_normalize(cohesion / n - position) * flock.cohesion_weight;
    }

    if flock.wrap == 0u {
        acceleration += wall_push(position) * flock.wall_weight;
    }

    if flock.fluid_enabled != 0u {
        velocity += sample_fluid(position) * flock.fluid_weight;
    }

    velocity += acceleration * flock.delta_time;
    let speed = length(velocity);
    if speed > flock.max_speed {
        velocity = velocity / speed * flock.max_speed;
    }
    velocity = clamp(velocity, vec2<f32>(-MAX_COMPONENT), vec2<f32>(MAX_COMPONENT));

    position += velocity * flock.delta_time;
    if flock.wrap != 0u {
        position = position - floor(position);
        position = select(position, vec2<f32>(0.0), position >= vec2<f32>(1.0));
    } else {
        position = clamp(position, vec2<f32>(0.0), vec2<f32>(1.0));
        if position.x == 0.0 || position.x == 1.0 {
            velocity.x = 0.0;
        }
        if position.y == 0.0 || position.y == 1.0 {
            velocity.y = 0.0;
        }
    }

    return vec4<f32>(position, velocity);
}
"#;

/// Mirrors [`crate::uniforms::RenderUniforms`].
const RENDER_UNIFORMS: &str = r#"
struct RenderUniforms {
    viewport: vec2<f32>,
    grid_size: u32,
    agent_count: u32,
    point_size: f32,
    color_mode: u32,
    max_speed: f32,
    _pad: f32,
};
"#;

const RENDER_BODY: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) color: vec3<f32>,
};

@group(0) @binding(0)
var<uniform> view: RenderUniforms;
@group(0) @binding(1)
var current: texture_2d<f32>;
@group(0) @binding(2)
var previous: texture_2d<f32>;

fn agent_color(now: vec4<f32>, before: vec4<f32>) -> vec3<f32> {
    var color = vec3<f32>(1.0);
    switch view.color_mode {
        case 1u: {
            let v = now.zw;
            let hue = atan2(v.y, v.x) / TAU + 0.5;
            let brightness = 0.5 + 0.5 * clamp(length(v) / view.max_speed, 0.0, 1.0);
            color = hsv_to_rgb(hue, 0.8, brightness);
        }
        case 2u: {
            // `previous` holds the generation before `current` after the swap.
            let delta = (now.zw - before.zw) / (view.max_speed * 0.05);
            color = vec3<f32>(0.5 + 0.5 * clamp(delta, vec2<f32>(-1.0), vec2<f32>(1.0)), 0.5);
        }
        default: {}
    }
    return color;
}

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) instance_index: u32,
) -> VertexOutput {
    let corner = quad_corner(vertex_index);
    let texel = decode_index(instance_index, view.grid_size);
    let now = textureLoad(current, texel, 0);
    let before = textureLoad(previous, texel, 0);

    // point_size is a diameter in pixels; clip space spans 2 units per viewport.
    let half_extent = view.point_size / view.viewport;

    var out: VertexOutput;
    out.clip_position = vec4<f32>(now.xy * 2.0 - 1.0 + corner * half_extent, 0.0, 1.0);
    out.local = corner;
    out.color = agent_color(now, before);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    if dot(in.local, in.local) > 1.0 {
        discard;
    }
    return vec4<f32>(in.color, 1.0);
}
"#;

/// Mirrors [`crate::uniforms::ProjectUniforms`].
const PROJECT_UNIFORMS: &str = r#"
struct ProjectUniforms {
    target_size: vec2<f32>,
    grid_size: u32,
    agent_count: u32,
    boid_weight: f32,
    splat_radius: f32,
    _pad0: f32,
    _pad1: f32,
};
"#;

const PROJECT_BODY: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) velocity: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> project: ProjectUniforms;
@group(0) @binding(1)
var state: texture_2d<f32>;

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) instance_index: u32,
) -> VertexOutput {
    let corner = quad_corner(vertex_index);
    let agent = textureLoad(state, decode_index(instance_index, project.grid_size), 0);
    let half_extent = vec2<f32>(project.splat_radius * 2.0);

    var out: VertexOutput;
    out.clip_position = vec4<f32>(agent.xy * 2.0 - 1.0 + corner * half_extent, 0.0, 1.0);
    out.local = corner;
    out.velocity = agent.zw * project.boid_weight;
    return out;
}

// Blended additively, so overlapping agents sum their contributions.
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let falloff = max(1.0 - dot(in.local, in.local), 0.0);
    return vec4<f32>(in.velocity * falloff, 0.0, falloff);
}
"#;

/// Mirrors [`crate::uniforms::FluidUniforms`].
const FLUID_UNIFORMS: &str = r#"
struct FluidUniforms {
    impulse_position: vec2<f32>,
    impulse_direction: vec2<f32>,
    impulse_radius: f32,
    impulse_magnitude: f32,
    decay: f32,
    forcing_gain: f32,
    delta_time: f32,
    impulse_active: u32,
    field_size: vec2<f32>,
};
"#;

const FLUID_BODY: &str = r#"
@group(0) @binding(0)
var<uniform> fluid: FluidUniforms;
@group(0) @binding(1)
var velocity: texture_2d<f32>;
@group(0) @binding(2)
var forcing: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    return fullscreen_position(vertex_index);
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(floor(frag.xy));
    var v = textureLoad(velocity, texel, 0).xy * fluid.decay;

    let forcing_dims = vec2<f32>(textureDimensions(forcing));
    let uv = frag.xy / fluid.field_size;
    let forcing_texel = clamp(
        vec2<i32>(uv * forcing_dims),
        vec2<i32>(0),
        vec2<i32>(forcing_dims) - vec2<i32>(1),
    );
    v += textureLoad(forcing, forcing_texel, 0).xy * fluid.forcing_gain * fluid.delta_time;

    if fluid.impulse_active != 0u {
        let position = vec2<f32>(uv.x, 1.0 - uv.y);
        let d = position - fluid.impulse_position;
        let splat = exp(-dot(d, d) / max(fluid.impulse_radius, 1e-8));
        v += fluid.impulse_direction * fluid.impulse_magnitude * splat * fluid.delta_time;
    }

    return vec4<f32>(v, 0.0, 1.0);
}
"#;

fn compose(uniforms: &str, body: &str) -> String {
    format!("{}\n{}\n{}", prelude(), uniforms, body)
}

/// Complete WGSL module for a pass.
pub fn source(kind: PassKind) -> String {
    match kind {
        PassKind::Reset => compose(FLOCK_UNIFORMS, RESET_BODY),
        PassKind::Update => compose(FLOCK_UNIFORMS, UPDATE_BODY),
        PassKind::Render => compose(RENDER_UNIFORMS, RENDER_BODY),
        PassKind::FluidProject => compose(PROJECT_UNIFORMS, PROJECT_BODY),
        PassKind::FluidStep => compose(FLUID_UNIFORMS, FLUID_BODY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {}", e.emit_to_string(code)))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(module)
    }

    fn has_entry_points(module: &naga::Module) -> bool {
        let names: Vec<_> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
        names.contains(&"vs_main") && names.contains(&"fs_main")
    }

    #[test]
    fn test_every_pass_validates() {
        for kind in PassKind::ALL {
            let module = validate_wgsl(&source(kind))
                .unwrap_or_else(|e| panic!("{:?} shader invalid: {}", kind, e));
            assert!(has_entry_points(&module), "{:?} missing entry points", kind);
        }
    }

    #[test]
    fn test_prelude_splices_constants() {
        let prelude = prelude();
        assert!(prelude.contains(&format!("const MAX_COMPONENT: f32 = {:?};", MAX_COMPONENT)));
        assert!(prelude.contains("const STALL_KICK: f32 = 0.0005;"));
        assert!(prelude.contains("const PREDATOR_IMPULSE: f32 = 5.0;"));
    }

    #[test]
    fn test_speed_bound_comes_from_uniforms() {
        for kind in PassKind::ALL {
            assert!(!source(kind).contains("MAX_SPEED"), "{:?}", kind);
        }
        assert!(source(PassKind::Update).contains("flock.max_speed"));
        assert!(source(PassKind::Render).contains("view.max_speed"));
    }

    #[test]
    fn test_update_reads_only_bound_state() {
        let src = source(PassKind::Update);
        assert!(src.contains("textureLoad(state"));
        assert!(!src.contains("textureStore"));
        assert!(src.contains("decode_index(i, flock.grid_size)"));
    }

    #[test]
    fn test_uniform_struct_sizes_match_rust() {
        use crate::uniforms::{FluidUniforms, ProjectUniforms, RenderUniforms, UpdateUniforms};

        let cases = [
            (PassKind::Update, "FlockUniforms", std::mem::size_of::<UpdateUniforms>()),
            (PassKind::Render, "RenderUniforms", std::mem::size_of::<RenderUniforms>()),
            (
                PassKind::FluidProject,
                "ProjectUniforms",
                std::mem::size_of::<ProjectUniforms>(),
            ),
            (PassKind::FluidStep, "FluidUniforms", std::mem::size_of::<FluidUniforms>()),
        ];
        for (kind, name, rust_size) in cases {
            let module = validate_wgsl(&source(kind)).unwrap();
            let mut layouter = naga::proc::Layouter::default();
            layouter.update(module.to_ctx()).unwrap();
            let (handle, _) = module
                .types
                .iter()
                .find(|(_, ty)| ty.name.as_deref() == Some(name))
                .unwrap_or_else(|| panic!("{} not declared", name));
            assert_eq!(layouter[handle].size as usize, rust_size, "{} size", name);
        }
    }
}
