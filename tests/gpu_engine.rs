//! End-to-end engine tests on a headless adapter.
//!
//! Every test returns early when the machine has no usable GPU, so the suite
//! stays green on CI runners without one.

use std::sync::Arc;

use texflock::reference::ReferenceFlock;
use texflock::settings::{MAX_COMPONENT, MAX_SPEED, PREDATOR_ABSENT, PREDATOR_FORCE, PREDATOR_IMPULSE};
use texflock::state::baseline;
use texflock::{
    AgentState, BoundaryMode, ColorMode, DampedFluid, FlockEngine, FluidCoupling, FluidField, GpuContext,
    Impulse, NoFluid, Settings, SettingsChange, SettingsPatch, Vec2,
};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const TARGET_SIZE: (u32, u32) = (64, 64);
const DT: f32 = 1.0 / 60.0;

fn gpu() -> Option<Arc<GpuContext>> {
    match GpuContext::headless_blocking() {
        Ok(gpu) => Some(Arc::new(gpu)),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

fn engine(gpu: &Arc<GpuContext>, settings: Settings) -> FlockEngine {
    FlockEngine::with_seed(gpu.clone(), settings, TARGET_FORMAT, 42).expect("engine")
}

fn render_target(gpu: &GpuContext) -> wgpu::TextureView {
    readable_target(gpu).create_view(&wgpu::TextureViewDescriptor::default())
}

fn readable_target(gpu: &GpuContext) -> wgpu::Texture {
    gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: TARGET_SIZE.0,
            height: TARGET_SIZE.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Render the current generation and read it back as `[r, g, b, a]` rows, top row first.
fn render_pixels(engine: &FlockEngine, target: &wgpu::Texture) -> Vec<[u8; 4]> {
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    engine.render(&view, TARGET_SIZE);
    let bytes = engine.gpu().read_texture_bytes(target).expect("target readback");
    bytes
        .chunks_exact(4)
        .map(|p| [p[0], p[1], p[2], p[3]])
        .collect()
}

fn pixel(pixels: &[[u8; 4]], col: u32, row: u32) -> [u8; 4] {
    pixels[(row * TARGET_SIZE.0 + col) as usize]
}

const BLACK: [u8; 4] = [0, 0, 0, 255];

#[test]
fn test_construction_leaves_baseline_state() {
    let Some(gpu) = gpu() else { return };
    let engine = engine(&gpu, Settings::default().apply(&SettingsPatch::new().agent_count(50)));

    let state = engine.read_state().expect("readback");
    let expected = baseline(&engine.grid());
    assert_eq!(state.len(), 50);
    for (got, want) in state.iter().zip(&expected) {
        assert!((got.position - want.position).length() < 1e-6, "{:?}", got);
        assert_eq!(got.velocity, Vec2::ZERO);
    }
}

#[test]
fn test_reset_twice_matches_reset_once() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(&gpu, Settings::default());
    for _ in 0..5 {
        engine.update(DT, &NoFluid);
    }

    engine.reset_all();
    let once = engine.read_state().expect("readback");
    engine.reset_all();
    let twice = engine.read_state().expect("readback");
    assert_eq!(once, twice);
    assert!(twice.iter().all(|a| a.velocity == Vec2::ZERO));
}

#[test]
fn test_generation_counts_updates() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(&gpu, Settings::default());
    let view = render_target(&gpu);

    for n in 1..=4 {
        engine.step(DT, &NoFluid, &view, TARGET_SIZE);
        assert_eq!(engine.generation(), n);
    }
    engine.render(&view, TARGET_SIZE);
    assert_eq!(engine.generation(), 4);
}

#[test]
fn test_update_matches_reference() {
    let Some(gpu) = gpu() else { return };
    let settings = Settings::default().apply(
        &SettingsPatch::new()
            .agent_count(30)
            .sight_radius(0.2)
            .predator_position(Vec2::new(0.3, 0.4)),
    );
    let mut engine = engine(&gpu, settings);

    // Keep every agent above the stall speed so the sin() hash never runs.
    let agents: Vec<AgentState> = (0..30)
        .map(|i| {
            let t = i as f32 / 30.0;
            AgentState::new(
                Vec2::new(0.2 + 0.6 * t, 0.5 + 0.2 * (t * 7.0).sin()),
                Vec2::new(0.01 + 0.02 * t, -0.015),
            )
        })
        .collect();
    engine.load_state(&agents);
    let mut reference = ReferenceFlock::with_agents(settings, agents);

    for _ in 0..3 {
        engine.update(DT, &NoFluid);
        reference.step(DT, None);
    }

    let gpu_state = engine.read_state().expect("readback");
    for (got, want) in gpu_state.iter().zip(reference.agents()) {
        assert!((got.position - want.position).length() < 1e-4, "{:?} vs {:?}", got, want);
        assert!((got.velocity - want.velocity).length() < 1e-4, "{:?} vs {:?}", got, want);
    }
}

#[test]
fn test_wide_walls_and_overlapping_predator_on_gpu() {
    let Some(gpu) = gpu() else { return };
    let settings = Settings::default().apply(
        &SettingsPatch::new()
            .agent_count(2)
            .separation_weight(0.0)
            .alignment_weight(0.0)
            .cohesion_weight(0.0)
            .boundary(BoundaryMode::Clamp)
            .wall_avoidance_threshold(0.8)
            .wall_avoidance_weight(1.0)
            .predator_position(Vec2::splat(0.6))
            .predator_radius(0.2)
            .predator_weight(0.0),
    );
    let agents = vec![
        AgentState::new(Vec2::new(0.3, 0.9), Vec2::new(0.01, 0.0)),
        AgentState::new(Vec2::splat(0.6), Vec2::new(0.0, 0.01)),
    ];
    let mut engine = engine(&gpu, settings);
    engine.load_state(&agents);
    engine.update(DT, &NoFluid);
    let got = engine.read_state().expect("readback");

    // Away from the predator both walls push, so x grows instead of cancelling.
    let mut reference = ReferenceFlock::with_agents(settings, agents.clone());
    reference.step(DT, None);
    let walled = reference.agents()[0];
    assert!(got[0].velocity.x > 0.01, "{:?}", got[0]);
    assert!(got[0].velocity.y < 0.0, "{:?}", got[0]);
    assert!((got[0].velocity - walled.velocity).length() < 1e-4);

    // The fallback direction hashes with sin(), so only the kick size is compared.
    let unhunted = settings.apply(&SettingsPatch::new().predator_position(PREDATOR_ABSENT));
    let mut calm = ReferenceFlock::with_agents(unhunted, agents);
    calm.step(DT, None);
    let kick = (got[1].velocity - calm.agents()[1].velocity).length();
    assert!((kick - PREDATOR_FORCE * PREDATOR_IMPULSE).abs() < 1e-3, "kick {}", kick);
}

#[test]
fn test_speed_bound_and_wrap_on_gpu() {
    let Some(gpu) = gpu() else { return };
    let settings = Settings::default().apply(
        &SettingsPatch::new()
            .agent_count(100)
            .boundary(BoundaryMode::Wrap)
            .separation_weight(1.0e4)
            .alignment_weight(1.0e4)
            .cohesion_weight(1.0e4)
            .sight_radius(0.3)
            .predator_position(Vec2::splat(0.5))
            .predator_weight(1.0e4),
    );
    let mut engine = engine(&gpu, settings);
    for _ in 0..30 {
        engine.update(0.05, &NoFluid);
    }

    for agent in engine.read_state().expect("readback") {
        assert!(agent.velocity.length() <= MAX_SPEED * (1.0 + 1e-4), "{:?}", agent);
        assert!(agent.velocity.abs().max_element() <= MAX_COMPONENT);
        assert!((0.0..1.0).contains(&agent.position.x), "{:?}", agent);
        assert!((0.0..1.0).contains(&agent.position.y), "{:?}", agent);
    }
}

#[test]
fn test_agent_count_change_regrids() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(&gpu, Settings::default());
    assert_eq!(engine.grid().side(), 8);

    let change = engine
        .update_settings(&SettingsPatch::new().agent_count(101))
        .expect("regrid");
    assert_eq!(change, SettingsChange::Regrid);
    assert_eq!(engine.grid().side(), 11);
    assert_eq!(engine.settings().agent_count, 101);

    let state = engine.read_state().expect("readback");
    assert_eq!(state.len(), 101);
    assert!(state
        .iter()
        .all(|a| (0.0..1.0).contains(&a.position.x) && (0.0..1.0).contains(&a.position.y)));

    let change = engine
        .update_settings(&SettingsPatch::new().separation_weight(0.3))
        .expect("parameters");
    assert_eq!(change, SettingsChange::Parameters);
    assert_eq!(engine.grid().side(), 11);

    // The render after a regrid decodes against the new grid.
    let view = render_target(&gpu);
    engine.step(DT, &NoFluid, &view, TARGET_SIZE);
}

#[test]
fn test_oversized_grid_is_rejected_and_old_pair_kept() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(&gpu, Settings::default());
    let limit = gpu.max_texture_side();
    let too_many = (limit + 1).saturating_mul(limit + 1);
    if too_many == u32::MAX {
        return;
    }

    let result = engine.update_settings(&SettingsPatch::new().agent_count(too_many));
    assert!(result.is_err());
    assert_eq!(engine.settings().agent_count, 64);
    assert_eq!(engine.read_state().expect("readback").len(), 64);
}

#[test]
fn test_fluid_impulse_moves_field_and_flock() {
    let Some(gpu) = gpu() else { return };
    let settings = Settings::default().apply(
        &SettingsPatch::new()
            .agent_count(16)
            .fluid_enabled(true)
            .fluid_weight(1.0)
            .separation_weight(0.0)
            .alignment_weight(0.0)
            .cohesion_weight(0.0)
            .wall_avoidance_weight(0.0),
    );
    let mut engine = engine(&gpu, settings);
    let mut fluid = DampedFluid::new(&gpu, 32);
    assert!(fluid.velocity_field().is_some());

    fluid.inject_impulse(Impulse::new(Vec2::splat(0.5), Vec2::X, 0.05, 1.0));
    fluid.step(&gpu, 0.1, None);
    assert!(fluid.pending_impulse().is_none());

    let field = fluid.read_velocity(&gpu).expect("field readback");
    let peak = field.iter().map(|v| v[0]).fold(0.0f32, f32::max);
    assert!(peak > 0.0, "impulse left no trace in the field");

    let before = engine.read_state().expect("readback");
    engine.update(DT, &fluid);
    assert!(engine.fluid_forcing().is_some());
    fluid.step(&gpu, DT, engine.fluid_forcing());

    let after = engine.read_state().expect("readback");
    let pushed = before
        .iter()
        .zip(&after)
        .filter(|(b, a)| a.velocity.x > b.velocity.x)
        .count();
    assert!(pushed > 0, "no agent picked up the fluid velocity");

    fluid.reset(&gpu);
    let cleared = fluid.read_velocity(&gpu).expect("field readback");
    assert!(cleared.iter().all(|v| v[0] == 0.0 && v[1] == 0.0));
}

#[test]
fn test_disabled_fluid_has_no_forcing() {
    let Some(gpu) = gpu() else { return };
    let engine = engine(&gpu, Settings::default());
    assert!(engine.fluid_forcing().is_none());
}

#[test]
fn test_render_draws_one_disc_at_the_agent() {
    let Some(gpu) = gpu() else { return };
    let settings = Settings::default().apply(&SettingsPatch::new().agent_count(1).point_size(8.0));
    let engine = engine(&gpu, settings);
    engine.load_state(&[AgentState::new(Vec2::new(0.25, 0.75), Vec2::new(0.05, 0.0))]);
    let target = readable_target(&gpu);
    let pixels = render_pixels(&engine, &target);

    // Unit-square y points up, so y = 0.75 lands a quarter of the way down.
    let center = Vec2::new(16.0, 16.0);
    let radius = settings.point_size / 2.0;
    let mut lit = 0;
    for row in 0..TARGET_SIZE.1 {
        for col in 0..TARGET_SIZE.0 {
            let p = pixel(&pixels, col, row);
            let dist = (Vec2::new(col as f32, row as f32) + 0.5 - center).length();
            if p != BLACK {
                assert_eq!(p, [255, 255, 255, 255], "({}, {})", col, row);
                assert!(dist <= radius + 0.75, "({}, {}) lit at {}", col, row, dist);
                lit += 1;
            } else {
                assert!(dist >= radius - 0.75, "({}, {}) dark at {}", col, row, dist);
            }
        }
    }
    let disc = std::f32::consts::PI * radius * radius;
    assert!((lit as f32 - disc).abs() < disc * 0.35, "{} lit pixels", lit);
    assert_eq!(pixel(&pixels, 16, 48), BLACK);
}

#[test]
fn test_color_modes_tint_the_disc() {
    let Some(gpu) = gpu() else { return };
    let settings = Settings::default().apply(&SettingsPatch::new().agent_count(1).point_size(8.0));
    let mut engine = engine(&gpu, settings);
    engine.load_state(&[AgentState::new(Vec2::splat(0.5), Vec2::new(0.05, 0.0))]);
    let target = readable_target(&gpu);

    engine
        .update_settings(&SettingsPatch::new().color_mode(ColorMode::Velocity))
        .expect("color mode");
    let [r, g, b, _] = pixel(&render_pixels(&engine, &target), 32, 32);
    // Heading +x maps to hue 0.5.
    assert!(r < 64 && g > 160 && b > 160, "{:?}", [r, g, b]);

    engine
        .update_settings(&SettingsPatch::new().color_mode(ColorMode::Acceleration))
        .expect("color mode");
    let [_, _, b, a] = pixel(&render_pixels(&engine, &target), 32, 32);
    assert!((126..=129).contains(&b), "blue {}", b);
    assert_eq!(a, 255);
}

#[test]
fn test_projection_splats_near_the_agent_and_reset_clears() {
    let Some(gpu) = gpu() else { return };
    let settings = Settings::default().apply(
        &SettingsPatch::new()
            .agent_count(1)
            .fluid_enabled(true)
            .boid_weight(1.0)
            .separation_weight(0.0)
            .alignment_weight(0.0)
            .cohesion_weight(0.0)
            .wall_avoidance_weight(0.0),
    );
    let mut engine = engine(&gpu, settings);
    engine.load_state(&[AgentState::new(Vec2::new(0.25, 0.75), Vec2::new(0.02, 0.01))]);
    engine.update(DT, &NoFluid);

    let (side, forcing) = engine.read_forcing().expect("forcing readback");
    assert_eq!(forcing.len(), (side * side) as usize);
    let at = |col: u32, row: u32| forcing[(row * side + col) as usize];

    // Same top-down layout as the screen.
    let (col, row) = (side / 4, side / 4);
    let hit = at(col, row);
    assert!(hit[3] > 0.0, "{:?}", hit);
    assert!(hit[0] > 0.0 && hit[1] > 0.0, "{:?}", hit);
    assert_eq!(at(col, side - row), [0.0; 4]);
    assert_eq!(at(col + 8, row), [0.0; 4]);

    engine.reset_all();
    let (_, cleared) = engine.read_forcing().expect("forcing readback");
    assert!(cleared.iter().all(|t| *t == [0.0; 4]));
}
