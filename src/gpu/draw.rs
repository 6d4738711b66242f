//! The two draw shapes every pass is built from.

use super::ShaderProgram;
use crate::pass::DrawPrimitive;

fn color_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &'static str,
    target: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

/// Run a per-texel pass: one fragment for every texel of `target`.
pub fn draw_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    program: &ShaderProgram,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
) {
    let desc = program.kind().descriptor();
    debug_assert_eq!(desc.primitive, DrawPrimitive::FullscreenQuad);

    // Every texel is overwritten, so the old contents need not be loaded.
    let mut pass = color_pass(
        encoder,
        desc.label,
        target,
        wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
    );
    pass.set_pipeline(program.pipeline());
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

/// Draw one quad per agent index. `clear` of `None` keeps the target's contents.
pub fn draw_agents(
    encoder: &mut wgpu::CommandEncoder,
    program: &ShaderProgram,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
    agent_count: u32,
    clear: Option<wgpu::Color>,
) {
    let desc = program.kind().descriptor();
    debug_assert_eq!(desc.primitive, DrawPrimitive::AgentQuads);

    let load = match clear {
        Some(color) => wgpu::LoadOp::Clear(color),
        None => wgpu::LoadOp::Load,
    };
    let mut pass = color_pass(encoder, desc.label, target, load);
    pass.set_pipeline(program.pipeline());
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..6, 0..agent_count);
}
