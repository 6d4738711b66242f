//! Typed pass descriptors.
//!
//! Every draw the engine issues is one [`PassKind`]. A kind fixes its draw
//! primitive, the target it writes and the ordered list of resources it
//! binds, so pipelines and bind groups are built from static data rather
//! than looked up by name.
//!
//! | pass | primitive | target | bindings |
//! |------|-----------|--------|----------|
//! | Reset | fullscreen | state read side | uniforms |
//! | Update | fullscreen | state write side | uniforms, current state, fluid velocity |
//! | Render | agent quads | screen | uniforms, current state, previous state |
//! | FluidProject | agent quads | forcing | uniforms, current state |
//! | FluidStep | fullscreen | fluid field | uniforms, fluid velocity, forcing |

/// How many primitives a pass draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawPrimitive {
    /// One triangle covering the whole target; one fragment per texel.
    FullscreenQuad,
    /// One quad instance per agent index.
    AgentQuads,
}

/// What a pass writes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// The read side of the state pair (only reset writes here).
    StateRead,
    /// The write side of the state pair.
    StateWrite,
    /// The presentation surface or any caller-supplied color view.
    Screen,
    /// The flock-to-fluid forcing texture.
    Forcing,
    /// The write side of a fluid velocity pair.
    FluidField,
}

/// A resource a pass binds, in binding-slot order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    Uniforms,
    /// Agent state the pass reads (post-swap current generation).
    StateCurrent,
    /// The generation before `StateCurrent`.
    StatePrevious,
    FluidVelocity,
    Forcing,
}

/// Blend applied when writing the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Replace,
    /// `dst + src`, used to accumulate overlapping splats.
    Additive,
}

/// Static description of one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassDescriptor {
    pub label: &'static str,
    pub primitive: DrawPrimitive,
    pub target: TargetKind,
    pub bindings: &'static [Binding],
    pub blend: BlendMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    Reset,
    Update,
    Render,
    FluidProject,
    /// Step of the built-in stand-in fluid field.
    FluidStep,
}

impl PassKind {
    pub const ALL: [PassKind; 5] = [
        PassKind::Reset,
        PassKind::Update,
        PassKind::Render,
        PassKind::FluidProject,
        PassKind::FluidStep,
    ];

    pub const fn descriptor(self) -> PassDescriptor {
        match self {
            PassKind::Reset => PassDescriptor {
                label: "Reset",
                primitive: DrawPrimitive::FullscreenQuad,
                target: TargetKind::StateRead,
                bindings: &[Binding::Uniforms],
                blend: BlendMode::Replace,
            },
            PassKind::Update => PassDescriptor {
                label: "Update",
                primitive: DrawPrimitive::FullscreenQuad,
                target: TargetKind::StateWrite,
                bindings: &[
                    Binding::Uniforms,
                    Binding::StateCurrent,
                    Binding::FluidVelocity,
                ],
                blend: BlendMode::Replace,
            },
            PassKind::Render => PassDescriptor {
                label: "Render",
                primitive: DrawPrimitive::AgentQuads,
                target: TargetKind::Screen,
                bindings: &[
                    Binding::Uniforms,
                    Binding::StateCurrent,
                    Binding::StatePrevious,
                ],
                blend: BlendMode::Replace,
            },
            PassKind::FluidProject => PassDescriptor {
                label: "Fluid Project",
                primitive: DrawPrimitive::AgentQuads,
                target: TargetKind::Forcing,
                bindings: &[Binding::Uniforms, Binding::StateCurrent],
                blend: BlendMode::Additive,
            },
            PassKind::FluidStep => PassDescriptor {
                label: "Fluid Step",
                primitive: DrawPrimitive::FullscreenQuad,
                target: TargetKind::FluidField,
                bindings: &[
                    Binding::Uniforms,
                    Binding::FluidVelocity,
                    Binding::Forcing,
                ],
                blend: BlendMode::Replace,
            },
        }
    }

    pub fn label(self) -> &'static str {
        self.descriptor().label
    }
}

impl PassDescriptor {
    /// Whether the pass samples a texture it could also be writing.
    ///
    /// Only the state pair and the fluid pair are ever both read and written;
    /// a pass must never bind the side it targets.
    pub fn reads_own_target(&self) -> bool {
        match self.target {
            TargetKind::StateRead | TargetKind::StateWrite => self
                .bindings
                .iter()
                .any(|b| matches!(b, Binding::StatePrevious)),
            TargetKind::FluidField => false,
            TargetKind::Screen | TargetKind::Forcing => false,
        }
    }
}
