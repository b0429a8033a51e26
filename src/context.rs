//! Link-time configuration supplied by the enclosing graphics context: implementation limits, the
//! API profile and the callbacks into the compiler front-end and the driver back-end. The linker
//! treats all of this as read-mostly configuration.

use crate::error::Result;
use crate::program::Stage;
use crate::program::StageProgram;
use crate::registers::MAX_PROGRAM_OUTPUTS;
use crate::registers::MAX_SAMPLER_UNITS;
use crate::registers::VERT_RESULT_VAR0;
use crate::shader::Shader;

/// Implementation limits that bound what a linked program may use. Values are expressed in the
/// units the GL constants use: registers for varyings and attributes, float components for
/// transform feedback.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_varying: u32,
    pub max_texture_image_units: u32,
    pub max_vertex_generic_attribs: u32,
    pub max_draw_buffers: u32,
    pub max_feedback_interleaved_components: u32,
    pub max_feedback_separate_components: u32,
    pub max_texture_coord_units: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_varying: 16,
            max_texture_image_units: 16,
            max_vertex_generic_attribs: 16,
            max_draw_buffers: 8,
            max_feedback_interleaved_components: 64,
            max_feedback_separate_components: 4,
            max_texture_coord_units: 8,
        }
    }
}

/// Which API the enclosing context implements. A strict ES profile requires both a vertex and a
/// fragment stage in every linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Desktop,
    Es2,
}

/// The compiler front-end. The linker only needs it when no attached shader of a given stage is
/// self-contained and a concatenated source has to be compiled from scratch.
pub trait Compiler {
    /// Compiles `shader.source`, filling in `program`, `compile_status`, `defines_main` and
    /// `unresolved_refs`.
    fn compile(&self, shader: &mut Shader) -> Result;
}

/// The driver back-end. Each successfully linked stage program is handed to the driver, which may
/// reject it.
pub trait Driver {
    fn program_string_notify(&self, stage: Stage, program: &StageProgram) -> bool;
}

pub struct Context {
    pub limits: Limits,
    pub profile: Profile,
    pub compiler: Box<dyn Compiler>,
    pub driver: Box<dyn Driver>,
}

impl Context {
    pub fn new(
        limits: Limits,
        profile: Profile,
        compiler: Box<dyn Compiler>,
        driver: Box<dyn Driver>,
    ) -> Context {
        assert!(
            VERT_RESULT_VAR0 + limits.max_varying <= MAX_PROGRAM_OUTPUTS as u32,
            "max_varying exceeds register capacity"
        );
        assert!(
            limits.max_texture_image_units <= MAX_SAMPLER_UNITS as u32,
            "max_texture_image_units exceeds sampler capacity"
        );
        assert!(
            limits.max_vertex_generic_attribs <= 32,
            "max_vertex_generic_attribs exceeds slot capacity"
        );
        Context {
            limits,
            profile,
            compiler,
            driver,
        }
    }
}
