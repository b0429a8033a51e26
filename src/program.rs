//! Per-stage compiled programs. `StageProgram` is the tagged variant the linker passes around;
//! the stage-specific wrappers exist so the linked slots on a shader program are typed, with the
//! shared state living in `ProgramCommon`.

use crate::instruction::Instruction;
use crate::instruction::TextureTarget;
use crate::params::ParamFlags;
use crate::params::ParameterList;
use crate::registers::MAX_PROGRAM_INPUTS;
use crate::registers::MAX_PROGRAM_OUTPUTS;
use crate::registers::MAX_SAMPLER_UNITS;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Geometry,
    Fragment,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Vertex => "vertex",
            Stage::Geometry => "geometry",
            Stage::Fragment => "fragment",
        };
        write!(f, "{name}")
    }
}

/// Input primitive type of a geometry stage. Determines how many vertices each invocation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Points,
    Lines,
    Triangles,
    LinesAdjacency,
    TrianglesAdjacency,
}

impl PrimitiveType {
    pub fn vertex_count(self) -> u32 {
        match self {
            PrimitiveType::Points => 1,
            PrimitiveType::Lines => 2,
            PrimitiveType::Triangles => 3,
            PrimitiveType::LinesAdjacency => 4,
            PrimitiveType::TrianglesAdjacency => 6,
        }
    }
}

/// State shared by all three stage kinds: the instruction stream, the parameter lists handed over
/// by the front-end, and the derived masks the linker recomputes.
#[derive(Debug, Clone)]
pub struct ProgramCommon {
    pub stage: Stage,
    pub instructions: Vec<Instruction>,

    /// Uniforms, samplers and state variables.
    pub parameters: ParameterList,

    /// The stage's own varyings, in declaration order. Instruction operands with the `Varying`
    /// file index this list by register.
    pub varyings: ParameterList,

    /// Declared vertex attributes, indexed by generic attribute number. Vertex stage only.
    pub attributes: ParameterList,

    pub inputs_read: u32,
    pub outputs_written: u64,
    pub num_temporaries: u32,
    pub num_address_regs: u32,
    pub samplers_used: u32,
    pub shadow_samplers: u32,
    pub sampler_targets: [Option<TextureTarget>; MAX_SAMPLER_UNITS],

    /// Per sampler unit, the bitmask of texture targets fetched through it.
    pub textures_used: [u32; MAX_SAMPLER_UNITS],

    /// Qualifier flags per input register, filled in when varyings are rewritten.
    pub input_flags: [ParamFlags; MAX_PROGRAM_INPUTS],

    /// Qualifier flags per output register.
    pub output_flags: [ParamFlags; MAX_PROGRAM_OUTPUTS],
}

impl ProgramCommon {
    pub fn new(stage: Stage) -> ProgramCommon {
        ProgramCommon {
            stage,
            instructions: Vec::new(),
            parameters: ParameterList::new(),
            varyings: ParameterList::new(),
            attributes: ParameterList::new(),
            inputs_read: 0,
            outputs_written: 0,
            num_temporaries: 0,
            num_address_regs: 0,
            samplers_used: 0,
            shadow_samplers: 0,
            sampler_targets: [None; MAX_SAMPLER_UNITS],
            textures_used: [0; MAX_SAMPLER_UNITS],
            input_flags: [ParamFlags::empty(); MAX_PROGRAM_INPUTS],
            output_flags: [ParamFlags::empty(); MAX_PROGRAM_OUTPUTS],
        }
    }

    /// Recomputes `textures_used` from the linked sampler assignments.
    pub(crate) fn update_textures_used(&mut self) {
        self.textures_used = [0; MAX_SAMPLER_UNITS];
        for unit in 0..MAX_SAMPLER_UNITS {
            if self.samplers_used & (1 << unit) == 0 {
                continue;
            }
            if let Some(target) = self.sampler_targets[unit] {
                self.textures_used[unit] |= target.bit();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct VertexProgram {
    pub base: ProgramCommon,
}

#[derive(Debug, Clone)]
pub struct GeometryProgram {
    pub base: ProgramCommon,
    pub vertices_out: u32,
    pub input_primitive: PrimitiveType,
    pub output_primitive: PrimitiveType,
}

#[derive(Debug, Clone)]
pub struct FragmentProgram {
    pub base: ProgramCommon,
}

#[derive(Debug, Clone)]
pub enum StageProgram {
    Vertex(VertexProgram),
    Geometry(GeometryProgram),
    Fragment(FragmentProgram),
}

impl StageProgram {
    pub fn new(stage: Stage) -> StageProgram {
        let base = ProgramCommon::new(stage);
        match stage {
            Stage::Vertex => StageProgram::Vertex(VertexProgram { base }),
            Stage::Geometry => StageProgram::Geometry(GeometryProgram {
                base,
                vertices_out: 0,
                input_primitive: PrimitiveType::Triangles,
                output_primitive: PrimitiveType::Triangles,
            }),
            Stage::Fragment => StageProgram::Fragment(FragmentProgram { base }),
        }
    }

    pub fn stage(&self) -> Stage {
        self.base().stage
    }

    pub fn base(&self) -> &ProgramCommon {
        match self {
            StageProgram::Vertex(p) => &p.base,
            StageProgram::Geometry(p) => &p.base,
            StageProgram::Fragment(p) => &p.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ProgramCommon {
        match self {
            StageProgram::Vertex(p) => &mut p.base,
            StageProgram::Geometry(p) => &mut p.base,
            StageProgram::Fragment(p) => &mut p.base,
        }
    }
}

impl Display for StageProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let base = self.base();
        writeln!(f, "# {} program, {} instructions", base.stage, base.instructions.len())?;
        for inst in &base.instructions {
            writeln!(f, "{inst}")?;
        }
        Ok(())
    }
}
