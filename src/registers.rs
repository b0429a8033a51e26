//! Register index spaces for the three program stages.
//!
//! Each stage addresses its inputs and outputs through a fixed enumeration: built-in registers
//! occupy the low indices and user-defined varyings / generic attributes start at a per-stage
//! base. The linker rewrites pre-link `Varying`-file operands into these spaces, so the base
//! constants below define the bit positions of every mask the linker computes.

use crate::instruction::RegisterFile;
use crate::params::DataType;
use crate::program::Stage;

/// Upper bound on per-stage input registers. `InputsRead` is a 32-bit mask.
pub const MAX_PROGRAM_INPUTS: usize = 32;

/// Upper bound on per-stage output registers. `OutputsWritten` is a 64-bit mask.
pub const MAX_PROGRAM_OUTPUTS: usize = 64;

/// Upper bound on program-wide sampler units. `SamplersUsed` is a 32-bit mask.
pub const MAX_SAMPLER_UNITS: usize = 32;

// Vertex program inputs.
pub const VERT_ATTRIB_POS: u32 = 0;
pub const VERT_ATTRIB_WEIGHT: u32 = 1;
pub const VERT_ATTRIB_NORMAL: u32 = 2;
pub const VERT_ATTRIB_COLOR0: u32 = 3;
pub const VERT_ATTRIB_COLOR1: u32 = 4;
pub const VERT_ATTRIB_FOG: u32 = 5;
pub const VERT_ATTRIB_COLOR_INDEX: u32 = 6;
pub const VERT_ATTRIB_EDGEFLAG: u32 = 7;
pub const VERT_ATTRIB_TEX0: u32 = 8;
pub const VERT_ATTRIB_GENERIC0: u32 = 16;

// Vertex program results.
pub const VERT_RESULT_HPOS: u32 = 0;
pub const VERT_RESULT_COL0: u32 = 1;
pub const VERT_RESULT_COL1: u32 = 2;
pub const VERT_RESULT_FOGC: u32 = 3;
pub const VERT_RESULT_TEX0: u32 = 4;
pub const VERT_RESULT_PSIZ: u32 = 12;
pub const VERT_RESULT_BFC0: u32 = 13;
pub const VERT_RESULT_BFC1: u32 = 14;
pub const VERT_RESULT_EDGE: u32 = 15;
pub const VERT_RESULT_VAR0: u32 = 16;

// Fragment program inputs.
pub const FRAG_ATTRIB_WPOS: u32 = 0;
pub const FRAG_ATTRIB_COL0: u32 = 1;
pub const FRAG_ATTRIB_COL1: u32 = 2;
pub const FRAG_ATTRIB_FOGC: u32 = 3;
pub const FRAG_ATTRIB_TEX0: u32 = 4;
pub const FRAG_ATTRIB_FACE: u32 = 12;
pub const FRAG_ATTRIB_PNTC: u32 = 13;
pub const FRAG_ATTRIB_VAR0: u32 = 14;

// Fragment program results.
pub const FRAG_RESULT_DEPTH: u32 = 0;
pub const FRAG_RESULT_COLOR: u32 = 1;
pub const FRAG_RESULT_DATA0: u32 = 2;

// Geometry program inputs.
pub const GEOM_ATTRIB_POSITION: u32 = 0;
pub const GEOM_ATTRIB_COLOR0: u32 = 1;
pub const GEOM_ATTRIB_COLOR1: u32 = 2;
pub const GEOM_ATTRIB_FOG: u32 = 3;
pub const GEOM_ATTRIB_TEX0: u32 = 4;
pub const GEOM_ATTRIB_PRIMITIVE_ID: u32 = 12;
pub const GEOM_ATTRIB_VAR0: u32 = 16;

// Geometry program results.
pub const GEOM_RESULT_POS: u32 = 0;
pub const GEOM_RESULT_COL0: u32 = 1;
pub const GEOM_RESULT_COL1: u32 = 2;
pub const GEOM_RESULT_FOGC: u32 = 3;
pub const GEOM_RESULT_TEX0: u32 = 4;
pub const GEOM_RESULT_PSIZ: u32 = 12;
pub const GEOM_RESULT_VAR0: u32 = 16;

/// Where a stage's varyings land after linking: the register file and first register index for
/// the side that reads varyings and the side that writes them. A vertex program only writes
/// varyings and a fragment program only reads them, but both sides are defined for every stage so
/// the rewrite loop doesn't need to special-case direction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VaryingBases {
    pub(crate) src_file: RegisterFile,
    pub(crate) src_base: u32,
    pub(crate) dst_file: RegisterFile,
    pub(crate) dst_base: u32,
}

pub(crate) fn varying_bases(stage: Stage) -> VaryingBases {
    match stage {
        Stage::Vertex => VaryingBases {
            src_file: RegisterFile::Output,
            src_base: VERT_RESULT_VAR0,
            dst_file: RegisterFile::Output,
            dst_base: VERT_RESULT_VAR0,
        },
        Stage::Geometry => VaryingBases {
            src_file: RegisterFile::Input,
            src_base: GEOM_ATTRIB_VAR0,
            dst_file: RegisterFile::Output,
            dst_base: GEOM_RESULT_VAR0,
        },
        Stage::Fragment => VaryingBases {
            src_file: RegisterFile::Input,
            src_base: FRAG_ATTRIB_VAR0,
            dst_file: RegisterFile::Input,
            dst_base: FRAG_ATTRIB_VAR0,
        },
    }
}

/// GLSL name of a built-in vertex input, or `None` for registers that have no GLSL-visible name.
pub(crate) fn vertex_input_name(index: u32) -> Option<&'static str> {
    match index {
        VERT_ATTRIB_POS => Some("gl_Vertex"),
        VERT_ATTRIB_NORMAL => Some("gl_Normal"),
        VERT_ATTRIB_COLOR0 => Some("gl_Color"),
        VERT_ATTRIB_COLOR1 => Some("gl_SecondaryColor"),
        VERT_ATTRIB_FOG => Some("gl_FogCoord"),
        VERT_ATTRIB_TEX0..=15 => TEX_COORD_NAMES.get((index - VERT_ATTRIB_TEX0) as usize).copied(),
        _ => None,
    }
}

pub(crate) fn vertex_input_type(index: u32) -> DataType {
    match index {
        VERT_ATTRIB_NORMAL => DataType::Vec3,
        VERT_ATTRIB_FOG => DataType::Float,
        _ => DataType::Vec4,
    }
}

/// GLSL name of a built-in vertex output. User varyings (`VERT_RESULT_VAR0` and up) and the edge
/// flag have no name here.
pub(crate) fn vertex_output_name(index: u32) -> Option<&'static str> {
    match index {
        VERT_RESULT_HPOS => Some("gl_Position"),
        VERT_RESULT_COL0 => Some("gl_FrontColor"),
        VERT_RESULT_COL1 => Some("gl_FrontSecondaryColor"),
        VERT_RESULT_FOGC => Some("gl_FogFragCoord"),
        VERT_RESULT_TEX0..=11 => TEX_COORD_OUT_NAMES.get((index - VERT_RESULT_TEX0) as usize).copied(),
        VERT_RESULT_PSIZ => Some("gl_PointSize"),
        VERT_RESULT_BFC0 => Some("gl_BackColor"),
        VERT_RESULT_BFC1 => Some("gl_BackSecondaryColor"),
        _ => None,
    }
}

/// GLSL name of a built-in geometry output. The geometry stage emits the same built-ins as the
/// vertex stage, so the names coincide.
pub(crate) fn geometry_output_name(index: u32) -> Option<&'static str> {
    match index {
        GEOM_RESULT_POS => Some("gl_Position"),
        GEOM_RESULT_COL0 => Some("gl_FrontColor"),
        GEOM_RESULT_COL1 => Some("gl_FrontSecondaryColor"),
        GEOM_RESULT_FOGC => Some("gl_FogFragCoord"),
        GEOM_RESULT_TEX0..=11 => TEX_COORD_OUT_NAMES.get((index - GEOM_RESULT_TEX0) as usize).copied(),
        GEOM_RESULT_PSIZ => Some("gl_PointSize"),
        _ => None,
    }
}

const TEX_COORD_NAMES: [&str; 8] = [
    "gl_MultiTexCoord0",
    "gl_MultiTexCoord1",
    "gl_MultiTexCoord2",
    "gl_MultiTexCoord3",
    "gl_MultiTexCoord4",
    "gl_MultiTexCoord5",
    "gl_MultiTexCoord6",
    "gl_MultiTexCoord7",
];

const TEX_COORD_OUT_NAMES: [&str; 8] = [
    "gl_TexCoord[0]",
    "gl_TexCoord[1]",
    "gl_TexCoord[2]",
    "gl_TexCoord[3]",
    "gl_TexCoord[4]",
    "gl_TexCoord[5]",
    "gl_TexCoord[6]",
    "gl_TexCoord[7]",
];
