//! The register-based instruction representation the compiler front-end lowers each stage to.
//! Operands name a register file plus an index into it; linking rewrites `Varying`, sampler and
//! generic-attribute references so that every index is a concrete linked location.

use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt::Display;

/// The register bank an operand addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFile {
    Input,
    Output,
    Temporary,

    /// Inter-stage storage as the front-end sees it. No operand carries this file after linking.
    Varying,

    Uniform,
    Sampler,
    StateVar,
    Address,
    Constant,
}

impl RegisterFile {
    fn name(self) -> &'static str {
        match self {
            RegisterFile::Input => "INPUT",
            RegisterFile::Output => "OUTPUT",
            RegisterFile::Temporary => "TEMP",
            RegisterFile::Varying => "VARYING",
            RegisterFile::Uniform => "UNIFORM",
            RegisterFile::Sampler => "SAMPLER",
            RegisterFile::StateVar => "STATE",
            RegisterFile::Address => "ADDR",
            RegisterFile::Constant => "CONST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTarget {
    Tex1D = 0,
    Tex2D = 1,
    Tex3D = 2,
    Cube = 3,
    Rect = 4,
}

impl TextureTarget {
    /// Bit position of this target in a `TexturesUsed` entry.
    pub(crate) fn bit(self) -> u32 {
        1 << self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    Mov,
    Add,
    Sub,
    Mul,
    Mad,
    Dp3,
    Dp4,
    Min,
    Max,
    Slt,
    Sge,
    Rcp,
    Rsq,
    Ex2,
    Lg2,
    Pow,
    Frc,
    Flr,
    Abs,
    Cmp,
    Arl,
    Tex,
    Txb,
    Txl,
    Txd,
    Txp,
    Kil,
    End,
}

impl Opcode {
    /// How many source operands the opcode consumes.
    pub fn num_srcs(self) -> usize {
        match self {
            Opcode::Nop | Opcode::End => 0,
            Opcode::Mov
            | Opcode::Rcp
            | Opcode::Rsq
            | Opcode::Ex2
            | Opcode::Lg2
            | Opcode::Frc
            | Opcode::Flr
            | Opcode::Abs
            | Opcode::Arl
            | Opcode::Tex
            | Opcode::Txb
            | Opcode::Txl
            | Opcode::Txp
            | Opcode::Kil => 1,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Dp3
            | Opcode::Dp4
            | Opcode::Min
            | Opcode::Max
            | Opcode::Slt
            | Opcode::Sge
            | Opcode::Pow => 2,
            Opcode::Mad | Opcode::Cmp | Opcode::Txd => 3,
        }
    }

    pub fn is_texture(self) -> bool {
        matches!(self, Opcode::Tex | Opcode::Txb | Opcode::Txl | Opcode::Txd | Opcode::Txp)
    }

    fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Mov => "MOV",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Mad => "MAD",
            Opcode::Dp3 => "DP3",
            Opcode::Dp4 => "DP4",
            Opcode::Min => "MIN",
            Opcode::Max => "MAX",
            Opcode::Slt => "SLT",
            Opcode::Sge => "SGE",
            Opcode::Rcp => "RCP",
            Opcode::Rsq => "RSQ",
            Opcode::Ex2 => "EX2",
            Opcode::Lg2 => "LG2",
            Opcode::Pow => "POW",
            Opcode::Frc => "FRC",
            Opcode::Flr => "FLR",
            Opcode::Abs => "ABS",
            Opcode::Cmp => "CMP",
            Opcode::Arl => "ARL",
            Opcode::Tex => "TEX",
            Opcode::Txb => "TXB",
            Opcode::Txl => "TXL",
            Opcode::Txd => "TXD",
            Opcode::Txp => "TXP",
            Opcode::Kil => "KIL",
            Opcode::End => "END",
        }
    }
}

/// Geometry-only secondary index selecting which input vertex a per-vertex array operand reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexRef {
    pub index: u32,
    pub rel_addr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrcReg {
    pub file: RegisterFile,
    pub index: u32,
    pub rel_addr: bool,
    pub vertex: Option<VertexRef>,
}

impl SrcReg {
    pub fn new(file: RegisterFile, index: u32) -> SrcReg {
        SrcReg {
            file,
            index,
            rel_addr: false,
            vertex: None,
        }
    }

    pub fn relative(file: RegisterFile, index: u32) -> SrcReg {
        SrcReg {
            rel_addr: true,
            ..SrcReg::new(file, index)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstReg {
    pub file: RegisterFile,
    pub index: u32,
    pub rel_addr: bool,
}

impl DstReg {
    pub fn new(file: RegisterFile, index: u32) -> DstReg {
        DstReg {
            file,
            index,
            rel_addr: false,
        }
    }
}

/// Sampler state carried by texture-fetch instructions. Before linking, `sampler_unit` is the
/// stage-local sampler number; afterwards it's the program-wide unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureAccess {
    pub sampler_unit: u32,
    pub target: TextureTarget,
    pub shadow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub dst: Option<DstReg>,
    pub srcs: SmallVec<[SrcReg; 3]>,
    pub tex: Option<TextureAccess>,
}

impl Instruction {
    pub fn new(opcode: Opcode, dst: Option<DstReg>, srcs: impl IntoIterator<Item = SrcReg>) -> Instruction {
        let srcs: SmallVec<[SrcReg; 3]> = srcs.into_iter().collect();
        debug_assert_eq!(srcs.len(), opcode.num_srcs(), "wrong operand count for {opcode:?}");
        Instruction {
            opcode,
            dst,
            srcs,
            tex: None,
        }
    }

    pub fn with_tex(mut self, tex: TextureAccess) -> Instruction {
        debug_assert!(self.opcode.is_texture());
        self.tex = Some(tex);
        self
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        if let Some(dst) = &self.dst {
            write!(f, " {}[{}]", dst.file.name(), dst.index)?;
            if dst.rel_addr {
                write!(f, "+ADDR")?;
            }
        }
        if !self.srcs.is_empty() {
            let srcs = self
                .srcs
                .iter()
                .map(|s| {
                    let rel = if s.rel_addr { "+ADDR" } else { "" };
                    format!("{}[{}]{rel}", s.file.name(), s.index)
                })
                .join(", ");
            write!(f, ", {srcs}")?;
        }
        if let Some(tex) = &self.tex {
            write!(f, ", texture[{}], {:?}", tex.sampler_unit, tex.target)?;
            if tex.shadow {
                write!(f, ", SHADOW")?;
            }
        }
        write!(f, ";")
    }
}
