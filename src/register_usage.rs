//! Recomputes the derived per-program masks and counters from the rewritten instruction stream:
//! `InputsRead`, `OutputsWritten`, `NumTemporaries` and `NumAddressRegs`.
//!
//! A relatively-addressed operand may touch any element of the array its base register starts,
//! so its mask contribution is the whole span: every texture-coordinate slot, every varying
//! register, every draw-buffer output or every generic attribute, depending on the stage and
//! which base the index names.

use crate::context::Limits;
use crate::instruction::RegisterFile;
use crate::program::Stage;
use crate::program::StageProgram;
use crate::registers::FRAG_ATTRIB_TEX0;
use crate::registers::FRAG_ATTRIB_VAR0;
use crate::registers::FRAG_RESULT_DATA0;
use crate::registers::GEOM_ATTRIB_VAR0;
use crate::registers::GEOM_RESULT_TEX0;
use crate::registers::GEOM_RESULT_VAR0;
use crate::registers::VERT_ATTRIB_GENERIC0;
use crate::registers::VERT_ATTRIB_TEX0;
use crate::registers::VERT_RESULT_TEX0;
use crate::registers::VERT_RESULT_VAR0;

/// Bits `lo..=hi` of a 64-bit mask.
fn bit_range64(lo: u32, hi: u32) -> u64 {
    debug_assert!(lo <= hi && hi < 64);
    let span = hi - lo + 1;
    if span == 64 {
        u64::MAX
    } else {
        ((1u64 << span) - 1) << lo
    }
}

/// Bits `lo..=hi` of a 32-bit mask.
fn bit_range32(lo: u32, hi: u32) -> u32 {
    debug_assert!(lo <= hi && hi < 32);
    bit_range64(lo, hi) as u32
}

/// Mask of input registers an operand may read. Without relative addressing this is the single
/// bit of `index`; with it, the span of the array `index` starts.
pub(crate) fn inputs_read_mask(limits: &Limits, stage: Stage, index: u32, rel_addr: bool) -> u32 {
    if !rel_addr {
        return 1 << index;
    }
    let coords = limits.max_texture_coord_units;
    match stage {
        Stage::Vertex if index == VERT_ATTRIB_TEX0 => {
            bit_range32(VERT_ATTRIB_TEX0, VERT_ATTRIB_TEX0 + coords - 1)
        }
        // Any generic attribute from the base to the end of the register space.
        Stage::Vertex if index == VERT_ATTRIB_GENERIC0 => u32::MAX << VERT_ATTRIB_GENERIC0,
        Stage::Fragment if index == FRAG_ATTRIB_TEX0 => {
            bit_range32(FRAG_ATTRIB_TEX0, FRAG_ATTRIB_TEX0 + coords - 1)
        }
        Stage::Fragment if index == FRAG_ATTRIB_VAR0 => {
            bit_range32(FRAG_ATTRIB_VAR0, FRAG_ATTRIB_VAR0 + limits.max_varying - 1)
        }
        Stage::Geometry if index == GEOM_ATTRIB_VAR0 => {
            bit_range32(GEOM_ATTRIB_VAR0, GEOM_ATTRIB_VAR0 + limits.max_varying - 1)
        }
        // Not an array base.
        _ => 1 << index,
    }
}

/// Mask of output registers an operand may write.
pub(crate) fn outputs_written_mask(
    limits: &Limits,
    stage: Stage,
    index: u32,
    rel_addr: bool,
) -> u64 {
    if !rel_addr {
        return 1u64 << index;
    }
    let coords = limits.max_texture_coord_units;
    match stage {
        Stage::Vertex if index == VERT_RESULT_TEX0 => {
            bit_range64(VERT_RESULT_TEX0, VERT_RESULT_TEX0 + coords - 1)
        }
        Stage::Vertex if index == VERT_RESULT_VAR0 => {
            bit_range64(VERT_RESULT_VAR0, VERT_RESULT_VAR0 + limits.max_varying - 1)
        }
        Stage::Fragment if index == FRAG_RESULT_DATA0 => {
            bit_range64(FRAG_RESULT_DATA0, FRAG_RESULT_DATA0 + limits.max_draw_buffers - 1)
        }
        Stage::Geometry if index == GEOM_RESULT_TEX0 => {
            bit_range64(GEOM_RESULT_TEX0, GEOM_RESULT_TEX0 + coords - 1)
        }
        Stage::Geometry if index == GEOM_RESULT_VAR0 => {
            bit_range64(GEOM_RESULT_VAR0, GEOM_RESULT_VAR0 + limits.max_varying - 1)
        }
        _ => 1u64 << index,
    }
}

/// Recomputes `inputs_read`, `outputs_written` and `num_address_regs` by scanning every operand.
pub(crate) fn update_register_usage(limits: &Limits, linked: &mut StageProgram) {
    let stage = linked.stage();
    let common = linked.base_mut();

    let mut inputs_read = 0u32;
    let mut outputs_written = 0u64;
    let mut max_address_regs = 0u32;

    for inst in &common.instructions {
        for src in &inst.srcs {
            match src.file {
                RegisterFile::Input => {
                    inputs_read |= inputs_read_mask(limits, stage, src.index, src.rel_addr);
                }
                RegisterFile::Address => {
                    max_address_regs = max_address_regs.max(src.index + 1);
                }
                _ => {}
            }
        }
        if let Some(dst) = &inst.dst {
            match dst.file {
                RegisterFile::Output => {
                    outputs_written |= outputs_written_mask(limits, stage, dst.index, dst.rel_addr);
                }
                RegisterFile::Address => {
                    max_address_regs = max_address_regs.max(dst.index + 1);
                }
                _ => {}
            }
        }
    }

    common.inputs_read = inputs_read;
    common.outputs_written = outputs_written;
    common.num_address_regs = max_address_regs;
}

/// Recomputes `num_temporaries` as one past the highest temporary register index observed, or
/// zero when the program uses none.
pub(crate) fn count_temporaries(linked: &mut StageProgram) {
    let common = linked.base_mut();
    let mut max_index: Option<u32> = None;

    for inst in &common.instructions {
        for src in &inst.srcs {
            if src.file == RegisterFile::Temporary {
                max_index = Some(max_index.map_or(src.index, |m| m.max(src.index)));
            }
        }
        if let Some(dst) = &inst.dst {
            if dst.file == RegisterFile::Temporary {
                max_index = Some(max_index.map_or(dst.index, |m| m.max(dst.index)));
            }
        }
    }

    common.num_temporaries = max_index.map_or(0, |m| m + 1);
}
