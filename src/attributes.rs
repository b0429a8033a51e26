//! Assigns generic vertex-attribute slots.
//!
//! User bindings made before the link have priority; everything else takes the lowest free slot.
//! Slot 0 aliases the fixed-function vertex position, so a program that reads `gl_Vertex` never
//! gets slot 0 handed to a user attribute.

use crate::context::Context;
use crate::error::Result;
use crate::instruction::RegisterFile;
use crate::program::StageProgram;
use crate::registers;
use crate::registers::VERT_ATTRIB_GENERIC0;
use crate::registers::VERT_ATTRIB_POS;
use crate::shader::AttributeBinding;
use crate::shader::ShaderProgram;
use anyhow::anyhow;
use anyhow::bail;

/// Resolves generic attribute slots for the vertex stage and rewrites every generic input
/// operand. `original` is the pre-clone vertex program: its attribute list supplies the declared
/// names and its pre-link `inputs_read` tells us whether position is read.
#[tracing::instrument(skip_all, name = "Resolve attributes")]
pub(crate) fn resolve_attributes(
    ctx: &Context,
    prog: &mut ShaderProgram,
    original: &StageProgram,
    linked: &mut StageProgram,
) -> Result {
    let original = original.base();
    let common = linked.base_mut();
    let max_generic = ctx.limits.max_vertex_generic_attribs;

    // Slots already spoken for: user bindings, plus slot 0 when the program reads the built-in
    // position (slot 0 aliases it).
    let mut used_slots = 0u32;
    for &slot in prog.attribute_bindings.values() {
        used_slots |= 1 << slot;
    }
    if original.inputs_read & (1 << VERT_ATTRIB_POS) != 0 {
        used_slots |= 1;
    }

    // Declared generic index -> assigned slot, filled in lazily as references are found. Sized
    // by the register space, which may be wider than the slot limit.
    let mut slot_of: Vec<Option<u32>> =
        vec![None; registers::MAX_PROGRAM_INPUTS - VERT_ATTRIB_GENERIC0 as usize];

    let mut inputs_read = 0u32;
    for inst in &mut common.instructions {
        for src in &mut inst.srcs {
            if src.file != RegisterFile::Input {
                continue;
            }
            inputs_read |= 1 << src.index;
            if src.index < VERT_ATTRIB_GENERIC0 {
                continue;
            }

            let declared = (src.index - VERT_ATTRIB_GENERIC0) as usize;
            let slot = match slot_of.get(declared).copied().flatten() {
                Some(slot) => slot,
                None => {
                    let param = original
                        .attributes
                        .get(declared)
                        .ok_or_else(|| anyhow!("reference to undeclared vertex attribute {declared}"))?;
                    let slot = match prog.attribute_bindings.get(&param.name) {
                        Some(&bound) => bound,
                        None => {
                            let Some(free) = (0..max_generic).find(|s| used_slots & (1 << s) == 0)
                            else {
                                bail!("Too many vertex attributes");
                            };
                            used_slots |= 1 << free;
                            free
                        }
                    };
                    slot_of[declared] = Some(slot);
                    tracing::trace!(name = %param.name, slot, "attribute slot");
                    prog.attributes.push(AttributeBinding {
                        name: param.name.clone(),
                        size: param.size,
                        data_type: param.data_type,
                        slot: Some(slot),
                    });
                    slot
                }
            };
            src.index = VERT_ATTRIB_GENERIC0 + slot;
        }
    }

    // Built-in attributes actually read are listed too, so introspection sees both kinds.
    for index in VERT_ATTRIB_POS..VERT_ATTRIB_GENERIC0 {
        if inputs_read & (1 << index) == 0 {
            continue;
        }
        let Some(name) = registers::vertex_input_name(index) else {
            continue;
        };
        prog.attributes.push(AttributeBinding {
            name: name.to_owned(),
            size: 4,
            data_type: registers::vertex_input_type(index),
            slot: None,
        });
    }

    Ok(())
}
