//! Builds the program-wide uniform table and assigns program-wide sampler units.
//!
//! A uniform may be declared by several stages under one name; the merged entry keeps one
//! parameter index per stage so the host can update every copy when the value changes. Samplers
//! additionally get a program-wide unit from a counter that runs across all stages of the link,
//! and every texture instruction is rewritten to fetch through its linked unit.

use crate::context::Context;
use crate::error::Result;
use crate::params::ParamKind;
use crate::program::StageProgram;
use crate::shader::ShaderProgram;
use crate::shader::Uniform;
use anyhow::bail;

#[tracing::instrument(skip_all, name = "Merge uniforms")]
pub(crate) fn link_uniform_vars(
    ctx: &Context,
    prog: &mut ShaderProgram,
    linked: &mut StageProgram,
    num_samplers: &mut u32,
) -> Result {
    let stage = linked.stage();
    let common = linked.base_mut();

    // Stage-local sampler number -> program-wide unit, for rewriting texture instructions below.
    let mut sampler_map: foldhash::HashMap<u32, u32> = foldhash::HashMap::default();

    for (index, param) in common.parameters.iter_mut().enumerate() {
        if !param.used {
            continue;
        }
        match param.kind {
            ParamKind::Uniform | ParamKind::Sampler => {
                let entry = prog
                    .uniforms
                    .entry(param.name.clone())
                    .or_insert_with(Uniform::default);
                *entry.stage_slot_mut(stage) = Some(index);
                entry.initialized |= param.initialized;
            }
            // State variables are tracked per stage only; they never join the program-wide
            // table because the host cannot set them.
            ParamKind::Varying
            | ParamKind::Attribute
            | ParamKind::StateVar
            | ParamKind::Constant => continue,
        }

        if param.kind == ParamKind::Sampler {
            let local = param.values.first().copied().unwrap_or(0.0) as u32;
            let unit = *num_samplers;
            if unit >= ctx.limits.max_texture_image_units {
                bail!(
                    "Too many texture samplers ({unit}, max is {})",
                    ctx.limits.max_texture_image_units
                );
            }
            sampler_map.insert(local, unit);
            if param.values.is_empty() {
                param.values.push(unit as f32);
            } else {
                param.values[0] = unit as f32;
            }
            *num_samplers += 1;
            tracing::trace!(%stage, name = %param.name, local, unit, "sampler unit");
        }
    }

    common.samplers_used = 0;
    common.shadow_samplers = 0;
    for inst in &mut common.instructions {
        let Some(tex) = &mut inst.tex else { continue };
        let Some(&unit) = sampler_map.get(&tex.sampler_unit) else {
            continue;
        };
        tex.sampler_unit = unit;
        common.sampler_targets[unit as usize] = Some(tex.target);
        common.samplers_used |= 1 << unit;
        if tex.shadow {
            common.shadow_samplers |= 1 << unit;
        }
    }

    Ok(())
}
