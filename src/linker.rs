//! The link orchestrator. Sequences the passes over cloned stage programs and publishes the
//! results onto the shader program, or records the first diagnostic and leaves the program
//! unlinked.

use crate::attributes;
use crate::context::Context;
use crate::error::Result;
use crate::program::Stage;
use crate::program::StageProgram;
use crate::register_usage;
use crate::shader::ShaderProgram;
use crate::source_merging;
use crate::uniform_merging;
use crate::validation;
use crate::varying_merging;
use anyhow::bail;

/// Links the attached compiled units of `prog` into one program. On success the linked stage
/// programs and the program-wide symbol tables are published on `prog` and `link_status` is set;
/// on failure `link_status` is cleared and `info_log` carries the first diagnostic.
pub fn link(ctx: &Context, prog: &mut ShaderProgram) {
    prog.clear_link_state();
    prog.link_status = true;
    if let Err(error) = try_link(ctx, prog) {
        tracing::debug!(%error, "link failed");
        prog.link_status = false;
        prog.info_log = Some(format!("{error:#}"));
    }
}

#[tracing::instrument(skip_all, name = "Link shader program")]
fn try_link(ctx: &Context, prog: &mut ShaderProgram) -> Result {
    for shader in &prog.shaders {
        if !shader.compile_status {
            bail!("linking with uncompiled shader");
        }
    }

    // Select the unit providing main() for each stage. These stay pristine: the attribute
    // resolver needs the vertex program's pre-link state after the clones have been rewritten.
    let selected_vertex = source_merging::select_main_program(ctx, prog, Stage::Vertex)?;
    let selected_geometry = source_merging::select_main_program(ctx, prog, Stage::Geometry)?;
    let selected_fragment = source_merging::select_main_program(ctx, prog, Stage::Fragment)?;

    // Clones the passes below are free to mutate.
    let mut vertex = selected_vertex.clone();
    let mut geometry = selected_geometry.clone();
    let mut fragment = selected_fragment.clone();

    for stage_prog in stages_mut(&mut vertex, &mut geometry, &mut fragment) {
        varying_merging::link_varying_vars(ctx, prog, stage_prog)?;
    }

    // One counter across all stages, so sampler units are program-wide.
    let mut num_samplers = 0;
    for stage_prog in stages_mut(&mut vertex, &mut geometry, &mut fragment) {
        uniform_merging::link_uniform_vars(ctx, prog, stage_prog, &mut num_samplers)?;
    }

    if let (Some(original), Some(linked)) = (&selected_vertex, &mut vertex) {
        attributes::resolve_attributes(ctx, prog, original, linked)?;
    }

    for stage_prog in stages_mut(&mut vertex, &mut geometry, &mut fragment) {
        register_usage::update_register_usage(&ctx.limits, stage_prog);
        register_usage::count_temporaries(stage_prog);
    }

    if let Some(StageProgram::Geometry(geometry)) = &mut geometry {
        geometry.vertices_out = prog.geometry.vertices_out;
        geometry.input_primitive = prog.geometry.input_primitive;
        geometry.output_primitive = prog.geometry.output_primitive;
    }

    validation::validate_cross_stage(ctx, vertex.as_ref(), geometry.as_ref(), fragment.as_ref())?;

    varying_merging::publish_builtin_varyings(prog, vertex.as_ref(), geometry.as_ref());
    validation::validate_transform_feedback(ctx, prog, vertex.is_some())?;

    let mut accepted = true;
    for stage_prog in stages_mut(&mut vertex, &mut geometry, &mut fragment) {
        stage_prog.base_mut().update_textures_used();
        tracing::debug!(program = %stage_prog, "linked stage program");
        accepted &= ctx.driver.program_string_notify(stage_prog.stage(), stage_prog);
    }
    if !accepted {
        bail!("Vertex, geometry and/or fragment program rejected by driver");
    }

    publish(prog, vertex, geometry, fragment);
    Ok(())
}

fn stages_mut<'a>(
    vertex: &'a mut Option<StageProgram>,
    geometry: &'a mut Option<StageProgram>,
    fragment: &'a mut Option<StageProgram>,
) -> impl Iterator<Item = &'a mut StageProgram> {
    [vertex.as_mut(), geometry.as_mut(), fragment.as_mut()]
        .into_iter()
        .flatten()
}

/// Transfers ownership of the linked clones to the shader program.
fn publish(
    prog: &mut ShaderProgram,
    vertex: Option<StageProgram>,
    geometry: Option<StageProgram>,
    fragment: Option<StageProgram>,
) {
    if let Some(StageProgram::Vertex(vertex)) = vertex {
        prog.vertex_program = Some(vertex);
    }
    if let Some(StageProgram::Geometry(geometry)) = geometry {
        prog.geometry_program = Some(geometry);
    }
    if let Some(StageProgram::Fragment(fragment)) = fragment {
        prog.fragment_program = Some(fragment);
    }
}
