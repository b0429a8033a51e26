//! Cross-stage constraints checked after every operand has been rewritten and the usage masks
//! recomputed.

use crate::context::Context;
use crate::context::Profile;
use crate::error::Result;
use crate::program::StageProgram;
use crate::registers::FRAG_ATTRIB_VAR0;
use crate::registers::FRAG_RESULT_COLOR;
use crate::registers::FRAG_RESULT_DATA0;
use crate::registers::VERT_RESULT_HPOS;
use crate::registers::VERT_RESULT_VAR0;
use crate::shader::FeedbackMode;
use crate::shader::ShaderProgram;
use anyhow::bail;
use foldhash::HashSet;

pub(crate) fn validate_cross_stage(
    ctx: &Context,
    vertex: Option<&StageProgram>,
    geometry: Option<&StageProgram>,
    fragment: Option<&StageProgram>,
) -> Result {
    if vertex.is_none() && fragment.is_none() {
        bail!("program contains no vertex or fragment shader");
    }

    if ctx.profile == Profile::Es2 {
        if vertex.is_none() {
            bail!("missing vertex shader");
        }
        if fragment.is_none() {
            bail!("missing fragment shader");
        }
    }

    if let Some(vertex) = vertex {
        if vertex.base().outputs_written & (1u64 << VERT_RESULT_HPOS) == 0 {
            bail!("gl_Position was not written by vertex shader");
        }
    }

    if let Some(geometry) = geometry {
        if vertex.is_none() {
            bail!("Geometry shader without a vertex shader is illegal!");
        }
        let StageProgram::Geometry(geometry) = geometry else {
            unreachable!("geometry slot holds a non-geometry program");
        };
        if geometry.vertices_out == 0 {
            bail!("GEOMETRY_VERTICES_OUT is zero");
        }
    }

    if let Some(fragment) = fragment {
        // Every varying the fragment stage reads must be produced by the vertex stage.
        let varyings_read = fragment.base().inputs_read >> FRAG_ATTRIB_VAR0;
        let varyings_written =
            vertex.map_or(0, |v| (v.base().outputs_written >> VERT_RESULT_VAR0) as u32);
        if varyings_read & varyings_written != varyings_read {
            bail!("Fragment program using varying vars not written by vertex shader");
        }

        // The scalar colour output and the indexed data outputs are mutually exclusive.
        let written = fragment.base().outputs_written;
        let data_mask = ((1u64 << ctx.limits.max_draw_buffers) - 1) << FRAG_RESULT_DATA0;
        if written & (1u64 << FRAG_RESULT_COLOR) != 0 && written & data_mask != 0 {
            bail!("Fragment program cannot write both gl_FragColor and gl_FragData[].");
        }
    }

    Ok(())
}

/// Checks the requested transform-feedback captures against the linked varying table and the
/// component limit for the configured mode. Runs after built-in varyings have been published, so
/// built-ins like `gl_Position` are capturable.
pub(crate) fn validate_transform_feedback(
    ctx: &Context,
    prog: &ShaderProgram,
    have_vertex: bool,
) -> Result {
    let feedback = &prog.transform_feedback;
    if feedback.varying_names.is_empty() {
        return Ok(());
    }

    if !have_vertex {
        bail!("Transform feedback without vertex shader");
    }

    let mut seen: HashSet<usize> = HashSet::default();
    let mut total_components = 0u32;
    for name in &feedback.varying_names {
        let Some((index, _, varying)) = prog.varyings.get_full(name) else {
            bail!("vertex shader does not emit {name}");
        };
        if !seen.insert(index) {
            bail!("duplicated transform feedback varying name: {name}");
        }
        total_components += varying.data_type.component_count();
    }

    let max_components = match feedback.mode {
        FeedbackMode::Interleaved => ctx.limits.max_feedback_interleaved_components,
        FeedbackMode::Separate => ctx.limits.max_feedback_separate_components,
    };
    if total_components > max_components {
        bail!("Too many feedback components: {total_components}, max is {max_components}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Compiler;
    use crate::context::Driver;
    use crate::context::Limits;
    use crate::error::Result;
    use crate::params::DataType;
    use crate::params::ParamFlags;
    use crate::program::Stage;
    use crate::shader::Shader;

    struct NoCompiler;
    impl Compiler for NoCompiler {
        fn compile(&self, _shader: &mut Shader) -> Result {
            bail!("no compiler in tests")
        }
    }
    struct AcceptAll;
    impl Driver for AcceptAll {
        fn program_string_notify(&self, _stage: Stage, _program: &StageProgram) -> bool {
            true
        }
    }

    fn context(profile: Profile) -> Context {
        Context::new(Limits::default(), profile, Box::new(NoCompiler), Box::new(AcceptAll))
    }

    fn vertex_writing_position() -> StageProgram {
        let mut vertex = StageProgram::new(Stage::Vertex);
        vertex.base_mut().outputs_written = 1 << VERT_RESULT_HPOS;
        vertex
    }

    #[test]
    fn test_missing_position_fails() {
        let ctx = context(Profile::Desktop);
        let vertex = StageProgram::new(Stage::Vertex);
        let err = validate_cross_stage(&ctx, Some(&vertex), None, None).unwrap_err();
        assert_eq!(err.to_string(), "gl_Position was not written by vertex shader");
    }

    #[test]
    fn test_es2_requires_both_stages() {
        let ctx = context(Profile::Es2);
        let vertex = vertex_writing_position();
        let err = validate_cross_stage(&ctx, Some(&vertex), None, None).unwrap_err();
        assert_eq!(err.to_string(), "missing fragment shader");

        let fragment = StageProgram::new(Stage::Fragment);
        let err = validate_cross_stage(&ctx, None, None, Some(&fragment)).unwrap_err();
        assert_eq!(err.to_string(), "missing vertex shader");
    }

    #[test]
    fn test_unproduced_varying_read_fails() {
        let ctx = context(Profile::Desktop);
        let vertex = vertex_writing_position();
        let mut fragment = StageProgram::new(Stage::Fragment);
        fragment.base_mut().inputs_read = 1 << (FRAG_ATTRIB_VAR0 + 1);
        let err = validate_cross_stage(&ctx, Some(&vertex), None, Some(&fragment)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Fragment program using varying vars not written by vertex shader"
        );

        // Producing the varying fixes it.
        let mut vertex = vertex_writing_position();
        vertex.base_mut().outputs_written |= 1 << (VERT_RESULT_VAR0 + 1);
        validate_cross_stage(&ctx, Some(&vertex), None, Some(&fragment)).unwrap();
    }

    #[test]
    fn test_exclusive_fragment_outputs() {
        let ctx = context(Profile::Desktop);
        let vertex = vertex_writing_position();
        let mut fragment = StageProgram::new(Stage::Fragment);
        fragment.base_mut().outputs_written =
            (1 << FRAG_RESULT_COLOR) | (1 << (FRAG_RESULT_DATA0 + 2));
        let err = validate_cross_stage(&ctx, Some(&vertex), None, Some(&fragment)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Fragment program cannot write both gl_FragColor and gl_FragData[]."
        );
    }

    #[test]
    fn test_geometry_requires_vertex_and_vertices_out() {
        let ctx = context(Profile::Desktop);
        let geometry = StageProgram::new(Stage::Geometry);
        let fragment = StageProgram::new(Stage::Fragment);
        let err =
            validate_cross_stage(&ctx, None, Some(&geometry), Some(&fragment)).unwrap_err();
        assert_eq!(err.to_string(), "Geometry shader without a vertex shader is illegal!");

        let vertex = vertex_writing_position();
        let err =
            validate_cross_stage(&ctx, Some(&vertex), Some(&geometry), Some(&fragment)).unwrap_err();
        assert_eq!(err.to_string(), "GEOMETRY_VERTICES_OUT is zero");
    }

    fn feedback_program(names: &[&str]) -> ShaderProgram {
        let mut prog = ShaderProgram::new();
        prog.transform_feedback.varying_names = names.iter().map(|n| n.to_string()).collect();
        prog
    }

    #[test]
    fn test_feedback_requires_vertex_stage() {
        let ctx = context(Profile::Desktop);
        let prog = feedback_program(&["v"]);
        let err = validate_transform_feedback(&ctx, &prog, false).unwrap_err();
        assert_eq!(err.to_string(), "Transform feedback without vertex shader");
    }

    #[test]
    fn test_feedback_unknown_varying() {
        let ctx = context(Profile::Desktop);
        let prog = feedback_program(&["v_ghost"]);
        let err = validate_transform_feedback(&ctx, &prog, true).unwrap_err();
        assert_eq!(err.to_string(), "vertex shader does not emit v_ghost");
    }

    #[test]
    fn test_feedback_duplicate_varying() {
        let ctx = context(Profile::Desktop);
        let mut prog = feedback_program(&["v", "v"]);
        prog.add_varying("v", 4, DataType::Vec4, ParamFlags::empty());
        let err = validate_transform_feedback(&ctx, &prog, true).unwrap_err();
        assert_eq!(err.to_string(), "duplicated transform feedback varying name: v");
    }

    #[test]
    fn test_feedback_component_limit() {
        let mut limits = Limits::default();
        limits.max_feedback_interleaved_components = 12;
        let ctx = Context::new(limits, Profile::Desktop, Box::new(NoCompiler), Box::new(AcceptAll));
        let mut prog = feedback_program(&["a", "b", "c", "d"]);
        for name in ["a", "b", "c", "d"] {
            prog.add_varying(name, 4, DataType::Vec4, ParamFlags::empty());
        }
        let err = validate_transform_feedback(&ctx, &prog, true).unwrap_err();
        assert_eq!(err.to_string(), "Too many feedback components: 16, max is 12");

        // Separate mode has its own limit.
        let mut prog = feedback_program(&["a"]);
        prog.transform_feedback.mode = FeedbackMode::Separate;
        prog.add_varying("a", 4, DataType::Vec4, ParamFlags::empty());
        validate_transform_feedback(&ctx, &prog, true).unwrap();
    }
}
