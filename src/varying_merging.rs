//! Merges each stage's varyings into the program-wide varying table and rewrites instruction
//! operands so that no `Varying`-file reference survives linking.
//!
//! Varyings are ordinary output registers to the producing stage and ordinary input registers to
//! the consuming stage; only the first register index differs per stage. Merging builds a map
//! from a stage's private varying registers to linked slots, then walks the instruction stream
//! replacing file and index on every varying operand.

use crate::context::Context;
use crate::error::Result;
use crate::instruction::RegisterFile;
use crate::params::ParamFlags;
use crate::program::Stage;
use crate::program::StageProgram;
use crate::registers;
use crate::shader::ShaderProgram;
use anyhow::bail;

#[tracing::instrument(skip_all, name = "Merge varyings")]
pub(crate) fn link_varying_vars(
    ctx: &Context,
    prog: &mut ShaderProgram,
    linked: &mut StageProgram,
) -> Result {
    let stage = linked.stage();
    let bases = registers::varying_bases(stage);
    let common = linked.base_mut();

    // Maps the stage's private varying registers to linked slots. Indexed by register, so a
    // multi-register varying contributes several consecutive entries.
    let mut map: Vec<u32> = Vec::new();

    for var in common.varyings.iter() {
        let slot = match prog.varyings.get(&var.name) {
            Some(existing) => {
                if existing.size != var.size {
                    bail!("mismatched varying variable types");
                }
                if !existing.flags.agrees_with(var.flags, ParamFlags::CENTROID) {
                    bail!("centroid modifier mismatch for '{}'", var.name);
                }
                if !existing.flags.agrees_with(var.flags, ParamFlags::INVARIANT) {
                    bail!("invariant modifier mismatch for '{}'", var.name);
                }
                existing.slot
            }
            None => prog.add_varying(&var.name, var.size, var.data_type, var.flags),
        };

        if prog.varying_register_count() > ctx.limits.max_varying {
            bail!("Too many varying variables");
        }

        for offset in 0..var.register_count() {
            let register = slot + offset;
            match stage {
                Stage::Vertex => {
                    common.output_flags[(bases.dst_base + register) as usize] = var.flags;
                }
                Stage::Fragment => {
                    common.input_flags[(bases.dst_base + register) as usize] = var.flags;
                }
                Stage::Geometry => {
                    common.input_flags[(bases.src_base + register) as usize] = var.flags;
                    common.output_flags[(bases.dst_base + register) as usize] = var.flags;
                }
            }
            tracing::trace!(%stage, name = %var.name, local = map.len(), linked = register, "varying slot");
            map.push(register);
        }
    }

    for inst in &mut common.instructions {
        if let Some(dst) = &mut inst.dst {
            if dst.file == RegisterFile::Varying {
                dst.file = bases.dst_file;
                dst.index = map[dst.index as usize] + bases.dst_base;
            }
        }
        for src in &mut inst.srcs {
            if src.file == RegisterFile::Varying {
                src.file = bases.src_file;
                src.index = map[src.index as usize] + bases.src_base;
            }
        }
    }

    // Stale after the rewrite; recomputed once all passes are done.
    common.inputs_read = 0;
    common.outputs_written = 0;

    Ok(())
}

/// Appends the built-in outputs actually written by the vertex and geometry stages to the
/// program-wide varying table, so transform feedback can capture them and introspection can list
/// them. User varyings are already present from merging.
pub(crate) fn publish_builtin_varyings(
    prog: &mut ShaderProgram,
    vertex: Option<&StageProgram>,
    geometry: Option<&StageProgram>,
) {
    let stages = [
        (vertex, registers::vertex_output_name as fn(u32) -> Option<&'static str>),
        (geometry, registers::geometry_output_name),
    ];
    for (stage_prog, name_of) in stages {
        let Some(stage_prog) = stage_prog else {
            continue;
        };
        let written = stage_prog.base().outputs_written;
        for index in 0..registers::MAX_PROGRAM_OUTPUTS as u32 {
            if written & (1u64 << index) == 0 {
                continue;
            }
            let Some(name) = name_of(index) else { continue };
            if !prog.varyings.contains_key(name) {
                prog.add_varying(name, 4, crate::params::DataType::Vec4, ParamFlags::empty());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Compiler;
    use crate::context::Driver;
    use crate::context::Limits;
    use crate::context::Profile;
    use crate::instruction::DstReg;
    use crate::instruction::Instruction;
    use crate::instruction::Opcode;
    use crate::instruction::SrcReg;
    use crate::params::DataType;
    use crate::params::ParamKind;
    use crate::params::Parameter;
    use crate::registers::FRAG_ATTRIB_VAR0;
    use crate::registers::VERT_RESULT_VAR0;
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

    fn test_context() -> Context {
        Context::new(Limits::default(), Profile::Desktop, Box::new(NoCompiler), Box::new(AcceptAll))
    }

    fn varying(name: &str, size: u32, data_type: DataType) -> Parameter {
        Parameter::new(ParamKind::Varying, name, size, data_type)
    }

    fn mov(dst: DstReg, src: SrcReg) -> Instruction {
        Instruction::new(Opcode::Mov, Some(dst), [src])
    }

    #[test]
    fn test_vertex_writes_become_outputs() {
        let ctx = test_context();
        let mut prog = ShaderProgram::new();
        let mut vertex = StageProgram::new(Stage::Vertex);
        let base = vertex.base_mut();
        base.varyings.push(varying("v_color", 4, DataType::Vec4));
        base.instructions.push(mov(
            DstReg::new(RegisterFile::Varying, 0),
            SrcReg::new(RegisterFile::Temporary, 0),
        ));

        link_varying_vars(&ctx, &mut prog, &mut vertex).unwrap();

        let dst = vertex.base().instructions[0].dst.unwrap();
        assert_eq!(dst.file, RegisterFile::Output);
        assert_eq!(dst.index, VERT_RESULT_VAR0);
        assert_eq!(prog.varyings.get("v_color").unwrap().slot, 0);
    }

    #[test]
    fn test_fragment_reads_follow_vertex_slots() {
        let ctx = test_context();
        let mut prog = ShaderProgram::new();

        let mut vertex = StageProgram::new(Stage::Vertex);
        vertex.base_mut().varyings.push(varying("v_a", 4, DataType::Vec4));
        vertex.base_mut().varyings.push(varying("v_b", 4, DataType::Vec4));
        link_varying_vars(&ctx, &mut prog, &mut vertex).unwrap();

        // The fragment stage declares them in the opposite order; slots come from the table.
        let mut fragment = StageProgram::new(Stage::Fragment);
        let base = fragment.base_mut();
        base.varyings.push(varying("v_b", 4, DataType::Vec4));
        base.varyings.push(varying("v_a", 4, DataType::Vec4));
        base.instructions.push(mov(
            DstReg::new(RegisterFile::Temporary, 0),
            SrcReg::new(RegisterFile::Varying, 0),
        ));
        base.instructions.push(mov(
            DstReg::new(RegisterFile::Temporary, 1),
            SrcReg::new(RegisterFile::Varying, 1),
        ));
        link_varying_vars(&ctx, &mut prog, &mut fragment).unwrap();

        let insts = &fragment.base().instructions;
        assert_eq!(insts[0].srcs[0].file, RegisterFile::Input);
        assert_eq!(insts[0].srcs[0].index, FRAG_ATTRIB_VAR0 + 1);
        assert_eq!(insts[1].srcs[0].index, FRAG_ATTRIB_VAR0);
    }

    #[test]
    fn test_multi_register_varying_spans_consecutive_slots() {
        let ctx = test_context();
        let mut prog = ShaderProgram::new();
        let mut vertex = StageProgram::new(Stage::Vertex);
        let base = vertex.base_mut();
        base.varyings.push(varying("v_mat", 16, DataType::Mat4));
        base.varyings.push(varying("v_after", 4, DataType::Vec4));
        // Registers 0..4 belong to v_mat; register 4 is v_after.
        base.instructions.push(mov(
            DstReg::new(RegisterFile::Varying, 3),
            SrcReg::new(RegisterFile::Temporary, 0),
        ));
        base.instructions.push(mov(
            DstReg::new(RegisterFile::Varying, 4),
            SrcReg::new(RegisterFile::Temporary, 1),
        ));
        link_varying_vars(&ctx, &mut prog, &mut vertex).unwrap();

        let insts = &vertex.base().instructions;
        assert_eq!(insts[0].dst.unwrap().index, VERT_RESULT_VAR0 + 3);
        assert_eq!(insts[1].dst.unwrap().index, VERT_RESULT_VAR0 + 4);
        assert_eq!(prog.varyings.get("v_after").unwrap().slot, 4);
    }

    #[test]
    fn test_size_mismatch_fails() {
        let ctx = test_context();
        let mut prog = ShaderProgram::new();
        let mut vertex = StageProgram::new(Stage::Vertex);
        vertex.base_mut().varyings.push(varying("x", 4, DataType::Vec4));
        link_varying_vars(&ctx, &mut prog, &mut vertex).unwrap();

        let mut fragment = StageProgram::new(Stage::Fragment);
        fragment.base_mut().varyings.push(varying("x", 2, DataType::Vec2));
        let err = link_varying_vars(&ctx, &mut prog, &mut fragment).unwrap_err();
        assert_eq!(err.to_string(), "mismatched varying variable types");
    }

    #[test]
    fn test_centroid_mismatch_fails() {
        let ctx = test_context();
        let mut prog = ShaderProgram::new();
        let mut vertex = StageProgram::new(Stage::Vertex);
        vertex
            .base_mut()
            .varyings
            .push(varying("vc", 4, DataType::Vec4).with_flags(ParamFlags::CENTROID));
        link_varying_vars(&ctx, &mut prog, &mut vertex).unwrap();

        let mut fragment = StageProgram::new(Stage::Fragment);
        fragment.base_mut().varyings.push(varying("vc", 4, DataType::Vec4));
        let err = link_varying_vars(&ctx, &mut prog, &mut fragment).unwrap_err();
        assert_eq!(err.to_string(), "centroid modifier mismatch for 'vc'");
    }

    #[test]
    fn test_varying_limit() {
        let ctx = test_context();
        let max = ctx.limits.max_varying;

        // Exactly the limit links.
        let mut prog = ShaderProgram::new();
        let mut vertex = StageProgram::new(Stage::Vertex);
        for i in 0..max {
            vertex.base_mut().varyings.push(varying(&format!("v{i}"), 4, DataType::Vec4));
        }
        link_varying_vars(&ctx, &mut prog, &mut vertex).unwrap();
        assert_eq!(prog.varying_register_count(), max);

        // One more fails.
        let mut prog = ShaderProgram::new();
        let mut vertex = StageProgram::new(Stage::Vertex);
        for i in 0..=max {
            vertex.base_mut().varyings.push(varying(&format!("v{i}"), 4, DataType::Vec4));
        }
        let err = link_varying_vars(&ctx, &mut prog, &mut vertex).unwrap_err();
        assert_eq!(err.to_string(), "Too many varying variables");
    }

    #[test]
    fn test_flags_copied_to_register_arrays() {
        let ctx = test_context();
        let mut prog = ShaderProgram::new();
        let mut vertex = StageProgram::new(Stage::Vertex);
        vertex
            .base_mut()
            .varyings
            .push(varying("vi", 4, DataType::Vec4).with_flags(ParamFlags::INVARIANT));
        link_varying_vars(&ctx, &mut prog, &mut vertex).unwrap();
        assert_eq!(
            vertex.base().output_flags[VERT_RESULT_VAR0 as usize],
            ParamFlags::INVARIANT
        );
    }

    #[test]
    fn test_builtin_varying_publication() {
        let mut prog = ShaderProgram::new();
        prog.add_varying("v_color", 4, DataType::Vec4, ParamFlags::empty());
        let mut vertex = StageProgram::new(Stage::Vertex);
        vertex.base_mut().outputs_written =
            (1 << crate::registers::VERT_RESULT_HPOS) | (1 << VERT_RESULT_VAR0);
        publish_builtin_varyings(&mut prog, Some(&vertex), None);
        assert!(prog.varyings.contains_key("gl_Position"));
        assert!(prog.varyings.contains_key("v_color"));
        // The user varying register has no built-in name.
        assert_eq!(prog.varyings.len(), 2);
    }
}
