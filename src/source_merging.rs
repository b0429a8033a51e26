//! Finds, for each stage, the compiled unit that provides `main`. When no attached unit of a
//! stage is self-contained, the units' sources are concatenated into one synthetic shader and
//! handed back to the compiler front-end.

use crate::context::Context;
use crate::error::Result;
use crate::program::Stage;
use crate::program::StageProgram;
use crate::shader::Shader;
use crate::shader::ShaderProgram;
use anyhow::bail;
use std::fmt::Write as _;

/// Returns the stage program to link for `stage`, or `None` if the program has no shader of that
/// stage at all. The returned program is a copy; the attached units are never mutated.
#[tracing::instrument(skip_all, name = "Select main shader", fields(stage = %stage))]
pub(crate) fn select_main_program(
    ctx: &Context,
    prog: &ShaderProgram,
    stage: Stage,
) -> Result<Option<StageProgram>> {
    for shader in prog.shaders.iter().filter(|s| s.stage == stage) {
        if shader.defines_main && !shader.unresolved_refs {
            return Ok(shader.program.clone());
        }
    }

    // Unresolved references during the original compilation. Concatenate all units of this stage
    // and recompile the combined source.
    let Some(mut combined) = concat_shaders(prog, stage) else {
        return Ok(None);
    };
    let compiled = ctx.compiler.compile(&mut combined);
    if compiled.is_err() || !combined.compile_status || !combined.defines_main || combined.unresolved_refs
    {
        bail!("Unresolved symbols");
    }
    tracing::debug!(%stage, "adopted concatenated shader");
    Ok(combined.program.take())
}

/// Concatenates the sources of every attached unit of `stage`, or `None` if there are none. The
/// combined shader keeps the first unit's pragmas.
fn concat_shaders(prog: &ShaderProgram, stage: Stage) -> Option<Shader> {
    let parts: Vec<&Shader> = prog.shaders.iter().filter(|s| s.stage == stage).collect();
    let first = parts.first()?;

    let total: usize = parts.iter().map(|s| s.source.len()).sum();
    let mut source = String::with_capacity(total + 40);

    // A geometry shader sees the vertex count of its input primitive as a constant.
    if stage == Stage::Geometry {
        let verts = prog.geometry.input_primitive.vertex_count();
        let _ = writeln!(source, "const int gl_VerticesIn = {verts};");
    }
    for part in &parts {
        source.push_str(&part.source);
    }

    suppress_extra_version_directives(&mut source);

    let mut combined = Shader::new(stage, &source);
    combined.pragmas = first.pragmas;
    Some(combined)
}

/// The preprocessor accepts only one `#version` per source, so every directive after the first is
/// turned into a line comment by overwriting its first two characters.
fn suppress_extra_version_directives(source: &mut String) {
    let mut from = 0;
    let mut count = 0;
    while let Some(pos) = source[from..].find("#version") {
        let at = from + pos;
        count += 1;
        if count > 1 {
            source.replace_range(at..at + 2, "//");
        }
        from = at + "#version".len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Limits;
    use crate::context::Profile;
    use crate::program::PrimitiveType;

    struct RecordingCompiler;

    impl crate::context::Compiler for RecordingCompiler {
        fn compile(&self, shader: &mut Shader) -> Result {
            shader.compile_status = true;
            shader.defines_main = shader.source.contains("main");
            shader.unresolved_refs = false;
            shader.program = Some(StageProgram::new(shader.stage));
            Ok(())
        }
    }

    struct AcceptAll;

    impl crate::context::Driver for AcceptAll {
        fn program_string_notify(&self, _stage: Stage, _program: &StageProgram) -> bool {
            true
        }
    }

    fn test_context() -> Context {
        Context::new(
            Limits::default(),
            Profile::Desktop,
            Box::new(RecordingCompiler),
            Box::new(AcceptAll),
        )
    }

    fn compiled_shader(stage: Stage, source: &str, defines_main: bool) -> Shader {
        let mut shader = Shader::new(stage, source);
        shader.compile_status = true;
        shader.defines_main = defines_main;
        shader.program = Some(StageProgram::new(stage));
        shader
    }

    #[test]
    fn test_version_directive_suppression() {
        let mut source = "#version 120\nvoid a() {}\n#version 120\nvoid b() {}\n".to_owned();
        suppress_extra_version_directives(&mut source);
        assert_eq!(source, "#version 120\nvoid a() {}\n//ersion 120\nvoid b() {}\n");
    }

    #[test]
    fn test_self_contained_shader_is_preferred() {
        let ctx = test_context();
        let mut prog = ShaderProgram::new();
        prog.attach(compiled_shader(Stage::Vertex, "void helper() {}", false));
        prog.attach(compiled_shader(Stage::Vertex, "void main() {}", true));
        let selected = select_main_program(&ctx, &prog, Stage::Vertex).unwrap();
        assert!(selected.is_some());
    }

    #[test]
    fn test_concatenation_combines_units() {
        let mut prog = ShaderProgram::new();
        prog.attach(compiled_shader(Stage::Vertex, "#version 120\nvoid helper() {}\n", false));
        prog.attach(compiled_shader(Stage::Vertex, "#version 120\nvoid main() { helper(); }\n", false));
        let combined = concat_shaders(&prog, Stage::Vertex).unwrap();
        assert!(combined.source.contains("helper()"));
        assert!(combined.source.contains("main()"));
        assert_eq!(combined.source.matches("#version").count(), 1);
        assert!(combined.source.contains("//ersion"));
    }

    #[test]
    fn test_geometry_vertices_in_constant() {
        let mut prog = ShaderProgram::new();
        prog.geometry.input_primitive = PrimitiveType::LinesAdjacency;
        prog.attach(compiled_shader(Stage::Geometry, "void main() {}\n", false));
        let combined = concat_shaders(&prog, Stage::Geometry).unwrap();
        assert!(combined.source.starts_with("const int gl_VerticesIn = 4;\n"));
    }

    #[test]
    fn test_missing_stage_selects_nothing() {
        let ctx = test_context();
        let prog = ShaderProgram::new();
        assert!(select_main_program(&ctx, &prog, Stage::Fragment).unwrap().is_none());
    }

    #[test]
    fn test_unresolved_after_recompile_fails() {
        struct FailingCompiler;
        impl crate::context::Compiler for FailingCompiler {
            fn compile(&self, shader: &mut Shader) -> Result {
                shader.compile_status = false;
                Ok(())
            }
        }
        let ctx = Context::new(
            Limits::default(),
            Profile::Desktop,
            Box::new(FailingCompiler),
            Box::new(AcceptAll),
        );
        let mut prog = ShaderProgram::new();
        prog.attach(compiled_shader(Stage::Vertex, "void helper() {}", false));
        let err = select_main_program(&ctx, &prog, Stage::Vertex).unwrap_err();
        assert_eq!(err.to_string(), "Unresolved symbols");
    }
}
