//! Compiled shader units and the linkable shader program container.

use crate::params::DataType;
use crate::params::ParamFlags;
use crate::program::FragmentProgram;
use crate::program::GeometryProgram;
use crate::program::PrimitiveType;
use crate::program::Stage;
use crate::program::StageProgram;
use crate::program::VertexProgram;
use indexmap::IndexMap;

/// Compiler pragmas carried alongside a shader's source. A concatenated shader inherits the first
/// unit's pragmas.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pragmas {
    pub optimize: bool,
    pub debug: bool,
}

/// One compiled unit as delivered by the compiler front-end.
#[derive(Debug, Clone)]
pub struct Shader {
    pub stage: Stage,
    pub source: String,
    pub pragmas: Pragmas,
    pub compile_status: bool,
    pub defines_main: bool,
    pub unresolved_refs: bool,

    /// The lowered program. Present whenever `compile_status` is set.
    pub program: Option<StageProgram>,
}

impl Shader {
    pub fn new(stage: Stage, source: &str) -> Shader {
        Shader {
            stage,
            source: source.to_owned(),
            pragmas: Pragmas::default(),
            compile_status: false,
            defines_main: false,
            unresolved_refs: false,
            program: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackMode {
    #[default]
    Interleaved,
    Separate,
}

/// Transform feedback configuration, set by the caller before linking.
#[derive(Debug, Clone, Default)]
pub struct TransformFeedback {
    pub mode: FeedbackMode,
    pub varying_names: Vec<String>,
}

/// Geometry stage configuration, set by the caller before linking.
#[derive(Debug, Clone, Copy)]
pub struct GeometryConfig {
    pub input_primitive: PrimitiveType,
    pub output_primitive: PrimitiveType,
    pub vertices_out: u32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig {
            input_primitive: PrimitiveType::Triangles,
            output_primitive: PrimitiveType::Triangles,
            vertices_out: 0,
        }
    }
}

/// A program-wide varying. `slot` is the first register the varying occupies; a varying wider
/// than 4 floats occupies consecutive registers starting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varying {
    pub size: u32,
    pub data_type: DataType,
    pub flags: ParamFlags,
    pub slot: u32,
}

/// A program-wide uniform: for each stage that declares it, the index into that stage's parameter
/// list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Uniform {
    pub vertex: Option<usize>,
    pub geometry: Option<usize>,
    pub fragment: Option<usize>,
    pub initialized: bool,
}

impl Uniform {
    pub(crate) fn stage_slot_mut(&mut self, stage: Stage) -> &mut Option<usize> {
        match stage {
            Stage::Vertex => &mut self.vertex,
            Stage::Geometry => &mut self.geometry,
            Stage::Fragment => &mut self.fragment,
        }
    }
}

/// A resolved vertex attribute. `slot` is the generic attribute slot, or `None` for built-ins
/// like `gl_Vertex`, which are listed for introspection but have no generic slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    pub name: String,
    pub size: u32,
    pub data_type: DataType,
    pub slot: Option<u32>,
}

/// The linkable container: attached compiled units plus, after a successful link, the rewritten
/// per-stage programs and the three program-wide symbol tables.
#[derive(Default)]
pub struct ShaderProgram {
    pub shaders: Vec<Shader>,

    pub vertex_program: Option<VertexProgram>,
    pub geometry_program: Option<GeometryProgram>,
    pub fragment_program: Option<FragmentProgram>,

    pub varyings: IndexMap<String, Varying>,
    pub uniforms: IndexMap<String, Uniform>,
    pub attributes: Vec<AttributeBinding>,

    /// User pre-bindings of attribute names to generic slots. Unlike the tables above, this
    /// survives re-links; it's input to the attribute resolver, not an output of it.
    pub attribute_bindings: IndexMap<String, u32>,

    pub link_status: bool,
    pub info_log: Option<String>,

    pub transform_feedback: TransformFeedback,
    pub geometry: GeometryConfig,
}

impl ShaderProgram {
    pub fn new() -> ShaderProgram {
        ShaderProgram::default()
    }

    pub fn attach(&mut self, shader: Shader) {
        self.shaders.push(shader);
    }

    /// Pre-binds an attribute name to a generic slot, taking priority over automatic assignment
    /// at the next link.
    pub fn bind_attribute(&mut self, name: &str, slot: u32) {
        self.attribute_bindings.insert(name.to_owned(), slot);
    }

    /// Drops the results of any previous link. User attribute bindings and the feedback/geometry
    /// configuration are kept.
    pub(crate) fn clear_link_state(&mut self) {
        self.vertex_program = None;
        self.geometry_program = None;
        self.fragment_program = None;
        self.varyings.clear();
        self.uniforms.clear();
        self.attributes.clear();
        self.link_status = false;
        self.info_log = None;
    }

    /// Total registers occupied by the program-wide varyings, which is also the next free slot.
    pub(crate) fn varying_register_count(&self) -> u32 {
        self.varyings.values().map(|v| v.size.div_ceil(4).max(1)).sum()
    }

    /// Appends a varying, allocating it the next free run of registers. The name must not already
    /// be present.
    pub(crate) fn add_varying(
        &mut self,
        name: &str,
        size: u32,
        data_type: DataType,
        flags: ParamFlags,
    ) -> u32 {
        let slot = self.varying_register_count();
        let previous = self.varyings.insert(
            name.to_owned(),
            Varying {
                size,
                data_type,
                flags,
                slot,
            },
        );
        debug_assert!(previous.is_none(), "duplicate varying {name}");
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varying_slot_allocation() {
        let mut prog = ShaderProgram::new();
        assert_eq!(prog.add_varying("a", 4, DataType::Vec4, ParamFlags::empty()), 0);
        // A mat4 spans four registers.
        assert_eq!(prog.add_varying("b", 16, DataType::Mat4, ParamFlags::empty()), 1);
        assert_eq!(prog.add_varying("c", 2, DataType::Vec2, ParamFlags::empty()), 5);
        assert_eq!(prog.varying_register_count(), 6);
    }

    #[test]
    fn test_clear_link_state_keeps_bindings() {
        let mut prog = ShaderProgram::new();
        prog.bind_attribute("aPos", 3);
        prog.add_varying("v", 4, DataType::Vec4, ParamFlags::empty());
        prog.info_log = Some("stale".to_owned());
        prog.clear_link_state();
        assert!(prog.varyings.is_empty());
        assert!(prog.info_log.is_none());
        assert_eq!(prog.attribute_bindings.get("aPos"), Some(&3));
    }
}
