//! Per-stage parameter lists. The compiler front-end hands each stage program three of these: the
//! main parameter list (uniforms, samplers, state variables), the varying list and, for vertex
//! programs, the declared attribute list.

use bitflags::bitflags;
use smallvec::SmallVec;

bitflags! {
    /// Qualifier bits attached to a parameter. For a varying that appears in more than one stage,
    /// `CENTROID` and `INVARIANT` must agree bit-for-bit across the stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u8 {
        const CENTROID = 1 << 0;
        const INVARIANT = 1 << 1;
        const FLAT = 1 << 2;
        const LINEAR = 1 << 3;
    }
}

impl ParamFlags {
    /// Whether `bit` is either set in both flag sets or clear in both.
    pub(crate) fn agrees_with(self, other: ParamFlags, bit: ParamFlags) -> bool {
        (self & bit) == (other & bit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Uniform,
    Sampler,
    Varying,
    Attribute,
    StateVar,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    Bool,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler1DShadow,
    Sampler2DShadow,
}

impl DataType {
    /// Number of float components occupied by one value of this type. This is what transform
    /// feedback sums when checking captured varyings against the component limit.
    pub fn component_count(self) -> u32 {
        match self {
            DataType::Float | DataType::Int | DataType::Bool => 1,
            DataType::Vec2 | DataType::IVec2 | DataType::BVec2 => 2,
            DataType::Vec3 | DataType::IVec3 | DataType::BVec3 => 3,
            DataType::Vec4 | DataType::IVec4 | DataType::BVec4 | DataType::Mat2 => 4,
            DataType::Mat3 => 9,
            DataType::Mat4 => 16,
            DataType::Sampler1D
            | DataType::Sampler2D
            | DataType::Sampler3D
            | DataType::SamplerCube
            | DataType::Sampler1DShadow
            | DataType::Sampler2DShadow => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,

    /// Size in floats. Arrays and matrices span `size.div_ceil(4)` consecutive registers.
    pub size: u32,

    pub data_type: DataType,
    pub flags: ParamFlags,
    pub used: bool,
    pub initialized: bool,

    /// Constant storage for the parameter. For samplers, `values[0]` holds the sampler number:
    /// stage-local before linking, the program-wide unit afterwards.
    pub values: SmallVec<[f32; 4]>,
}

impl Parameter {
    pub fn new(kind: ParamKind, name: &str, size: u32, data_type: DataType) -> Parameter {
        Parameter {
            name: name.to_owned(),
            kind,
            size,
            data_type,
            flags: ParamFlags::empty(),
            used: true,
            initialized: false,
            values: SmallVec::new(),
        }
    }

    /// A sampler parameter bound to a stage-local sampler number.
    pub fn sampler(name: &str, data_type: DataType, local_unit: u32) -> Parameter {
        let mut param = Parameter::new(ParamKind::Sampler, name, 1, data_type);
        param.values.push(local_unit as f32);
        param
    }

    pub fn with_flags(mut self, flags: ParamFlags) -> Parameter {
        self.flags = flags;
        self
    }

    /// Number of 4-float registers this parameter occupies.
    pub fn register_count(&self) -> u32 {
        self.size.div_ceil(4).max(1)
    }
}

/// An ordered list of parameters. Lists are small (a handful of entries per stage), so name
/// lookup is a linear scan.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    params: Vec<Parameter>,
}

impl ParameterList {
    pub fn new() -> ParameterList {
        ParameterList::default()
    }

    pub fn push(&mut self, param: Parameter) -> usize {
        self.params.push(param);
        self.params.len() - 1
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.params.iter_mut()
    }
}
