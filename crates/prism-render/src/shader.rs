//! Shader module registry.
//!
//! Materials are named pairs of WGSL stage sources plus the default values of
//! their per-batch uniform block. Sources may pull in shared chunks with
//! `#include <name>` lines; [`ShaderRegistry::preprocess`] expands them and
//! prepends one `const` declaration per define.

use crate::error::{RenderError, RenderResult};
use prism_core::alloc::{HashMap, HashSet};
use prism_test_utils::ProgramDescriptor;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const MATERIAL_SDF: &str = "material-sdf";
pub const MATERIAL_IMAGE: &str = "material-image";
pub const MATERIAL_BASIC: &str = "material-basic";

#[derive(Debug, Clone)]
pub struct Material {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
    /// Initial contents of the material's `@group(1)` uniform block.
    pub uniform_defaults: Vec<f32>,
}

/// Value of a compile-time constant injected into both stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderDefine {
    Bool(bool),
    U32(u32),
    F32(f32),
}

impl ShaderDefine {
    fn declaration(&self, name: &str) -> String {
        match self {
            ShaderDefine::Bool(v) => format!("const {}: bool = {};", name, v),
            ShaderDefine::U32(v) => format!("const {}: u32 = {}u;", name, v),
            ShaderDefine::F32(v) => format!("const {}: f32 = {:?};", name, v),
        }
    }
}

/// Fully expanded sources, ready to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedProgram {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
}

impl PreprocessedProgram {
    pub fn descriptor(&self) -> ProgramDescriptor<'_> {
        ProgramDescriptor {
            label: Some(&self.label),
            vertex: &self.vertex,
            fragment: &self.fragment,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderRegistry {
    materials: HashMap<String, Material>,
    chunks: HashMap<String, Cow<'static, str>>,
}

impl ShaderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in chunks and materials.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_chunk("scene", include_str!("shaders/scene.wgsl"));
        registry.register_chunk("instance", include_str!("shaders/instance.wgsl"));
        registry.register_chunk("lights", include_str!("shaders/lights.wgsl"));

        registry.register_material(
            MATERIAL_SDF,
            Material {
                vertex: include_str!("shaders/sdf.vert.wgsl").into(),
                fragment: include_str!("shaders/sdf.frag.wgsl").into(),
                uniform_defaults: vec![1.0, 0.0, 0.0, 0.0],
            },
        );
        registry.register_material(
            MATERIAL_IMAGE,
            Material {
                vertex: include_str!("shaders/image.vert.wgsl").into(),
                fragment: include_str!("shaders/image.frag.wgsl").into(),
                uniform_defaults: vec![1.0, 1.0, 1.0, 1.0],
            },
        );
        registry.register_material(
            MATERIAL_BASIC,
            Material {
                vertex: include_str!("shaders/basic.vert.wgsl").into(),
                fragment: include_str!("shaders/basic.frag.wgsl").into(),
                uniform_defaults: vec![1.0, 1.0, 1.0, 1.0],
            },
        );
        registry
    }

    /// Registers or replaces a material.
    pub fn register_material(&mut self, name: impl Into<String>, material: Material) {
        self.materials.insert(name.into(), material);
    }

    pub fn register_chunk(&mut self, name: impl Into<String>, source: impl Into<Cow<'static, str>>) {
        self.chunks.insert(name.into(), source.into());
    }

    pub fn material(&self, name: &str) -> RenderResult<&Material> {
        self.materials.get(name).ok_or_else(|| RenderError::UnknownMaterial {
            name: name.to_string(),
        })
    }

    /// Expands includes and injects `defines` into both stages of `material`.
    ///
    /// Defines are emitted in name order, so equal define sets always yield
    /// byte-identical sources and therefore the same cached program.
    pub fn preprocess(&self, material: &str, defines: &[(&str, ShaderDefine)]) -> RenderResult<PreprocessedProgram> {
        let source = self.material(material)?;

        let sorted: BTreeMap<&str, ShaderDefine> = defines.iter().copied().collect();
        let mut header = String::new();
        for (name, value) in &sorted {
            header.push_str(&value.declaration(name));
            header.push('\n');
        }

        let expand = |stage: &str| -> RenderResult<String> {
            let mut out = header.clone();
            let mut included = HashSet::default();
            self.expand_includes(material, stage, &mut included, &mut out)?;
            Ok(out)
        };

        Ok(PreprocessedProgram {
            label: material.to_string(),
            vertex: expand(&source.vertex)?,
            fragment: expand(&source.fragment)?,
        })
    }

    fn expand_includes<'a>(
        &'a self,
        material: &str,
        source: &'a str,
        included: &mut HashSet<&'a str>,
        out: &mut String,
    ) -> RenderResult<()> {
        for line in source.lines() {
            let Some(name) = parse_include(line) else {
                let _ = writeln!(out, "{}", line);
                continue;
            };
            let (key, chunk) = self
                .chunks
                .get_key_value(name)
                .ok_or_else(|| RenderError::UnknownShaderChunk {
                    name: name.to_string(),
                    material: material.to_string(),
                })?;
            // each chunk is pasted at most once per stage
            if included.insert(key.as_str()) {
                self.expand_includes(material, chunk, included, out)?;
            }
        }
        Ok(())
    }
}

fn parse_include(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("#include")?
        .trim()
        .strip_prefix('<')?
        .strip_suffix('>')
        .map(str::trim)
}
