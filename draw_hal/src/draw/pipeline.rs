/// Pipeline trait, primitive topology, stage validation and CPU-side uniform storage

use std::any::Any;

use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::draw::{ShaderModuleRef, ShaderStage, UniformDesc, UniformType};
use crate::error::{Error, Result};
use crate::RefCounted;

/// Primitive topology of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
    /// Tessellation patches
    PatchList,
    LineListAdjacency,
    LineStripAdjacency,
    TriangleListAdjacency,
    TriangleStripAdjacency,
}

/// Descriptor for `DrawContext::create_pipeline`
///
/// Order matters: modules are handed to the backend as listed.
#[derive(Debug, Clone, Default)]
pub struct PipelineDesc {
    pub shaders: Vec<ShaderModuleRef>,
}

/// Pipeline resource trait
///
/// Uniform setters address uniforms by name; names no module declares are
/// ignored silently.
pub trait Pipeline {
    /// Set a float/vecN uniform from 1..=4 floats (extra floats are ignored)
    fn set_vector(&mut self, name: &str, values: &[f32]);

    /// Set a mat4 uniform
    fn set_matrix4x4(&mut self, name: &str, value: &Mat4);

    /// Modules the pipeline was created from, in order
    fn shaders(&self) -> &[ShaderModuleRef];

    fn as_any(&self) -> &dyn Any;
}

pub type PipelineRef = RefCounted<dyn Pipeline>;

/// Check that `shaders` form a usable stage set
///
/// Accepted: vertex + fragment (other graphics stages optional), or a single
/// compute module.
pub fn validate_pipeline_stages(shaders: &[ShaderModuleRef]) -> Result<()> {
    let mut stages = Vec::with_capacity(shaders.len());
    for shader in shaders {
        let module = shader.get().ok_or_else(|| {
            Error::InvalidPipeline(format!("shader module #{} was already destroyed", shader.id()))
        })?;
        stages.push(module.stage());
    }

    if stages.contains(&ShaderStage::Compute) {
        if stages.len() != 1 {
            return Err(Error::InvalidPipeline(
                "a compute module cannot be combined with other stages".to_string(),
            ));
        }
        return Ok(());
    }
    if !stages.contains(&ShaderStage::Vertex) || !stages.contains(&ShaderStage::Fragment) {
        return Err(Error::InvalidPipeline(format!(
            "pipeline needs a vertex and a fragment module, got {:?}",
            stages
        )));
    }
    Ok(())
}

// ===== PIPELINE SHADERS =====

/// Shader modules held by a pipeline
///
/// Takes one reference to every module on construction and gives it back
/// when dropped.
pub struct PipelineShaders {
    modules: Vec<ShaderModuleRef>,
}

impl PipelineShaders {
    pub fn acquire(desc: &PipelineDesc) -> Self {
        for module in &desc.shaders {
            module.acquire();
        }
        Self {
            modules: desc.shaders.clone(),
        }
    }

    pub fn modules(&self) -> &[ShaderModuleRef] {
        &self.modules
    }

    /// First module of `stage`
    pub fn find(&self, stage: ShaderStage) -> Option<&ShaderModuleRef> {
        self.modules
            .iter()
            .find(|m| m.get().is_some_and(|module| module.stage() == stage))
    }
}

impl Drop for PipelineShaders {
    fn drop(&mut self) {
        for module in &self.modules {
            module.release();
        }
    }
}

// ===== UNIFORM BLOCK =====

/// Packed CPU copy of a pipeline's uniforms
///
/// Built from the uniforms every module declares; a name declared by several
/// stages maps to one slot. Backends push `bytes()` to the GPU at draw time.
#[derive(Debug, Clone, Default)]
pub struct UniformBlock {
    slots: FxHashMap<String, (UniformType, usize)>,
    data: Vec<u8>,
}

impl UniformBlock {
    /// Lay out the uniforms of `shaders` at the offsets they declare
    ///
    /// For backends where every stage shares one uniform block layout.
    pub fn from_shaders(shaders: &[ShaderModuleRef]) -> Self {
        let mut block = Self::default();
        for uniform in collect_uniforms(shaders) {
            let offset = uniform.offset as usize;
            block.declare(uniform, offset);
        }
        block
    }

    /// Lay out the uniforms of `shaders` back to back, in declaration order
    ///
    /// For backends that address uniforms by name only.
    pub fn packed(shaders: &[ShaderModuleRef]) -> Self {
        let mut block = Self::default();
        for uniform in collect_uniforms(shaders) {
            let offset = block.data.len();
            block.declare(uniform, offset);
        }
        block
    }

    fn declare(&mut self, uniform: UniformDesc, offset: usize) {
        if self.slots.contains_key(&uniform.name) {
            return;
        }
        let end = offset + uniform.uniform_type.size() as usize;
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.slots.insert(uniform.name, (uniform.uniform_type, offset));
    }

    /// Write up to the uniform's component count; returns false for unknown names
    pub fn set_vector(&mut self, name: &str, values: &[f32]) -> bool {
        let Some(&(uniform_type, offset)) = self.slots.get(name) else {
            return false;
        };
        let count = values.len().min(uniform_type.components());
        let bytes: &[u8] = bytemuck::cast_slice(&values[..count]);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        true
    }

    /// Write a column-major matrix; returns false for unknown or non-matrix names
    pub fn set_matrix4x4(&mut self, name: &str, value: &Mat4) -> bool {
        match self.slots.get(name) {
            Some(&(UniformType::Matrix4x4, offset)) => {
                let bytes: &[u8] = bytemuck::bytes_of(value);
                self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
                true
            }
            _ => false,
        }
    }

    /// Current value of a uniform as floats
    pub fn get(&self, name: &str) -> Option<Vec<f32>> {
        let &(uniform_type, offset) = self.slots.get(name)?;
        let bytes = &self.data[offset..offset + uniform_type.size() as usize];
        Some(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

fn collect_uniforms(shaders: &[ShaderModuleRef]) -> Vec<UniformDesc> {
    shaders
        .iter()
        .filter_map(|shader| shader.get().map(|module| module.uniforms().to_vec()))
        .flatten()
        .collect()
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
