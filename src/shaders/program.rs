// SPDX-License-Identifier: GPL-3.0-only

//! Compiled composite program and its uniform/attribute slots
//!
//! Both stages are parsed and validated with naga before any GPU object
//! exists, so a broken shader fails the surface initialization with a
//! readable message instead of a device-lost later on. Uniform slots are
//! resolved by member name through reflection; names that are not part of
//! the uniform block resolve to an invalid location and writes to it are
//! dropped.

use crate::errors::{ShaderError, ShaderStage};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use std::collections::HashMap;
use tracing::debug;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Byte offset of a uniform member, or nothing when the name is unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation(Option<u32>);

impl UniformLocation {
    pub const INVALID: Self = Self(None);

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    pub fn offset(&self) -> Option<u32> {
        self.0
    }
}

/// Reflected layout of the fragment stage's uniform block
#[derive(Debug, Clone)]
struct UniformLayout {
    group: u32,
    binding: u32,
    size: u32,
    members: HashMap<String, u32>,
}

/// A validated vertex + fragment pair
#[derive(Debug)]
pub struct ShaderProgram {
    vertex_source: String,
    fragment_source: String,
    attributes: HashMap<String, u32>,
    uniforms: Option<UniformLayout>,
}

impl ShaderProgram {
    /// Parse, validate and link both stages
    pub fn compile(vertex_src: &str, fragment_src: &str) -> Result<Self, ShaderError> {
        let vertex = parse_and_validate(ShaderStage::Vertex, vertex_src)?;
        let fragment = parse_and_validate(ShaderStage::Fragment, fragment_src)?;

        let vs = find_entry(&vertex, ShaderStage::Vertex, VERTEX_ENTRY)?;
        let fs = find_entry(&fragment, ShaderStage::Fragment, FRAGMENT_ENTRY)?;

        // Every fragment input must be written by the vertex stage
        let produced = match &vs.function.result {
            Some(result) => io_locations(&vertex, result.ty, result.binding.as_ref()),
            None => Vec::new(),
        };
        for arg in &fs.function.arguments {
            for (name, location) in io_locations(&fragment, arg.ty, arg.binding.as_ref()) {
                if !produced.iter().any(|(_, l)| *l == location) {
                    return Err(ShaderError::Link(format!(
                        "fragment input '{}' at location {} is not written by the vertex stage",
                        name, location
                    )));
                }
            }
        }

        let attributes = vs
            .function
            .arguments
            .iter()
            .flat_map(|arg| io_locations(&vertex, arg.ty, arg.binding.as_ref()))
            .collect::<HashMap<_, _>>();

        let uniforms = reflect_uniform_block(&fragment);

        debug!(
            attributes = attributes.len(),
            uniform_members = uniforms.as_ref().map(|u| u.members.len()).unwrap_or(0),
            uniform_size = uniforms.as_ref().map(|u| u.size).unwrap_or(0),
            "Shader program compiled"
        );

        Ok(Self {
            vertex_source: vertex_src.to_string(),
            fragment_source: fragment_src.to_string(),
            attributes,
            uniforms,
        })
    }

    /// Location of a uniform member; unknown names are not an error
    pub fn resolve_uniform(&self, name: &str) -> UniformLocation {
        self.uniforms
            .as_ref()
            .and_then(|u| u.members.get(name).copied())
            .map_or(UniformLocation::INVALID, |offset| UniformLocation(Some(offset)))
    }

    /// Vertex input location of an attribute
    pub fn resolve_attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    /// `(group, binding)` of the uniform block, if the fragment stage has one
    pub fn uniform_binding(&self) -> Option<(u32, u32)> {
        self.uniforms.as_ref().map(|u| (u.group, u.binding))
    }

    /// Fresh zeroed storage for the uniform block
    pub fn uniform_block(&self) -> UniformBlock {
        let size = self.uniforms.as_ref().map_or(0, |u| u.size as usize);
        UniformBlock {
            bytes: vec![0; size],
        }
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }
}

/// CPU copy of a uniform block, uploaded as one buffer write per draw
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    /// Write an `f32`; no-op for an invalid or out-of-range location
    pub fn set_f32(&mut self, location: UniformLocation, value: f32) {
        let Some(offset) = location.offset() else {
            return;
        };
        let start = offset as usize;
        if let Some(slot) = self.bytes.get_mut(start..start + 4) {
            slot.copy_from_slice(&value.to_ne_bytes());
        }
    }

    pub fn get_f32(&self, location: UniformLocation) -> Option<f32> {
        let start = location.offset()? as usize;
        let slot = self.bytes.get(start..start + 4)?;
        Some(f32::from_ne_bytes([slot[0], slot[1], slot[2], slot[3]]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn parse_and_validate(stage: ShaderStage, source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        stage,
        message: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            stage,
            message: e.emit_to_string(source),
        })?;

    Ok(module)
}

fn find_entry<'m>(
    module: &'m naga::Module,
    stage: ShaderStage,
    name: &'static str,
) -> Result<&'m naga::EntryPoint, ShaderError> {
    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    module
        .entry_points
        .iter()
        .find(|ep| ep.name == name && ep.stage == wanted)
        .ok_or(ShaderError::MissingEntryPoint { stage, name })
}

/// User-defined IO locations of a value, flattening one level of struct
fn io_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
) -> Vec<(String, u32)> {
    if let Some(binding) = binding {
        return match binding {
            naga::Binding::Location { location, .. } => vec![(String::new(), *location)],
            _ => Vec::new(),
        };
    }

    match &module.types[ty].inner {
        naga::TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|m| match m.binding {
                Some(naga::Binding::Location { location, .. }) => {
                    Some((m.name.clone().unwrap_or_default(), location))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn reflect_uniform_block(module: &naga::Module) -> Option<UniformLayout> {
    module.global_variables.iter().find_map(|(_, var)| {
        if var.space != naga::AddressSpace::Uniform {
            return None;
        }
        let resource = var.binding.as_ref()?;
        match &module.types[var.ty].inner {
            naga::TypeInner::Struct { members, span } => Some(UniformLayout {
                group: resource.group,
                binding: resource.binding,
                size: *span,
                members: members
                    .iter()
                    .filter_map(|m| m.name.clone().map(|name| (name, m.offset)))
                    .collect(),
            }),
            _ => None,
        }
    })
}
