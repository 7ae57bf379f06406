//! Shader reflection data consumed by constant buffers.
//!
//! Shader compilation lives outside this crate. Whatever compiles programs
//! fills a [`ProgramReflection`] with the byte sizes of the buffers each
//! program declares; [`ConstantBuffer`](crate::ConstantBuffer) only needs a
//! name-to-size lookup from it.

use std::collections::HashMap;
use std::sync::Arc;

/// Kind of shader-declared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Uniform / constant buffer.
    Constant,
    /// Structured buffer.
    Structured,
    /// Raw byte-address buffer.
    Raw,
}

/// Reflection of one shader-declared buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferReflection {
    name: String,
    kind: BufferKind,
    required_size: u64,
}

impl BufferReflection {
    /// Describe a buffer named `name` whose declared layout takes `required_size` bytes.
    pub fn new(name: impl Into<String>, kind: BufferKind, required_size: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            required_size,
        }
    }

    /// Shader-side name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Buffer kind.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Size of the declared layout in bytes.
    pub fn required_size(&self) -> u64 {
        self.required_size
    }
}

/// Reflection of a compiled program.
#[derive(Debug, Clone, Default)]
pub struct ProgramReflection {
    buffers: HashMap<String, Arc<BufferReflection>>,
}

impl ProgramReflection {
    /// Create an empty reflection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a buffer declaration.
    pub fn with_buffer(mut self, buffer: BufferReflection) -> Self {
        self.add_buffer(buffer);
        self
    }

    /// Add a buffer declaration, replacing one with the same name.
    pub fn add_buffer(&mut self, buffer: BufferReflection) {
        self.buffers
            .insert(buffer.name().to_string(), Arc::new(buffer));
    }

    /// Look up a buffer by name and kind.
    pub fn buffer_desc(&self, name: &str, kind: BufferKind) -> Option<Arc<BufferReflection>> {
        self.buffers
            .get(name)
            .filter(|buffer| buffer.kind() == kind)
            .cloned()
    }

    /// Number of declared buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

/// One compiled version of a program (a particular set of defines).
#[derive(Debug, Clone)]
pub struct ProgramVersion {
    reflector: Arc<ProgramReflection>,
}

impl ProgramVersion {
    /// Wrap the reflection of a compiled version.
    pub fn new(reflector: Arc<ProgramReflection>) -> Self {
        Self { reflector }
    }

    /// Reflection of this version.
    pub fn reflector(&self) -> &Arc<ProgramReflection> {
        &self.reflector
    }
}

/// A shader program with its currently active compiled version.
#[derive(Debug, Clone)]
pub struct Program {
    name: String,
    active_version: Arc<ProgramVersion>,
}

impl Program {
    /// Create a program whose active version is `version`.
    pub fn new(name: impl Into<String>, version: Arc<ProgramVersion>) -> Self {
        Self {
            name: name.into(),
            active_version: version,
        }
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The active compiled version.
    pub fn active_version(&self) -> &Arc<ProgramVersion> {
        &self.active_version
    }

    /// Switch to another compiled version.
    pub fn set_active_version(&mut self, version: Arc<ProgramVersion>) {
        self.active_version = version;
    }
}
