//! GPU resources.
//!
//! - [`Buffer`]: a dedicated memory block with a CPU access mode
//! - [`VariablesBuffer`]: a write buffer with a CPU shadow copy
//! - [`ConstantBuffer`]: a reflection-sized constant buffer with a cached view

mod buffer;
mod constant_buffer;
mod variables;

pub use buffer::Buffer;
pub use constant_buffer::{CacheState, ConstantBuffer, ViewCache};
pub use variables::VariablesBuffer;
