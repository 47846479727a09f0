//! Runtime layer: objects, their capabilities, and the registry that constructs them.

pub mod builtins;
pub mod context;
pub mod object;
pub mod precision;
pub mod registry;

pub use context::{BuildContext, BuildStats};
pub use object::{BoxedValue, DeferredInit, Object, ObjectRef, Taggable, downcast};
pub use precision::{ElemType, Precision};
pub use registry::{ConstructFn, Constructor, RuntimeTypeEntry, RuntimeTypeRegistry};
