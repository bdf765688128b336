pub mod bridge;
pub mod error;
pub mod tag;
pub mod value;

pub use bridge::{fields_from_dynamic, fields_to_dynamic, FromDynamic, HostFields, ToDynamic};
pub use error::{
    CompileError, CompileErrorGroup, CompileFailure, ConversionError, EnvironmentCloneError,
    RuntimeFault, ServiceError,
};
pub use tag::SourceTag;
pub use value::{DynArray, DynEntry, DynamicValue};
