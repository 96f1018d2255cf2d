//! Model sourcing: registry access and local location resolution.

pub mod huggingface;
pub mod model_location;
pub mod model_registry;

pub use huggingface::HuggingFaceRegistry;
pub use model_location::{ModelLocation, ModelResolver};
pub use model_registry::{has_model_files, ModelRegistry};
