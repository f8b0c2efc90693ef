/// Binary record codecs for every entity kind, per generation
pub mod codec;
/// Instance conversion between generations, including model and ParamBlock adaptation
pub mod convert;
/// The level store collaborator and shared parsing utilities
pub mod data;
/// Error definitions
pub mod error;
/// The in-memory level graph: instances, models, textures, param blocks and derived tables
pub mod level;
/// Engine concept types (generations, instance categories) shared across the crate.
pub mod level_types;
/// Appending textures, models and paths from one level into another
pub mod merge;
/// Named operations with validation, occlusion rebuild and snapshot-protected saving
pub mod pipeline;
/// Generic wrapper for values that may or may not match a known variant.
pub mod recognized;
/// Occlusion table rebuilding, spatial hashing and coordinate conversion
pub mod spatial;
/// Reference validation and repair
pub mod validate;
