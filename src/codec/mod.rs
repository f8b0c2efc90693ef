//! Per-generation encoders and decoders for every entity record.
//!
//! [`decode`] and [`encode`] dispatch on an [`EntityKind`]; the submodules
//! expose the individual record codecs for callers that already know what
//! they hold.

pub mod class_header;
pub mod layouts;
pub mod model;
pub mod occlusion;
pub mod path;
pub mod table;
pub mod texture;

use rootcause::Report;
use thiserror::Error;

use crate::data::parser_utils::ParseError;
use crate::level::{ClassHeader, Instance, Model, OcclusionTable, ParamBlock, PathSpline, Texture};
use crate::level_types::{Category, Generation};

pub use table::DecodeStats;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{what}: data too short (need {need} bytes, have {have})")]
    DataTooShort {
        what: &'static str,
        need: usize,
        have: usize,
    },
    #[error("{what}: malformed record: {detail}")]
    Malformed { what: &'static str, detail: String },
    #[error("{what}: unknown tag {tag}")]
    UnknownTag { what: &'static str, tag: u32 },
    #[error("{what}: conversion would drop data: {detail}")]
    LossyDowngrade { what: &'static str, detail: String },
    #[error("record parse error: {0}")]
    Parse(#[from] ParseError),
}

/// What a byte buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Instance(Category),
    ClassHeader,
    Model,
    Texture,
    Occlusion,
    Path,
    ParamBlock,
}

/// A decoded entity record.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Instance { category: Category, instance: Instance },
    ClassHeader(ClassHeader),
    Model(Model),
    Texture(Texture),
    Occlusion(OcclusionTable),
    Path(PathSpline),
    ParamBlock(ParamBlock),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Instance { category, .. } => EntityKind::Instance(*category),
            Entity::ClassHeader(_) => EntityKind::ClassHeader,
            Entity::Model(_) => EntityKind::Model,
            Entity::Texture(_) => EntityKind::Texture,
            Entity::Occlusion(_) => EntityKind::Occlusion,
            Entity::Path(_) => EntityKind::Path,
            Entity::ParamBlock(_) => EntityKind::ParamBlock,
        }
    }
}

/// Decode one record of `kind` written for `generation`.
pub fn decode(
    bytes: &[u8],
    generation: Generation,
    kind: EntityKind,
) -> Result<Entity, Report<CodecError>> {
    Ok(match kind {
        EntityKind::Instance(category) => {
            let layout = layouts::instance_layout(generation, category);
            Entity::Instance {
                category,
                instance: layouts::decode_instance(bytes, layout).map_err(CodecError::from)?,
            }
        }
        EntityKind::ClassHeader => {
            Entity::ClassHeader(class_header::decode_class_header(bytes, generation)?)
        }
        EntityKind::Model => Entity::Model(model::decode_model(bytes, generation)?.0),
        EntityKind::Texture => Entity::Texture(texture::decode_texture(bytes)?.0),
        EntityKind::Occlusion => Entity::Occlusion(occlusion::decode_occlusion(bytes)?),
        EntityKind::Path => Entity::Path(path::decode_path(bytes)?.0),
        EntityKind::ParamBlock => Entity::ParamBlock(ParamBlock::new(bytes.to_vec())),
    })
}

/// Encode `entity` in `generation`'s layout.
pub fn encode(entity: &Entity, generation: Generation) -> Result<Vec<u8>, Report<CodecError>> {
    Ok(match entity {
        Entity::Instance { category, instance } => {
            layouts::encode_instance(instance, layouts::instance_layout(generation, *category))
        }
        Entity::ClassHeader(header) => class_header::encode_class_header(header, generation)?,
        Entity::Model(m) => model::encode_model(m, generation)?,
        Entity::Texture(t) => texture::encode_texture(t),
        Entity::Occlusion(table) => occlusion::encode_occlusion(table),
        Entity::Path(p) => path::encode_path(p)?,
        Entity::ParamBlock(block) => block.data.clone(),
    })
}
