//! Typed metadata entities.
//!
//! Each category of metadata (biomaterials, files, protocols) is a closed enum
//! over its concrete schemas, so code that branches on the kind of an entity
//! does so with an exhaustive `match`.

mod entities;
mod parse;

pub use entities::{
    AgeRange, Biomaterial, BiomaterialCore, CellLine, CellSuspension, DonorOrganism, File,
    FileKind, Organoid, OtherBiomaterial, Process, Project, ProjectContact, ProjectPublication,
    Protocol, Sample, SpecimenFromOrganism,
};
pub use parse::{parse_entity, schema_name, MetadataEntity};
