//! Declaration binding over compilation snapshots

pub mod model;

pub use model::{
    DocumentSnapshot, SemanticModel, SyncMode, TypeHandle, UDON_SHARP_BEHAVIOUR,
    UDON_SHARP_BEHAVIOUR_METHODS, WELL_KNOWN_TYPES,
};
