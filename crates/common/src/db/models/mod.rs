//! SeaORM entity models
//!
//! Database entities for PaperLineage

mod paper;
mod citation;

pub use paper::{
    Entity as PaperEntity,
    Model as PaperRow,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use citation::{
    Entity as CitationEntity,
    Model as CitationRow,
    ActiveModel as CitationActiveModel,
    Column as CitationColumn,
};
