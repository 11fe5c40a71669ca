//! Paper entity
//!
//! The `embedding vector` column is not mapped here; SeaORM has no pgvector
//! type, so the store reads and writes it with raw SQL.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    /// DOI or arXiv identifier
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    /// Author names as a JSON array
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: Json,

    #[sea_orm(column_type = "Text", nullable)]
    pub category: Option<String>,

    pub published_at: Option<Date>,

    /// Count reported by the upstream source
    pub citation_count: Option<i64>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::citation::Entity", on_delete = "Cascade")]
    CitationsFrom,
}

impl Related<super::citation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CitationsFrom.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
