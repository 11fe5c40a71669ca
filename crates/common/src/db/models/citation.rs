//! Citation entity for graph relationships
//!
//! `cited_id` carries no foreign key: scraped reference lists point at many
//! DOIs that were never ingested, and the graph builder decides what to do
//! with those.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "citations")]
pub struct Model {
    /// Paper that contains the citation
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub citing_id: String,

    /// Paper that is being cited
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub cited_id: String,

    /// Reference-extraction confidence in [0, 1]
    pub confidence: Option<f64>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::CitingId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    CitingPaper,
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CitingPaper.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
