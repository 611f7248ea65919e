use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::Event;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,
    pub created_by: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event_interest::Entity")]
    EventInterest,
}

impl Related<super::event_interest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventInterest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Event {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            location: model.location,
            start_time: model.start_time,
            end_time: model.end_time,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<Event> for ActiveModel {
    fn from(event: Event) -> Self {
        ActiveModel {
            id: Set(event.id),
            title: Set(event.title),
            description: Set(event.description),
            location: Set(event.location),
            start_time: Set(event.start_time),
            end_time: Set(event.end_time),
            created_by: Set(event.created_by),
            created_at: Set(event.created_at),
            updated_at: Set(event.updated_at),
        }
    }
}
