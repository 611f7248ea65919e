use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::EventInterest;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "event_interests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub interest_id: Uuid,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id",
        on_delete = "Cascade"
    )]
    Event,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for EventInterest {
    fn from(model: Model) -> Self {
        Self {
            event_id: model.event_id,
            interest_id: model.interest_id,
            created_at: model.created_at,
        }
    }
}

impl From<EventInterest> for ActiveModel {
    fn from(interest: EventInterest) -> Self {
        ActiveModel {
            event_id: Set(interest.event_id),
            interest_id: Set(interest.interest_id),
            created_at: Set(interest.created_at),
        }
    }
}
