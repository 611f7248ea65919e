use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::{Task, TaskStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub status: TaskStatus,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub result: Option<Json>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Task {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            status: model.status,
            result: model.result,
            error: model.error,
            created_at: model.created_at,
            updated_at: model.updated_at,
            completed_at: model.completed_at,
        }
    }
}

impl From<Task> for ActiveModel {
    fn from(task: Task) -> Self {
        ActiveModel {
            id: Set(task.id),
            status: Set(task.status),
            result: Set(task.result),
            error: Set(task.error),
            created_at: Set(task.created_at),
            updated_at: Set(task.updated_at),
            completed_at: Set(task.completed_at),
        }
    }
}
