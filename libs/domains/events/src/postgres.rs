use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, Func, OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    entity::{event, event_interest, task},
    error::{EventError, EventResult},
    models::{
        CreateEvent, Event, EventFilter, EventInterest, MAX_SKIP, PatchEvent, ReplaceEvent, Task,
        TaskStatus,
    },
    repository::{EventRepository, TaskRepository, check_etag},
};

/// Escape LIKE metacharacters and wrap in `%…%`, lowercased.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn filtered(filter: &EventFilter) -> Select<event::Entity> {
    let mut query = event::Entity::find();

    if let Some(interest_id) = filter.interest_id {
        query = query.filter(
            event::Column::Id.in_subquery(
                Query::select()
                    .column(event_interest::Column::EventId)
                    .from(event_interest::Entity)
                    .and_where(event_interest::Column::InterestId.eq(interest_id))
                    .to_owned(),
            ),
        );
    }

    if let Some(created_by) = &filter.created_by {
        query = query.filter(event::Column::CreatedBy.eq(created_by.as_str()));
    }

    if let Some(after) = filter.starts_after {
        query = query.filter(event::Column::StartTime.gte(after));
    }

    if let Some(before) = filter.ends_before {
        query = query.filter(event::Column::EndTime.lte(before));
    }

    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        let lower_like = |column: event::Column| {
            Expr::expr(Func::lower(Expr::col((event::Entity, column)))).like(pattern.as_str())
        };
        query = query.filter(
            Condition::any()
                .add(lower_like(event::Column::Title))
                .add(lower_like(event::Column::Description))
                .add(lower_like(event::Column::Location)),
        );
    }

    query
}

/// sea-orm backed [`EventRepository`].
///
/// Tag-checked writes load the row `FOR UPDATE` inside a transaction, so the
/// comparison and the write are atomic against concurrent writers.
#[derive(Clone)]
pub struct PgEventRepository {
    db: DatabaseConnection,
}

impl PgEventRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn list(&self, filter: EventFilter) -> EventResult<(Vec<Event>, u64)> {
        let query = filtered(&filter);

        let total = query.clone().count(&self.db).await?;
        let models = query
            .order_by_asc(event::Column::StartTime)
            .order_by_asc(event::Column::Id)
            .offset(std::cmp::Ord::min(filter.skip, MAX_SKIP))
            .limit(filter.limit)
            .all(&self.db)
            .await?;

        Ok((models.into_iter().map(Event::from).collect(), total))
    }

    async fn get_by_id(&self, id: Uuid) -> EventResult<Option<Event>> {
        let model = event::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Event::from))
    }

    async fn create(&self, created_by: String, input: CreateEvent) -> EventResult<Event> {
        let active_model: event::ActiveModel = Event::new(created_by, input).into();
        let model = active_model.insert(&self.db).await?;

        tracing::info!(event_id = %model.id, "Created event");
        Ok(model.into())
    }

    async fn replace(
        &self,
        id: Uuid,
        input: ReplaceEvent,
        if_match: String,
    ) -> EventResult<Event> {
        let txn = self.db.begin().await?;

        let mut current: Event = event::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(EventError::NotFound(id))?
            .into();
        check_etag(&current, &if_match)?;

        current.apply_replace(input)?;
        let active_model: event::ActiveModel = current.into();
        let model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(event_id = %id, "Replaced event");
        Ok(model.into())
    }

    async fn patch(&self, id: Uuid, input: PatchEvent, if_match: String) -> EventResult<Event> {
        let txn = self.db.begin().await?;

        let mut current: Event = event::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(EventError::NotFound(id))?
            .into();
        check_etag(&current, &if_match)?;

        current.apply_patch(input)?;
        let active_model: event::ActiveModel = current.into();
        let model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(event_id = %id, "Patched event");
        Ok(model.into())
    }

    async fn delete(&self, id: Uuid, if_match: String) -> EventResult<()> {
        let txn = self.db.begin().await?;

        let current: Event = event::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(EventError::NotFound(id))?
            .into();
        check_etag(&current, &if_match)?;

        let interests = event_interest::Entity::delete_many()
            .filter(event_interest::Column::EventId.eq(id))
            .exec(&txn)
            .await?;
        event::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(
            event_id = %id,
            interests_removed = interests.rows_affected,
            "Deleted event"
        );
        Ok(())
    }

    async fn list_interests(&self, event_id: Uuid) -> EventResult<Vec<EventInterest>> {
        if event::Entity::find_by_id(event_id)
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(EventError::NotFound(event_id));
        }

        let models = event_interest::Entity::find()
            .filter(event_interest::Column::EventId.eq(event_id))
            .order_by_asc(event_interest::Column::InterestId)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(EventInterest::from).collect())
    }

    async fn add_interest(
        &self,
        event_id: Uuid,
        interest_id: Uuid,
    ) -> EventResult<(EventInterest, bool)> {
        let txn = self.db.begin().await?;

        // Shared lock keeps a concurrent delete from orphaning the new row
        if event::Entity::find_by_id(event_id)
            .lock_shared()
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(EventError::NotFound(event_id));
        }

        let active_model: event_interest::ActiveModel =
            EventInterest::new(event_id, interest_id).into();
        let inserted = event_interest::Entity::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    event_interest::Column::EventId,
                    event_interest::Column::InterestId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        let model = event_interest::Entity::find_by_id((event_id, interest_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                EventError::Internal(format!(
                    "interest {interest_id} missing on event {event_id} after insert"
                ))
            })?;
        txn.commit().await?;

        let created = inserted > 0;
        if created {
            tracing::info!(event_id = %event_id, interest_id = %interest_id, "Added interest");
        }
        Ok((model.into(), created))
    }

    async fn remove_interest(&self, event_id: Uuid, interest_id: Uuid) -> EventResult<()> {
        if event::Entity::find_by_id(event_id)
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(EventError::NotFound(event_id));
        }

        let result = event_interest::Entity::delete_by_id((event_id, interest_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(EventError::InterestNotFound {
                event_id,
                interest_id,
            });
        }

        tracing::info!(event_id = %event_id, interest_id = %interest_id, "Removed interest");
        Ok(())
    }
}

/// sea-orm backed [`TaskRepository`]
#[derive(Clone)]
pub struct PgTaskRepository {
    db: DatabaseConnection,
}

impl PgTaskRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create(&self) -> EventResult<Task> {
        let active_model: task::ActiveModel = Task::new().into();
        let model = active_model.insert(&self.db).await?;
        Ok(model.into())
    }

    async fn get(&self, id: Uuid) -> EventResult<Option<Task>> {
        let model = task::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Task::from))
    }

    async fn transition(
        &self,
        id: Uuid,
        to: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> EventResult<Task> {
        let txn = self.db.begin().await?;

        let mut current: Task = task::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(EventError::TaskNotFound(id))?
            .into();
        current.transition(to, result, error)?;

        let active_model: task::ActiveModel = current.into();
        let model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::debug!(task_id = %id, status = %to, "Task transitioned");
        Ok(model.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait};

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("Rust"), "%rust%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_filtered_query_shape() {
        let filter = EventFilter {
            interest_id: Some(Uuid::nil()),
            created_by: Some("uid-1".into()),
            search: Some("meetup".into()),
            ..Default::default()
        };

        let sql = filtered(&filter)
            .build(DatabaseBackend::Postgres)
            .to_string();

        assert!(sql.contains("IN (SELECT"));
        assert!(sql.contains("event_interests"));
        assert!(sql.contains("'uid-1'"));
        assert!(sql.contains("LOWER"));
        assert!(sql.contains("'%meetup%'"));
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = EventFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        let sql = filtered(&filter)
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(!sql.contains("LIKE"));
    }

    #[tokio::test]
    async fn test_get_by_id_maps_model() {
        let now = crate::models::now();
        let model = event::Model {
            id: Uuid::now_v7(),
            title: "Mocked".into(),
            description: None,
            location: None,
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            created_by: "uid-1".into(),
            created_at: now,
            updated_at: now,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model.clone()]])
            .into_connection();

        let repo = PgEventRepository::new(db);
        let event = repo.get_by_id(model.id).await.unwrap().unwrap();
        assert_eq!(event.title, "Mocked");
        assert_eq!(event.id, model.id);
    }
}
