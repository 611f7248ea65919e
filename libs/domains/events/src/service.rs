use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::error::{EventError, EventResult};
use crate::models::{
    CreateEvent, Event, EventFilter, EventInterest, Page, PatchEvent, ReplaceEvent, Task,
    TaskStatus,
};
use crate::publisher::{EventPublisher, spawn_publish};
use crate::repository::{EventRepository, TaskRepository};

/// Event business logic over an event store, a task store and an optional
/// notification publisher.
pub struct EventService<R: EventRepository, T: TaskRepository> {
    events: Arc<R>,
    tasks: Arc<T>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl<R: EventRepository, T: TaskRepository> Clone for EventService<R, T> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            tasks: Arc::clone(&self.tasks),
            publisher: self.publisher.clone(),
        }
    }
}

impl<R, T> EventService<R, T>
where
    R: EventRepository + 'static,
    T: TaskRepository + 'static,
{
    pub fn new(events: R, tasks: T) -> Self {
        Self {
            events: Arc::new(events),
            tasks: Arc::new(tasks),
            publisher: None,
        }
    }

    /// Publish `event-created` notifications after each create
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    #[instrument(skip(self))]
    pub async fn list_events(&self, filter: EventFilter) -> EventResult<Page<Event>> {
        filter.validate()?;

        let skip = filter.skip;
        let limit = filter.limit;
        let (items, total) = self.events.list(filter).await?;

        Ok(Page {
            items,
            total,
            skip,
            limit,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_event(&self, id: Uuid) -> EventResult<Event> {
        self.events
            .get_by_id(id)
            .await?
            .ok_or(EventError::NotFound(id))
    }

    /// Persist the event, then publish without waiting on the broker.
    #[instrument(skip(self, input), fields(created_by = %created_by))]
    pub async fn create_event(&self, created_by: String, input: CreateEvent) -> EventResult<Event> {
        input.validate()?;
        self.persist(created_by, input).await
    }

    async fn persist(&self, created_by: String, input: CreateEvent) -> EventResult<Event> {
        let event = self.events.create(created_by, input).await?;

        if let Some(publisher) = &self.publisher {
            spawn_publish(Arc::clone(publisher), &event);
        }

        Ok(event)
    }

    /// Validate now, create in the background. Returns the `pending` task.
    #[instrument(skip(self, input), fields(created_by = %created_by))]
    pub async fn create_event_async(
        &self,
        created_by: String,
        input: CreateEvent,
    ) -> EventResult<Task> {
        input.validate()?;

        let task = self.tasks.create().await?;
        info!(task_id = %task.id, "Accepted asynchronous create");

        let service = self.clone();
        let task_id = task.id;
        tokio::spawn(async move {
            service.complete_create(task_id, created_by, input).await;
        });

        Ok(task)
    }

    async fn complete_create(&self, task_id: Uuid, created_by: String, input: CreateEvent) {
        if let Err(e) = self
            .tasks
            .transition(task_id, TaskStatus::Processing, None, None)
            .await
        {
            error!(task_id = %task_id, error = %e, "Failed to start task");
            return;
        }

        let outcome = match self.persist(created_by, input).await {
            Ok(event) => match serde_json::to_value(&event) {
                Ok(value) => {
                    self.tasks
                        .transition(task_id, TaskStatus::Completed, Some(value), None)
                        .await
                }
                Err(e) => {
                    self.tasks
                        .transition(task_id, TaskStatus::Failed, None, Some(e.to_string()))
                        .await
                }
            },
            Err(e) => {
                self.tasks
                    .transition(task_id, TaskStatus::Failed, None, Some(e.to_string()))
                    .await
            }
        };

        match outcome {
            Ok(task) => info!(task_id = %task_id, status = %task.status, "Task finished"),
            Err(e) => error!(task_id = %task_id, error = %e, "Failed to record task outcome"),
        }
    }

    #[instrument(skip(self, input, if_match))]
    pub async fn replace_event(
        &self,
        id: Uuid,
        input: ReplaceEvent,
        if_match: Option<String>,
    ) -> EventResult<Event> {
        input.validate()?;
        let if_match = if_match.ok_or(EventError::PreconditionRequired)?;
        self.events.replace(id, input, if_match).await
    }

    #[instrument(skip(self, input, if_match))]
    pub async fn patch_event(
        &self,
        id: Uuid,
        input: PatchEvent,
        if_match: Option<String>,
    ) -> EventResult<Event> {
        input.validate()?;
        let if_match = if_match.ok_or(EventError::PreconditionRequired)?;
        self.events.patch(id, input, if_match).await
    }

    #[instrument(skip(self, if_match))]
    pub async fn delete_event(&self, id: Uuid, if_match: Option<String>) -> EventResult<()> {
        let if_match = if_match.ok_or(EventError::PreconditionRequired)?;
        self.events.delete(id, if_match).await
    }

    #[instrument(skip(self))]
    pub async fn list_interests(&self, event_id: Uuid) -> EventResult<Vec<EventInterest>> {
        self.events.list_interests(event_id).await
    }

    /// Returns the association and whether it was newly created.
    #[instrument(skip(self))]
    pub async fn add_interest(
        &self,
        event_id: Uuid,
        interest_id: Uuid,
    ) -> EventResult<(EventInterest, bool)> {
        self.events.add_interest(event_id, interest_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_interest(&self, event_id: Uuid, interest_id: Uuid) -> EventResult<()> {
        self.events.remove_interest(event_id, interest_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_task(&self, id: Uuid) -> EventResult<Task> {
        self.tasks
            .get(id)
            .await?
            .ok_or(EventError::TaskNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::InMemoryEventPublisher;
    use crate::repository::{
        InMemoryEventRepository, InMemoryTaskRepository, MockEventRepository,
        MockTaskRepository,
    };
    use chrono::{Duration, Utc};
    use mockall::predicate::eq;
    use std::time::Duration as StdDuration;

    fn input() -> CreateEvent {
        let start = Utc::now() + Duration::days(1);
        CreateEvent {
            title: "Standup".into(),
            description: None,
            location: Some("Room 4".into()),
            start_time: start,
            end_time: start + Duration::minutes(15),
        }
    }

    fn in_memory() -> EventService<InMemoryEventRepository, InMemoryTaskRepository> {
        EventService::new(InMemoryEventRepository::new(), InMemoryTaskRepository::new())
    }

    async fn wait_for_terminal<R, T>(service: &EventService<R, T>, id: Uuid) -> Task
    where
        R: EventRepository + 'static,
        T: TaskRepository + 'static,
    {
        for _ in 0..100 {
            let task = service.get_task(id).await.unwrap();
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("task {id} never finished");
    }

    #[tokio::test]
    async fn test_get_event_not_found() {
        let mut events = MockEventRepository::new();
        let id = Uuid::now_v7();
        events
            .expect_get_by_id()
            .with(eq(id))
            .returning(|_| Ok(None));

        let service = EventService::new(events, MockTaskRepository::new());
        let result = service.get_event(id).await;

        assert!(matches!(result, Err(EventError::NotFound(got)) if got == id));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input_before_repository() {
        let mut events = MockEventRepository::new();
        events.expect_create().never();

        let service = EventService::new(events, MockTaskRepository::new());
        let mut bad = input();
        bad.end_time = bad.start_time - Duration::minutes(1);

        let result = service.create_event("uid-1".into(), bad).await;
        assert!(matches!(result, Err(EventError::Validation(_))));
    }

    #[tokio::test]
    async fn test_writes_require_if_match() {
        let mut events = MockEventRepository::new();
        events.expect_patch().never();
        events.expect_delete().never();

        let service = EventService::new(events, MockTaskRepository::new());
        let id = Uuid::now_v7();

        assert!(matches!(
            service.patch_event(id, PatchEvent::default(), None).await,
            Err(EventError::PreconditionRequired)
        ));
        assert!(matches!(
            service.delete_event(id, None).await,
            Err(EventError::PreconditionRequired)
        ));
    }

    #[tokio::test]
    async fn test_delete_forwards_if_match() {
        let mut events = MockEventRepository::new();
        let id = Uuid::now_v7();
        events
            .expect_delete()
            .with(eq(id), eq("\"abc\"".to_string()))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = EventService::new(events, MockTaskRepository::new());
        service
            .delete_event(id, Some("\"abc\"".into()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_events_rejects_out_of_range_limit() {
        let mut events = MockEventRepository::new();
        events.expect_list().never();

        let service = EventService::new(events, MockTaskRepository::new());
        let result = service
            .list_events(EventFilter {
                limit: 101,
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(EventError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_events_builds_page() {
        let mut events = MockEventRepository::new();
        events
            .expect_list()
            .returning(|_| Ok((vec![], 42)));

        let service = EventService::new(events, MockTaskRepository::new());
        let page = service
            .list_events(EventFilter {
                skip: 40,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.total, 42);
        assert_eq!(page.skip, 40);
        assert_eq!(page.limit, 10);
    }

    #[tokio::test]
    async fn test_create_publishes_notification() {
        let publisher = InMemoryEventPublisher::new();
        let service = in_memory().with_publisher(Arc::new(publisher.clone()));

        let event = service.create_event("uid-1".into(), input()).await.unwrap();

        for _ in 0..100 {
            if !publisher.messages().await.is_empty() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        let messages = publisher.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event_id, event.id);
        assert_eq!(messages[0].created_by, "uid-1");
    }

    #[tokio::test]
    async fn test_async_create_completes_task() {
        let service = in_memory();

        let task = service
            .create_event_async("uid-1".into(), input())
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let done = wait_for_terminal(&service, task.id).await;
        assert_eq!(done.status, TaskStatus::Completed);

        let event_id = done.event_id().unwrap();
        let event = service.get_event(event_id).await.unwrap();
        assert_eq!(event.title, "Standup");
    }

    #[tokio::test]
    async fn test_async_create_records_failure() {
        let mut events = MockEventRepository::new();
        events
            .expect_create()
            .returning(|_, _| Err(EventError::Internal("disk full".into())));

        let service = EventService::new(events, InMemoryTaskRepository::new());
        let task = service
            .create_event_async("uid-1".into(), input())
            .await
            .unwrap();

        let done = wait_for_terminal(&service, task.id).await;
        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.error.unwrap().contains("disk full"));
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_async_create_validates_synchronously() {
        let mut tasks = MockTaskRepository::new();
        tasks.expect_create().never();

        let service = EventService::new(MockEventRepository::new(), tasks);
        let mut bad = input();
        bad.title = String::new();

        assert!(matches!(
            service.create_event_async("uid-1".into(), bad).await,
            Err(EventError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_get_task_not_found() {
        let service = in_memory();
        assert!(matches!(
            service.get_task(Uuid::new_v4()).await,
            Err(EventError::TaskNotFound(_))
        ));
    }
}
