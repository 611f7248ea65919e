use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EventError, EventResult};
use crate::etag;
use crate::models::{
    CreateEvent, Event, EventFilter, EventInterest, PatchEvent, ReplaceEvent, Task, TaskStatus,
};

/// Persistence for events and their interest associations.
///
/// Writes that take an `if_match` tag compare it with the stored state and
/// apply the change atomically, failing with [`EventError::EtagMismatch`]
/// when another writer got there first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Matching events ordered by `(start_time, id)`, paged, plus the total match count
    async fn list(&self, filter: EventFilter) -> EventResult<(Vec<Event>, u64)>;

    async fn get_by_id(&self, id: Uuid) -> EventResult<Option<Event>>;

    async fn create(&self, created_by: String, input: CreateEvent) -> EventResult<Event>;

    async fn replace(&self, id: Uuid, input: ReplaceEvent, if_match: String)
    -> EventResult<Event>;

    async fn patch(&self, id: Uuid, input: PatchEvent, if_match: String) -> EventResult<Event>;

    /// Removes the event together with its interest associations
    async fn delete(&self, id: Uuid, if_match: String) -> EventResult<()>;

    async fn list_interests(&self, event_id: Uuid) -> EventResult<Vec<EventInterest>>;

    /// Idempotent; the flag is `true` only when the association is new
    async fn add_interest(
        &self,
        event_id: Uuid,
        interest_id: Uuid,
    ) -> EventResult<(EventInterest, bool)>;

    async fn remove_interest(&self, event_id: Uuid, interest_id: Uuid) -> EventResult<()>;
}

/// Persistence for asynchronous-create status records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// New `pending` task
    async fn create(&self) -> EventResult<Task>;

    async fn get(&self, id: Uuid) -> EventResult<Option<Task>>;

    /// Move along `pending -> processing -> completed | failed`
    async fn transition(
        &self,
        id: Uuid,
        to: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> EventResult<Task>;
}

pub(crate) fn check_etag(event: &Event, if_match: &str) -> EventResult<()> {
    if etag::matches(event, if_match) {
        Ok(())
    } else {
        Err(EventError::EtagMismatch(event.id))
    }
}

#[derive(Debug, Default)]
struct Store {
    events: HashMap<Uuid, Event>,
    interests: HashMap<Uuid, BTreeMap<Uuid, EventInterest>>,
}

/// In-memory implementation of [`EventRepository`] (for development/testing).
///
/// Events and associations share one lock, so tag checks and cascading
/// deletes are atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn list(&self, filter: EventFilter) -> EventResult<(Vec<Event>, u64)> {
        let store = self.store.read().await;

        let mut matched: Vec<&Event> = store
            .events
            .values()
            .filter(|e| filter.matches(e))
            .filter(|e| match filter.interest_id {
                Some(interest_id) => store
                    .interests
                    .get(&e.id)
                    .is_some_and(|set| set.contains_key(&interest_id)),
                None => true,
            })
            .collect();

        matched.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(usize::try_from(filter.skip).unwrap_or(usize::MAX))
            .take(filter.limit as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn get_by_id(&self, id: Uuid) -> EventResult<Option<Event>> {
        let store = self.store.read().await;
        Ok(store.events.get(&id).cloned())
    }

    async fn create(&self, created_by: String, input: CreateEvent) -> EventResult<Event> {
        let event = Event::new(created_by, input);
        let mut store = self.store.write().await;
        store.events.insert(event.id, event.clone());

        tracing::info!(event_id = %event.id, "Created event");
        Ok(event)
    }

    async fn replace(
        &self,
        id: Uuid,
        input: ReplaceEvent,
        if_match: String,
    ) -> EventResult<Event> {
        let mut store = self.store.write().await;
        let event = store.events.get_mut(&id).ok_or(EventError::NotFound(id))?;
        check_etag(event, &if_match)?;

        event.apply_replace(input)?;

        tracing::info!(event_id = %id, "Replaced event");
        Ok(event.clone())
    }

    async fn patch(&self, id: Uuid, input: PatchEvent, if_match: String) -> EventResult<Event> {
        let mut store = self.store.write().await;
        let event = store.events.get_mut(&id).ok_or(EventError::NotFound(id))?;
        check_etag(event, &if_match)?;

        event.apply_patch(input)?;

        tracing::info!(event_id = %id, "Patched event");
        Ok(event.clone())
    }

    async fn delete(&self, id: Uuid, if_match: String) -> EventResult<()> {
        let mut store = self.store.write().await;
        let event = store.events.get(&id).ok_or(EventError::NotFound(id))?;
        check_etag(event, &if_match)?;

        store.events.remove(&id);
        store.interests.remove(&id);

        tracing::info!(event_id = %id, "Deleted event");
        Ok(())
    }

    async fn list_interests(&self, event_id: Uuid) -> EventResult<Vec<EventInterest>> {
        let store = self.store.read().await;
        if !store.events.contains_key(&event_id) {
            return Err(EventError::NotFound(event_id));
        }

        Ok(store
            .interests
            .get(&event_id)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_interest(
        &self,
        event_id: Uuid,
        interest_id: Uuid,
    ) -> EventResult<(EventInterest, bool)> {
        let mut store = self.store.write().await;
        if !store.events.contains_key(&event_id) {
            return Err(EventError::NotFound(event_id));
        }

        let set = store.interests.entry(event_id).or_default();
        if let Some(existing) = set.get(&interest_id) {
            return Ok((existing.clone(), false));
        }

        let interest = EventInterest::new(event_id, interest_id);
        set.insert(interest_id, interest.clone());

        tracing::info!(event_id = %event_id, interest_id = %interest_id, "Added interest");
        Ok((interest, true))
    }

    async fn remove_interest(&self, event_id: Uuid, interest_id: Uuid) -> EventResult<()> {
        let mut store = self.store.write().await;
        if !store.events.contains_key(&event_id) {
            return Err(EventError::NotFound(event_id));
        }

        store
            .interests
            .get_mut(&event_id)
            .and_then(|set| set.remove(&interest_id))
            .ok_or(EventError::InterestNotFound {
                event_id,
                interest_id,
            })?;

        tracing::info!(event_id = %event_id, interest_id = %interest_id, "Removed interest");
        Ok(())
    }
}

/// In-memory implementation of [`TaskRepository`] (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self) -> EventResult<Task> {
        let task = Task::new();
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get(&self, id: Uuid) -> EventResult<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        to: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> EventResult<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(EventError::TaskNotFound(id))?;
        task.transition(to, result, error)?;
        Ok(task.clone())
    }
}
