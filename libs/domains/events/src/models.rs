use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{EventError, EventResult};

pub const TITLE_MAX: u64 = 255;
pub const DESCRIPTION_MAX: u64 = 10_000;
pub const LOCATION_MAX: u64 = 255;

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;
/// Largest offset PostgreSQL accepts (`bigint`)
pub const MAX_SKIP: u64 = i64::MAX as u64;

/// Current time at the precision PostgreSQL stores (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Compared and stored at microsecond precision, so a window that is
/// only valid in nanoseconds is rejected rather than collapsing on write.
fn validate_window(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if end_time.trunc_subsecs(6) <= start_time.trunc_subsecs(6) {
        let mut err = ValidationError::new("time_window");
        err.message = Some("end_time must be after start_time".into());
        return Err(err);
    }
    Ok(())
}

fn validate_create_window(input: &CreateEvent) -> Result<(), ValidationError> {
    validate_window(input.start_time, input.end_time)
}

fn validate_replace_window(input: &ReplaceEvent) -> Result<(), ValidationError> {
    validate_window(input.start_time, input.end_time)
}

fn validate_patch(input: &PatchEvent) -> Result<(), ValidationError> {
    let too_long = |value: &Option<Option<String>>, max: u64| {
        matches!(value, Some(Some(s)) if s.chars().count() as u64 > max)
    };

    if too_long(&input.description, DESCRIPTION_MAX) {
        let mut err = ValidationError::new("length");
        err.message = Some(format!("description exceeds {} characters", DESCRIPTION_MAX).into());
        return Err(err);
    }
    if too_long(&input.location, LOCATION_MAX) {
        let mut err = ValidationError::new("length");
        err.message = Some(format!("location exceeds {} characters", LOCATION_MAX).into());
        return Err(err);
    }
    if let (Some(start), Some(end)) = (input.start_time, input.end_time) {
        validate_window(start, end)?;
    }
    Ok(())
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A scheduled event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Identity of the creator, as asserted by the gateway
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(created_by: impl Into<String>, input: CreateEvent) -> Self {
        let now = now();
        Self {
            id: Uuid::now_v7(),
            title: input.title,
            description: input.description,
            location: input.location,
            start_time: input.start_time.trunc_subsecs(6),
            end_time: input.end_time.trunc_subsecs(6),
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite every mutable field.
    pub fn apply_replace(&mut self, input: ReplaceEvent) -> EventResult<()> {
        validate_window(input.start_time, input.end_time)
            .map_err(|_| EventError::InvalidWindow)?;

        self.title = input.title;
        self.description = input.description;
        self.location = input.location;
        self.start_time = input.start_time.trunc_subsecs(6);
        self.end_time = input.end_time.trunc_subsecs(6);
        self.touch();
        Ok(())
    }

    /// Apply only the supplied fields, then re-check the merged time window.
    /// `self` is left untouched on error.
    pub fn apply_patch(&mut self, input: PatchEvent) -> EventResult<()> {
        let start_time = input.start_time.unwrap_or(self.start_time).trunc_subsecs(6);
        let end_time = input.end_time.unwrap_or(self.end_time).trunc_subsecs(6);
        validate_window(start_time, end_time).map_err(|_| EventError::InvalidWindow)?;

        if let Some(title) = input.title {
            self.title = title;
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(location) = input.location {
            self.location = location;
        }
        self.start_time = start_time;
        self.end_time = end_time;
        self.touch();
        Ok(())
    }

    /// Bump `updated_at`, strictly increasing even within one microsecond.
    fn touch(&mut self) {
        let now = now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }
}

/// Request body for `POST /events`
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_window"))]
pub struct CreateEvent {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Request body for `PUT /events/{id}`; every mutable field is replaced
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[validate(schema(function = "validate_replace_window"))]
pub struct ReplaceEvent {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Request body for `PATCH /events/{id}`
///
/// Absent fields are left alone. `null` clears `description` or `location`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_patch"))]
pub struct PatchEvent {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

/// Query parameters for `GET /events`; all filters combine with AND
#[derive(Debug, Clone, PartialEq, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventFilter {
    /// Only events associated with this interest
    pub interest_id: Option<Uuid>,
    /// Exact creator match
    pub created_by: Option<String>,
    /// Case-insensitive substring of title, description or location
    pub search: Option<String>,
    /// `start_time >= starts_after`
    pub starts_after: Option<DateTime<Utc>>,
    /// `end_time <= ends_before`
    pub ends_before: Option<DateTime<Utc>>,
    /// Rows to skip, at most `i64::MAX`
    #[serde(default)]
    #[validate(range(max = MAX_SKIP))]
    #[param(default = 0, minimum = 0)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    #[param(default = 10, minimum = 1, maximum = 100)]
    pub limit: u64,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            interest_id: None,
            created_by: None,
            search: None,
            starts_after: None,
            ends_before: None,
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl EventFilter {
    /// Trimmed search term, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// In-memory equivalent of the SQL filter, minus `interest_id`.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(created_by) = &self.created_by {
            if &event.created_by != created_by {
                return false;
            }
        }
        if let Some(after) = self.starts_after {
            if event.start_time < after.trunc_subsecs(6) {
                return false;
            }
        }
        if let Some(before) = self.ends_before {
            if event.end_time > before.trunc_subsecs(6) {
                return false;
            }
        }
        if let Some(term) = self.search_term() {
            let term = term.to_lowercase();
            let hit = |field: Option<&str>| {
                field.is_some_and(|f| f.to_lowercase().contains(&term))
            };
            if !(hit(Some(&event.title))
                || hit(event.description.as_deref())
                || hit(event.location.as_deref()))
            {
                return false;
            }
        }
        true
    }
}

/// One page of results plus the total number of matches
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// Association between an event and an interest (category, tag or topic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventInterest {
    pub event_id: Uuid,
    pub interest_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl EventInterest {
    pub fn new(event_id: Uuid, interest_id: Uuid) -> Self {
        Self {
            event_id,
            interest_id,
            created_at: now(),
        }
    }
}

/// Request body for `POST /events/{id}/interests`
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AddInterest {
    pub interest_id: Uuid,
}

/// Lifecycle of an asynchronous create
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// `pending -> processing -> completed | failed`
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

/// Status record for an asynchronous create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub status: TaskStatus,
    /// The created event once completed
    #[schema(value_type = Option<Object>)]
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new() -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn transition(
        &mut self,
        to: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> EventResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(EventError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        let now = now();
        self.status = to;
        self.result = result;
        self.error = error;
        self.updated_at = now;
        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Id of the created event, present once completed
    pub fn event_id(&self) -> Option<Uuid> {
        if self.status != TaskStatus::Completed {
            return None;
        }
        self.result
            .as_ref()?
            .get("id")?
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}
