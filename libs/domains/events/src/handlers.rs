use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_helpers::{
    AuditEvent, AuditOutcome, IfMatch, TrustedUser, UuidPath, UuidPathPair, ValidatedJson,
    ValidatedQuery,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse, NotFoundResponse, PreconditionFailedResponse,
        UnauthorizedResponse,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi, ToSchema};
use validator::Validate;

use crate::error::EventResult;
use crate::etag;
use crate::links::{Link, LinkBuilder, Links};
use crate::models::{
    AddInterest, CreateEvent, Event, EventFilter, EventInterest, Page, PatchEvent, ReplaceEvent,
    Task, TaskStatus,
};
use crate::repository::{EventRepository, TaskRepository};
use crate::service::EventService;

const TAG: &str = "events";

/// OpenAPI documentation for the Events API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_events,
        create_event,
        get_event,
        replace_event,
        patch_event,
        delete_event,
        list_interests,
        add_interest,
        remove_interest,
        get_task,
    ),
    components(
        schemas(
            Event,
            EventResponse,
            PageResponse,
            TaskResponse,
            InterestResponse,
            CreateEvent,
            ReplaceEvent,
            PatchEvent,
            AddInterest,
            Task,
            TaskStatus,
            EventInterest,
            Link,
        ),
        responses(
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            UnauthorizedResponse,
            NotFoundResponse,
            ConflictResponse,
            PreconditionFailedResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = TAG, description = "Event management with optimistic concurrency and pub/sub notifications")
    )
)]
pub struct ApiDoc;

/// A single event with its entity tag and links
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    #[serde(flatten)]
    pub event: Event,
    /// Same value as the `ETag` response header
    pub etag: String,
    pub links: Links,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PageResponse {
    pub items: Vec<EventResponse>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
    pub links: Links,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,
    pub links: Links,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InterestResponse {
    #[serde(flatten)]
    pub interest: EventInterest,
    pub links: Links,
}

/// Query options for `POST /events`
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreateOptions {
    /// Create in the background and return a task
    #[serde(rename = "async", default)]
    pub run_async: bool,
}

/// Shared handler state
pub struct EventsState<R: EventRepository, T: TaskRepository> {
    pub service: EventService<R, T>,
    pub links: LinkBuilder,
}

impl<R: EventRepository + 'static, T: TaskRepository + 'static> EventsState<R, T> {
    fn event_response(&self, event: Event) -> EventResponse {
        EventResponse {
            etag: etag::header_value(&event),
            links: self.links.event(event.id),
            event,
        }
    }

    fn page_response(&self, filter: &EventFilter, page: Page<Event>) -> PageResponse {
        PageResponse {
            links: self.links.page(filter, page.total),
            items: page
                .items
                .into_iter()
                .map(|e| self.event_response(e))
                .collect(),
            total: page.total,
            skip: page.skip,
            limit: page.limit,
        }
    }

    fn task_response(&self, task: Task) -> TaskResponse {
        TaskResponse {
            links: self.links.task(&task),
            task,
        }
    }

    fn interest_response(&self, interest: EventInterest) -> InterestResponse {
        InterestResponse {
            links: self.links.interest(&interest),
            interest,
        }
    }

    /// `200` with `ETag`, the shape of every single-event read or write
    fn event_ok(&self, event: Event) -> Response {
        let body = self.event_response(event);
        (
            StatusCode::OK,
            [(header::ETAG, body.etag.clone())],
            Json(body),
        )
            .into_response()
    }
}

/// `Prefer: respond-async`, in any of possibly several comma-separated preferences
fn prefers_async(headers: &HeaderMap) -> bool {
    headers
        .get_all("prefer")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|pref| pref.trim().eq_ignore_ascii_case("respond-async"))
}

/// Events router, to be nested at `/events`.
///
/// Every route requires the `x-firebase-uid` identity header.
pub fn router<R, T>(service: EventService<R, T>, links: LinkBuilder) -> Router
where
    R: EventRepository + 'static,
    T: TaskRepository + 'static,
{
    let state = Arc::new(EventsState { service, links });

    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/tasks/{task_id}", get(get_task))
        .route(
            "/{id}",
            get(get_event)
                .put(replace_event)
                .patch(patch_event)
                .delete(delete_event),
        )
        .route("/{id}/interests", get(list_interests).post(add_interest))
        .route(
            "/{id}/interests/{interest_id}",
            axum::routing::delete(remove_interest),
        )
        .with_state(state)
}

/// List events with filters and pagination
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        EventFilter
    ),
    responses(
        (status = 200, description = "One page of events, ordered by start time", body = PageResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_events<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(_uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    ValidatedQuery(filter): ValidatedQuery<EventFilter>,
) -> EventResult<Json<PageResponse>> {
    let page = state.service.list_events(filter.clone()).await?;
    Ok(Json(state.page_response(&filter, page)))
}

/// Create an event, synchronously or as a background task
///
/// `?async=true` or `Prefer: respond-async` returns `202` with a task to poll.
#[utoipa::path(
    post,
    path = "",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity; recorded as created_by"),
        CreateOptions
    ),
    request_body = CreateEvent,
    responses(
        (status = 201, description = "Event created", body = EventResponse,
            headers(("Location" = String), ("ETag" = String))),
        (status = 202, description = "Creation accepted", body = TaskResponse,
            headers(("Location" = String))),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_event<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    headers: HeaderMap,
    ValidatedQuery(options): ValidatedQuery<CreateOptions>,
    ValidatedJson(input): ValidatedJson<CreateEvent>,
) -> EventResult<Response> {
    if options.run_async || prefers_async(&headers) {
        let task = state.service.create_event_async(uid, input).await?;
        let location = state.links.task_location(task.id);

        return Ok((
            StatusCode::ACCEPTED,
            [(header::LOCATION, location)],
            Json(state.task_response(task)),
        )
            .into_response());
    }

    let event = state.service.create_event(uid.clone(), input).await?;

    AuditEvent::new(
        Some(uid),
        "event.create",
        Some(format!("event:{}", event.id)),
        AuditOutcome::Success,
    )
    .with_request_headers(&headers)
    .with_details(json!({
        "title": event.title,
        "start_time": event.start_time,
        "end_time": event.end_time,
    }))
    .log();

    let location = state.links.event_location(event.id);
    let body = state.event_response(event);
    Ok((
        StatusCode::CREATED,
        [
            (header::LOCATION, location),
            (header::ETAG, body.etag.clone()),
        ],
        Json(body),
    )
        .into_response())
}

/// Get an event by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        ("id" = Uuid, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Event found", body = EventResponse, headers(("ETag" = String))),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_event<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(_uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    UuidPath(id): UuidPath,
) -> EventResult<Response> {
    let event = state.service.get_event(id).await?;
    Ok(state.event_ok(event))
}

/// Replace every mutable field of an event
#[utoipa::path(
    put,
    path = "/{id}",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        ("If-Match" = String, Header, description = "ETag from the last read"),
        ("id" = Uuid, Path, description = "Event ID")
    ),
    request_body = ReplaceEvent,
    responses(
        (status = 200, description = "Event replaced", body = EventResponse, headers(("ETag" = String))),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 412, response = PreconditionFailedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn replace_event<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(_uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    UuidPath(id): UuidPath,
    IfMatch(if_match): IfMatch,
    ValidatedJson(input): ValidatedJson<ReplaceEvent>,
) -> EventResult<Response> {
    let event = state.service.replace_event(id, input, if_match).await?;
    Ok(state.event_ok(event))
}

/// Update only the supplied fields of an event
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        ("If-Match" = String, Header, description = "ETag from the last read"),
        ("id" = Uuid, Path, description = "Event ID")
    ),
    request_body = PatchEvent,
    responses(
        (status = 200, description = "Event updated", body = EventResponse, headers(("ETag" = String))),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 412, response = PreconditionFailedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn patch_event<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(_uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    UuidPath(id): UuidPath,
    IfMatch(if_match): IfMatch,
    ValidatedJson(input): ValidatedJson<PatchEvent>,
) -> EventResult<Response> {
    let event = state.service.patch_event(id, input, if_match).await?;
    Ok(state.event_ok(event))
}

/// Delete an event and its interest associations
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        ("If-Match" = String, Header, description = "ETag from the last read"),
        ("id" = Uuid, Path, description = "Event ID")
    ),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 412, response = PreconditionFailedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_event<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    IfMatch(if_match): IfMatch,
) -> EventResult<StatusCode> {
    state.service.delete_event(id, if_match).await?;

    AuditEvent::new(
        Some(uid),
        "event.delete",
        Some(format!("event:{}", id)),
        AuditOutcome::Success,
    )
    .with_request_headers(&headers)
    .log();

    Ok(StatusCode::NO_CONTENT)
}

/// List the interests associated with an event
#[utoipa::path(
    get,
    path = "/{id}/interests",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        ("id" = Uuid, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Associations of the event", body = Vec<InterestResponse>),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_interests<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(_uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    UuidPath(id): UuidPath,
) -> EventResult<Json<Vec<InterestResponse>>> {
    let interests = state.service.list_interests(id).await?;
    Ok(Json(
        interests
            .into_iter()
            .map(|i| state.interest_response(i))
            .collect(),
    ))
}

/// Associate an interest with an event (idempotent)
#[utoipa::path(
    post,
    path = "/{id}/interests",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        ("id" = Uuid, Path, description = "Event ID")
    ),
    request_body = AddInterest,
    responses(
        (status = 201, description = "Association created", body = InterestResponse),
        (status = 200, description = "Association already existed", body = InterestResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn add_interest<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(_uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<AddInterest>,
) -> EventResult<Response> {
    let (interest, created) = state.service.add_interest(id, input.interest_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(state.interest_response(interest))).into_response())
}

/// Remove an interest association
#[utoipa::path(
    delete,
    path = "/{id}/interests/{interest_id}",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        ("id" = Uuid, Path, description = "Event ID"),
        ("interest_id" = Uuid, Path, description = "Interest ID")
    ),
    responses(
        (status = 204, description = "Association removed"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn remove_interest<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(_uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    UuidPathPair(id, interest_id): UuidPathPair,
) -> EventResult<StatusCode> {
    state.service.remove_interest(id, interest_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Poll the status of an asynchronous create
#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    tag = TAG,
    params(
        ("x-firebase-uid" = String, Header, description = "Caller identity asserted by the gateway"),
        ("task_id" = Uuid, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task status", body = TaskResponse),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_task<R: EventRepository + 'static, T: TaskRepository + 'static>(
    TrustedUser(_uid): TrustedUser,
    State(state): State<Arc<EventsState<R, T>>>,
    UuidPath(task_id): UuidPath,
) -> EventResult<Json<TaskResponse>> {
    let task = state.service.get_task(task_id).await?;
    Ok(Json(state.task_response(task)))
}
