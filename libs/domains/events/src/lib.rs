//! Events Domain
//!
//! Scheduled events stored in PostgreSQL, with optimistic concurrency via
//! entity tags and `event-created` notifications over Dapr pub/sub.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← /events routes, ETag / Location headers, links
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌───────────────┐
//! │   Service   │ ──► │   Publisher   │  ← Dapr pub/sub (best effort)
//! └──────┬──────┘     └───────────────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← trait + in-memory and sea-orm implementations
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Event, EventInterest, Task
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_events::{
//!     handlers, EventService, InMemoryEventRepository, InMemoryTaskRepository, LinkBuilder,
//! };
//!
//! let service = EventService::new(InMemoryEventRepository::new(), InMemoryTaskRepository::new());
//! let router = axum::Router::new().nest("/events", handlers::router(service, LinkBuilder::default()));
//! ```

pub mod entity;
pub mod error;
pub mod etag;
pub mod handlers;
pub mod links;
pub mod models;
pub mod postgres;
pub mod publisher;
pub mod repository;
pub mod service;

pub use error::{EventError, EventResult};
pub use handlers::{ApiDoc, EventResponse, InterestResponse, PageResponse, TaskResponse};
pub use links::{Link, LinkBuilder, Links};
pub use models::{
    AddInterest, CreateEvent, Event, EventFilter, EventInterest, Page, PatchEvent, ReplaceEvent,
    Task, TaskStatus,
};
pub use postgres::{PgEventRepository, PgTaskRepository};
pub use publisher::{
    DaprClient, DaprConfig, DaprEventPublisher, EventCreatedMessage, EventPublisher,
    InMemoryEventPublisher,
};
pub use repository::{
    EventRepository, InMemoryEventRepository, InMemoryTaskRepository, TaskRepository,
};
pub use service::EventService;
