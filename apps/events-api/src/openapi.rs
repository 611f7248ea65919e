//! OpenAPI documentation configuration

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Event Service",
        version = "0.1.0",
        description = "Scheduled events with optimistic concurrency and Dapr pub/sub notifications",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/events", api = domain_events::ApiDoc)
    ),
    tags(
        (name = "events", description = "Event management backed by PostgreSQL")
    )
)]
pub struct ApiDoc;
