//! Custom extractors for Axum handlers.
//!
//! Every rejection renders as an [`ErrorResponse`](crate::errors::ErrorResponse).

pub mod if_match;
pub mod trusted_user;
pub mod uuid_path;
pub mod validated_json;
pub mod validated_query;

pub use if_match::{IfMatch, normalize_etag};
pub use trusted_user::{TRUSTED_USER_HEADER, TrustedUser};
pub use uuid_path::{UuidPath, UuidPathPair};
pub use validated_json::ValidatedJson;
pub use validated_query::ValidatedQuery;
