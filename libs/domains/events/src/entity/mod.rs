//! SeaORM entities for the `events`, `event_interests` and `tasks` tables.

pub mod event;
pub mod event_interest;
pub mod task;
