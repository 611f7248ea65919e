//! Shared test utilities for the domain crates
//!
//! - `TestDatabase`: PostgreSQL container with the schema applied (feature: "postgres")
//! - `TestDataBuilder`: deterministic test data (always available)
//! - `assertions`: assertion helpers (always available)
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let uid = builder.uid();
//!     let title = builder.name("event", "main");
//! }
//! ```

use uuid::Uuid;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

/// Deterministic test data seeded from the test name, so tests sharing a
/// database never collide and failures reproduce.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_create_event");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Caller identity as the gateway would assert it in `x-firebase-uid`
    pub fn uid(&self) -> String {
        format!("test-uid-{:016x}", self.seed)
    }

    /// Interest id `n` for this test
    pub fn interest_id(&self, n: u64) -> Uuid {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.seed.to_le_bytes());
        bytes[8..].copy_from_slice(&n.to_le_bytes());
        Uuid::from_bytes(bytes)
    }

    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("my_test");
    /// let title = builder.name("event", "main");
    /// assert!(title.starts_with("test-event-"));
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

pub mod assertions {
    use uuid::Uuid;

    pub fn assert_uuid_eq(actual: Uuid, expected: Uuid, context: &str) {
        assert_eq!(
            actual, expected,
            "{}: expected UUID {}, got {}",
            context, expected, actual
        );
    }

    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let builder1 = TestDataBuilder::new(42);
        let builder2 = TestDataBuilder::new(42);

        assert_eq!(builder1.uid(), builder2.uid());
        assert_eq!(builder1.interest_id(1), builder2.interest_id(1));
        assert_eq!(builder1.name("event", "a"), builder2.name("event", "a"));
    }

    #[test]
    fn test_data_builder_different_names() {
        let builder1 = TestDataBuilder::from_test_name("test1");
        let builder2 = TestDataBuilder::from_test_name("test2");

        assert_ne!(builder1.uid(), builder2.uid());
        assert_ne!(builder1.interest_id(1), builder2.interest_id(1));
    }

    #[test]
    fn test_interest_ids_distinct_within_test() {
        let builder = TestDataBuilder::from_test_name("interests");
        assert_ne!(builder.interest_id(1), builder.interest_id(2));
    }
}
