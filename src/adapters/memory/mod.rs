//! In-memory store and departure tracker for tests.

mod departure_tracker;
mod store;

pub use departure_tracker::InMemoryDepartureTracker;
pub use store::InMemoryStore;
