//! The Data Store: per-organization state held entirely
//! in memory behind per-topic locks. A relational engine satisfies the same
//! contract in a production deployment; only
//! this in-memory reference implementation is built here.

pub mod locks;
pub mod org_state;
pub mod store;

pub use locks::TopicGuard;
pub use org_state::OrgState;
pub use store::Store;
