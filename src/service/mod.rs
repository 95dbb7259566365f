//! State Service Module
//!
//! Per-user state keyed by namespace, cached in a [`BoundedTtlCache`] and
//! selectively persisted to a [`RemoteStore`].
//!
//! [`BoundedTtlCache`]: crate::cache::BoundedTtlCache
//! [`RemoteStore`]: crate::store::RemoteStore

mod keys;
mod policy;
mod state;

pub use keys::{Namespace, StateKey, MAX_USER_ID_LENGTH};
pub use policy::{PersistencePolicy, StateCategory};
pub use state::{StateDefaults, StateService};
