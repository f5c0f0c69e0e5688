//! pulse-state: durable per-target status for the Pulse monitor.
//!
//! Each target owns one value in an external key-value store: the literal
//! string `Unknown`, `Running` or `Stopping`. Two backends implement the
//! [`StatusStore`] seam:
//!
//! - [`RedbStore`]: embedded [redb](https://docs.rs/redb) database, on disk
//!   or in memory.
//! - [`AppConfigStore`]: a remote configuration service reached over HTTPS
//!   with HMAC-signed requests.
//!
//! The [`StatusGateway`] sits on top and applies the bootstrap rule: reading
//! an absent key writes `Unknown` and reports `Unknown`.

pub mod appconfig;
pub mod error;
pub mod gateway;
pub mod redb_store;
pub mod status;
pub mod store;

pub use appconfig::{AppConfigStore, ConnectionString};
pub use error::{StateError, StateResult};
pub use gateway::StatusGateway;
pub use redb_store::RedbStore;
pub use status::PersistedStatus;
pub use store::{StatusStore, open_store};
