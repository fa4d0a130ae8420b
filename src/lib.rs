//! Metadata catalog query gate.
//!
//! Compiles client filters over catalog record types into store predicates,
//! enforcing field-level permissions derived from each type's inheritance
//! chain and the cross-field invariants configured for writes.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod gate;
pub mod permission;
pub mod query;
pub mod schema;
pub mod store;
pub mod types;
pub mod value_groups;

pub use config::{ConfigError, GateConfig, QueryLimits};
pub use error::{ErrorDetail, ErrorMap, GateError, Result, ValidationError};
pub use gate::Gate;
pub use permission::{Action, Caller, PermissionHolder};
pub use query::{MalformedQuery, Query, QueryNode, Value};
pub use schema::{FieldDef, FieldKind, SchemaArena, SchemaProvider};
pub use store::{Filter, MemoryStore, Record, RecordStore};
pub use types::{TypeId, YearMonth};
