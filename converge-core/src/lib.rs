//! converge core library: domain types, resource schemas, store traits,
//! shared timeout budget, settings, errors.
//!
//! - [`types`]: newtypes, references, remote objects, event records
//! - [`schema`]: typed field-descriptor tables and desired-state types
//! - [`catalog`]: the static schemas of every managed resource family
//! - [`store`]: [`RemoteStore`] and [`ActionLog`] collaborator traits
//! - [`budget`]: the [`Budget`] every wait draws from
//! - [`config`]: [`Settings`] load / save
//! - [`error`]: [`ConvergeError`], [`StoreError`], [`ConfigError`]

pub mod budget;
pub mod catalog;
pub mod config;
pub mod error;
pub mod schema;
pub mod store;
pub mod types;
pub mod value;

pub use budget::Budget;
pub use config::Settings;
pub use error::{ConfigError, ConvergeError, StoreError};
pub use schema::{
    DesiredAttributeSet, FieldKind, FieldSpec, MutabilityPolicy, ResourceSchema, SlotPolicy,
    SubResourceDescriptor,
};
pub use store::{ActionLog, RecordedActions, RemoteStore, TracingActionLog};
pub use types::{
    Attributes, Collection, EntityId, EventAction, EventFilter, EventId, EventRecord,
    EventStatus, FieldChange, OperationKind, RemoteObject, ResourceKind, ResourceRef,
};
