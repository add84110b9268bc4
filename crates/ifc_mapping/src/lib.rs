#![forbid(unsafe_code)]
//! Mapping rules for turning user records into typed IFC building entities.
//!
//! A mapping document declares, per entity kind, which `userKey` selects the
//! rule and which external field feeds each internal parameter:
//!
//! ```json
//! {"mappingEntity": {
//!     "IfcBuildingStorey": {"userKey": "STOREY1", "userArgs": {"name": "n", "height": "h"}}
//! }}
//! ```
//!
//! [`MappingRuleStore`] validates and indexes the document, and
//! [`MappingEngine`] resolves each [`RawRecord`] to a [`MappableEntity`] or an
//! [`UnmappedRecord`] with the reason it was rejected.
//!
//! ```rust
//! use ifc_mapping::{MappingEngine, MappingRuleStore, RawRecord, TransformOutcome};
//!
//! let store = MappingRuleStore::from_document(
//!     r#"{"mappingEntity": {"IfcBuildingStorey":
//!         {"userKey": "STOREY1", "userArgs": {"name": "n", "height": "h"}}}}"#,
//! )?;
//! let records = RawRecord::parse_batch(r#"[{"userKey": "STOREY1", "userArgs": {"n": "L1", "h": 3.5}}]"#)?;
//! let outcome = MappingEngine::new().transform(&records[0], &store);
//! assert!(matches!(outcome, TransformOutcome::Mapped(_)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod engine;
mod entity;
mod error;
mod kind;
mod record;
mod session;
mod store;

pub use engine::{BatchOutcome, MappingEngine, TransformOutcome, UnmappedReason, UnmappedRecord};
pub use entity::{
    Beam, BuildingStorey, Column, EntityError, MappableEntity, Point2, WallStandardCase,
};
pub use error::MappingDocumentError;
pub use kind::{EntityKind, ParamType, RequiredParam, UnknownEntityKind};
pub use record::RawRecord;
pub use session::ConversionSession;
pub use store::{MappingRule, MappingRuleStore, MAPPING_ENTITY_KEY};
