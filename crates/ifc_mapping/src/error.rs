use thiserror::Error;

use crate::kind::EntityKind;

/// Errors raised while loading a mapping document. The store that attempted
/// the load keeps its previous rules.
#[derive(Debug, Error)]
pub enum MappingDocumentError {
    #[error("mapping document is not valid JSON: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid mapping document: {detail}")]
    InvalidDocument { detail: String },
    #[error("invalid mapping rule for {kind}: {detail}")]
    InvalidRule { kind: EntityKind, detail: String },
    #[error("mapping document declares unsupported entity kind `{kind}`")]
    UnsupportedKind { kind: String },
    #[error("userKey `{user_key}` is used by both {first} and {second}")]
    DuplicateUserKey {
        user_key: String,
        first: EntityKind,
        second: EntityKind,
    },
}
