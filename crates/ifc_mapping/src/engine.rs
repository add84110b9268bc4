use std::{collections::BTreeSet, fmt};

use serde::Serialize;
use serde_json::Map;
use tracing::debug;

use crate::{
    entity::MappableEntity, kind::EntityKind, record::RawRecord, store::MappingRuleStore,
};

/// Why a record was not turned into an entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum UnmappedReason {
    /// No rule has the record's `userKey`.
    RuleNotFound,
    /// External fields the rule reads but the record lacks.
    MissingKeys { missing: Vec<String> },
    /// First internal parameter whose value has the wrong shape.
    TypeValidationFailed { parameter: String },
    /// The engine does not build entities of this kind.
    UnsupportedKind { kind: EntityKind },
}

impl UnmappedReason {
    /// User-facing explanation.
    pub fn message(&self) -> &'static str {
        match self {
            Self::RuleNotFound => "Can't find matching rule.",
            Self::MissingKeys { .. } => "Some required keys are not included.",
            Self::TypeValidationFailed { .. } => "Type validation failed.",
            Self::UnsupportedKind { .. } => "Unsupported Item.",
        }
    }
}

impl fmt::Display for UnmappedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())?;
        match self {
            Self::RuleNotFound => Ok(()),
            Self::MissingKeys { missing } => write!(f, " (missing: {})", missing.join(", ")),
            Self::TypeValidationFailed { parameter } => write!(f, " (parameter: {parameter})"),
            Self::UnsupportedKind { kind } => write!(f, " ({kind})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnmappedRecord {
    pub original: RawRecord,
    pub reason: UnmappedReason,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransformOutcome {
    Mapped(MappableEntity),
    Unmapped(UnmappedRecord),
}

/// Result of transforming a batch; both lists keep input order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOutcome {
    pub mapped: Vec<MappableEntity>,
    pub unmapped: Vec<UnmappedRecord>,
}

/// Turns raw records into typed entities using a [`MappingRuleStore`].
///
/// Checks run in a fixed order: rule lookup, field presence, kind support,
/// then value types. The first failing check decides the reason.
#[derive(Clone, Debug)]
pub struct MappingEngine {
    enabled: BTreeSet<EntityKind>,
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self::with_kinds(EntityKind::ALL)
    }
}

impl MappingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that only builds the given kinds; records resolving to any other
    /// kind are reported as [`UnmappedReason::UnsupportedKind`].
    pub fn with_kinds(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            enabled: kinds.into_iter().collect(),
        }
    }

    pub fn supports(&self, kind: EntityKind) -> bool {
        self.enabled.contains(&kind)
    }

    pub fn transform(&self, record: &RawRecord, store: &MappingRuleStore) -> TransformOutcome {
        let unmapped = |reason: UnmappedReason| {
            debug!(user_key = %record.user_key, %reason, "record not mapped");
            TransformOutcome::Unmapped(UnmappedRecord {
                original: record.clone(),
                reason,
            })
        };

        let Some(rule) = store.rule_for_user_key(&record.user_key) else {
            return unmapped(UnmappedReason::RuleNotFound);
        };

        let missing: Vec<String> = rule
            .external_fields()
            .filter(|field| !record.user_args.contains_key(*field))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return unmapped(UnmappedReason::MissingKeys { missing });
        }

        let mut remapped = Map::with_capacity(rule.field_map().len());
        for (internal, external) in rule.field_map() {
            if let Some(value) = record.user_args.get(external) {
                remapped.insert(internal.clone(), value.clone());
            }
        }

        let kind = rule.kind();
        if !self.supports(kind) {
            return unmapped(UnmappedReason::UnsupportedKind { kind });
        }

        match MappableEntity::from_args(kind, &remapped).and_then(|entity| {
            entity.validate()?;
            Ok(entity)
        }) {
            Ok(entity) => TransformOutcome::Mapped(entity),
            Err(err) => unmapped(UnmappedReason::TypeValidationFailed {
                parameter: err.parameter().to_string(),
            }),
        }
    }

    pub fn transform_batch<'a, I>(&self, records: I, store: &MappingRuleStore) -> BatchOutcome
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        let mut outcome = BatchOutcome::default();
        for record in records {
            match self.transform(record, store) {
                TransformOutcome::Mapped(entity) => outcome.mapped.push(entity),
                TransformOutcome::Unmapped(record) => outcome.unmapped.push(record),
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::entity::Beam;

    fn record(user_key: &str, args: Value) -> RawRecord {
        match args {
            Value::Object(map) => RawRecord::new(user_key, map),
            other => panic!("expected object, got {other}"),
        }
    }

    fn store() -> MappingRuleStore {
        MappingRuleStore::from_document(
            &json!({
                "mappingEntity": {
                    "IfcBeam": {
                        "userKey": "BEAM",
                        "userArgs": {
                            "startPt": "from",
                            "endPt": "to",
                            "height": "depth",
                            "rotation": "angle",
                            "targetStorey": "level"
                        }
                    },
                    "IfcWallStandardCase": {
                        "userKey": "WALL",
                        "userArgs": {
                            "startPt": "from",
                            "endPt": "to",
                            "height": "h",
                            "zOffset": "z",
                            "thickness": "t",
                            "targetStorey": "level"
                        }
                    }
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    fn beam_args() -> Value {
        json!({"from": [0, 0], "to": [4, 0], "depth": 0.5, "angle": 0, "level": "L1", "note": "x"})
    }

    #[test]
    fn beam_record_is_mapped() {
        let outcome = MappingEngine::new().transform(&record("BEAM", beam_args()), &store());
        assert_eq!(
            outcome,
            TransformOutcome::Mapped(MappableEntity::Beam(Beam {
                start_pt: [0.0, 0.0],
                end_pt: [4.0, 0.0],
                height: 0.5,
                rotation: 0.0,
                target_storey: "L1".to_string(),
            }))
        );
    }

    #[test]
    fn missing_fields_are_listed_in_rule_order() {
        let outcome =
            MappingEngine::new().transform(&record("BEAM", json!({"angle": 0, "from": [0, 0]})), &store());
        let TransformOutcome::Unmapped(unmapped) = outcome else {
            panic!("expected unmapped");
        };
        assert_eq!(
            unmapped.reason,
            UnmappedReason::MissingKeys {
                missing: vec!["to".into(), "depth".into(), "level".into()]
            }
        );
        assert_eq!(unmapped.reason.message(), "Some required keys are not included.");
    }

    #[test]
    fn wrong_type_names_the_parameter() {
        let mut args = beam_args();
        args["depth"] = json!("half a metre");
        let TransformOutcome::Unmapped(unmapped) =
            MappingEngine::new().transform(&record("BEAM", args), &store())
        else {
            panic!("expected unmapped");
        };
        assert_eq!(
            unmapped.reason,
            UnmappedReason::TypeValidationFailed {
                parameter: "height".into()
            }
        );
        assert_eq!(unmapped.reason.to_string(), "Type validation failed. (parameter: height)");
    }

    #[test]
    fn null_values_fail_type_validation_not_presence() {
        let mut args = beam_args();
        args["level"] = Value::Null;
        let TransformOutcome::Unmapped(unmapped) =
            MappingEngine::new().transform(&record("BEAM", args), &store())
        else {
            panic!("expected unmapped");
        };
        assert!(matches!(
            unmapped.reason,
            UnmappedReason::TypeValidationFailed { ref parameter } if parameter == "targetStorey"
        ));
    }

    #[test]
    fn disabled_kind_is_unsupported_after_presence_check() {
        let engine = MappingEngine::with_kinds([
            EntityKind::BuildingStorey,
            EntityKind::Column,
            EntityKind::Beam,
        ]);
        assert!(!engine.supports(EntityKind::WallStandardCase));

        let wall = record(
            "WALL",
            json!({"from": [0, 0], "to": [1, 0], "h": 3, "z": 0, "t": "thick", "level": "L1"}),
        );
        let TransformOutcome::Unmapped(unmapped) = engine.transform(&wall, &store()) else {
            panic!("expected unmapped");
        };
        assert_eq!(
            unmapped.reason,
            UnmappedReason::UnsupportedKind {
                kind: EntityKind::WallStandardCase
            }
        );
        assert_eq!(unmapped.reason.message(), "Unsupported Item.");

        let incomplete = record("WALL", json!({"from": [0, 0]}));
        let TransformOutcome::Unmapped(unmapped) = engine.transform(&incomplete, &store()) else {
            panic!("expected unmapped");
        };
        assert!(matches!(unmapped.reason, UnmappedReason::MissingKeys { .. }));
    }

    #[test]
    fn reasons_serialize_with_a_code() {
        assert_eq!(
            serde_json::to_value(UnmappedReason::RuleNotFound).unwrap(),
            json!({"code": "ruleNotFound"})
        );
        assert_eq!(
            serde_json::to_value(UnmappedReason::UnsupportedKind {
                kind: EntityKind::WallStandardCase
            })
            .unwrap(),
            json!({"code": "unsupportedKind", "kind": "IfcWallStandardCase"})
        );
    }
}
