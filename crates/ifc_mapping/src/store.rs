use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{error::MappingDocumentError, kind::EntityKind};

/// Top-level key of a mapping document.
pub const MAPPING_ENTITY_KEY: &str = "mappingEntity";
const USER_KEY: &str = "userKey";
const USER_ARGS: &str = "userArgs";

/// How records tagged with `user_key` become entities of `kind`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingRule {
    kind: EntityKind,
    user_key: String,
    field_map: IndexMap<String, String>,
}

impl MappingRule {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    /// Internal parameter name to external field name, in document order.
    pub fn field_map(&self) -> &IndexMap<String, String> {
        &self.field_map
    }

    /// External field names this rule reads, without duplicates.
    pub fn external_fields(&self) -> impl Iterator<Item = &str> {
        let mut seen = Vec::with_capacity(self.field_map.len());
        self.field_map.values().filter_map(move |field| {
            if seen.contains(&field) {
                None
            } else {
                seen.push(field);
                Some(field.as_str())
            }
        })
    }

    fn from_entry(kind: EntityKind, entry: &Value) -> Result<Self, MappingDocumentError> {
        let invalid = |detail: String| MappingDocumentError::InvalidRule { kind, detail };

        let entry = entry
            .as_object()
            .ok_or_else(|| invalid("rule must be a JSON object".to_string()))?;

        let user_key = match entry.get(USER_KEY) {
            Some(Value::String(key)) if !key.is_empty() => key.clone(),
            Some(Value::String(_)) => return Err(invalid("userKey must not be empty".to_string())),
            Some(_) => return Err(invalid("userKey must be a string".to_string())),
            None => return Err(invalid("userKey is missing".to_string())),
        };

        let args = match entry.get(USER_ARGS) {
            Some(Value::Object(args)) if !args.is_empty() => args,
            Some(Value::Object(_)) => {
                return Err(invalid("userArgs must map at least one parameter".to_string()))
            }
            Some(_) => return Err(invalid("userArgs must be a JSON object".to_string())),
            None => return Err(invalid("userArgs is missing".to_string())),
        };

        let field_map = Self::field_map_from(kind, args).map_err(invalid)?;
        for required in kind.required_params() {
            if !field_map.contains_key(required.name) {
                return Err(invalid(format!(
                    "required parameter `{}` is not mapped",
                    required.name
                )));
            }
        }

        Ok(Self {
            kind,
            user_key,
            field_map,
        })
    }

    fn field_map_from(
        kind: EntityKind,
        args: &Map<String, Value>,
    ) -> Result<IndexMap<String, String>, String> {
        let mut field_map = IndexMap::with_capacity(args.len());
        for (param, field) in args {
            let field = match field {
                Value::String(field) if !field.is_empty() => field,
                _ => {
                    return Err(format!(
                        "parameter `{param}` must map to a non-empty field name"
                    ))
                }
            };
            if !kind.is_known_param(param) {
                warn!(%kind, param = %param, "mapping rule names a parameter the entity does not use");
            }
            field_map.insert(param.clone(), field.clone());
        }
        Ok(field_map)
    }
}

#[derive(Debug, Default)]
struct RuleIndex {
    rules: Vec<MappingRule>,
    by_kind: HashMap<EntityKind, usize>,
    by_user_key: HashMap<String, usize>,
}

impl RuleIndex {
    fn parse(document: &str) -> Result<Self, MappingDocumentError> {
        let document: Value = serde_json::from_str(document)
            .map_err(|source| MappingDocumentError::Parse { source })?;

        let entities = match document.get(MAPPING_ENTITY_KEY) {
            Some(Value::Object(entities)) => entities,
            Some(_) => {
                return Err(MappingDocumentError::InvalidDocument {
                    detail: format!("`{MAPPING_ENTITY_KEY}` must be a JSON object"),
                })
            }
            None => {
                return Err(MappingDocumentError::InvalidDocument {
                    detail: format!("`{MAPPING_ENTITY_KEY}` is missing"),
                })
            }
        };

        let mut index = Self::default();
        for (name, entry) in entities {
            let kind = name
                .parse::<EntityKind>()
                .map_err(|_| MappingDocumentError::UnsupportedKind { kind: name.clone() })?;
            let rule = MappingRule::from_entry(kind, entry)?;

            if let Some(&existing) = index.by_user_key.get(rule.user_key()) {
                return Err(MappingDocumentError::DuplicateUserKey {
                    user_key: rule.user_key.clone(),
                    first: index.rules[existing].kind,
                    second: kind,
                });
            }

            let slot = index.rules.len();
            index.by_kind.insert(kind, slot);
            index.by_user_key.insert(rule.user_key.clone(), slot);
            index.rules.push(rule);
        }
        Ok(index)
    }
}

/// Validated mapping rules, looked up by entity kind or by `userKey`.
///
/// A load either replaces every rule or leaves the store untouched.
#[derive(Debug, Default)]
pub struct MappingRuleStore {
    index: RuleIndex,
}

impl MappingRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: &str) -> Result<Self, MappingDocumentError> {
        Ok(Self {
            index: RuleIndex::parse(document)?,
        })
    }

    /// Replaces the rules with those of `document`.
    pub fn load(&mut self, document: &str) -> Result<(), MappingDocumentError> {
        let index = RuleIndex::parse(document)?;
        debug!(rules = index.rules.len(), "mapping rules loaded");
        self.index = index;
        Ok(())
    }

    pub fn rule_for_kind(&self, kind: EntityKind) -> Option<&MappingRule> {
        self.index
            .by_kind
            .get(&kind)
            .map(|&slot| &self.index.rules[slot])
    }

    pub fn rule_for_user_key(&self, user_key: &str) -> Option<&MappingRule> {
        self.index
            .by_user_key
            .get(user_key)
            .map(|&slot| &self.index.rules[slot])
    }

    pub fn kind_for_user_key(&self, user_key: &str) -> Option<EntityKind> {
        self.rule_for_user_key(user_key).map(MappingRule::kind)
    }

    /// Rules in document order.
    pub fn rules(&self) -> &[MappingRule] {
        &self.index.rules
    }

    pub fn len(&self) -> usize {
        self.index.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.rules.is_empty()
    }
}
