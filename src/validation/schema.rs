//! JSON Schema validation of entity attributes.
//!
//! Each entity type may have a schema; entities of types without one are
//! skipped. Validation runs in-process with the `jsonschema` crate, and every
//! finding is recorded on the entity keyed by the attribute it localizes to,
//! so the caller can render it back onto the originating cell.

use std::collections::HashMap;

use jsonschema::validator_for;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::submission::entity::Entity;
use crate::validation::validator::Validator;

lazy_static! {
    static ref REQUIRED_PROPERTY: Regex =
        Regex::new(r#"['"](?P<attribute>[^'"]+)['"] is a required property"#).unwrap();
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to compile schema for {entity_type}: {message}")]
    Compile { entity_type: String, message: String },
}

/// Validates entities against per-type JSON Schemas.
pub struct SchemaValidator {
    validators: HashMap<String, jsonschema::Validator>,
}

impl SchemaValidator {
    /// Compiles one validator per entity type. An uncompilable schema is a
    /// systemic failure, not a per-record finding.
    pub fn new(schemas: HashMap<String, Value>) -> Result<Self, SchemaError> {
        let mut validators = HashMap::new();
        for (entity_type, mut schema) in schemas {
            if let Some(object) = schema.as_object_mut() {
                object.remove("id");
            }
            let validator = validator_for(&schema).map_err(|error| SchemaError::Compile {
                entity_type: entity_type.clone(),
                message: error.to_string(),
            })?;
            validators.insert(entity_type, validator);
        }
        Ok(Self { validators })
    }
}

impl Validator for SchemaValidator {
    fn validate_entity(&self, entity: &mut Entity) {
        let Some(validator) = self.validators.get(&entity.identifier().entity_type) else {
            return;
        };
        let payload = attribute_payload(entity);
        let mut findings: Vec<(String, String)> = Vec::new();
        for error in validator.iter_errors(&payload) {
            let message = error.to_string().replace('"', "'");
            let attribute = attribute_for(&error.instance_path.to_string(), &message);
            findings.push((attribute, message));
        }
        for (attribute, message) in findings {
            entity.add_error(&attribute, message);
        }
    }
}

/// Entity attributes as a JSON object, values lowercased to match the
/// case-insensitive enumerations the submission schemas declare.
fn attribute_payload(entity: &Entity) -> Value {
    let mut object = Map::new();
    for (key, value) in &entity.attributes {
        object.insert(key.clone(), Value::String(value.to_lowercase()));
    }
    Value::Object(object)
}

/// Localizes a schema finding to an attribute name: the instance path when
/// the finding points inside the payload, the named property for missing
/// required attributes, or the whole entity as a last resort.
fn attribute_for(instance_path: &str, message: &str) -> String {
    let path = instance_path.trim_start_matches('/');
    if !path.is_empty() {
        return path.split('/').next().unwrap_or(path).to_string();
    }
    if let Some(captures) = REQUIRED_PROPERTY.captures(message) {
        return captures["attribute"].to_string();
    }
    "schema".to_string()
}
