//! Template-driven attribute validation.
//!
//! The submission template declares, per entity type and attribute, whether
//! the attribute is mandatory, what format it must follow and which values
//! are accepted. The host application reads that template (a spreadsheet
//! header, a config file); this validator only consumes the resulting map.

use std::collections::HashMap;

use serde::Deserialize;

use crate::clean::{clean_validation, is_valid_date};
use crate::submission::entity::Entity;
use crate::validation::validator::Validator;

/// Validation rules for one attribute.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributeValidation {
    /// `M` mandatory, `R` recommended, `O` optional; any other text is
    /// surfaced as a conditional requirement.
    pub mandatory: Option<String>,
    /// Currently only `YYYY-MM-DD` is understood.
    pub format: Option<String>,
    pub accepted_values: Option<Vec<String>>,
    pub units: Option<String>,
}

/// `entity_type → attribute → rules`.
pub type ValidationMap = HashMap<String, HashMap<String, AttributeValidation>>;

pub struct AttributeValidator {
    validation_map: ValidationMap,
}

impl AttributeValidator {
    pub fn new(validation_map: ValidationMap) -> Self {
        Self { validation_map }
    }
}

impl Validator for AttributeValidator {
    fn validate_entity(&self, entity: &mut Entity) {
        let Some(entity_validation) = self.validation_map.get(&entity.identifier().entity_type)
        else {
            return;
        };
        let mut findings: Vec<(String, Vec<String>)> = Vec::new();
        for (attribute_name, attribute_validation) in entity_validation {
            let attribute_errors = match entity.attributes.get(attribute_name) {
                None => missing_attribute_errors(attribute_name, attribute_validation),
                Some(value) => validate_attribute(attribute_validation, value),
            };
            if !attribute_errors.is_empty() {
                findings.push((attribute_name.clone(), attribute_errors));
            }
        }
        for (attribute, errors) in findings {
            entity.add_errors(&attribute, errors);
        }
    }
}

fn missing_attribute_errors(
    attribute_name: &str,
    attribute_validation: &AttributeValidation,
) -> Vec<String> {
    let Some(mandatory) = attribute_validation.mandatory.as_deref().map(str::trim) else {
        return Vec::new();
    };
    match mandatory {
        "M" => vec![format!("should have required property '{attribute_name}'.")],
        "R" => vec!["recommended attribute is missing.".to_string()],
        "O" => Vec::new(),
        condition => vec![format!("may be required: {condition}")],
    }
}

fn validate_attribute(attribute_validation: &AttributeValidation, value: &str) -> Vec<String> {
    let mut attribute_errors = Vec::new();
    if attribute_validation.format.as_deref() == Some("YYYY-MM-DD") && !is_valid_date(value) {
        attribute_errors.push(format!("'{value}' is not in date format: YYYY-MM-DD."));
    }
    if let Some(accepted) = &attribute_validation.accepted_values {
        if !accepted
            .iter()
            .any(|candidate| clean_validation(candidate) == clean_validation(value))
        {
            attribute_errors.push(format!(
                "'{value}' is not in list of accepted values: {accepted:?}"
            ));
        }
    }
    attribute_errors
}
