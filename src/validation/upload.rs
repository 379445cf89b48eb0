//! Checks declared data files against the files actually uploaded.
//!
//! The manifest maps each uploaded file name to its checksum. How the
//! manifest is obtained (object store listing, directory scan) is up to
//! the caller.

use std::collections::HashMap;

use crate::submission::entity::Entity;
use crate::submission::graph::Submission;
use crate::validation::validator::Validator;

pub struct UploadValidator {
    file_manifest: HashMap<String, String>,
}

impl UploadValidator {
    pub fn new(file_manifest: HashMap<String, String>) -> Self {
        Self { file_manifest }
    }

    fn validate_file(&self, entity: &mut Entity, file_attribute: &str, check_attribute: &str) {
        let Some(file_name) = entity.attributes.get(file_attribute).cloned() else {
            return;
        };
        let Some(upload_checksum) = self.file_manifest.get(&file_name).cloned() else {
            entity.add_error(
                file_attribute,
                format!("File has not been uploaded to drag-and-drop: {file_name}"),
            );
            return;
        };
        match entity.attributes.get(check_attribute).cloned() {
            Some(stated_checksum) => {
                if stated_checksum != upload_checksum {
                    entity.add_error(
                        check_attribute,
                        format!(
                            "The checksum found on drag-and-drop {upload_checksum} does not match: {stated_checksum}"
                        ),
                    );
                }
            }
            None => {
                // Fill in the checksum so downstream converters can use it.
                entity
                    .attributes
                    .insert(check_attribute.to_string(), upload_checksum);
            }
        }
    }
}

impl Validator for UploadValidator {
    /// Only sequencing runs carry files.
    fn validate_data(&self, data: &mut Submission) {
        for entity in data.entities_of_type_mut("run_experiment") {
            self.validate_entity(entity);
        }
    }

    fn validate_entity(&self, entity: &mut Entity) {
        let mut file_number = 1;
        loop {
            let file_attribute = format!("uploaded_file_{file_number}");
            if !entity.attributes.contains_key(&file_attribute) {
                break;
            }
            let check_attribute = format!("{file_attribute}_checksum");
            self.validate_file(entity, &file_attribute, &check_attribute);
            file_number += 1;
        }
    }
}
