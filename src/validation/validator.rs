//! The validator seam every check in the pipeline plugs into.
//!
//! A validator signals problems solely by recording errors on entities;
//! nothing is ever raised for an individual record's problem, so one pass
//! surfaces every issue across the whole file. Raising is reserved for
//! systemic failures such as an uncompilable schema.

use crate::submission::entity::Entity;
use crate::submission::graph::Submission;

pub trait Validator {
    /// Checks one entity, recording findings via `add_error`/`add_errors`.
    fn validate_entity(&self, entity: &mut Entity);

    /// Checks the whole graph; the default dispatches per entity.
    fn validate_data(&self, data: &mut Submission) {
        for entity in data.entities_mut() {
            self.validate_entity(entity);
        }
    }
}
