//! The in-memory entity graph shared by every processing pass.
//!
//! A [`Submission`] owns all entities for one whole-file run, keyed by
//! `(entity_type, index)`. Entities live in an arena and every per-type view
//! preserves insertion order, so "first linked entity" is a stable,
//! reproducible choice wherever a converter has to break a tie.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::clean::is_not_applicable;
use crate::submission::entity::{Entity, EntityIdentifier};

/// Errors, accessions and lookups aggregated across the whole graph.
pub type AllErrors = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;
pub type AllAccessions = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Index {index} already exists for {entity_type}")]
    DuplicateIndex { entity_type: String, index: String },
    #[error("No {entity_type} entity found with index {index}")]
    NotFound { entity_type: String, index: String },
    #[error("{entity_type} link to {index} does not resolve to a stored entity")]
    BrokenLink { entity_type: String, index: String },
}

/// Rule applied when two inputs target the same `(entity_type, index)`.
///
/// Always chosen explicitly by the caller; the graph never infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleCollision {
    /// Merge attributes key-by-key, keep existing errors/links/accessions.
    #[default]
    Update,
    /// Replace the whole attributes map, keep identity and accumulated state.
    Overwrite,
    /// Reject the second mapping with [`GraphError::DuplicateIndex`].
    Error,
}

/// The entity graph: an arena of entities with per-type insertion-ordered
/// views and symmetric link bookkeeping.
#[derive(Debug, Default)]
pub struct Submission {
    collider: HandleCollision,
    entities: Vec<Entity>,
    lookup: HashMap<EntityIdentifier, usize>,
    type_order: Vec<String>,
    by_type: HashMap<String, Vec<usize>>,
}

impl Submission {
    pub fn new(collider: HandleCollision) -> Self {
        Self {
            collider,
            ..Default::default()
        }
    }

    /// Maps attributes onto the entity at `(entity_type, index)`, creating it
    /// on first sight and applying the collision policy on repeats.
    ///
    /// Attribute values equal to a "not applicable" sentinel are dropped
    /// before storage, on both the insert and the merge path, so the rest of
    /// the pipeline never sees them.
    pub fn map(
        &mut self,
        entity_type: &str,
        index: &str,
        attributes: HashMap<String, String>,
    ) -> Result<&mut Entity, GraphError> {
        let attributes = drop_not_applicable(attributes);
        let identifier = EntityIdentifier::new(entity_type, index);
        if let Some(&id) = self.lookup.get(&identifier) {
            let entity = &mut self.entities[id];
            match self.collider {
                HandleCollision::Error => {
                    return Err(GraphError::DuplicateIndex {
                        entity_type: entity_type.to_string(),
                        index: index.to_string(),
                    })
                }
                HandleCollision::Overwrite => entity.attributes = attributes,
                HandleCollision::Update => entity.attributes.extend(attributes),
            }
            return Ok(entity);
        }

        let id = self.entities.len();
        self.entities
            .push(Entity::new(entity_type, index, attributes));
        self.lookup.insert(identifier, id);
        if !self.by_type.contains_key(entity_type) {
            self.type_order.push(entity_type.to_string());
        }
        self.by_type
            .entry(entity_type.to_string())
            .or_default()
            .push(id);
        Ok(&mut self.entities[id])
    }

    pub fn get_entity(&self, entity_type: &str, index: &str) -> Result<&Entity, GraphError> {
        self.find_entity(entity_type, index)
            .ok_or_else(|| GraphError::NotFound {
                entity_type: entity_type.to_string(),
                index: index.to_string(),
            })
    }

    pub fn find_entity(&self, entity_type: &str, index: &str) -> Option<&Entity> {
        let identifier = EntityIdentifier::new(entity_type, index);
        self.lookup.get(&identifier).map(|&id| &self.entities[id])
    }

    pub fn entity_mut(&mut self, identifier: &EntityIdentifier) -> Result<&mut Entity, GraphError> {
        match self.lookup.get(identifier) {
            Some(&id) => Ok(&mut self.entities[id]),
            None => Err(GraphError::NotFound {
                entity_type: identifier.entity_type.clone(),
                index: identifier.index.clone(),
            }),
        }
    }

    /// All entities of a type, in insertion order.
    pub fn get_entities(&self, entity_type: &str) -> impl Iterator<Item = &Entity> {
        self.by_type
            .get(entity_type)
            .into_iter()
            .flatten()
            .map(|&id| &self.entities[id])
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    pub fn entities_of_type_mut<'a>(
        &'a mut self,
        entity_type: &'a str,
    ) -> impl Iterator<Item = &'a mut Entity> + 'a {
        self.entities
            .iter_mut()
            .filter(move |entity| entity.identifier().entity_type == entity_type)
    }

    /// Entity types in first-seen order.
    pub fn get_entity_types(&self) -> impl Iterator<Item = &str> {
        self.type_order.iter().map(String::as_str)
    }

    /// Resolves an entity's typed links against the graph, in graph insertion
    /// order. A link whose target is not stored is a data-integrity bug and
    /// fails loudly rather than being dropped.
    pub fn get_linked_entities(
        &self,
        entity: &Entity,
        entity_type: &str,
    ) -> Result<Vec<&Entity>, GraphError> {
        let indexes = entity.get_linked_indexes(entity_type);
        for index in &indexes {
            if self.find_entity(entity_type, index).is_none() {
                return Err(GraphError::BrokenLink {
                    entity_type: entity_type.to_string(),
                    index: index.clone(),
                });
            }
        }
        Ok(self
            .get_entities(entity_type)
            .filter(|linked| indexes.contains(&linked.identifier().index))
            .collect())
    }

    /// Links two stored entities symmetrically.
    pub fn link_entities(
        &mut self,
        a: &EntityIdentifier,
        b: &EntityIdentifier,
    ) -> Result<(), GraphError> {
        let b_clone = b.clone();
        let a_clone = a.clone();
        self.entity_mut(a)?.add_link_id(&b_clone);
        self.entity_mut(b)?.add_link_id(&a_clone);
        Ok(())
    }

    pub fn has_data(&self) -> bool {
        !self.entities.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entities.iter().any(Entity::has_errors)
    }

    /// Every recorded error, keyed `entity_type → index → attribute` so the
    /// caller can render a message back onto its originating cell or record.
    pub fn get_all_errors(&self) -> AllErrors {
        let mut all_errors = AllErrors::new();
        for entity in &self.entities {
            if !entity.has_errors() {
                continue;
            }
            let identifier = entity.identifier();
            all_errors
                .entry(identifier.entity_type.clone())
                .or_default()
                .insert(identifier.index.clone(), entity.get_errors().clone());
        }
        all_errors
    }

    /// Every recorded accession flattened per service, in graph insertion
    /// order. Used for run reporting and for telling a first-time ADD apart
    /// from a MODIFY resubmission.
    pub fn get_all_accessions(&self) -> AllAccessions {
        let mut all_accessions = AllAccessions::new();
        for entity in &self.entities {
            for (service, accession) in entity.accessions() {
                let accessions = all_accessions.entry(service.to_string()).or_default();
                if !accessions.iter().any(|known| known == accession) {
                    accessions.push(accession.to_string());
                }
            }
        }
        all_accessions
    }
}

fn drop_not_applicable(attributes: HashMap<String, String>) -> HashMap<String, String> {
    attributes
        .into_iter()
        .filter(|(_, value)| !is_not_applicable(value))
        .collect()
}
