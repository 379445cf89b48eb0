//! The typed, identified record at the heart of the entity graph.
//!
//! An [`Entity`] accumulates state over the whole processing run: free-form
//! domain attributes from the spreadsheet, validation errors keyed per
//! attribute, accessions assigned by external archival services, and typed
//! links to other entities. Its identity is fixed at construction and never
//! changes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Value-typed key of an entity: a `(entity_type, index)` pair.
///
/// The `index` is the submitter-chosen alias, a promoted accession, or a
/// synthesized `"{entity_type}:{row}"` fallback. Two identifiers with the
/// same pair always resolve to the same entity in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityIdentifier {
    pub entity_type: String,
    pub index: String,
}

impl EntityIdentifier {
    pub fn new(entity_type: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            index: index.into(),
        }
    }
}

/// A mutable domain record: attributes plus accumulated errors, accessions
/// and links. Identity is immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    identifier: EntityIdentifier,
    pub attributes: HashMap<String, String>,
    accessions: BTreeMap<String, String>,
    errors: BTreeMap<String, Vec<String>>,
    links: BTreeMap<String, BTreeSet<String>>,
}

impl Entity {
    pub fn new(
        entity_type: impl Into<String>,
        index: impl Into<String>,
        attributes: HashMap<String, String>,
    ) -> Self {
        Self {
            identifier: EntityIdentifier::new(entity_type, index),
            attributes,
            accessions: BTreeMap::new(),
            errors: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn identifier(&self) -> &EntityIdentifier {
        &self.identifier
    }

    /// Records a validation or submission error against an attribute.
    /// Append-only: validators run in sequence and accumulate.
    pub fn add_error(&mut self, attribute: &str, message: impl Into<String>) {
        self.errors
            .entry(attribute.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_errors<I, S>(&mut self, attribute: &str, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors
            .entry(attribute.to_string())
            .or_default()
            .extend(messages.into_iter().map(Into::into));
    }

    pub fn get_errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Records the accession a service assigned to this entity. Last write
    /// wins: a resubmission may update the accession for the same service.
    pub fn add_accession(&mut self, service: impl Into<String>, accession: impl Into<String>) {
        self.accessions.insert(service.into(), accession.into());
    }

    pub fn get_accession(&self, service: &str) -> Option<&str> {
        self.accessions.get(service).map(String::as_str)
    }

    /// Walks the priority list and returns the first accession present.
    ///
    /// Different wire formats prefer different services as the canonical
    /// external reference, so the caller supplies the ordering.
    pub fn get_first_accession(&self, service_priority: &[&str]) -> Option<&str> {
        service_priority
            .iter()
            .find_map(|service| self.get_accession(service))
    }

    pub fn accessions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.accessions
            .iter()
            .map(|(service, accession)| (service.as_str(), accession.as_str()))
    }

    pub fn add_link(&mut self, entity_type: &str, index: impl Into<String>) {
        self.links
            .entry(entity_type.to_string())
            .or_default()
            .insert(index.into());
    }

    pub fn add_link_id(&mut self, identifier: &EntityIdentifier) {
        self.add_link(&identifier.entity_type, identifier.index.clone());
    }

    /// The set of indexes this entity links to under the given type.
    pub fn get_linked_indexes(&self, entity_type: &str) -> BTreeSet<String> {
        self.links.get(entity_type).cloned().unwrap_or_default()
    }
}
