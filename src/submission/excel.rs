//! Row semantics on top of the entity graph.
//!
//! A denormalized spreadsheet describes several entity types on each row
//! without ever stating their relationships. [`ExcelSubmission`] reconstructs
//! both: repeated rows that name the same entity merge into one record, and
//! entity types that co-occur on a row are linked automatically.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};

use itertools::Itertools;

use crate::submission::entity::EntityIdentifier;
use crate::submission::graph::{GraphError, HandleCollision, Submission};

/// Index attribute suffixes searched in priority order when no accession is
/// present on the row.
const INDEX_KEYS: [&str; 3] = ["alias", "index", "name"];

/// A [`Submission`] with bidirectional row bookkeeping and same-row
/// auto-linking.
#[derive(Debug, Default)]
pub struct ExcelSubmission {
    submission: Submission,
    row_entities: BTreeMap<u32, HashMap<String, String>>,
    entity_rows: HashMap<EntityIdentifier, BTreeSet<u32>>,
}

impl ExcelSubmission {
    pub fn new(collider: HandleCollision) -> Self {
        Self {
            submission: Submission::new(collider),
            ..Default::default()
        }
    }

    /// Maps one entity type's attributes from one spreadsheet row.
    ///
    /// Derives the entity index (accession first, then alias/index/name, then
    /// a synthesized `"{entity_type}:{row}"`), registers any accession
    /// attributes, and links the entity to every other entity type already
    /// mapped on the same row. The auto-link step runs on every call, so row
    /// mapping is order-independent.
    pub fn map_row(
        &mut self,
        row: u32,
        entity_type: &str,
        attributes: HashMap<String, String>,
    ) -> Result<EntityIdentifier, GraphError> {
        let index = derive_index(entity_type, row, &attributes);
        self.map_row_entity(row, entity_type, &index, attributes)
    }

    /// [`map_row`](Self::map_row) with a pre-derived index. Accession
    /// attributes are still registered against the entity.
    pub fn map_row_entity(
        &mut self,
        row: u32,
        entity_type: &str,
        index: &str,
        attributes: HashMap<String, String>,
    ) -> Result<EntityIdentifier, GraphError> {
        let accessions = derive_accessions(entity_type, &attributes);
        let entity = self.submission.map(entity_type, index, attributes)?;
        for (service, accession) in accessions {
            entity.add_accession(service, accession);
        }
        let identifier = entity.identifier().clone();
        self.link_row(row, &identifier)?;
        self.record_row(row, &identifier);
        Ok(identifier)
    }

    /// Rows that contributed to the given entity.
    pub fn get_rows(&self, entity_type: &str, index: &str) -> BTreeSet<u32> {
        self.get_rows_from_id(&EntityIdentifier::new(entity_type, index))
    }

    pub fn get_rows_from_id(&self, identifier: &EntityIdentifier) -> BTreeSet<u32> {
        self.entity_rows.get(identifier).cloned().unwrap_or_default()
    }

    pub fn get_all_rows(&self) -> BTreeSet<u32> {
        self.row_entities.keys().copied().collect()
    }

    fn link_row(&mut self, row: u32, identifier: &EntityIdentifier) -> Result<(), GraphError> {
        if let Some(row_entities) = self.row_entities.get(&row) {
            let others: Vec<EntityIdentifier> = row_entities
                .iter()
                .filter(|(entity_type, _)| **entity_type != identifier.entity_type)
                .map(|(entity_type, index)| EntityIdentifier::new(entity_type, index.clone()))
                .collect();
            for other in others {
                self.submission.link_entities(identifier, &other)?;
            }
        }
        Ok(())
    }

    fn record_row(&mut self, row: u32, identifier: &EntityIdentifier) {
        self.row_entities
            .entry(row)
            .or_default()
            .insert(identifier.entity_type.clone(), identifier.index.clone());
        self.entity_rows
            .entry(identifier.clone())
            .or_default()
            .insert(row);
    }
}

impl Deref for ExcelSubmission {
    type Target = Submission;

    fn deref(&self) -> &Submission {
        &self.submission
    }
}

impl DerefMut for ExcelSubmission {
    fn deref_mut(&mut self) -> &mut Submission {
        &mut self.submission
    }
}

/// Derives the entity index from row attributes.
///
/// An externally assigned `{entity_type}_accession` is promoted to serve as
/// the index so that rows sharing an accession collapse onto one entity;
/// otherwise the first of `_alias`/`_index`/`_name` wins; otherwise the index
/// is synthesized from the row number.
fn derive_index(entity_type: &str, row: u32, attributes: &HashMap<String, String>) -> String {
    if let Some(accession) = attributes.get(&format!("{entity_type}_accession")) {
        return accession.clone();
    }
    for key in INDEX_KEYS {
        if let Some(index) = attributes.get(&format!("{entity_type}_{key}")) {
            return index.clone();
        }
    }
    format!("{entity_type}:{row}")
}

/// Collects every accession attribute on the row: the bare
/// `{entity_type}_accession` under the type's default service, and any
/// `{entity_type}_{service}_accession` under that service's name.
fn derive_accessions(
    entity_type: &str,
    attributes: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut accessions = Vec::new();
    if let Some(accession) = attributes.get(&format!("{entity_type}_accession")) {
        accessions.push((default_service(entity_type).to_string(), accession.clone()));
    }
    let prefix = format!("{entity_type}_");
    for key in attributes.keys().sorted() {
        if let Some(middle) = key
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix("_accession"))
        {
            if !middle.is_empty() {
                accessions.push((canonical_service(middle), attributes[key].clone()));
            }
        }
    }
    accessions
}

/// The service an unqualified `{entity_type}_accession` belongs to.
fn default_service(entity_type: &str) -> &'static str {
    match entity_type {
        "study" => "BioStudies",
        "sample" => "BioSamples",
        _ => "ENA",
    }
}

/// Canonical capitalization for known service tokens; unknown services are
/// kept as typed.
fn canonical_service(service: &str) -> String {
    match service.to_lowercase().as_str() {
        "ena" => "ENA".to_string(),
        "biosamples" => "BioSamples".to_string(),
        "biostudies" => "BioStudies".to_string(),
        _ => service.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn attributes(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_accession_wins_over_alias() {
        let mut submission = ExcelSubmission::default();
        let identifier = submission
            .map_row(
                1,
                "sample",
                attributes(&[("sample_accession", "SAME1"), ("sample_alias", "X")]),
            )
            .unwrap();
        assert_eq!(identifier.index, "SAME1");
        let entity = submission.get_entity("sample", "SAME1").unwrap();
        assert_eq!(entity.get_accession("BioSamples"), Some("SAME1"));
    }

    #[test]
    fn test_alias_index_without_accession() {
        let mut submission = ExcelSubmission::default();
        let identifier = submission
            .map_row(1, "sample", attributes(&[("sample_alias", "X")]))
            .unwrap();
        assert_eq!(identifier.index, "X");
        let entity = submission.get_entity("sample", "X").unwrap();
        assert_eq!(entity.get_accession("BioSamples"), None);
    }

    #[test]
    fn test_synthesized_index_for_unkeyed_row() {
        let mut submission = ExcelSubmission::default();
        let identifier = submission
            .map_row(7, "run_experiment", attributes(&[("library_name", "lib1")]))
            .unwrap();
        assert_eq!(identifier.index, "run_experiment:7");
    }

    #[test]
    fn test_rows_sharing_entities_merge_and_link_once() {
        let mut submission = ExcelSubmission::default();
        for row in [1, 2] {
            submission
                .map_row(row, "sample", attributes(&[("sample_alias", "S1")]))
                .unwrap();
            submission
                .map_row(row, "study", attributes(&[("study_alias", "T1")]))
                .unwrap();
        }

        let sample = submission.get_entity("sample", "S1").unwrap();
        assert_eq!(sample.get_linked_indexes("study").len(), 1);
        assert_eq!(
            submission.get_rows_from_id(sample.identifier()),
            BTreeSet::from([1, 2])
        );
        let study = submission.get_entity("study", "T1").unwrap();
        assert!(study.get_linked_indexes("sample").contains("S1"));
    }

    #[test]
    fn test_auto_link_is_order_independent() {
        let mut submission = ExcelSubmission::default();
        submission
            .map_row(3, "study", attributes(&[("study_alias", "T1")]))
            .unwrap();
        submission
            .map_row(3, "sample", attributes(&[("sample_alias", "S1")]))
            .unwrap();
        submission
            .map_row(3, "run_experiment", attributes(&[("run_experiment_alias", "R1")]))
            .unwrap();

        let run = submission.get_entity("run_experiment", "R1").unwrap();
        assert!(run.get_linked_indexes("sample").contains("S1"));
        assert!(run.get_linked_indexes("study").contains("T1"));
        let study = submission.get_entity("study", "T1").unwrap();
        assert!(study.get_linked_indexes("run_experiment").contains("R1"));
    }

    #[test]
    fn test_mapped_and_default_service_accessions() {
        let mut submission = ExcelSubmission::default();
        for row in [1, 2] {
            submission
                .map_row(row, "study", attributes(&[("study_accession", "PRJEB12345")]))
                .unwrap();
            submission
                .map_row(row, "sample", attributes(&[("sample_accession", "SAME123")]))
                .unwrap();
        }
        submission
            .map_row(
                1,
                "run_experiment",
                attributes(&[("run_experiment_accession", "EXP123")]),
            )
            .unwrap();
        // Only `{entity_type}_accession` may serve as the index.
        let run2 = submission
            .map_row(
                2,
                "run_experiment",
                attributes(&[("run_experiment_ena_accession", "EXP456")]),
            )
            .unwrap();
        assert_eq!(run2.index, "run_experiment:2");

        let study = submission.get_entity("study", "PRJEB12345").unwrap();
        assert_eq!(study.get_accession("BioStudies"), Some("PRJEB12345"));
        let run1 = submission.get_entity("run_experiment", "EXP123").unwrap();
        assert_eq!(run1.get_accession("ENA"), Some("EXP123"));

        let expected: crate::submission::graph::AllAccessions = [
            ("BioSamples".to_string(), vec!["SAME123".to_string()]),
            ("BioStudies".to_string(), vec!["PRJEB12345".to_string()]),
            (
                "ENA".to_string(),
                vec!["EXP123".to_string(), "EXP456".to_string()],
            ),
        ]
        .into();
        assert_eq!(submission.get_all_accessions(), expected);
    }

    #[test]
    fn test_unmapped_service_accessions_kept_verbatim() {
        let mut submission = ExcelSubmission::default();
        submission
            .map_row(
                1,
                "sample",
                attributes(&[
                    ("sample_accession", "SAME123"),
                    ("sample_ena_accession", "ENA-SAMPLE-1"),
                    ("sample_eva_accession", "EVA1"),
                ]),
            )
            .unwrap();

        let sample = submission.get_entity("sample", "SAME123").unwrap();
        assert_eq!(sample.get_accession("BioSamples"), Some("SAME123"));
        assert_eq!(sample.get_accession("ENA"), Some("ENA-SAMPLE-1"));
        assert_eq!(sample.get_accession("eva"), Some("EVA1"));
    }
}
