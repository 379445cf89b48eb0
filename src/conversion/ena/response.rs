//! Ingestion of the ENA receipt document.
//!
//! After a submission round-trip, the receipt assigns accessions to the
//! aliases we sent and may carry per-object error lines. This module parses
//! the receipt, writes accessions and errors back into the entity graph, and
//! links a synthetic `submission` entity to everything the run touched.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::warn;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;

use crate::conversion::ena::base::XmlElement;
use crate::submission::entity::EntityIdentifier;
use crate::submission::excel::ExcelSubmission;

/// Receipt element name → (graph entity type, accession service).
const RECEIPT_MAP: [(&str, &str, &str); 6] = [
    ("PROJECT", "study", "ENA_Project"),
    ("STUDY", "study", "ENA_Study"),
    ("SAMPLE", "sample", "ENA_Sample"),
    ("EXPERIMENT", "run_experiment", "ENA_Experiment"),
    ("RUN", "run_experiment", "ENA_Run"),
    ("SUBMISSION", "submission", "ENA_Submission"),
];

lazy_static! {
    static ref ERROR_LINE: Regex = Regex::new(
        r#"^In (?P<name>.+), alias:"(?P<alias>.+)", accession:"(?P<accession>.*)"\. (?P<message>.*)$"#
    )
    .unwrap();
}

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Failed to parse receipt XML: {0}")]
    Parse(String),
    #[error("Receipt has no SUBMISSION element")]
    MissingSubmission,
    #[error("ENA submission failed: {0}")]
    Ena(String),
    #[error(transparent)]
    Graph(#[from] crate::submission::graph::GraphError),
}

pub struct EnaResponseConverter;

impl EnaResponseConverter {
    /// Applies a receipt to the graph that produced the submission.
    ///
    /// Accessions are only recorded when the receipt's success flag is set;
    /// error lines are extracted either way. Error lines that do not match
    /// the known pattern mean the response has an unexpected shape, and are
    /// raised as one aggregate failure for a human to inspect.
    pub fn convert_response(
        &self,
        submission: &mut ExcelSubmission,
        receipt_xml: &str,
    ) -> Result<(), ResponseError> {
        let receipt = parse_document(receipt_xml)?;
        if receipt.attribute("success") == Some("true") {
            let submission_id = self.map_submission_entity(submission, &receipt)?;
            self.add_accessions(submission, &receipt, &submission_id)?;
        }
        self.add_errors(submission, &receipt)
    }

    /// Maps the synthetic `submission` entity onto every row the graph
    /// covers, so later reporting can reach everything this run touched.
    fn map_submission_entity(
        &self,
        submission: &mut ExcelSubmission,
        receipt: &XmlElement,
    ) -> Result<EntityIdentifier, ResponseError> {
        let ena_submission = receipt
            .descendants_named("SUBMISSION")
            .into_iter()
            .next()
            .ok_or(ResponseError::MissingSubmission)?;
        let alias = ena_submission
            .attribute("alias")
            .ok_or(ResponseError::MissingSubmission)?
            .to_string();
        let rows = submission.get_all_rows();
        if let (Some(&first), Some(&last)) = (rows.iter().next(), rows.iter().next_back()) {
            let mut identifier = EntityIdentifier::new("submission", alias.clone());
            for row in first..=last {
                identifier =
                    submission.map_row_entity(row, "submission", &alias, HashMap::new())?;
            }
            Ok(identifier)
        } else {
            // A rowless graph still gets the entity, so accession recording
            // and linking never dangle.
            let entity = submission.map("submission", &alias, HashMap::new())?;
            Ok(entity.identifier().clone())
        }
    }

    fn add_accessions(
        &self,
        submission: &mut ExcelSubmission,
        receipt: &XmlElement,
        submission_id: &EntityIdentifier,
    ) -> Result<(), ResponseError> {
        for (receipt_name, entity_type, service) in RECEIPT_MAP {
            let found: Vec<(String, String)> = receipt
                .descendants_named(receipt_name)
                .into_iter()
                .filter_map(|element| {
                    match (element.attribute("alias"), element.attribute("accession")) {
                        (Some(alias), Some(accession)) => {
                            Some((alias.to_string(), accession.to_string()))
                        }
                        _ => None,
                    }
                })
                .collect();
            for (alias, accession) in found {
                // The index may itself have been promoted from a prior
                // accession, so fall back to accession lookup.
                let identifier = submission
                    .find_entity(entity_type, &alias)
                    .or_else(|| submission.find_entity(entity_type, &accession))
                    .map(|entity| entity.identifier().clone());
                let Some(identifier) = identifier else {
                    warn!("Cannot find {entity_type}.{alias} to add accession {accession}");
                    continue;
                };
                submission
                    .entity_mut(&identifier)
                    .map_err(ResponseError::Graph)?
                    .add_accession(service, accession);
                if identifier != *submission_id {
                    submission.link_entities(submission_id, &identifier)?;
                }
            }
        }
        Ok(())
    }

    fn add_errors(
        &self,
        submission: &mut ExcelSubmission,
        receipt: &XmlElement,
    ) -> Result<(), ResponseError> {
        let mut unexpected = Vec::new();
        for messages in receipt.descendants_named("MESSAGES") {
            for error in messages.descendants_named("ERROR") {
                let Some(text) = error.text.as_deref() else {
                    continue;
                };
                match ERROR_LINE.captures(text) {
                    Some(captures) => self.add_error(submission, &captures),
                    None => unexpected.push(text.to_string()),
                }
            }
        }
        if unexpected.is_empty() {
            Ok(())
        } else {
            Err(ResponseError::Ena(unexpected.join(" ")))
        }
    }

    fn add_error(&self, submission: &mut ExcelSubmission, captures: &regex::Captures) {
        let receipt_name = captures["name"].to_uppercase();
        let alias = &captures["alias"];
        let Some((_, entity_type, service)) = RECEIPT_MAP
            .iter()
            .find(|(name, _, _)| *name == receipt_name)
        else {
            return;
        };
        let attribute = format!("{entity_type}_{service}_accession").to_lowercase();
        let identifier = submission
            .find_entity(entity_type, alias)
            .map(|entity| entity.identifier().clone());
        match identifier {
            Some(identifier) => {
                if let Ok(entity) = submission.entity_mut(&identifier) {
                    entity.add_error(&attribute, captures["message"].to_string());
                }
            }
            None => warn!("Cannot find {entity_type}.{alias} to record receipt error"),
        }
    }
}

/// Parses an XML document into an element tree.
pub fn parse_document(xml: &str) -> Result<XmlElement, ResponseError> {
    let mut reader = Reader::from_str(xml);
    let mut buffer = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;
    loop {
        match reader
            .read_event_into(&mut buffer)
            .map_err(|error| ResponseError::Parse(error.to_string()))?
        {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let content = text
                    .xml_content()
                    .map_err(|error| ResponseError::Parse(error.to_string()))?;
                let content = content.trim();
                if !content.is_empty() {
                    if let Some(open) = stack.last_mut() {
                        open.text = Some(content.to_string());
                    }
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ResponseError::Parse("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
        buffer.clear();
    }
    root.ok_or_else(|| ResponseError::Parse("empty document".to_string()))
}

fn element_from_start(start: &quick_xml::events::BytesStart) -> Result<XmlElement, ResponseError> {
    let name = String::from_utf8(start.name().as_ref().to_vec())
        .map_err(|error| ResponseError::Parse(error.to_string()))?;
    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|error| ResponseError::Parse(error.to_string()))?;
        let key = String::from_utf8(attribute.key.as_ref().to_vec())
            .map_err(|error| ResponseError::Parse(error.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|error| ResponseError::Parse(error.to_string()))?;
        element.set_attribute(key, value.into_owned());
    }
    Ok(element)
}

fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.add_child(element),
        None => *root = Some(element),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn graph() -> ExcelSubmission {
        let mut submission = ExcelSubmission::default();
        let rows = [
            ("study", "study_alias", "T1"),
            ("sample", "sample_alias", "S1"),
            ("run_experiment", "run_experiment_alias", "R1"),
        ];
        for (entity_type, key, index) in rows {
            submission
                .map_row(
                    1,
                    entity_type,
                    [(key.to_string(), index.to_string())].into_iter().collect(),
                )
                .unwrap();
        }
        submission
    }

    fn success_receipt() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<RECEIPT receiptDate="2021-03-05T15:51:51.862Z" success="true">
  <PROJECT accession="PRJEB1" alias="T1" status="PRIVATE"/>
  <SAMPLE accession="ERS1" alias="S1" status="PRIVATE"/>
  <EXPERIMENT accession="ERX1" alias="R1" status="PRIVATE"/>
  <RUN accession="ERR1" alias="R1" status="PRIVATE"/>
  <SUBMISSION accession="ERA1" alias="sub-1"/>
  <MESSAGES/>
</RECEIPT>"#
    }

    #[test]
    fn test_success_receipt_records_accessions_and_links() {
        let mut submission = graph();
        EnaResponseConverter
            .convert_response(&mut submission, success_receipt())
            .unwrap();

        let study = submission.get_entity("study", "T1").unwrap();
        assert_eq!(study.get_accession("ENA_Project"), Some("PRJEB1"));
        let run = submission.get_entity("run_experiment", "R1").unwrap();
        assert_eq!(run.get_accession("ENA_Experiment"), Some("ERX1"));
        assert_eq!(run.get_accession("ENA_Run"), Some("ERR1"));

        let ena_submission = submission.get_entity("submission", "sub-1").unwrap();
        assert_eq!(ena_submission.get_accession("ENA_Submission"), Some("ERA1"));
        assert!(ena_submission.get_linked_indexes("study").contains("T1"));
        assert!(ena_submission.get_linked_indexes("sample").contains("S1"));
        assert!(run.get_linked_indexes("submission").contains("sub-1"));
    }

    #[test]
    fn test_failed_receipt_applies_no_accessions() {
        let mut submission = graph();
        let receipt = r#"<RECEIPT success="false">
  <SAMPLE alias="S1" status="PRIVATE"/>
  <MESSAGES>
    <ERROR>In sample, alias:"S1", accession:"". Sample failed checklist validation.</ERROR>
  </MESSAGES>
</RECEIPT>"#;
        EnaResponseConverter
            .convert_response(&mut submission, receipt)
            .unwrap();

        let sample = submission.get_entity("sample", "S1").unwrap();
        assert_eq!(sample.get_accession("ENA_Sample"), None);
        assert_eq!(
            sample.get_errors()["sample_ena_sample_accession"],
            vec!["Sample failed checklist validation.".to_string()]
        );
        assert!(submission.find_entity("submission", "sub-1").is_none());
    }

    #[test]
    fn test_alias_promoted_from_accession_resolves() {
        let mut submission = ExcelSubmission::default();
        submission
            .map_row(
                1,
                "sample",
                [("sample_accession".to_string(), "SAME1".to_string())]
                    .into_iter()
                    .collect(),
            )
            .unwrap();
        let receipt = r#"<RECEIPT success="true">
  <SAMPLE accession="SAME1" alias="original-alias"/>
  <SUBMISSION accession="ERA1" alias="sub-1"/>
</RECEIPT>"#;
        EnaResponseConverter
            .convert_response(&mut submission, receipt)
            .unwrap();

        let sample = submission.get_entity("sample", "SAME1").unwrap();
        assert_eq!(sample.get_accession("ENA_Sample"), Some("SAME1"));
    }

    #[test]
    fn test_escaped_error_text_is_decoded() {
        let mut submission = graph();
        let receipt = r#"<RECEIPT success="false">
  <MESSAGES>
    <ERROR>In sample, alias:"S1", accession:"". Collection date &amp; location required.</ERROR>
  </MESSAGES>
</RECEIPT>"#;
        EnaResponseConverter
            .convert_response(&mut submission, receipt)
            .unwrap();

        let sample = submission.get_entity("sample", "S1").unwrap();
        assert_eq!(
            sample.get_errors()["sample_ena_sample_accession"],
            vec!["Collection date & location required.".to_string()]
        );
    }

    #[test]
    fn test_receipt_for_empty_graph_still_maps_submission() {
        let mut submission = ExcelSubmission::default();
        let receipt = r#"<RECEIPT success="true">
  <SUBMISSION accession="ERA1" alias="sub-1"/>
</RECEIPT>"#;
        EnaResponseConverter
            .convert_response(&mut submission, receipt)
            .unwrap();

        let ena_submission = submission.get_entity("submission", "sub-1").unwrap();
        assert_eq!(ena_submission.get_accession("ENA_Submission"), Some("ERA1"));
    }

    #[test]
    fn test_unparsable_error_lines_aggregate() {
        let mut submission = graph();
        let receipt = r#"<RECEIPT success="false">
  <MESSAGES>
    <ERROR>Something went wrong internally.</ERROR>
    <ERROR>Submission rejected.</ERROR>
  </MESSAGES>
</RECEIPT>"#;
        let result = EnaResponseConverter.convert_response(&mut submission, receipt);
        assert!(matches!(result, Err(ResponseError::Ena(message))
            if message == "Something went wrong internally. Submission rejected."));
    }
}
