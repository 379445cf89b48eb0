//! ENA study converter: the legacy `STUDY` object, kept for brokers that
//! target the study namespace instead of projects.

use crate::conversion::ena::base::{append_attribute_block, EnaConverter, XmlElement};
use crate::conversion::ena::project::STUDY_ACCESSION_PRIORITY;
use crate::mapping::MapSpec;
use crate::submission::entity::Entity;

const EXCLUDED: [&str; 6] = [
    "study_accession",
    "study_alias",
    "center_name",
    "study_name",
    "short_description",
    "abstract",
];

pub struct EnaStudyConverter;

impl EnaConverter for EnaStudyConverter {
    fn ena_type(&self) -> &'static str {
        "STUDY"
    }

    fn accession_priority(&self) -> &'static [&'static str] {
        &STUDY_ACCESSION_PRIORITY
    }

    fn spec(&self) -> MapSpec {
        MapSpec::node(vec![
            ("@center_name", MapSpec::attr("center_name")),
            (
                "DESCRIPTOR",
                MapSpec::node(vec![
                    ("STUDY_TITLE", MapSpec::attr("study_name")),
                    ("STUDY_DESCRIPTION", MapSpec::attr("short_description")),
                    ("STUDY_ABSTRACT", MapSpec::attr("abstract")),
                    ("CENTER_PROJECT_NAME", MapSpec::attr("study_name")),
                ]),
            ),
        ])
    }

    fn excluded_attributes(&self) -> &'static [&'static str] {
        &EXCLUDED
    }

    fn post_process(&self, entity: &Entity, element: &mut XmlElement) {
        append_attribute_block(
            entity,
            element,
            "STUDY_ATTRIBUTES",
            "STUDY_ATTRIBUTE",
            self.excluded_attributes(),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_study_conversion_with_attribute_block() {
        let attributes: HashMap<String, String> = [
            ("study_name", "cohort"),
            ("abstract", "genomes"),
            ("release_date", "2030-01-01"),
        ]
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
        let study = Entity::new("study", "T1", attributes);

        let element = EnaStudyConverter.convert(&study).unwrap();
        assert_eq!(element.name, "STUDY");
        assert_eq!(element.attribute("alias"), Some("T1"));
        assert_eq!(element.attribute("accession"), None);
        let descriptor = &element.children[0];
        assert_eq!(descriptor.name, "DESCRIPTOR");
        assert_eq!(descriptor.children.len(), 3);
        // release_date is not structured, so it lands in the attribute block
        let block = element.descendants_named("STUDY_ATTRIBUTES");
        assert_eq!(block[0].children.len(), 1);
    }
}
