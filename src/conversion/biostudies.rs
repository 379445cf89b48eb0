//! BioStudies JSON converter.
//!
//! The whole payload is declarative: a study entity's attributes are
//! projected into the BioStudies submission shape (top-level attributes, a
//! `Study` section with an ENA cross-link and an `Author` subsection) and
//! serialized as JSON.

use serde_json::Value;

use crate::mapping::{map_attributes, MapSpec, Mapped};
use crate::submission::entity::Entity;

pub struct BioStudyConverter;

impl BioStudyConverter {
    pub fn convert(study: &Entity) -> Value {
        let spec = bio_study_spec();
        map_attributes(&spec, &study.attributes)
            .unwrap_or(Mapped::Node(Vec::new()))
            .into_json()
    }
}

fn named_value(name: &str, source: &str) -> MapSpec {
    MapSpec::node(vec![
        ("name", MapSpec::literal(name)),
        ("value", MapSpec::attr(source)),
    ])
}

fn bio_study_spec() -> MapSpec {
    MapSpec::node(vec![
        (
            "attributes",
            MapSpec::Repeat(
                vec![
                    named_value("Name", "study_name"),
                    named_value("Release Date", "release_date"),
                ],
                true,
            ),
        ),
        (
            "section",
            MapSpec::node(vec![
                ("accno", MapSpec::literal("PROJECT")),
                ("type", MapSpec::literal("Study")),
                (
                    "attributes",
                    MapSpec::Repeat(
                        vec![
                            named_value("Study alias", "study_alias"),
                            named_value("Name", "study_name"),
                            named_value("Title", "short_description"),
                            named_value("Description", "abstract"),
                        ],
                        true,
                    ),
                ),
                (
                    "links",
                    MapSpec::Repeat(
                        vec![MapSpec::node(vec![
                            ("url", MapSpec::attr("study_accession")),
                            (
                                "attributes",
                                MapSpec::Repeat(
                                    vec![MapSpec::node(vec![
                                        ("name", MapSpec::literal("Type")),
                                        ("value", MapSpec::literal("ENA")),
                                    ])],
                                    false,
                                ),
                            ),
                        ])],
                        true,
                    ),
                ),
                (
                    "subsections",
                    MapSpec::Repeat(
                        vec![MapSpec::node(vec![
                            ("type", MapSpec::literal("Author")),
                            (
                                "attributes",
                                MapSpec::Repeat(
                                    vec![
                                        named_value("Email address", "email_address"),
                                        named_value("Centre name", "center_name"),
                                    ],
                                    true,
                                ),
                            ),
                        ])],
                        true,
                    ),
                ),
            ]),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn study(pairs: &[(&str, &str)]) -> Entity {
        let attributes = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Entity::new("study", "T1", attributes)
    }

    #[test]
    fn test_full_study_payload() {
        let payload = BioStudyConverter::convert(&study(&[
            ("study_alias", "T1"),
            ("study_name", "cohort"),
            ("short_description", "Irish genomes"),
            ("abstract", "Sequencing of positive cases"),
            ("release_date", "2021-06-01"),
            ("study_accession", "PRJEB1"),
            ("email_address", "someone@example.org"),
            ("center_name", "NVRL"),
        ]));

        assert_eq!(
            payload["attributes"],
            json!([
                {"name": "Name", "value": "cohort"},
                {"name": "Release Date", "value": "2021-06-01"}
            ])
        );
        assert_eq!(payload["section"]["accno"], json!("PROJECT"));
        assert_eq!(payload["section"]["type"], json!("Study"));
        assert_eq!(
            payload["section"]["links"],
            json!([{
                "url": "PRJEB1",
                "attributes": [{"name": "Type", "value": "ENA"}]
            }])
        );
        assert_eq!(
            payload["section"]["subsections"][0]["type"],
            json!("Author")
        );
    }

    #[test]
    fn test_missing_attributes_leave_no_placeholders() {
        let payload = BioStudyConverter::convert(&study(&[("study_name", "cohort")]));
        assert_eq!(
            payload["attributes"],
            json!([{"name": "Name", "value": "cohort"}])
        );
        // No accession means no ENA link and no author subsection.
        assert!(payload["section"].get("links").is_none());
        assert!(payload["section"].get("subsections").is_none());
    }
}
