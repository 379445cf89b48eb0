//! ENA sample converter.

use crate::conversion::ena::base::{append_attribute_block, EnaConverter, XmlElement};
use crate::mapping::MapSpec;
use crate::submission::entity::Entity;

pub const SAMPLE_ACCESSION_PRIORITY: [&str; 2] = ["BioSamples", "ENA_Sample"];

const EXCLUDED: [&str; 8] = [
    "sample_accession",
    "sample_alias",
    "center_name",
    "broker_name",
    "sample_title",
    "sample_description",
    "tax_id",
    "scientific_name",
];

pub struct EnaSampleConverter;

impl EnaConverter for EnaSampleConverter {
    fn ena_type(&self) -> &'static str {
        "SAMPLE"
    }

    fn accession_priority(&self) -> &'static [&'static str] {
        &SAMPLE_ACCESSION_PRIORITY
    }

    fn spec(&self) -> MapSpec {
        MapSpec::node(vec![
            ("@center_name", MapSpec::attr("center_name")),
            ("@broker_name", MapSpec::attr("broker_name")),
            ("TITLE", MapSpec::attr("sample_title")),
            (
                "SAMPLE_NAME",
                MapSpec::node(vec![
                    ("TAXON_ID", MapSpec::attr("tax_id")),
                    ("SCIENTIFIC_NAME", MapSpec::attr("scientific_name")),
                    ("COMMON_NAME", MapSpec::attr("common_name")),
                ]),
            ),
            ("DESCRIPTION", MapSpec::attr("sample_description")),
        ])
    }

    fn excluded_attributes(&self) -> &'static [&'static str] {
        &EXCLUDED
    }

    fn post_process(&self, entity: &Entity, element: &mut XmlElement) {
        append_attribute_block(
            entity,
            element,
            "SAMPLE_ATTRIBUTES",
            "SAMPLE_ATTRIBUTE",
            self.excluded_attributes(),
        );
    }
}
