//! ENA project converter: one `PROJECT` node per study entity.

use crate::conversion::ena::base::EnaConverter;
use crate::mapping::MapSpec;

pub const STUDY_ACCESSION_PRIORITY: [&str; 3] = ["ENA_Study", "ENA_Project", "BioStudies"];

pub struct EnaProjectConverter;

impl EnaConverter for EnaProjectConverter {
    fn ena_type(&self) -> &'static str {
        "PROJECT"
    }

    fn accession_priority(&self) -> &'static [&'static str] {
        &STUDY_ACCESSION_PRIORITY
    }

    fn spec(&self) -> MapSpec {
        MapSpec::node(vec![
            ("@center_name", MapSpec::attr("center_name")),
            ("NAME", MapSpec::attr("study_name")),
            ("TITLE", MapSpec::attr("short_description")),
            ("DESCRIPTION", MapSpec::attr("abstract")),
            (
                "SUBMISSION_PROJECT",
                MapSpec::node(vec![("SEQUENCING_PROJECT", MapSpec::Node(Vec::new()))]),
            ),
        ])
    }

    fn excluded_attributes(&self) -> &'static [&'static str] {
        &[]
    }
}
