//! ENA experiment converter.
//!
//! An experiment references exactly one sample and one study, so the spec is
//! rebuilt per entity with the link references injected and with one of the
//! two mutually exclusive library-layout sub-trees selected by the
//! paired-fastq rule.

use crate::conversion::ena::base::{
    append_attribute_block, link_reference, ConversionError, EnaConverter, XmlElement,
};
use crate::conversion::ena::project::STUDY_ACCESSION_PRIORITY;
use crate::conversion::ena::sample::SAMPLE_ACCESSION_PRIORITY;
use crate::mapping::MapSpec;
use crate::submission::entity::Entity;

pub const EXPERIMENT_ACCESSION_PRIORITY: [&str; 2] = ["ENA_Experiment", "ENA"];

const EXCLUDED: [&str; 14] = [
    "experiment_accession",
    "center_name",
    "experiment_name",
    "library_name",
    "library_strategy",
    "library_source",
    "library_selection",
    "insert_size",
    "sequencing_platform",
    "sequencing_instrument",
    "uploaded_file_1",
    "uploaded_file_2",
    "uploaded_file_1_checksum",
    "uploaded_file_2_checksum",
];

pub struct EnaExperimentConverter;

impl EnaExperimentConverter {
    /// Converts an experiment with its resolved sample and study links.
    pub fn convert_experiment(
        &self,
        experiment: &Entity,
        sample: &Entity,
        study: &Entity,
    ) -> Result<XmlElement, ConversionError> {
        let layout = if is_paired_fastq(experiment) {
            ("PAIRED", MapSpec::node(vec![
                ("NOMINAL_LENGTH", MapSpec::attr("insert_size")),
            ]))
        } else {
            ("SINGLE", MapSpec::Node(Vec::new()))
        };

        let mut spec = MapSpec::node(vec![
            ("@center_name", MapSpec::attr("center_name")),
            ("TITLE", MapSpec::attr("experiment_name")),
            ("STUDY_REF", link_reference(study, &STUDY_ACCESSION_PRIORITY)),
            (
                "DESIGN",
                MapSpec::node(vec![
                    ("DESIGN_DESCRIPTION", MapSpec::attr("experiment_name")),
                    (
                        "SAMPLE_DESCRIPTOR",
                        link_reference(sample, &SAMPLE_ACCESSION_PRIORITY),
                    ),
                    (
                        "LIBRARY_DESCRIPTOR",
                        MapSpec::node(vec![
                            ("LIBRARY_NAME", MapSpec::attr("library_name")),
                            ("LIBRARY_STRATEGY", MapSpec::attr("library_strategy")),
                            ("LIBRARY_SOURCE", MapSpec::attr("library_source")),
                            ("LIBRARY_SELECTION", MapSpec::attr("library_selection")),
                            ("LIBRARY_LAYOUT", MapSpec::node(vec![layout])),
                        ]),
                    ),
                ]),
            ),
        ]);
        if let Some(platform) = experiment.attributes.get("sequencing_platform") {
            spec.push_child(
                "PLATFORM",
                MapSpec::node(vec![(
                    platform.clone(),
                    MapSpec::node(vec![(
                        "INSTRUMENT_MODEL",
                        MapSpec::attr("sequencing_instrument"),
                    )]),
                )]),
            );
        }
        self.convert_with_spec(experiment, spec)
    }
}

impl EnaConverter for EnaExperimentConverter {
    fn ena_type(&self) -> &'static str {
        "EXPERIMENT"
    }

    fn accession_priority(&self) -> &'static [&'static str] {
        &EXPERIMENT_ACCESSION_PRIORITY
    }

    fn spec(&self) -> MapSpec {
        // The full spec depends on resolved links; see convert_experiment.
        MapSpec::Node(Vec::new())
    }

    fn excluded_attributes(&self) -> &'static [&'static str] {
        &EXCLUDED
    }

    fn post_process(&self, entity: &Entity, element: &mut XmlElement) {
        append_attribute_block(
            entity,
            element,
            "EXPERIMENT_ATTRIBUTES",
            "EXPERIMENT_ATTRIBUTE",
            self.excluded_attributes(),
        );
    }
}

/// A run-experiment is paired if and only if it has an `insert_size`, a
/// second uploaded file, and both uploaded file names contain "fastq"
/// (case-insensitive).
pub fn is_paired_fastq(experiment: &Entity) -> bool {
    experiment.attributes.contains_key("insert_size")
        && experiment
            .attributes
            .get("uploaded_file_1")
            .is_some_and(|file| contains_fastq(file))
        && experiment
            .attributes
            .get("uploaded_file_2")
            .is_some_and(|file| contains_fastq(file))
}

fn contains_fastq(file_name: &str) -> bool {
    file_name.to_lowercase().contains("fastq")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn experiment(pairs: &[(&str, &str)]) -> Entity {
        let attributes = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Entity::new("run_experiment", "R1", attributes)
    }

    fn paired_attributes() -> Vec<(&'static str, &'static str)> {
        vec![
            ("insert_size", "300"),
            ("uploaded_file_1", "r1.fastq.gz"),
            ("uploaded_file_2", "r2.FASTQ.gz"),
        ]
    }

    #[test]
    fn test_paired_fastq_detection() {
        assert!(is_paired_fastq(&experiment(&paired_attributes())));

        let mut no_insert = paired_attributes();
        no_insert.retain(|(key, _)| *key != "insert_size");
        assert!(!is_paired_fastq(&experiment(&no_insert)));

        let mut bam = paired_attributes();
        bam[1] = ("uploaded_file_1", "r1.bam");
        assert!(!is_paired_fastq(&experiment(&bam)));

        let mut single = paired_attributes();
        single.retain(|(key, _)| *key != "uploaded_file_2");
        assert!(!is_paired_fastq(&experiment(&single)));
    }

    #[test]
    fn test_paired_layout_and_links() {
        let mut attributes = paired_attributes();
        attributes.extend([
            ("experiment_name", "seq run 1"),
            ("sequencing_platform", "ILLUMINA"),
            ("sequencing_instrument", "Illumina MiSeq"),
        ]);
        let run = experiment(&attributes);
        let mut sample = Entity::new("sample", "S1", HashMap::new());
        sample.add_accession("BioSamples", "SAME1");
        let study = Entity::new("study", "T1", HashMap::new());

        let element = EnaExperimentConverter
            .convert_experiment(&run, &sample, &study)
            .unwrap();
        let study_ref = element.descendants_named("STUDY_REF");
        assert_eq!(study_ref[0].attribute("refname"), Some("T1"));
        let descriptor = element.descendants_named("SAMPLE_DESCRIPTOR");
        assert_eq!(descriptor[0].attribute("accession"), Some("SAME1"));
        assert_eq!(element.descendants_named("PAIRED").len(), 1);
        assert!(element.descendants_named("SINGLE").is_empty());
        let nominal = element.descendants_named("NOMINAL_LENGTH");
        assert_eq!(nominal[0].text.as_deref(), Some("300"));
        let instrument = element.descendants_named("INSTRUMENT_MODEL");
        assert_eq!(instrument[0].text.as_deref(), Some("Illumina MiSeq"));
    }

    #[test]
    fn test_single_layout_without_platform() {
        let run = experiment(&[("uploaded_file_1", "reads.bam")]);
        let sample = Entity::new("sample", "S1", HashMap::new());
        let study = Entity::new("study", "T1", HashMap::new());

        let element = EnaExperimentConverter
            .convert_experiment(&run, &sample, &study)
            .unwrap();
        assert_eq!(element.descendants_named("SINGLE").len(), 1);
        assert!(element.descendants_named("PAIRED").is_empty());
        assert!(element.descendants_named("PLATFORM").is_empty());
    }
}
