//! ENA run converter.
//!
//! A run is the file-bearing half of a run-experiment entity: it references
//! the experiment object and carries the uploaded files in a `DATA_BLOCK`.

use crate::conversion::ena::base::{
    append_attribute_block, file_type, link_reference, uploaded_files, ConversionError,
    EnaConverter, XmlElement,
};
use crate::conversion::ena::experiment::EXPERIMENT_ACCESSION_PRIORITY;
use crate::mapping::MapSpec;
use crate::submission::entity::Entity;

pub const RUN_ACCESSION_PRIORITY: [&str; 1] = ["ENA_Run"];

const EXCLUDED: [&str; 12] = [
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
];

pub struct EnaRunConverter;

impl EnaRunConverter {
    pub fn convert_run(
        &self,
        run: &Entity,
        experiment: &Entity,
    ) -> Result<XmlElement, ConversionError> {
        let spec = MapSpec::node(vec![
            ("@center_name", MapSpec::attr("center_name")),
            ("TITLE", MapSpec::attr("experiment_name")),
            (
                "EXPERIMENT_REF",
                link_reference(experiment, &EXPERIMENT_ACCESSION_PRIORITY),
            ),
        ]);
        self.convert_with_spec(run, spec)
    }
}

impl EnaConverter for EnaRunConverter {
    fn ena_type(&self) -> &'static str {
        "RUN"
    }

    fn accession_priority(&self) -> &'static [&'static str] {
        &RUN_ACCESSION_PRIORITY
    }

    fn spec(&self) -> MapSpec {
        // The experiment reference needs a resolved link; see convert_run.
        MapSpec::Node(Vec::new())
    }

    fn excluded_attributes(&self) -> &'static [&'static str] {
        &EXCLUDED
    }

    fn post_process(&self, entity: &Entity, element: &mut XmlElement) {
        let mut files = XmlElement::new("FILES");
        for (file_name, checksum) in uploaded_files(entity) {
            let mut file = XmlElement::new("FILE");
            file.set_attribute("filename", file_name.clone());
            if let Some(file_type) = file_type(&file_name) {
                file.set_attribute("filetype", file_type);
            }
            file.set_attribute("checksum_method", "MD5");
            file.set_attribute("checksum", checksum.unwrap_or_else(|| "0".to_string()));
            files.add_child(file);
        }
        let mut data_block = XmlElement::new("DATA_BLOCK");
        data_block.add_child(files);
        element.add_child(data_block);

        append_attribute_block(
            entity,
            element,
            "RUN_ATTRIBUTES",
            "RUN_ATTRIBUTE",
            self.excluded_attributes(),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_run_conversion_with_files() {
        let attributes: HashMap<String, String> = [
            ("experiment_name", "seq run 1"),
            ("uploaded_file_1", "r1.fastq.gz"),
            ("uploaded_file_1_checksum", "d41d8cd9"),
            ("uploaded_file_2", "r2.fastq.gz"),
        ]
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
        let run = Entity::new("run_experiment", "R1", attributes);
        let mut experiment = Entity::new("run_experiment", "R1", HashMap::new());
        experiment.add_accession("ENA_Experiment", "ERX1");

        let element = EnaRunConverter.convert_run(&run, &experiment).unwrap();
        assert_eq!(element.name, "RUN");
        let reference = element.descendants_named("EXPERIMENT_REF");
        assert_eq!(reference[0].attribute("accession"), Some("ERX1"));

        let files = element.descendants_named("FILE");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].attribute("filename"), Some("r1.fastq.gz"));
        assert_eq!(files[0].attribute("filetype"), Some("fastq"));
        assert_eq!(files[0].attribute("checksum"), Some("d41d8cd9"));
        assert_eq!(files[1].attribute("checksum"), Some("0"));
    }
}
