//! Flat manifest files for the ENA command-line uploader.
//!
//! One `.manifest` per run-experiment with resolved accessions, tab-separated
//! `KEY\tVALUE` lines in a fixed order. Enum-constrained fields are resolved
//! against the experiment schema's allowed-value lists and degrade to a
//! documented fallback rather than failing, so a manifest can always be
//! produced.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::conversion::ena::base::{file_type, ConversionError};
use crate::conversion::ena::experiment::is_paired_fastq;
use crate::conversion::ena::sample::SAMPLE_ACCESSION_PRIORITY;
use crate::submission::entity::Entity;
use crate::submission::graph::Submission;

const SUBMISSION_TOOL: &str = "drag and drop uploader tool";

/// Converts run-experiments into uploader manifests, using the experiment
/// JSON schema's enum lists to validate constrained fields.
pub struct EnaManifestConverter {
    platforms: Vec<String>,
    instruments: Vec<String>,
    library_sources: Vec<String>,
    library_selections: Vec<String>,
    library_strategies: Vec<String>,
}

impl EnaManifestConverter {
    pub fn new(schema: &Value) -> Self {
        Self {
            platforms: enum_values(schema, "sequencing_platform"),
            instruments: enum_values(schema, "sequencing_instrument"),
            library_sources: enum_values(schema, "library_source"),
            library_selections: enum_values(schema, "library_selection"),
            library_strategies: enum_values(schema, "library_strategy"),
        }
    }

    /// Builds a manifest for every run-experiment with exactly one linked
    /// sample, exactly one linked study, an uploaded file and resolved
    /// accessions for both links. Returns `file name → content`.
    pub fn make_manifests(
        &self,
        submission: &Submission,
    ) -> Result<BTreeMap<String, String>, ConversionError> {
        let mut manifests = BTreeMap::new();
        for run_experiment in submission.get_entities("run_experiment") {
            let samples = submission.get_linked_entities(run_experiment, "sample")?;
            let studies = submission.get_linked_entities(run_experiment, "study")?;
            if samples.len() != 1
                || studies.len() != 1
                || !run_experiment.attributes.contains_key("uploaded_file_1")
            {
                continue;
            }
            let sample_accession = samples[0].get_first_accession(&SAMPLE_ACCESSION_PRIORITY);
            let study_accession = studies[0].get_accession("ENA_Study");
            if let (Some(sample_accession), Some(study_accession)) =
                (sample_accession, study_accession)
            {
                if let Some((file_name, content)) =
                    self.make_manifest(run_experiment, sample_accession, study_accession)
                {
                    manifests.insert(file_name, content);
                }
            }
        }
        Ok(manifests)
    }

    /// One manifest, fields in the fixed uploader order. `None` when the
    /// run-experiment has no uploaded file to declare.
    pub fn make_manifest(
        &self,
        run_experiment: &Entity,
        sample_accession: &str,
        study_accession: &str,
    ) -> Option<(String, String)> {
        let attributes = &run_experiment.attributes;
        let first_file = attributes.get("uploaded_file_1")?;
        let mut lines = vec![
            format!("STUDY\t{study_accession}"),
            format!("SAMPLE\t{sample_accession}"),
            format!("NAME\t{}", run_experiment.identifier().index),
        ];

        if let Some(platform) = self.valid_platform(attributes.get("sequencing_platform")) {
            lines.push(format!("PLATFORM\t{platform}"));
        }
        lines.push(format!(
            "INSTRUMENT\t{}",
            self.valid_instrument(attributes.get("sequencing_instrument"))
        ));

        let paired_fastq = is_paired_fastq(run_experiment);
        if paired_fastq {
            lines.push(format!("INSERT_SIZE\t{}", attributes["insert_size"]));
        }
        if let Some(library_name) = attributes.get("library_name") {
            lines.push(format!("LIBRARY_NAME\t{library_name}"));
        }
        lines.push(format!(
            "LIBRARY_SOURCE\t{}",
            self.valid_library_source(attributes.get("library_source"))
        ));
        lines.push(format!(
            "LIBRARY_SELECTION\t{}",
            self.valid_library_selection(attributes.get("library_selection"))
        ));
        lines.push(format!(
            "LIBRARY_STRATEGY\t{}",
            self.valid_library_strategy(attributes.get("library_strategy"))
        ));
        lines.push(format!("SUBMISSION_TOOL\t{SUBMISSION_TOOL}"));

        let file_key = file_type(first_file).unwrap_or("fastq").to_uppercase();
        lines.push(format!("{file_key}\t{first_file}"));
        let mut manifest_name = first_file.clone();
        if paired_fastq {
            let paired_file = &attributes["uploaded_file_2"];
            lines.push(format!("{file_key}\t{paired_file}"));
            manifest_name.push('.');
            manifest_name.push_str(paired_file);
        }
        manifest_name.push_str(".manifest");
        Some((manifest_name, lines.join("\n")))
    }

    /// Platforms are matched after upper-casing and space folding; an
    /// unrecognized platform is omitted rather than defaulted.
    fn valid_platform(&self, platform: Option<&String>) -> Option<String> {
        let converted = platform?.to_uppercase().replace(' ', "_");
        self.platforms.contains(&converted).then_some(converted)
    }

    fn valid_instrument(&self, instrument: Option<&String>) -> String {
        match instrument {
            Some(instrument) if self.instruments.contains(instrument) => instrument.clone(),
            _ => "unspecified".to_string(),
        }
    }

    fn valid_library_source(&self, library_source: Option<&String>) -> String {
        match library_source {
            Some(source) if self.library_sources.contains(source) => source.clone(),
            _ => "OTHER".to_string(),
        }
    }

    fn valid_library_selection(&self, library_selection: Option<&String>) -> String {
        match library_selection {
            Some(selection) if self.library_selections.contains(selection) => selection.clone(),
            _ => "other".to_string(),
        }
    }

    fn valid_library_strategy(&self, library_strategy: Option<&String>) -> String {
        match library_strategy {
            Some(strategy) if self.library_strategies.contains(strategy) => strategy.clone(),
            _ => "OTHER".to_string(),
        }
    }
}

fn enum_values(schema: &Value, property: &str) -> Vec<String> {
    schema
        .pointer(&format!("/properties/{property}/enum"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
