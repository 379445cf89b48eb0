//! Whole-graph conversion into the ENA submission file set.
//!
//! Walks the entity graph once per targeted ENA object type, collects the
//! converted nodes into `<TYPE_SET>` documents, and builds the `SUBMISSION`
//! action document that tells the archive whether this run is a first-time
//! ADD or a MODIFY of previously accessioned objects.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use log::warn;

use crate::conversion::ena::base::{ConversionError, EnaConverter, XmlElement};
use crate::conversion::ena::experiment::EnaExperimentConverter;
use crate::conversion::ena::project::EnaProjectConverter;
use crate::conversion::ena::run::EnaRunConverter;
use crate::conversion::ena::sample::EnaSampleConverter;
use crate::conversion::ena::study::EnaStudyConverter;
use crate::submission::entity::{Entity, EntityIdentifier};
use crate::submission::graph::Submission;

/// The ENA object namespaces a run may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnaTarget {
    Project,
    Study,
    Sample,
    Experiment,
    Run,
}

impl EnaTarget {
    /// The service name accessions are recorded under for this namespace.
    pub fn service(&self) -> &'static str {
        match self {
            EnaTarget::Project => "ENA_Project",
            EnaTarget::Study => "ENA_Study",
            EnaTarget::Sample => "ENA_Sample",
            EnaTarget::Experiment => "ENA_Experiment",
            EnaTarget::Run => "ENA_Run",
        }
    }

    /// The graph entity type this namespace is fed from.
    pub fn entity_type(&self) -> &'static str {
        match self {
            EnaTarget::Project | EnaTarget::Study => "study",
            EnaTarget::Sample => "sample",
            EnaTarget::Experiment | EnaTarget::Run => "run_experiment",
        }
    }
}

pub struct EnaSubmissionConverter {
    targets: Vec<EnaTarget>,
}

impl Default for EnaSubmissionConverter {
    fn default() -> Self {
        Self::new(vec![
            EnaTarget::Project,
            EnaTarget::Sample,
            EnaTarget::Experiment,
            EnaTarget::Run,
        ])
    }
}

impl EnaSubmissionConverter {
    pub fn new(targets: Vec<EnaTarget>) -> Self {
        // Project and Study are two encodings of the same entities; a run
        // submits to one namespace or the other, never both.
        let targets = if targets.contains(&EnaTarget::Project) {
            targets
                .into_iter()
                .filter(|target| *target != EnaTarget::Study)
                .collect()
        } else {
            targets
        };
        Self { targets }
    }

    /// Converts every targeted entity and returns one XML document per ENA
    /// object type that produced at least one node, keyed by file name.
    ///
    /// Entities whose conversion is structurally impossible (an experiment
    /// with no linked sample or study) are skipped and the failure is
    /// recorded on the entity; no partial payload is emitted for them.
    pub fn ena_files(
        &self,
        submission: &mut Submission,
    ) -> Result<BTreeMap<String, String>, ConversionError> {
        let mut files = BTreeMap::new();
        for target in &self.targets {
            let identifiers: Vec<EntityIdentifier> = submission
                .get_entities(target.entity_type())
                .map(|entity| entity.identifier().clone())
                .collect();
            let mut set = XmlElement::new(format!("{}_SET", ena_root(*target)));
            for identifier in identifiers {
                if let Some(node) = self.convert_one(submission, *target, &identifier)? {
                    set.add_child(node);
                }
            }
            if !set.children.is_empty() {
                let file_name = format!("{}.xml", ena_root(*target));
                files.insert(file_name, set.to_document()?);
            }
        }
        Ok(files)
    }

    fn convert_one(
        &self,
        submission: &mut Submission,
        target: EnaTarget,
        identifier: &EntityIdentifier,
    ) -> Result<Option<XmlElement>, ConversionError> {
        match target {
            EnaTarget::Project => {
                let entity = submission.entity_mut(identifier)?.clone();
                EnaProjectConverter.convert(&entity).map(Some)
            }
            EnaTarget::Study => {
                let entity = submission.entity_mut(identifier)?.clone();
                EnaStudyConverter.convert(&entity).map(Some)
            }
            EnaTarget::Sample => {
                let entity = submission.entity_mut(identifier)?.clone();
                EnaSampleConverter.convert(&entity).map(Some)
            }
            EnaTarget::Experiment => convert_experiment(submission, identifier),
            EnaTarget::Run => {
                let entity = submission.entity_mut(identifier)?.clone();
                // The run references the experiment object sharing its alias.
                EnaRunConverter.convert_run(&entity, &entity).map(Some)
            }
        }
    }

    /// Builds the `SUBMISSION` action document for this run: ADD when no
    /// ENA accession exists yet anywhere in the graph, MODIFY otherwise,
    /// plus a HOLD action when a study requests a future release date.
    pub fn actions_document(&self, submission: &Submission, alias: &str) -> XmlElement {
        let mut root = XmlElement::new("SUBMISSION");
        root.set_attribute("alias", alias);
        let mut actions = XmlElement::new("ACTIONS");

        let resubmission = submission
            .get_all_accessions()
            .keys()
            .any(|service| service.starts_with("ENA"));
        let mut action = XmlElement::new("ACTION");
        action.add_child(XmlElement::new(if resubmission { "MODIFY" } else { "ADD" }));
        actions.add_child(action);

        if let Some(release_date) = get_release_date(submission) {
            let mut hold = XmlElement::new("HOLD");
            hold.set_attribute("HoldUntilDate", release_date.format("%Y-%m-%d").to_string());
            let mut action = XmlElement::new("ACTION");
            action.add_child(hold);
            actions.add_child(action);
        }
        root.add_child(actions);
        root
    }
}

fn ena_root(target: EnaTarget) -> &'static str {
    match target {
        EnaTarget::Project => "PROJECT",
        EnaTarget::Study => "STUDY",
        EnaTarget::Sample => "SAMPLE",
        EnaTarget::Experiment => "EXPERIMENT",
        EnaTarget::Run => "RUN",
    }
}

/// Resolves the single sample and study an experiment references, recording
/// cardinality problems on the experiment.
///
/// Zero linked entities of either type is fatal for this record: the error
/// is recorded and no node is emitted. More than one is a recorded warning
/// and the first-inserted entity wins.
fn convert_experiment(
    submission: &mut Submission,
    identifier: &EntityIdentifier,
) -> Result<Option<XmlElement>, ConversionError> {
    let experiment = submission.entity_mut(identifier)?.clone();
    let samples: Vec<Entity> = submission
        .get_linked_entities(&experiment, "sample")?
        .into_iter()
        .cloned()
        .collect();
    let studies: Vec<Entity> = submission
        .get_linked_entities(&experiment, "study")?
        .into_iter()
        .cloned()
        .collect();

    let error_key = "run_experiment_ena_experiment_accession";
    if samples.is_empty() || studies.is_empty() {
        let entity = submission.entity_mut(identifier)?;
        if samples.is_empty() {
            entity.add_error(error_key, "No Linked Sample");
        }
        if studies.is_empty() {
            entity.add_error(error_key, "No Linked Study");
        }
        warn!(
            "Skipping ENA experiment conversion of {}: missing links",
            identifier.index
        );
        return Ok(None);
    }

    let sample = &samples[0];
    let study = &studies[0];
    if samples.len() > 1 || studies.len() > 1 {
        let entity = submission.entity_mut(identifier)?;
        // ENA only supports linking one study and sample to an experiment.
        if samples.len() > 1 {
            entity.add_error(
                error_key,
                format!(
                    "More than one Sample Linked, using first: {}",
                    sample.identifier().index
                ),
            );
        }
        if studies.len() > 1 {
            entity.add_error(
                error_key,
                format!(
                    "More than one Study Linked, using first: {}",
                    study.identifier().index
                ),
            );
        }
    }
    EnaExperimentConverter
        .convert_experiment(&experiment, sample, study)
        .map(Some)
}

/// The latest future release date requested by any study, if one exists.
pub fn get_release_date(submission: &Submission) -> Option<NaiveDate> {
    let today = Local::now().date_naive();
    for study in submission.get_entities("study") {
        if let Some(value) = study.attributes.get("release_date") {
            if let Ok(release_date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                if release_date > today {
                    return Some(release_date);
                }
            }
        }
    }
    None
}
