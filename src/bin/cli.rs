//! Command-line interface for the submission broker
//!
//! This binary provides a CLI to parse, validate and convert sequencing
//! submissions, including:
//! - Validating parsed rows against JSON schemas and a submission template
//! - Converting entities to ENA XML, ENA manifests and BioStudies JSON
//!
//! # Usage
//!
//! ```bash
//! # Validate parsed rows against a schema directory
//! submission-broker validate --rows rows.json --schemas schemas/
//!
//! # Produce ENA submission XMLs and BioStudies JSON
//! submission-broker convert --rows rows.json --alias covid-sub-1 --output out/
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use submission_broker::{
    clean::{clean_entity_name, clean_name},
    conversion::biostudies::BioStudyConverter,
    conversion::ena::manifest::EnaManifestConverter,
    conversion::ena::submission::EnaSubmissionConverter,
    submission::excel::ExcelSubmission,
    validation::attributes::{AttributeValidator, ValidationMap},
    validation::schema::SchemaValidator,
    validation::validator::Validator,
};

/// `row → entity type → attributes`, as exported by the spreadsheet parser.
type Rows = BTreeMap<u32, BTreeMap<String, HashMap<String, String>>>;

/// Main CLI configuration struct
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Validate parsed rows and report errors by entity
    Validate {
        /// Path to the parsed rows JSON file
        #[arg(short, long)]
        rows: PathBuf,

        /// Directory of JSON schemas, one `<entity_type>.json` per type
        #[arg(short, long)]
        schemas: Option<PathBuf>,

        /// Path to a submission template JSON with per-attribute rules
        #[arg(short, long)]
        template: Option<PathBuf>,
    },
    /// Convert parsed rows into archive submission files
    Convert {
        /// Path to the parsed rows JSON file
        #[arg(short, long)]
        rows: PathBuf,

        /// Submission alias used in the ENA actions document
        #[arg(short, long)]
        alias: String,

        /// Output directory for the generated files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Path to the experiment JSON schema, enables manifest output
        #[arg(short, long)]
        manifest_schema: Option<PathBuf>,
    },
}

/// Main entry point for the CLI application
pub fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Validate {
            rows,
            schemas,
            template,
        } => {
            let mut submission = load_rows(rows);
            if !submission.has_data() {
                println!("{}", "No data imported".yellow());
                return ExitCode::SUCCESS;
            }
            if let Some(schemas) = schemas {
                let validator = SchemaValidator::new(load_schemas(schemas))
                    .expect("Failed to compile schemas");
                validator.validate_data(&mut submission);
            }
            if let Some(template) = template {
                let template_file =
                    File::open(template).expect("Failed to open template file");
                let validation_map: ValidationMap = serde_json::from_reader(template_file)
                    .expect("Failed to parse template file");
                AttributeValidator::new(validation_map).validate_data(&mut submission);
            }
            if submission.has_errors() {
                let errors = submission.get_all_errors();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&errors)
                        .expect("Failed to serialize errors")
                );
                println!("{}", "Validation issues detected".red());
                ExitCode::FAILURE
            } else {
                println!("{}", "No validation issues detected".green());
                ExitCode::SUCCESS
            }
        }
        Commands::Convert {
            rows,
            alias,
            output,
            manifest_schema,
        } => {
            let mut submission = load_rows(rows);
            if !submission.has_data() {
                println!("{}", "No data imported".yellow());
                return ExitCode::SUCCESS;
            }
            fs::create_dir_all(output).expect("Failed to create output directory");

            let converter = EnaSubmissionConverter::default();
            let mut files = converter
                .ena_files(&mut submission)
                .expect("ENA conversion failed");
            let actions = converter
                .actions_document(&submission, alias)
                .to_document()
                .expect("ENA conversion failed");
            files.insert("SUBMISSION.xml".to_string(), actions);

            if let Some(manifest_schema) = manifest_schema {
                let schema_file =
                    File::open(manifest_schema).expect("Failed to open manifest schema");
                let schema: Value = serde_json::from_reader(schema_file)
                    .expect("Failed to parse manifest schema");
                let manifests = EnaManifestConverter::new(&schema)
                    .make_manifests(&submission)
                    .expect("Manifest conversion failed");
                files.extend(manifests);
            }

            for study in submission.get_entities("study") {
                let bio_study = BioStudyConverter::convert(study);
                files.insert(
                    format!("biostudies_{}.json", study.identifier().index),
                    serde_json::to_string_pretty(&bio_study)
                        .expect("Failed to serialize BioStudies submission"),
                );
            }

            for (file_name, content) in &files {
                let file_path = output.join(file_name);
                fs::write(&file_path, content).expect("Failed to write output file");
                println!("Submission file written to: {}", file_path.display());
            }

            if submission.has_errors() {
                let errors = submission.get_all_errors();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&errors)
                        .expect("Failed to serialize errors")
                );
                println!("{}", "Conversion issues detected".red());
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

/// Reads the parsed rows file and maps every row onto the entity graph.
fn load_rows(path: &PathBuf) -> ExcelSubmission {
    let rows_file = File::open(path).expect("Failed to open rows file");
    let rows: Rows = serde_json::from_reader(rows_file).expect("Failed to parse rows file");
    let mut submission = ExcelSubmission::default();
    for (row, entities) in rows {
        for (entity_type, attributes) in entities {
            let attributes = attributes
                .into_iter()
                .map(|(name, value)| (clean_name(&name), value))
                .collect();
            submission
                .map_row(row, &clean_entity_name(&entity_type), attributes)
                .expect("Failed to map row");
        }
    }
    submission
}

/// Loads every `<entity_type>.json` schema in a directory.
fn load_schemas(directory: &PathBuf) -> HashMap<String, Value> {
    let mut schemas = HashMap::new();
    for entry in fs::read_dir(directory).expect("Failed to read schema directory") {
        let path = entry.expect("Failed to read schema directory").path();
        if path.extension().is_some_and(|extension| extension == "json") {
            if let Some(entity_type) = path.file_stem().and_then(|stem| stem.to_str()) {
                let schema_file = File::open(&path).expect("Failed to open schema file");
                let schema: Value =
                    serde_json::from_reader(schema_file).expect("Failed to parse schema file");
                schemas.insert(entity_type.to_string(), schema);
            }
        }
    }
    schemas
}
