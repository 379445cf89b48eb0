//! Submission Broker Library
//!
//! This library brokers sequencing data submissions to public archives,
//! including:
//! - Building an in-memory graph of studies, samples and sequencing runs
//! - Mapping spreadsheet-style rows onto that graph
//! - Validating entities against JSON schemas, templates and uploads
//! - Converting entities to ENA XML, ENA manifests and BioStudies JSON
//! - Folding archive receipts back into the graph

#![warn(unused_imports)]

pub mod clean;
pub mod mapping;

pub mod submission {
    pub mod entity;
    pub mod excel;
    pub mod graph;
}

pub mod validation {
    pub mod attributes;
    pub mod schema;
    pub mod upload;
    pub mod validator;
}

pub mod conversion {
    pub mod biostudies;

    pub mod ena {
        pub mod base;
        pub mod experiment;
        pub mod manifest;
        pub mod project;
        pub mod response;
        pub mod run;
        pub mod sample;
        pub mod study;
        pub mod submission;
    }
}

/// Commonly used types and functionality re-exported for convenience
pub mod prelude {
    pub use crate::conversion::biostudies::BioStudyConverter;
    pub use crate::conversion::ena::base::{ConversionError, EnaConverter, XmlElement};
    pub use crate::conversion::ena::manifest::EnaManifestConverter;
    pub use crate::conversion::ena::response::{EnaResponseConverter, ResponseError};
    pub use crate::conversion::ena::submission::{EnaSubmissionConverter, EnaTarget};
    pub use crate::mapping::{MapSpec, Mapped};
    pub use crate::submission::entity::{Entity, EntityIdentifier};
    pub use crate::submission::excel::ExcelSubmission;
    pub use crate::submission::graph::{GraphError, HandleCollision, Submission};
    pub use crate::validation::attributes::{AttributeValidator, ValidationMap};
    pub use crate::validation::schema::SchemaValidator;
    pub use crate::validation::upload::UploadValidator;
    pub use crate::validation::validator::Validator;
}
