use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Region {region} is missing input files: {}", missing.join(", "))]
    MissingInputFiles { region: String, missing: Vec<String> },
    #[error("No region could be processed")]
    NoProcessableRegion,
    #[error("Invalid service date: {0}")]
    InvalidDate(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
