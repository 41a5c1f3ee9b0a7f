use thiserror::Error;

/// Caller-misuse errors raised synchronously by the scheduler API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Job with id \"{id}\" already exists")]
    DuplicateJob { id: String },

    #[error("Job \"{id}\" not found")]
    JobNotFound { id: String },

    #[error("Invalid job descriptor{}: {reason}", fmt_id(.id))]
    InvalidDescriptor { id: Option<String>, reason: String },
}

fn fmt_id(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" \"{}\"", id),
        None => String::new(),
    }
}

impl SchedulerError {
    pub fn invalid(id: Option<&str>, reason: impl Into<String>) -> Self {
        SchedulerError::InvalidDescriptor {
            id: id.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// The job id the error refers to, when there is one.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            SchedulerError::DuplicateJob { id } | SchedulerError::JobNotFound { id } => Some(id),
            SchedulerError::InvalidDescriptor { id, .. } => id.as_deref(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
