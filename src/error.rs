use std::time::Duration;
use thiserror::Error;

/// Errors that abort a pipeline refresh.
///
/// A missing app token is deliberately absent here: it only downgrades the
/// client to anonymous access and is logged as a warning at startup. An
/// empty matching set is a valid result, not an error.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("request to data service failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    #[error("count query returned an unusable value: {0}")]
    BadCount(String),

    #[error("record {row}: required field `{field}` is missing")]
    SchemaMismatch { row: usize, field: &'static str },

    #[error("record {row}: field `{field}` value {value:?} is not {expected}")]
    DataType {
        row: usize,
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid service URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
