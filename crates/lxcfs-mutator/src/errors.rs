use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("couldn't get version/kind; json parse error: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Object 'apiVersion' and 'kind' must be set in {0}")]
    MissingTypeMeta(String),

    #[error("no kind \"{kind}\" is registered for version \"{api_version}\"")]
    NotRegistered { api_version: String, kind: String },

    #[error("cannot decode {kind}: {source}")]
    Schema {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum InjectionTableError {
    #[error("cannot read injection table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse injection table: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("injection table must hold at least one entry")]
    Empty,

    #[error("injection table entry #{index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },

    #[error("injection table lists \"{0}\" more than once")]
    DuplicateName(String),
}
