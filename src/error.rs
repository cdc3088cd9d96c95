use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which part of the query round trip produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Compile,
    Request,
    Decode,
}

#[derive(Error, Debug)]
pub enum Error {
    /// The group-by interval could not be parsed as a duration
    #[error("invalid group by interval: {0:?}")]
    DurationParse(String),

    /// A top/bottom-k parameter was neither an integer nor an integer string
    #[error("invalid filter parameter: {0}")]
    ParamParse(String),

    /// A panel failed to compile, which aborts the whole batch
    #[error("panel {ref_id}: {source}")]
    Panel {
        ref_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid query request: {0}")]
    InvalidRequest(String),

    #[error("request failed status: {status}")]
    BackendRequest { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    ResponseDecode(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("query cancelled")]
    Cancelled,

    #[error("query timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::Config,
            Self::DurationParse(_)
            | Self::ParamParse(_)
            | Self::Panel { .. }
            | Self::InvalidRequest(_) => Stage::Compile,
            Self::BackendRequest { .. }
            | Self::Transport(_)
            | Self::Cancelled
            | Self::Timeout(_) => Stage::Request,
            Self::ResponseDecode(_) => Stage::Decode,
        }
    }

    /// The panel whose compilation failed, if this error concerns one panel.
    pub fn ref_id(&self) -> Option<&str> {
        match self {
            Self::Panel { ref_id, .. } => Some(ref_id),
            _ => None,
        }
    }

    pub(crate) fn in_panel(self, ref_id: &str) -> Self {
        Self::Panel {
            ref_id: ref_id.to_string(),
            source: Box::new(self),
        }
    }
}
