use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Transcription backend misconfigured: {0}")]
    Misconfiguration(String),

    #[error("Subtitle download failed: {0}")]
    SubtitleContent(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<SummaryError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SummaryError {
    /// Prefix the error with the pipeline stage that produced it.
    pub fn in_stage(self, stage: &'static str) -> Self {
        SummaryError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The innermost error, with stage prefixes stripped.
    pub fn root(&self) -> &SummaryError {
        match self {
            SummaryError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach a stage prefix to the error side of a `Result`.
pub trait StageExt<T> {
    fn stage(self, stage: &'static str) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: &'static str) -> Result<T> {
        self.map_err(|e| e.in_stage(stage))
    }
}

pub type Result<T> = std::result::Result<T, SummaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_prefix_in_message() {
        let err = SummaryError::Transcription("boom".to_string()).in_stage("transcription");
        assert_eq!(err.to_string(), "transcription: Transcription failed: boom");
    }

    #[test]
    fn test_root_unwraps_nested_stages() {
        let err = SummaryError::Misconfiguration("bad".to_string())
            .in_stage("transcription")
            .in_stage("audio");
        assert!(matches!(err.root(), SummaryError::Misconfiguration(_)));
    }
}
