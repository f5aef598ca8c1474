use thiserror::Error;

/// Failure reported by a media engine backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine could not build the pipeline: {0}")]
    Construction(String),
    #[error("engine refused state change to {0}")]
    StateChange(String),
    #[error("engine did not expose a message bus")]
    Bus,
    #[error("failed to push buffer: {0}")]
    Flow(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum RendererError {
    /// The stage graph could not be built. This is a configuration defect; the
    /// host has to fix its stage names, retrying will not help.
    #[error("failed to construct video pipeline \"{launch}\": {source}")]
    Construction {
        launch: String,
        #[source]
        source: EngineError,
    },
    #[error("failed to get element with name='{0}' from the video pipeline")]
    MissingStage(&'static str),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("a video renderer is already live")]
    AlreadyInitialized,
    #[error("video renderer is not initialized")]
    NotInitialized,
    #[error("video renderer has not been started")]
    NotStarted,
    #[error("video pipeline reached NULL; a new renderer is required")]
    Terminated,
}
