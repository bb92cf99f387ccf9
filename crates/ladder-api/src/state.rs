use ladder_core::Config;
use ladder_processing::Pipeline;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(config: Config, pipeline: Pipeline) -> Self {
        Self { config, pipeline }
    }
}
