use crate::config::Config;
use crate::streamer::VideoStreamer;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub streamer: VideoStreamer,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(streamer: VideoStreamer, config: Config) -> Self {
        Self {
            streamer,
            config: Arc::new(config),
        }
    }
}
