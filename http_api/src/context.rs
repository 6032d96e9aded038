use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use fork_choice_control::Controller;
use types::config::Config;

#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<Config>,
    pub controller: Arc<Controller>,
    pub syncing: Arc<AtomicBool>,
    pub version: String,
}

impl ApiContext {
    #[must_use]
    pub fn new(config: Arc<Config>, controller: Arc<Controller>) -> Self {
        Self {
            config,
            controller,
            syncing: Arc::new(AtomicBool::new(false)),
            version: concat!("lantern/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Relaxed)
    }
}
