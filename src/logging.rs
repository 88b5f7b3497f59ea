use crate::debsnap::config::ENV_LOG;
use env_logger::{Builder, Env};

/// Level comes from `DEBSNAP_LOG` (env_logger syntax), default `info`.
pub fn init() {
    Builder::from_env(Env::new().filter_or(ENV_LOG, "info"))
        .format_timestamp_millis()
        .init();
}
