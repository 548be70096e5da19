use log::LevelFilter;

/// Enable info level logging for the tetcollide crate only.
pub fn init_info() {
    env_logger::Builder::new()
        .filter_module("tetcollide", LevelFilter::Info)
        .init();
}

/// Enable debug level logging for the tetcollide crate only.
pub fn init_debug() {
    env_logger::Builder::new()
        .filter_module("tetcollide", LevelFilter::Debug)
        .init();
}
