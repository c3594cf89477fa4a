//! Progress reporting collaborator.
//!
//! The scheduler calls these from multiple worker threads, so
//! implementations need interior mutability. `update` is monotonic per
//! worker; across workers only the scheduler's atomic counter is.

/// Sink for tiling progress and diagnostics.
pub trait Progress: Send + Sync {
    fn init(&self, total: usize);
    fn update(&self, current: usize, total: usize);
    fn complete(&self);
    fn log(&self, msg: &str);
    fn warn(&self, msg: &str);
}

/// Progress sink that forwards everything to the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn init(&self, total: usize) {
        log::info!("tiling {} tiles", total);
    }

    fn update(&self, current: usize, total: usize) {
        log::debug!("tile {}/{}", current, total);
    }

    fn complete(&self) {
        log::info!("tiling complete");
    }

    fn log(&self, msg: &str) {
        log::debug!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        log::warn!("{}", msg);
    }
}
