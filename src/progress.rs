// src/progress.rs
/// Lightweight progress reporting used by long-running stages (discovery, fetch, normalize).
/// Frontends implement this to surface status to users. Always driven from
/// the coordinating thread, never from fetch workers.
pub trait Progress {
    /// Called at the start of a stage with the number of items (if known).
    fn begin(&mut self, _stage: &str, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// One item of the current stage completed (an entity, schedule or contest id).
    fn item_done(&mut self, _id: &str) {}

    fn item_failed(&mut self, _id: &str, _reason: &str) {}

    /// Called at the end of a stage, successful or not.
    fn finish(&mut self) {}
}

/// Counts calls; handy for tests and for a final tally.
#[derive(Debug, Default)]
pub struct Tally {
    pub stages: Vec<(String, usize)>,
    pub done: usize,
    pub failed: usize,
}

impl Progress for Tally {
    fn begin(&mut self, stage: &str, total: usize) {
        self.stages.push((s!(stage), total));
    }
    fn item_done(&mut self, _id: &str) {
        self.done += 1;
    }
    fn item_failed(&mut self, _id: &str, _reason: &str) {
        self.failed += 1;
    }
}
