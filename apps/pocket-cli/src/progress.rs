use pocket_core::{SyncPhase, SyncProgress};
use tracing::{debug, info};

/// Renders insert progress as log lines, roughly every tenth of a batch.
#[derive(Debug, Default)]
pub struct LogProgress {
    label: String,
    total: usize,
    done: usize,
    step: usize,
}

impl SyncProgress for LogProgress {
    fn phase(&mut self, phase: SyncPhase) {
        debug!(%phase, "phase");
    }

    fn begin(&mut self, label: &str, total: usize) {
        self.label = label.to_string();
        self.total = total;
        self.done = 0;
        self.step = (total / 10).max(1);
    }

    fn advance(&mut self) {
        self.done += 1;
        if self.done % self.step.max(1) == 0 && self.done < self.total {
            info!("{} {}/{}", self.label, self.done, self.total);
        }
    }

    fn finish(&mut self) {
        info!("{} {}/{} done", self.label, self.done, self.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_reset_per_batch() {
        let mut progress = LogProgress::default();
        progress.begin("tags", 3);
        for _ in 0..3 {
            progress.advance();
        }
        progress.finish();
        assert_eq!(progress.done, 3);

        progress.begin("items", 25);
        progress.advance();
        assert_eq!(progress.done, 1);
        assert_eq!(progress.step, 2);
    }
}
