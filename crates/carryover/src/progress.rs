//! Terminal progress rendering driven by [`TransferEvent`]s.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::orchestrator::{TransferEvent, TransferObserver};

/// Progress bar whose length grows as pages are listed.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Bar drawn on stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Reporter that draws nothing.
    #[must_use]
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(
            Some(0),
            ProgressDrawTarget::hidden(),
        ))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Items processed so far, skipped and failed ones included.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Items listed so far.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    /// Stops drawing and leaves `message` on screen.
    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferObserver for ProgressReporter {
    fn on_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::SessionStarted {
                session_id,
                resumed,
            } => {
                let verb = if *resumed { "Resuming" } else { "Starting" };
                self.bar.set_message(format!("{} {}", verb, session_id));
            }
            TransferEvent::MappingResolved { categories } => {
                self.bar.set_message(format!("{} categories", categories));
            }
            TransferEvent::CategoryStarted {
                category,
                container,
                ..
            } => {
                self.bar.set_message(format!("{} -> {}", category, container));
            }
            TransferEvent::PageListed { items, .. } => {
                self.bar.inc_length(*items as u64);
            }
            TransferEvent::ItemTransferred { .. } | TransferEvent::ItemSkipped { .. } => {
                self.bar.inc(1);
            }
            TransferEvent::ItemFailed {
                item_id, reason, ..
            } => {
                self.bar.inc(1);
                self.bar.println(format!("  failed {}: {}", item_id, reason));
            }
            TransferEvent::CategoryCompleted { .. } => {}
            TransferEvent::CategoryAborted { category, reason } => {
                self.bar
                    .println(format!("  '{}' left incomplete: {}", category, reason));
            }
        }
    }
}
