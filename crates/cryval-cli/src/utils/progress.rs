use cryval::engine::progress::{Progress, ProgressCallback};
use cryval::engine::verdict::RejectionReason;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

const SPINNER_TICK_MS: u64 = 80;

struct DisplayState {
    bar: ProgressBar,
    phase: &'static str,
    rejected: BTreeMap<RejectionReason, usize>,
}

impl DisplayState {
    fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    fn refresh_message(&self) {
        let total = self.rejected_total();
        if total == 0 {
            self.bar.set_message(self.phase);
        } else {
            self.bar
                .set_message(format!("{} ({} rejected)", self.phase, total));
        }
    }

    fn apply(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.phase = name;
                self.bar.reset();
                self.bar.set_length(0);
                self.bar.set_style(spinner_style());
                self.bar
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                self.refresh_message();
            }
            Progress::PhaseFinish => {
                self.bar.disable_steady_tick();
                self.bar.finish_with_message(format!("✓ {}", self.phase));
            }
            Progress::TaskStart { total_steps } => {
                self.bar.disable_steady_tick();
                self.bar.reset();
                self.bar.set_length(total_steps);
                self.bar.set_style(bar_style());
                self.refresh_message();
            }
            Progress::TaskIncrement => self.bar.inc(1),
            Progress::TaskFinish => {
                if let Some(length) = self.bar.length() {
                    self.bar.set_position(length);
                }
                self.bar.finish();
            }
            Progress::StructureRejected { id, reason } => {
                debug!(%id, %reason, "Structure rejected");
                *self.rejected.entry(reason).or_default() += 1;
                self.refresh_message();
            }
            Progress::Message(msg) => {
                if self.bar.is_finished() {
                    self.bar.set_message(msg);
                } else {
                    self.bar.println(format!("  {}", msg));
                }
            }
        }
    }
}

/// Renders workflow progress on stderr and keeps a running tally of rejections.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<DisplayState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(spinner_style());
        bar.finish_and_clear();

        Self {
            state: Arc::new(Mutex::new(DisplayState {
                bar,
                phase: "Initializing",
                rejected: BTreeMap::new(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = Arc::clone(&self.state);
        Box::new(move |progress: Progress| match state.lock() {
            Ok(mut guard) => guard.apply(progress),
            Err(_) => warn!("Progress state mutex was poisoned. Cannot update progress."),
        })
    }

    /// Rejections seen so far, per reason.
    pub fn rejections(&self) -> BTreeMap<RejectionReason, usize> {
        self.state
            .lock()
            .map(|guard| guard.rejected.clone())
            .unwrap_or_default()
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<32} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("##-")
}
