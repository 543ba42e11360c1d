use std::convert::TryInto;
use std::time::Duration;

/// Predicts how many work items fit into one cooperative step, so a host can interleave its own frames between steps.
///
/// The estimate starts from a caller-provided guess and is refined from the measured cost of completed items.
pub struct FrameBudget {
    target_step_time_us: u32,
    item_time_estimate_us: u32,
    measured: Option<StepMeasurement>,
}

#[derive(Default)]
struct StepMeasurement {
    total_time: Duration,
    items_completed: u32,
}

impl FrameBudget {
    pub fn new(target_step_time_us: u32, initial_item_time_estimate_us: u32) -> Self {
        Self {
            target_step_time_us,
            item_time_estimate_us: initial_item_time_estimate_us,
            measured: None,
        }
    }

    /// Starts a fresh measurement window.
    pub fn reset_timer(&mut self) {
        self.measured = Some(StepMeasurement::default());
    }

    pub fn complete_item(&mut self, elapsed: Duration) {
        let measured = self.measured.get_or_insert_with(Default::default);
        measured.total_time += elapsed;
        measured.items_completed += 1;
    }

    /// Folds the current measurement window into the per-item estimate. Windows without completed items are ignored.
    pub fn update_estimate(&mut self) {
        let Some(measured) = self.measured.as_ref() else {
            return;
        };
        if measured.items_completed == 0 {
            return;
        }
        let total_us: u32 = measured
            .total_time
            .as_micros()
            .try_into()
            .unwrap_or(u32::MAX);
        self.item_time_estimate_us = total_us / measured.items_completed;
    }

    pub fn item_time_estimate_us(&self) -> u32 {
        self.item_time_estimate_us
    }

    /// Always at least one, so a step makes progress even when a single item overruns the target.
    pub fn items_per_step(&self) -> usize {
        (self.target_step_time_us / self.item_time_estimate_us.max(1)).max(1) as usize
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
