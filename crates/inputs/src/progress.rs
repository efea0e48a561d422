//! Run-wide progress counter and the per-query shares it is split into.

use conefor_common::EventBus;

/// Share of a query's budget spent on analysis; the rest covers saving
const ANALYSIS_SHARE: f64 = 0.8;

/// Progress accumulator owned by the worker.
///
/// Increments are published on the bus whenever the whole percent changes,
/// so observers see the counter move through the O(n²) loops and not only
/// at the end.
pub struct Progress {
    value: f64,
    bus: EventBus,
    last_emitted: Option<u8>,
}

impl Progress {
    pub fn new(bus: EventBus) -> Self {
        Self {
            value: 0.0,
            bus,
            last_emitted: None,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Back to zero; emitted at the start and end of each run
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.last_emitted = Some(0);
        self.bus.progress(0);
    }

    /// Add `amount` percent, clamped to 100
    pub fn advance(&mut self, amount: f64) {
        if amount <= 0.0 || !amount.is_finite() {
            return;
        }
        self.value = (self.value + amount).min(100.0);
        let percent = self.value.floor() as u8;
        if self.last_emitted == Some(percent) {
            return;
        }
        self.last_emitted = Some(percent);
        self.bus.progress(percent);
    }

    pub fn last_emitted(&self) -> Option<u8> {
        self.last_emitted
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

/// Pre-allocated progress for one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryBudget {
    pub analysis: f64,
    pub save: f64,
}

impl QueryBudget {
    /// Split `total` between analysis and saving
    pub fn split(total: f64) -> Self {
        Self {
            analysis: total * ANALYSIS_SHARE,
            save: total * (1.0 - ANALYSIS_SHARE),
        }
    }

    pub fn total(&self) -> f64 {
        self.analysis + self.save
    }

    /// Analysis increment for each of `steps` outer iterations
    pub fn per_step(&self, steps: usize) -> f64 {
        if steps == 0 {
            0.0
        } else {
            self.analysis / steps as f64
        }
    }
}
