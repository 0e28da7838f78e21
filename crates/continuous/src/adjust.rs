//! Back-adjustment of spliced series.
//!
//! Removes the artificial price jumps at roll boundaries. The adjuster never
//! mutates its input; it returns new bars plus an audit recording the
//! cumulative factor or offset in force at every roll.

use contfut_core::{
    AdjustmentAudit, AdjustmentConfig, AdjustmentDirection, AdjustmentMethod, AuditEntry, ContinuousBar, Error,
    Result, RollEvent,
};
use tracing::debug;

use crate::splice::SplicedSeries;

/// Adjusted bars with their provenance.
#[derive(Debug, Clone)]
pub struct AdjustedSeries {
    pub bars: Vec<ContinuousBar>,
    pub audit: AdjustmentAudit,
}

/// Price adjuster.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceAdjuster {
    config: AdjustmentConfig,
}

impl PriceAdjuster {
    /// Create an adjuster.
    pub fn new(config: AdjustmentConfig) -> Self {
        Self { config }
    }

    /// Per-roll step: the jump the roll introduced.
    fn step(&self, event: &RollEvent) -> Result<f64> {
        match self.config.method {
            AdjustmentMethod::None => Ok(AdjustmentMethod::None.identity()),
            AdjustmentMethod::Additive => Ok(event.difference),
            AdjustmentMethod::Ratio => event.ratio.ok_or_else(|| {
                if event.outgoing_close <= 0.0 || event.outgoing_close.is_nan() {
                    Error::invalid_adjustment(event.outgoing.clone(), event.date, event.outgoing_close)
                } else {
                    Error::invalid_adjustment(event.incoming.clone(), event.date, event.incoming_price)
                }
            }),
        }
    }

    /// Fold a step into a cumulative adjustment, inverting it for forward direction.
    fn accumulate(&self, cumulative: f64, step: f64) -> f64 {
        match (self.config.method, self.config.direction) {
            (AdjustmentMethod::None, _) => cumulative,
            (AdjustmentMethod::Ratio, AdjustmentDirection::Backward) => cumulative * step,
            (AdjustmentMethod::Ratio, AdjustmentDirection::Forward) => cumulative / step,
            (AdjustmentMethod::Additive, AdjustmentDirection::Backward) => cumulative + step,
            (AdjustmentMethod::Additive, AdjustmentDirection::Forward) => cumulative - step,
        }
    }

    /// Build the audit for a chronological list of roll events.
    pub fn audit(&self, events: &[RollEvent]) -> Result<AdjustmentAudit> {
        let steps = events.iter().map(|e| self.step(e)).collect::<Result<Vec<_>>>()?;
        let identity = self.config.method.identity();
        let mut cumulative = vec![identity; events.len()];

        match self.config.direction {
            AdjustmentDirection::Backward => {
                let mut acc = identity;
                for (i, step) in steps.iter().enumerate().rev() {
                    acc = self.accumulate(acc, *step);
                    cumulative[i] = acc;
                }
            }
            AdjustmentDirection::Forward => {
                let mut acc = identity;
                for (i, step) in steps.iter().enumerate() {
                    acc = self.accumulate(acc, *step);
                    cumulative[i] = acc;
                }
            }
        }

        Ok(AdjustmentAudit {
            method: self.config.method,
            direction: self.config.direction,
            reference: self.config.reference,
            entries: events
                .iter()
                .cloned()
                .zip(cumulative)
                .map(|(event, cumulative)| AuditEntry { event, cumulative })
                .collect(),
        })
    }

    /// Adjust a spliced series.
    pub fn adjust(&self, spliced: &SplicedSeries) -> Result<AdjustedSeries> {
        let audit = self.audit(&spliced.roll_events)?;
        let method = audit.method;

        let bars = spliced
            .bars
            .iter()
            .zip(&spliced.dates)
            .map(|(bar, &date)| {
                let mut adjusted = bar.clone();
                if method != AdjustmentMethod::None {
                    let cumulative = audit.adjustment_on(date);
                    adjusted.open = method.apply(bar.open, cumulative);
                    adjusted.high = method.apply(bar.high, cumulative);
                    adjusted.low = method.apply(bar.low, cumulative);
                    adjusted.close = method.apply(bar.close, cumulative);
                    adjusted.adjustment = Some(cumulative);
                }
                adjusted
            })
            .collect();

        debug!(
            tenor = spliced.tenor,
            method = ?method,
            direction = ?audit.direction,
            rolls = audit.entries.len(),
            "series adjusted"
        );
        Ok(AdjustedSeries { bars, audit })
    }
}
