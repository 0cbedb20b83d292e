//! Bus Monitor
//!
//! A stuck bus (shorted, unpowered, or held active by a faulty device) is
//! detected by sampling the line at a steady rate. Once enough samples in a
//! row are bad, the bus is marked bad, and every later transmission fails
//! fast with [`ResultStatus::BusMonitorBad`][crate::ResultStatus] instead of
//! running into timeouts. A single good sample clears the condition.

/// Number of consecutive bad samples before the bus is marked bad
pub const BUS_ERROR_THRESHOLD: u8 = 8;

/// Health of the physical bus
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
pub struct BusHealth {
    counter: u8,
    bad: bool,
}

impl BusHealth {
    /// A fresh, healthy bus
    pub const fn new() -> Self {
        Self {
            counter: 0,
            bad: false,
        }
    }

    /// Feed one sample of the line state.
    ///
    /// `line_bad` is true when the line was found stuck. Must be called at
    /// a steady rate, the threshold is counted in samples.
    pub fn on_tick(&mut self, line_bad: bool) {
        if !line_bad {
            if self.bad {
                dali_info!("Bus recovered");
            }
            self.counter = 0;
            self.bad = false;
            return;
        }

        self.counter = self.counter.saturating_add(1);
        if self.counter >= BUS_ERROR_THRESHOLD && !self.bad {
            dali_warn!("Bus stuck for {=u8} samples", self.counter);
            self.bad = true;
        }
    }

    /// Is the bus currently considered unusable?
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.bad
    }

    /// Number of consecutive bad samples seen so far
    #[inline]
    pub fn error_count(&self) -> u8 {
        self.counter
    }
}
