// SPDX-License-Identifier: GPL-3.0-only

//! One-shot automatic retry policy

use crate::backends::camera::types::{AcquisitionAttempt, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};

/// Session-scoped allowance of one automatic retry
///
/// Reset on mount and on manual retry from the error screen.
#[derive(Debug, Default)]
pub struct RetryBudget {
    consumed: AtomicBool,
}

impl RetryBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.consumed.store(false, Ordering::SeqCst);
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::SeqCst)
    }

    /// Decide whether a failed attempt gets an automatic retry
    ///
    /// A busy device is retried once with relaxed constraints after the grace
    /// delay. Any other failure of a first attempt gets the same single
    /// retry. An unsupported platform is never retried. Consumes the budget
    /// when it grants a retry. An attempt without a classification never
    /// retries.
    pub fn try_consume(&self, attempt: &AcquisitionAttempt) -> bool {
        let Some(kind) = attempt.classification else {
            return false;
        };
        if kind == ErrorKind::Unsupported {
            return false;
        }
        let eligible = kind == ErrorKind::Busy || !attempt.is_retry;
        eligible && !self.consumed.swap(true, Ordering::SeqCst)
    }
}
