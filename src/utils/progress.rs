/// Scalar progress callback `(current_unit, total_units)` invoked at least
/// once per station by the connector, router and balance engines.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// Cooperative cancellation predicate checked at the same points; when it
/// returns true the caller stops at the next boundary and marks the result
/// partial.
pub type CancelFn<'a> = dyn Fn() -> bool + Send + Sync + 'a;

/// Optional progress/cancellation pair accepted as a construction
/// parameter by the long-running components.
#[derive(Default)]
pub struct ProgressHooks<'a> {
    pub progress: Option<&'a ProgressFn<'a>>,
    pub cancel: Option<&'a CancelFn<'a>>,
}

impl<'a> ProgressHooks<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn report(&self, current: usize, total: usize) {
        if let Some(progress) = self.progress {
            progress(current, total);
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.map(|cancel| cancel()).unwrap_or(false)
    }
}
