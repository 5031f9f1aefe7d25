//! Error cache and the on-demand state reads served to the render layer.

use std::sync::{Arc, Mutex, PoisonError};

use shared::domain::ControlSnapshot;

use crate::ControlHandle;

/// Last error list observed while the control was not pending.
#[derive(Debug, Default)]
pub(crate) struct ErrorCache {
    last_stable: Mutex<Option<Vec<String>>>,
}

impl ErrorCache {
    pub(crate) fn cached(&self) -> Option<Vec<String>> {
        self.last_stable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn store(&self, errors: Option<Vec<String>>) {
        *self.last_stable.lock().unwrap_or_else(PoisonError::into_inner) = errors;
    }

    pub(crate) fn clear(&self) {
        self.store(None);
    }

    /// Pending reads return the cache untouched; settled reads overwrite it.
    pub(crate) fn resolve(&self, snapshot: Option<&ControlSnapshot>) -> Option<Vec<String>> {
        if snapshot.is_some_and(|snapshot| snapshot.pending) {
            return self.cached();
        }
        let errors = snapshot.and_then(ControlSnapshot::messages);
        self.store(errors.clone());
        errors
    }
}

pub(crate) struct StateReader {
    control: Option<Arc<dyn ControlHandle>>,
    cache: ErrorCache,
}

impl StateReader {
    /// The group is read in preference to the field when both are attached.
    pub(crate) fn new(
        field: Option<Arc<dyn ControlHandle>>,
        group: Option<Arc<dyn ControlHandle>>,
    ) -> Self {
        Self {
            control: group.or(field),
            cache: ErrorCache::default(),
        }
    }

    pub(crate) fn errors(&self) -> Option<Vec<String>> {
        let snapshot = self.snapshot();
        self.cache.resolve(snapshot.as_ref())
    }

    pub(crate) fn invalid(&self) -> bool {
        let snapshot = self.snapshot();
        let touched = snapshot.as_ref().is_some_and(|snapshot| snapshot.touched);
        let errors = self.cache.resolve(snapshot.as_ref());
        touched && errors.is_some_and(|errors| !errors.is_empty())
    }

    pub(crate) fn discard_cache(&self) {
        self.cache.clear();
    }

    fn snapshot(&self) -> Option<ControlSnapshot> {
        self.control.as_ref().map(|control| control.snapshot())
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
