use std::thread;

use atsp_core::SearchStack;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Per-process search settings. The number of processes comes from the
/// transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub threads: usize,
    /// A worker only donates part of its stack once it holds at least this
    /// many tours.
    pub min_split_size: usize,
    /// Overrides the default stack capacity of `2 * n²` tours.
    pub stack_capacity: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: thread::available_parallelism().map_or(1, |n| n.get()),
            min_split_size: 2,
            stack_capacity: None,
        }
    }
}

impl SearchConfig {
    pub fn new(threads: usize, min_split_size: usize) -> Self {
        Self {
            threads,
            min_split_size,
            stack_capacity: None,
        }
    }

    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = Some(capacity);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::invalid_config("thread count must be positive"));
        }
        if self.min_split_size == 0 {
            return Err(Error::invalid_config("min split size must be positive"));
        }
        if self.stack_capacity == Some(0) {
            return Err(Error::invalid_config("stack capacity must be positive"));
        }
        Ok(())
    }

    pub(crate) fn new_stack(&self, cities: usize) -> SearchStack {
        match self.stack_capacity {
            Some(capacity) => SearchStack::with_capacity(capacity),
            None => SearchStack::for_cities(cities),
        }
    }
}
