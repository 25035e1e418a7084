//! In-memory frontier
//!
//! A single mutex guards the state map and the ready queue together, so each
//! operation observes and mutates both atomically. Suitable for single-process
//! crawls and tests; nothing survives a restart.

use crate::frontier::traits::{Frontier, FrontierCounts, FrontierError, FrontierResult};
use crate::state::UrlState;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Sets {
    /// Every known URL and its single state
    states: HashMap<String, UrlState>,

    /// Ready URLs in admission order; mirrors the `Ready` entries of `states`
    ready: VecDeque<String>,
}

/// Mutex-guarded map of URL sets
#[derive(Debug, Default)]
pub struct MemoryFrontier {
    sets: Mutex<Sets>,
}

impl MemoryFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> FrontierResult<MutexGuard<'_, Sets>> {
        self.sets.lock().map_err(|_| FrontierError::Poisoned)
    }
}

impl Frontier for MemoryFrontier {
    fn enqueue_one(&self, url: &str) -> FrontierResult<bool> {
        let mut sets = self.lock()?;
        if sets.states.contains_key(url) {
            return Ok(false);
        }
        sets.states.insert(url.to_string(), UrlState::Ready);
        sets.ready.push_back(url.to_string());
        Ok(true)
    }

    fn dequeue(&self) -> FrontierResult<Option<String>> {
        let mut sets = self.lock()?;
        let Some(url) = sets.ready.pop_front() else {
            return Ok(None);
        };
        sets.states.insert(url.clone(), UrlState::Pending);
        Ok(Some(url))
    }

    fn transition(&self, url: &str, from: UrlState, to: UrlState) -> FrontierResult<bool> {
        if !from.can_move_to(to) {
            return Ok(false);
        }

        let mut sets = self.lock()?;
        match sets.states.get_mut(url) {
            Some(state) if *state == from => {
                *state = to;
            }
            _ => return Ok(false),
        }

        if from == UrlState::Ready {
            sets.ready.retain(|u| u != url);
        }
        Ok(true)
    }

    fn repair(&self) -> FrontierResult<usize> {
        let mut sets = self.lock()?;
        let Sets { states, ready } = &mut *sets;

        let mut reclaimed = 0;
        for (url, state) in states.iter_mut() {
            if *state == UrlState::Pending {
                *state = UrlState::Ready;
                ready.push_back(url.clone());
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    fn failed_urls(&self) -> FrontierResult<Vec<String>> {
        let sets = self.lock()?;
        let mut failed: Vec<String> = sets
            .states
            .iter()
            .filter(|(_, state)| **state == UrlState::Failed)
            .map(|(url, _)| url.clone())
            .collect();
        failed.sort();
        Ok(failed)
    }

    fn cleanup(&self) -> FrontierResult<()> {
        let mut sets = self.lock()?;
        sets.ready.shrink_to_fit();
        sets.states.shrink_to_fit();
        Ok(())
    }

    fn state_of(&self, url: &str) -> FrontierResult<Option<UrlState>> {
        Ok(self.lock()?.states.get(url).copied())
    }

    fn counts(&self) -> FrontierResult<FrontierCounts> {
        let sets = self.lock()?;
        let mut counts = FrontierCounts::default();
        for state in sets.states.values() {
            counts.add(*state, 1);
        }
        Ok(counts)
    }

    fn reset(&self) -> FrontierResult<()> {
        let mut sets = self.lock()?;
        sets.states.clear();
        sets.ready.clear();
        Ok(())
    }
}
