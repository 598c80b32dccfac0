// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::CampaignObserver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Result of a single random test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestOutcome {
    Pass,
    /// Emulators disagree; the differing register names are listed.
    Diff { registers: Vec<String>, exceptions: usize },
    Error(String),
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Pass)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub started: u64,
    pub passed: u64,
    pub diffed: u64,
    pub failed: u64,
    pub elapsed_secs: f64,
    /// How often each register differed across the campaign.
    pub register_histogram: BTreeMap<String, u64>,
}

#[derive(Debug)]
pub struct CampaignMetrics {
    started: AtomicU64,
    passed: AtomicU64,
    diffed: AtomicU64,
    failed: AtomicU64,
    registers: Mutex<BTreeMap<String, u64>>,
    start_time: Instant,
}

impl Default for CampaignMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignMetrics {
    pub fn new() -> Self {
        Self {
            started: AtomicU64::new(0),
            passed: AtomicU64::new(0),
            diffed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            registers: Mutex::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn get_started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn get_passed(&self) -> u64 {
        self.passed.load(Ordering::SeqCst)
    }

    pub fn get_diffed(&self) -> u64 {
        self.diffed.load(Ordering::SeqCst)
    }

    pub fn get_failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn get_completed(&self) -> u64 {
        self.get_passed() + self.get_diffed() + self.get_failed()
    }

    pub fn get_tests_per_sec(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_completed() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> CampaignSummary {
        CampaignSummary {
            started: self.get_started(),
            passed: self.get_passed(),
            diffed: self.get_diffed(),
            failed: self.get_failed(),
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            register_histogram: self
                .registers
                .lock()
                .map(|m| m.clone())
                .unwrap_or_default(),
        }
    }
}

impl CampaignObserver for CampaignMetrics {
    fn on_test_start(&self, _id: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_test_end(&self, _id: usize, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Pass => {
                self.passed.fetch_add(1, Ordering::SeqCst);
            }
            TestOutcome::Diff { registers, .. } => {
                self.diffed.fetch_add(1, Ordering::SeqCst);
                if let Ok(mut m) = self.registers.lock() {
                    for r in registers {
                        *m.entry(r.clone()).or_insert(0) += 1;
                    }
                }
            }
            TestOutcome::Error(_) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_from_parallel_observers() {
        let metrics = Arc::new(CampaignMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let m = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let id = t * 25 + i;
                        m.on_test_start(id);
                        let outcome = match id % 5 {
                            0 => TestOutcome::Diff {
                                registers: vec!["x5".into()],
                                exceptions: 0,
                            },
                            1 => TestOutcome::Error("spike exited".into()),
                            _ => TestOutcome::Pass,
                        };
                        m.on_test_end(id, &outcome);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let s = metrics.summary();
        assert_eq!(s.started, 100);
        assert_eq!(s.diffed, 20);
        assert_eq!(s.failed, 20);
        assert_eq!(s.passed, 60);
        assert_eq!(s.register_histogram.get("x5"), Some(&20));
        assert_eq!(metrics.get_completed(), 100);
    }
}
