//! Random draws driving fault injection.
//!
//! Production uses `fastrand`; tests script the exact sequence of draws so a
//! given fault path can be forced.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Source of uniform draws in `[0, 1)`.
pub trait Dice: Send + Sync {
    fn draw(&self) -> f64;
}

/// Thread-local `fastrand` generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDice;

impl Dice for RandomDice {
    fn draw(&self) -> f64 {
        fastrand::f64()
    }
}

/// Replays a fixed sequence of draws, then a fallback value forever.
#[derive(Debug)]
pub struct ScriptedDice {
    script: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedDice {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self::with_fallback(draws, 0.5)
    }

    pub fn with_fallback(draws: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: Mutex::new(draws.into_iter().collect()),
            fallback,
        }
    }

    /// Append more draws to the end of the script.
    pub fn push(&self, draws: impl IntoIterator<Item = f64>) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(draws);
    }

    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Dice for ScriptedDice {
    fn draw(&self) -> f64 {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
