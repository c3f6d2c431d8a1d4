use std::collections::VecDeque;
use std::sync::Mutex;

/// Source of uniform draws in `[0, 1)` used to simulate check outcomes.
pub trait OutcomeSource: Send + Sync {
    fn draw(&self) -> f64;
}

/// Thread-local RNG backed draws.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOutcomes;

impl OutcomeSource for RandomOutcomes {
    fn draw(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Replays a fixed script of draws, then repeats `fallback`.
#[derive(Debug)]
pub struct ScriptedOutcomes {
    script: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedOutcomes {
    pub fn new(script: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
        }
    }
}

impl OutcomeSource for ScriptedOutcomes {
    fn draw(&self) -> f64 {
        match self.script.lock() {
            Ok(mut script) => script.pop_front().unwrap_or(self.fallback),
            Err(_) => self.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_draws_stay_in_the_unit_interval() {
        let source = RandomOutcomes;
        for _ in 0..1_000 {
            let draw = source.draw();
            assert!((0.0..1.0).contains(&draw));
        }
    }

    #[test]
    fn scripted_draws_fall_back_once_exhausted() {
        let source = ScriptedOutcomes::new([0.1, 0.9], 0.5);
        assert_eq!(source.draw(), 0.1);
        assert_eq!(source.draw(), 0.9);
        assert_eq!(source.draw(), 0.5);
    }
}
