//! Probabilistic admission of incoming commands

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

/// Decides whether a received command is processed or dropped
#[derive(Debug, Clone)]
pub struct ProcessGate {
    probability: f64,
    rng: StdRng,
}

impl ProcessGate {
    /// Create a gate admitting commands with the given probability.
    ///
    /// Values outside `[0, 1]` are clamped; a NaN admits everything.
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        let probability = if probability.is_nan() {
            warn!("Process probability is NaN, admitting every command");
            1.0
        } else {
            probability.clamp(0.0, 1.0)
        };

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self { probability, rng }
    }

    /// A gate that admits every command
    pub fn always() -> Self {
        Self::new(1.0, Some(0))
    }

    /// Effective admission probability
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Roll for one command
    pub fn admit(&mut self) -> bool {
        if self.probability >= 1.0 {
            return true;
        }
        if self.probability <= 0.0 {
            return false;
        }
        self.rng.gen_bool(self.probability)
    }
}

impl Default for ProcessGate {
    fn default() -> Self {
        Self::always()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut always = ProcessGate::always();
        assert!((0..100).all(|_| always.admit()));

        let mut never = ProcessGate::new(0.0, None);
        assert!((0..100).all(|_| !never.admit()));
    }

    #[test]
    fn test_clamping() {
        assert_eq!(ProcessGate::new(7.5, None).probability(), 1.0);
        assert_eq!(ProcessGate::new(-1.0, None).probability(), 0.0);
        assert_eq!(ProcessGate::new(f64::NAN, None).probability(), 1.0);
    }

    #[test]
    fn test_seeded_gate_is_reproducible() {
        let mut a = ProcessGate::new(0.5, Some(42));
        let mut b = ProcessGate::new(0.5, Some(42));
        let rolls_a: Vec<bool> = (0..64).map(|_| a.admit()).collect();
        let rolls_b: Vec<bool> = (0..64).map(|_| b.admit()).collect();
        assert_eq!(rolls_a, rolls_b);

        // A fair gate over 64 rolls admits some and drops some
        assert!(rolls_a.iter().any(|r| *r));
        assert!(rolls_a.iter().any(|r| !*r));
    }
}
