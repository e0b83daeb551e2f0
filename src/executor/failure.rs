//! Failure injection for exercising the decider's failure paths.
//!
//! The executor asks its injector, once per failable action, whether the
//! action should report an error instead of succeeding.

use rand::Rng;

pub trait FailureInjector: Send + Sync {
    /// Error to report for `action`, or `None` to let it succeed
    fn inject(&self, action: &str) -> Option<String>;
}

/// Every action succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFail;

impl FailureInjector for NeverFail {
    fn inject(&self, _action: &str) -> Option<String> {
        None
    }
}

/// Each action fails independently with a fixed probability
#[derive(Debug, Clone, Copy)]
pub struct RandomFailure {
    probability: f64,
}

impl RandomFailure {
    /// `probability` is clamped to `0.0..=1.0`
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl FailureInjector for RandomFailure {
    fn inject(&self, _action: &str) -> Option<String> {
        rand::thread_rng()
            .gen_bool(self.probability)
            .then(|| "A random error occurred while processing the request".to_string())
    }
}

/// Named actions always fail
#[derive(Debug, Clone, Default)]
pub struct FailOn {
    actions: Vec<String>,
}

impl FailOn {
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }
}

impl FailureInjector for FailOn {
    fn inject(&self, action: &str) -> Option<String> {
        self.actions
            .iter()
            .any(|a| a == action)
            .then(|| format!("Injected failure for '{}'", action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_failure_extremes() {
        let always = RandomFailure::new(1.0);
        let never = RandomFailure::new(0.0);

        for _ in 0..50 {
            assert!(always.inject("amicreate").is_some());
            assert!(never.inject("amicreate").is_none());
        }
    }

    #[test]
    fn test_random_failure_clamps() {
        assert_eq!(RandomFailure::new(3.0).probability(), 1.0);
        assert_eq!(RandomFailure::new(-1.0).probability(), 0.0);
        assert_eq!(RandomFailure::new(f64::NAN).probability(), 0.0);
    }

    #[test]
    fn test_fail_on_named_actions() {
        let injector = FailOn::new(["tagami"]);
        assert!(injector.inject("tagami").unwrap().contains("tagami"));
        assert!(injector.inject("amicreate").is_none());
        assert!(NeverFail.inject("tagami").is_none());
    }
}
