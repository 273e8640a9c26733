//! Simulated processing latency.

use std::time::Duration;

use rand::Rng;

/// Upper bound of stage 1 (local work).
pub const LOCAL_WORK_MAX: Duration = Duration::from_millis(100);
/// Upper bound of stage 3 (language resolution).
pub const LOCALIZATION_MAX: Duration = Duration::from_millis(50);
/// Upper bound of the backend's own work.
pub const BACKEND_WORK_MAX: Duration = Duration::from_millis(25);

/// A pseudo-random delay in `[0, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    max: Duration,
}

impl Latency {
    pub const fn up_to(max: Duration) -> Self {
        Self { max }
    }

    pub const fn none() -> Self {
        Self {
            max: Duration::ZERO,
        }
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw a delay below the bound.
    pub fn sample(&self) -> Duration {
        let max_ms = self.max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }

    /// Sleep for a sampled delay.
    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Per-stage latency bounds of the front service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyProfile {
    pub local_work: Latency,
    pub localization: Latency,
}

impl LatencyProfile {
    pub const fn standard() -> Self {
        Self {
            local_work: Latency::up_to(LOCAL_WORK_MAX),
            localization: Latency::up_to(LOCALIZATION_MAX),
        }
    }

    pub const fn none() -> Self {
        Self {
            local_work: Latency::none(),
            localization: Latency::none(),
        }
    }

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::standard()
        } else {
            Self::none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_within_bound() {
        let latency = Latency::up_to(BACKEND_WORK_MAX);
        for _ in 0..200 {
            assert!(latency.sample() < BACKEND_WORK_MAX);
        }
    }

    #[test]
    fn test_none_is_zero() {
        assert_eq!(Latency::none().sample(), Duration::ZERO);
        assert_eq!(LatencyProfile::from_enabled(false), LatencyProfile::none());
    }
}
