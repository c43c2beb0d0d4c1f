//! Inter-request rate limiting
//!
//! The downloader waits once before every navigation, continuation loads
//! included.

use crate::config::{DelayConfig, DelayMethod};
use rand::Rng;
use std::time::Duration;

/// Produces the wait between two navigations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delayer {
    /// Always waits the same duration
    Fixed(Duration),

    /// Waits a uniformly sampled duration in `[min, max]`
    Random { min: Duration, max: Duration },
}

impl Delayer {
    /// Builds a delayer from validated configuration
    pub fn from_config(config: &DelayConfig) -> Self {
        match config.method {
            DelayMethod::Fixed => Self::Fixed(secs(config.wait_secs.unwrap_or(0.0))),
            DelayMethod::Random => {
                let min = secs(config.min_secs.unwrap_or(0.0));
                let max = secs(config.max_secs.unwrap_or(0.0)).max(min);
                Self::Random { min, max }
            }
        }
    }

    /// A delayer that never sleeps
    pub fn none() -> Self {
        Self::Fixed(Duration::ZERO)
    }

    /// Samples the next wait interval
    pub fn interval(&self) -> Duration {
        match *self {
            Self::Fixed(wait) => wait,
            Self::Random { min, max } if min >= max => min,
            Self::Random { min, max } => {
                let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
                Duration::from_millis(millis as u64)
            }
        }
    }

    /// Sleeps for the next interval
    pub async fn wait(&self) {
        let interval = self.interval();
        if interval.is_zero() {
            return;
        }

        tracing::debug!("Delaying next request by {:?}", interval);
        tokio::time::sleep(interval).await;
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}
