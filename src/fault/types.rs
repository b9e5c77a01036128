use crate::fault::error::{FaultError, FaultResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Loss and delay applied to the benchmark path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkCondition {
    pub loss_percent: f32,
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl NetworkCondition {
    pub fn new(loss_percent: f32, delay: Duration) -> FaultResult<Self> {
        if !(0.0..=100.0).contains(&loss_percent) {
            return Err(FaultError::InvalidCondition(format!(
                "loss {loss_percent}% outside 0-100"
            )));
        }
        Ok(Self {
            loss_percent,
            delay,
        })
    }

    /// No loss, no delay.
    pub const fn clear() -> Self {
        Self {
            loss_percent: 0.0,
            delay: Duration::ZERO,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.loss_percent <= 0.0 && self.delay.is_zero()
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }

    /// The loss sweep: each loss level at a fixed delay.
    pub fn sweep(loss_levels: &[f32], delay: Duration) -> FaultResult<Vec<Self>> {
        loss_levels
            .iter()
            .map(|&loss| Self::new(loss, delay))
            .collect()
    }
}

impl Default for NetworkCondition {
    fn default() -> Self {
        Self::clear()
    }
}

impl fmt::Display for NetworkCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% loss, {}ms delay", self.loss_percent, self.delay_ms())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_condition() {
        assert!(NetworkCondition::clear().is_clear());
        assert!(!NetworkCondition::new(0.0, Duration::from_millis(50))
            .unwrap()
            .is_clear());
        assert!(!NetworkCondition::new(1.0, Duration::ZERO).unwrap().is_clear());
    }

    #[test]
    fn test_loss_out_of_range() {
        assert!(NetworkCondition::new(101.0, Duration::ZERO).is_err());
        assert!(NetworkCondition::new(-1.0, Duration::ZERO).is_err());
    }

    #[test]
    fn test_default_sweep() {
        let sweep = NetworkCondition::sweep(&[0.0, 1.0, 5.0, 10.0], Duration::from_millis(50))
            .unwrap();
        assert_eq!(sweep.len(), 4);
        assert!(sweep.iter().all(|c| c.delay_ms() == 50));
    }
}
