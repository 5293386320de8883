//! Learning rate schedules.
use crate::error::AcerError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Multiplier of the initial learning rate as a function of training progress.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LrSchedule {
    /// `1`.
    Constant,

    /// `1 - p`.
    Linear,

    /// Linear decay at twice the rate, floored at `0.125`.
    DoubleLinearCon,

    /// Linear until `p = 0.25`, then `0.075`.
    MiddleDrop,

    /// Linear until `p = 0.25`, `0.075` until `p = 0.75`, then `0.125`.
    DoubleMiddleDrop,
}

impl LrSchedule {
    /// Multiplier at progress `p`, the fraction of the training budget consumed.
    pub fn value(&self, p: f32) -> f32 {
        match self {
            Self::Constant => 1.0,
            Self::Linear => 1.0 - p,
            Self::DoubleLinearCon => {
                let eps = 0.125;
                let v = 1.0 - 2.0 * p;
                if v < eps {
                    eps
                } else {
                    v
                }
            }
            Self::MiddleDrop => {
                let eps = 0.75;
                if 1.0 - p < eps {
                    eps * 0.1
                } else {
                    1.0 - p
                }
            }
            Self::DoubleMiddleDrop => {
                let (eps1, eps2) = (0.75, 0.25);
                if 1.0 - p < eps2 {
                    eps2 * 0.5
                } else if 1.0 - p < eps1 {
                    eps1 * 0.1
                } else {
                    1.0 - p
                }
            }
        }
    }

    /// Name of the schedule.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Linear => "linear",
            Self::DoubleLinearCon => "double_linear_con",
            Self::MiddleDrop => "middle_drop",
            Self::DoubleMiddleDrop => "double_middle_drop",
        }
    }
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self::Linear
    }
}

impl fmt::Display for LrSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LrSchedule {
    type Err = AcerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Self::Constant),
            "linear" => Ok(Self::Linear),
            "double_linear_con" => Ok(Self::DoubleLinearCon),
            "middle_drop" => Ok(Self::MiddleDrop),
            "double_middle_drop" => Ok(Self::DoubleMiddleDrop),
            _ => Err(AcerError::UnknownSchedule(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        for s in [
            "constant",
            "linear",
            "double_linear_con",
            "middle_drop",
            "double_middle_drop",
        ] {
            let schedule: LrSchedule = s.parse().unwrap();
            assert_eq!(schedule.to_string(), s);
        }
        assert_eq!(
            "cosine".parse::<LrSchedule>(),
            Err(AcerError::UnknownSchedule("cosine".into()))
        );
    }

    #[test]
    fn test_values() {
        assert_eq!(LrSchedule::Constant.value(0.9), 1.0);
        assert!((LrSchedule::Linear.value(0.25) - 0.75).abs() < 1e-6);
        assert!((LrSchedule::DoubleLinearCon.value(0.25) - 0.5).abs() < 1e-6);
        assert_eq!(LrSchedule::DoubleLinearCon.value(0.9), 0.125);
        assert!((LrSchedule::MiddleDrop.value(0.2) - 0.8).abs() < 1e-6);
        assert!((LrSchedule::MiddleDrop.value(0.5) - 0.075).abs() < 1e-6);
        assert!((LrSchedule::DoubleMiddleDrop.value(0.1) - 0.9).abs() < 1e-6);
        assert!((LrSchedule::DoubleMiddleDrop.value(0.5) - 0.075).abs() < 1e-6);
        assert!((LrSchedule::DoubleMiddleDrop.value(0.9) - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_serde_name() {
        let yaml = serde_yaml::to_string(&LrSchedule::DoubleMiddleDrop).unwrap();
        assert!(yaml.contains("double_middle_drop"));
    }
}
