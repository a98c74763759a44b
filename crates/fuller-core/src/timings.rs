//! Device timing parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A timing parameter that is required to be positive but is not.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("timing parameter {name} is not positive")]
pub struct TimingError {
    /// Name of the offending parameter.
    pub name: &'static str,
}

/// Minimum-interval timing parameters of the target device, in cycles.
///
/// All parameters are positive. `ccd`/`rrd` are the same-bank-group ("long")
/// minimums and double as the rank-wide values for devices without bank
/// groups; `ccd_s`/`rrd_s` are the cross-bank-group ("short") minimums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingParameters {
    /// ACT to PRE on the same bank (row active time).
    pub ras: u32,
    /// PRE to ACT on the same bank (row precharge time).
    pub rp: u32,
    /// REF to any command (refresh cycle time).
    pub rfc: u32,
    /// Maximum allowed interval between refreshes.
    pub refi: u32,
    /// Four-activate window.
    pub faw: u32,
    /// ACT to READ on the same bank.
    pub rcd: u32,
    /// READ to PRE on the same bank.
    pub rtp: u32,
    /// READ to READ, same bank group (or rank-wide without bank groups).
    pub ccd: u32,
    /// READ to READ across bank groups.
    pub ccd_s: u32,
    /// ACT to ACT, same bank group (or rank-wide without bank groups).
    pub rrd: u32,
    /// ACT to ACT across bank groups.
    pub rrd_s: u32,
}

impl TimingParameters {
    /// Checks that every parameter is positive.
    pub fn validate(&self) -> Result<(), TimingError> {
        let named = [
            ("ras", self.ras),
            ("rp", self.rp),
            ("rfc", self.rfc),
            ("refi", self.refi),
            ("faw", self.faw),
            ("rcd", self.rcd),
            ("rtp", self.rtp),
            ("ccd", self.ccd),
            ("ccd_s", self.ccd_s),
            ("rrd", self.rrd),
            ("rrd_s", self.rrd_s),
        ];
        for (name, value) in named {
            if value == 0 {
                return Err(TimingError { name });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample() -> TimingParameters {
        TimingParameters {
            ras: 7,
            rp: 5,
            rfc: 20,
            refi: 150,
            faw: 20,
            rcd: 4,
            rtp: 3,
            ccd: 4,
            ccd_s: 4,
            rrd: 4,
            rrd_s: 4,
        }
    }

    #[test]
    fn validate_accepts_positive_parameters() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_names_the_offender() {
        let mut timings = sample();
        timings.rfc = 0;
        assert_eq!(timings.validate(), Err(TimingError { name: "rfc" }));
    }

    #[test]
    fn deserializes_from_named_fields() {
        let json = r#"{"ras":7,"rp":5,"rfc":20,"refi":150,"faw":20,
                       "rcd":4,"rtp":3,"ccd":4,"ccd_s":4,"rrd":4,"rrd_s":4}"#;
        let timings: TimingParameters = serde_json::from_str(json).unwrap();
        assert_eq!(timings, sample());
    }
}
