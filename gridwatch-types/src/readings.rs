//! Raw current readings reported for a constraint.

/// Amp readings behind a real-time constraint record.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmpReadings {
    /// Current flowing through the constrained asset.
    pub present_amps: f64,

    /// Current at which connected generation is trimmed.
    pub trim_amps: f64,

    /// Current below which trimmed generation is released again.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub release_limit_amps: Option<f64>,

    /// Whether the provider flagged this reading as a breach.
    #[cfg_attr(feature = "serde", serde(default))]
    pub breach: bool,
}

impl AmpReadings {
    /// Create readings from present and trim amps.
    pub fn new(present_amps: f64, trim_amps: f64) -> Self {
        Self {
            present_amps,
            trim_amps,
            ..Default::default()
        }
    }

    /// Set the release limit.
    pub fn release_limit(mut self, amps: f64) -> Self {
        self.release_limit_amps = Some(amps);
        self
    }

    /// Set the breach flag.
    pub fn breach(mut self, breach: bool) -> Self {
        self.breach = breach;
        self
    }

    /// Load as a proportion of the trim limit.
    ///
    /// Returns `None` when the trim limit is zero, negative or not finite,
    /// since no meaningful ratio exists.
    pub fn utilisation(&self) -> Option<f64> {
        if !self.trim_amps.is_finite() || self.trim_amps <= 0.0 {
            return None;
        }
        let ratio = self.present_amps / self.trim_amps;
        ratio.is_finite().then_some(ratio)
    }

    /// Amps remaining before the trim limit is reached (negative when over).
    pub fn headroom_amps(&self) -> f64 {
        self.trim_amps - self.present_amps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilisation() {
        let r = AmpReadings::new(250.0, 500.0);
        assert_eq!(r.utilisation(), Some(0.5));
        assert_eq!(r.headroom_amps(), 250.0);
    }

    #[test]
    fn test_utilisation_overloaded() {
        let r = AmpReadings::new(550.0, 500.0);
        assert!(r.utilisation().unwrap() > 1.0);
        assert_eq!(r.headroom_amps(), -50.0);
    }

    #[test]
    fn test_utilisation_without_trim() {
        assert!(AmpReadings::new(100.0, 0.0).utilisation().is_none());
        assert!(AmpReadings::new(100.0, -5.0).utilisation().is_none());
        assert!(AmpReadings::new(100.0, f64::NAN).utilisation().is_none());
    }

    #[test]
    fn test_builder_setters() {
        let r = AmpReadings::new(10.0, 20.0).release_limit(18.0).breach(true);
        assert_eq!(r.release_limit_amps, Some(18.0));
        assert!(r.breach);
    }
}
