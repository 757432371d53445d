//! Output artifact naming.
//!
//! Names look like
//! `METIS.LM_IMAGE_SCI_RAW.2027-01-01T00_00_02.img_lm.1.0.fits`.
//! Colons in the timestamp are replaced so the name is valid on every
//! filesystem.

use crate::recipe::ObsTime;

/// Instrument name used as the filename prefix.
pub const DEFAULT_INSTRUMENT: &str = "METIS";

/// Deterministic artifact name builder.
#[derive(Debug, Clone)]
pub struct FilenameGenerator {
    instrument: String,
}

impl Default for FilenameGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUMENT)
    }
}

impl FilenameGenerator {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Builds `<instrument>.<do_category>.<timestamp>.<mode>.<dit>.fits`.
    pub fn generate(
        &self,
        timestamp: &ObsTime,
        mode: &str,
        integration_time: f64,
        do_category: &str,
    ) -> String {
        let safe_timestamp = timestamp.iso_seconds().replace(':', "_");
        format!(
            "{}.{}.{}.{}.{}.fits",
            self.instrument,
            do_category,
            safe_timestamp,
            mode,
            format_seconds(integration_time)
        )
    }
}

/// Renders an integration time, keeping one decimal for whole seconds.
fn format_seconds(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> ObsTime {
        s.parse().expect("failed to parse timestamp")
    }

    #[test]
    fn test_generate_pattern() {
        let generator = FilenameGenerator::default();
        let name = generator.generate(
            &at("2027-01-01 00:00:02.2"),
            "img_lm",
            1.0,
            "LM_IMAGE_SCI_RAW",
        );
        assert_eq!(
            name,
            "METIS.LM_IMAGE_SCI_RAW.2027-01-01T00_00_02.img_lm.1.0.fits"
        );
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_fractional_dit() {
        let name = FilenameGenerator::default().generate(&at("2027-01-01 00:00:00"), "lms", 0.25, "X");
        assert!(name.ends_with(".lms.0.25.fits"));
    }

    #[test]
    fn test_distinct_inputs_give_distinct_names() {
        let generator = FilenameGenerator::default();
        let t0 = at("2027-01-01 00:00:00");
        let t1 = at("2027-01-01 00:00:01");
        let base = generator.generate(&t0, "img_lm", 1.0, "A");

        assert_eq!(base, generator.generate(&t0, "img_lm", 1.0, "A"));
        assert_ne!(base, generator.generate(&t1, "img_lm", 1.0, "A"));
        assert_ne!(base, generator.generate(&t0, "img_n", 1.0, "A"));
        assert_ne!(base, generator.generate(&t0, "img_lm", 2.0, "A"));
        assert_ne!(base, generator.generate(&t0, "img_lm", 1.0, "B"));
    }

    #[test]
    fn test_custom_instrument() {
        let name = FilenameGenerator::new("ELT").generate(&at("2027-01-01 00:00:00"), "m", 3.0, "P");
        assert!(name.starts_with("ELT.P."));
    }
}
