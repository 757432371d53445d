//! Closed vocabularies for recipe fields.
//!
//! Every enumerated recipe field (category, technique, observation type,
//! instrument mode) is a closed Rust enum. Calibration classification is
//! expressed as explicit tables over these enums instead of substring tests,
//! so `LMS` can never be mistaken for an `LM` technique.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string is not part of a closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTerm {
    /// Name of the vocabulary (e.g. "tech").
    pub vocabulary: &'static str,
    /// The rejected value.
    pub value: String,
}

impl fmt::Display for UnknownTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid {}", self.value, self.vocabulary)
    }
}

impl std::error::Error for UnknownTerm {}

fn lookup<T: Copy>(
    all: &[T],
    name: fn(T) -> &'static str,
    vocabulary: &'static str,
    value: &str,
) -> Result<T, UnknownTerm> {
    all.iter()
        .copied()
        .find(|term| name(*term) == value)
        .ok_or_else(|| UnknownTerm {
            vocabulary,
            value: value.to_string(),
        })
}

/// Top-level classification of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "CALIB")]
    Calib,
    #[serde(rename = "SCIENCE")]
    Science,
    #[serde(rename = "TECHNICAL")]
    Technical,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Calib, Category::Science, Category::Technical];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Calib => "CALIB",
            Category::Science => "SCIENCE",
            Category::Technical => "TECHNICAL",
        }
    }
}

/// Detector family a technique is read out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorFamily {
    /// LM-band imager (2RG detector).
    Lm,
    /// N-band imager (GeoSnap detector).
    N,
    /// Integral field spectrograph.
    Ifu,
}

impl DetectorFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectorFamily::Lm => "LM",
            DetectorFamily::N => "N",
            DetectorFamily::Ifu => "IFU",
        }
    }
}

/// Instrument configuration tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technique {
    #[serde(rename = "APP,LM")]
    AppLm,
    #[serde(rename = "IMAGE,LM")]
    ImageLm,
    #[serde(rename = "IMAGE,N")]
    ImageN,
    #[serde(rename = "LMS")]
    Lms,
    #[serde(rename = "LSS,LM")]
    LssLm,
    #[serde(rename = "LSS,N")]
    LssN,
    #[serde(rename = "PUP,M")]
    PupM,
    #[serde(rename = "PUP,N")]
    PupN,
    #[serde(rename = "RAVC,IFU")]
    RavcIfu,
    #[serde(rename = "RAVC,LM")]
    RavcLm,
}

impl Technique {
    pub const ALL: [Technique; 10] = [
        Technique::AppLm,
        Technique::ImageLm,
        Technique::ImageN,
        Technique::Lms,
        Technique::LssLm,
        Technique::LssN,
        Technique::PupM,
        Technique::PupN,
        Technique::RavcIfu,
        Technique::RavcLm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Technique::AppLm => "APP,LM",
            Technique::ImageLm => "IMAGE,LM",
            Technique::ImageN => "IMAGE,N",
            Technique::Lms => "LMS",
            Technique::LssLm => "LSS,LM",
            Technique::LssN => "LSS,N",
            Technique::PupM => "PUP,M",
            Technique::PupN => "PUP,N",
            Technique::RavcIfu => "RAVC,IFU",
            Technique::RavcLm => "RAVC,LM",
        }
    }

    /// Detector family used for derived calibrations.
    ///
    /// LM takes precedence over N, which takes precedence over IFU.
    /// `PUP,M` belongs to no family and gets no calibrations.
    pub fn family(self) -> Option<DetectorFamily> {
        match self {
            Technique::AppLm | Technique::ImageLm | Technique::LssLm | Technique::RavcLm => {
                Some(DetectorFamily::Lm)
            }
            Technique::ImageN | Technique::LssN | Technique::PupN => Some(DetectorFamily::N),
            Technique::Lms | Technique::RavcIfu => Some(DetectorFamily::Ifu),
            Technique::PupM => None,
        }
    }
}

/// Kind of dark a science exposure needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DarkKind {
    /// Detector dark with the instrument closed.
    Standard,
    /// Dark taken with the warm calibration unit switched off.
    WcuOff,
}

/// Observation purpose tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObsType {
    #[serde(rename = "CHOPHOME")]
    ChopHome,
    #[serde(rename = "DARK")]
    Dark,
    #[serde(rename = "DARK,WCUOFF")]
    DarkWcuOff,
    #[serde(rename = "DETLIN")]
    DetLin,
    #[serde(rename = "DISTORTION")]
    Distortion,
    #[serde(rename = "FLAT,LAMP")]
    FlatLamp,
    #[serde(rename = "FLAT,TWILIGHT")]
    FlatTwilight,
    #[serde(rename = "OBJECT")]
    Object,
    #[serde(rename = "PERSISTENCE")]
    Persistence,
    #[serde(rename = "PSF,OFFAXIS")]
    PsfOffAxis,
    #[serde(rename = "PUPIL")]
    Pupil,
    #[serde(rename = "RSRF")]
    Rsrf,
    #[serde(rename = "SKY")]
    Sky,
    #[serde(rename = "SLITLOSS")]
    SlitLoss,
    #[serde(rename = "STD")]
    Std,
    #[serde(rename = "WAVE")]
    Wave,
}

impl ObsType {
    pub const ALL: [ObsType; 16] = [
        ObsType::ChopHome,
        ObsType::Dark,
        ObsType::DarkWcuOff,
        ObsType::DetLin,
        ObsType::Distortion,
        ObsType::FlatLamp,
        ObsType::FlatTwilight,
        ObsType::Object,
        ObsType::Persistence,
        ObsType::PsfOffAxis,
        ObsType::Pupil,
        ObsType::Rsrf,
        ObsType::Sky,
        ObsType::SlitLoss,
        ObsType::Std,
        ObsType::Wave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObsType::ChopHome => "CHOPHOME",
            ObsType::Dark => "DARK",
            ObsType::DarkWcuOff => "DARK,WCUOFF",
            ObsType::DetLin => "DETLIN",
            ObsType::Distortion => "DISTORTION",
            ObsType::FlatLamp => "FLAT,LAMP",
            ObsType::FlatTwilight => "FLAT,TWILIGHT",
            ObsType::Object => "OBJECT",
            ObsType::Persistence => "PERSISTENCE",
            ObsType::PsfOffAxis => "PSF,OFFAXIS",
            ObsType::Pupil => "PUPIL",
            ObsType::Rsrf => "RSRF",
            ObsType::Sky => "SKY",
            ObsType::SlitLoss => "SLITLOSS",
            ObsType::Std => "STD",
            ObsType::Wave => "WAVE",
        }
    }

    pub fn is_dark(self) -> bool {
        matches!(self, ObsType::Dark | ObsType::DarkWcuOff)
    }

    pub fn is_flat(self) -> bool {
        matches!(self, ObsType::FlatLamp | ObsType::FlatTwilight)
    }

    /// Dark needed alongside an exposure of this type, if any.
    pub fn dark_requirement(self) -> Option<DarkKind> {
        match self {
            t if t.is_dark() => None,
            ObsType::Persistence => None,
            ObsType::SlitLoss | ObsType::DetLin | ObsType::Distortion => Some(DarkKind::WcuOff),
            _ => Some(DarkKind::Standard),
        }
    }

    /// Whether an exposure of this type is paired with sky and lamp flats.
    pub fn needs_flats(self) -> bool {
        !(self.is_dark()
            || self.is_flat()
            || matches!(self, ObsType::DetLin | ObsType::Persistence))
    }

    /// Engine source used when a recipe does not name one.
    pub fn default_source(self) -> &'static str {
        match self {
            ObsType::Dark | ObsType::DarkWcuOff => "empty",
            ObsType::DetLin | ObsType::Rsrf => "flat",
            _ => "empty_sky",
        }
    }
}

/// Named instrument configuration understood by the simulation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentMode {
    ImgLm,
    ImgN,
    LssL,
    LssM,
    LssN,
    Lms,
}

const LM_FILTERS: &[&str] = &[
    "Lp",
    "short-L",
    "Mp",
    "Br_alpha",
    "Br_alpha_ref",
    "PAH_3.3",
    "PAH_3.3_ref",
    "CO_1-0_ice",
    "CO_ref",
    "H2O-ice",
    "IB_4.05",
    "open",
    "closed",
    "HCI_M",
    "HCI_L_short",
    "HCI_L_long",
];

const N_FILTERS: &[&str] = &[
    "N1",
    "N2",
    "N3",
    "PAH_8.6",
    "PAH_8.6_ref",
    "PAH_11.25",
    "PAH_11.25_ref",
    "Ne_II",
    "Ne_II_ref",
    "S_IV",
    "S_IV_ref",
    "open",
    "closed",
];

/// Neutral-density filters accepted in every mode.
pub const ND_FILTERS: &[&str] = &["open", "ND_OD1", "ND_OD2", "ND_OD3", "ND_OD4", "ND_OD5"];

impl InstrumentMode {
    pub const ALL: [InstrumentMode; 6] = [
        InstrumentMode::ImgLm,
        InstrumentMode::ImgN,
        InstrumentMode::LssL,
        InstrumentMode::LssM,
        InstrumentMode::LssN,
        InstrumentMode::Lms,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentMode::ImgLm => "img_lm",
            InstrumentMode::ImgN => "img_n",
            InstrumentMode::LssL => "lss_l",
            InstrumentMode::LssM => "lss_m",
            InstrumentMode::LssN => "lss_n",
            InstrumentMode::Lms => "lms",
        }
    }

    /// Filter wheel positions valid in this mode.
    pub fn allowed_filters(self) -> &'static [&'static str] {
        match self {
            InstrumentMode::ImgLm | InstrumentMode::Lms => LM_FILTERS,
            InstrumentMode::ImgN => N_FILTERS,
            InstrumentMode::LssL => &["L_spec"],
            InstrumentMode::LssM => &["M_spec"],
            InstrumentMode::LssN => &["N_spec"],
        }
    }

    pub fn accepts_filter(self, filter: &str) -> bool {
        self.allowed_filters().contains(&filter)
    }
}

impl FromStr for Category {
    type Err = UnknownTerm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(&Self::ALL, Self::as_str, "catg", s)
    }
}

impl FromStr for Technique {
    type Err = UnknownTerm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(&Self::ALL, Self::as_str, "tech", s)
    }
}

impl FromStr for ObsType {
    type Err = UnknownTerm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(&Self::ALL, Self::as_str, "type", s)
    }
}

impl FromStr for InstrumentMode {
    type Err = UnknownTerm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(&Self::ALL, Self::as_str, "mode", s)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ObsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for InstrumentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technique_round_trips_through_str() {
        for tech in Technique::ALL {
            assert_eq!(tech.as_str().parse::<Technique>(), Ok(tech));
        }
        assert!("IMAGE,M".parse::<Technique>().is_err());
    }

    #[test]
    fn test_lms_is_not_lm_family() {
        assert_eq!(Technique::Lms.family(), Some(DetectorFamily::Ifu));
        assert_eq!(Technique::RavcIfu.family(), Some(DetectorFamily::Ifu));
        assert_eq!(Technique::RavcLm.family(), Some(DetectorFamily::Lm));
        assert_eq!(Technique::LssN.family(), Some(DetectorFamily::N));
        assert_eq!(Technique::PupM.family(), None);
    }

    #[test]
    fn test_dark_requirement_table() {
        assert_eq!(ObsType::Object.dark_requirement(), Some(DarkKind::Standard));
        assert_eq!(ObsType::Dark.dark_requirement(), None);
        assert_eq!(ObsType::DarkWcuOff.dark_requirement(), None);
        assert_eq!(ObsType::Persistence.dark_requirement(), None);
        assert_eq!(ObsType::SlitLoss.dark_requirement(), Some(DarkKind::WcuOff));
        assert_eq!(ObsType::DetLin.dark_requirement(), Some(DarkKind::WcuOff));
        assert_eq!(ObsType::Distortion.dark_requirement(), Some(DarkKind::WcuOff));
    }

    #[test]
    fn test_flat_exclusions() {
        assert!(ObsType::Object.needs_flats());
        assert!(ObsType::SlitLoss.needs_flats());
        assert!(!ObsType::FlatLamp.needs_flats());
        assert!(!ObsType::FlatTwilight.needs_flats());
        assert!(!ObsType::Dark.needs_flats());
        assert!(!ObsType::DetLin.needs_flats());
        assert!(!ObsType::Persistence.needs_flats());
    }

    #[test]
    fn test_mode_filter_tables() {
        assert!(InstrumentMode::ImgLm.accepts_filter("Lp"));
        assert!(InstrumentMode::Lms.accepts_filter("Br_alpha"));
        assert!(!InstrumentMode::ImgN.accepts_filter("Lp"));
        assert!(InstrumentMode::LssM.accepts_filter("M_spec"));
        assert!(!InstrumentMode::LssM.accepts_filter("L_spec"));
        assert_eq!("lss_n".parse::<InstrumentMode>(), Ok(InstrumentMode::LssN));
    }

    #[test]
    fn test_default_sources() {
        assert_eq!(ObsType::Dark.default_source(), "empty");
        assert_eq!(ObsType::DetLin.default_source(), "flat");
        assert_eq!(ObsType::Object.default_source(), "empty_sky");
    }
}
