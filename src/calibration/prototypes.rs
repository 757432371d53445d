//! Calibration template prototypes per detector family.

use crate::recipe::{DetectorFamily, InstrumentMode, ObsType, SourceSpec, Technique};

/// Integration time of generated flats.
pub const FLAT_DIT: f64 = 0.25;
/// Integrations of generated flats.
pub const FLAT_NDIT: u32 = 1;
/// ND filter of generated flats.
pub const FLAT_ND_FILTER: &str = "open";
/// Filter wheel position of generated darks.
pub const DARK_FILTER: &str = "closed";

/// Which calibration a prototype produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CalibrationKind {
    Dark,
    WcuOffDark,
    SkyFlat,
    LampFlat,
}

impl CalibrationKind {
    /// Label prefix in the calibration set.
    pub fn label_prefix(self) -> char {
        match self {
            CalibrationKind::Dark | CalibrationKind::WcuOffDark => 'd',
            CalibrationKind::SkyFlat => 's',
            CalibrationKind::LampFlat => 'l',
        }
    }
}

/// Fixed part of a materialized calibration template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prototype {
    pub do_category: &'static str,
    pub mode: InstrumentMode,
    pub tech: Technique,
    pub obs_type: ObsType,
    pub tplname: &'static str,
}

impl Prototype {
    /// Engine source for this calibration.
    pub fn source(&self) -> SourceSpec {
        match self.obs_type {
            ObsType::FlatLamp => SourceSpec::new("flat_field")
                .with_kwarg("temperature", 200)
                .with_kwarg("amplitude", 0)
                .with_kwarg("filter_curve", "V")
                .with_kwarg("extend", 15),
            _ => SourceSpec::new("empty_sky"),
        }
    }
}

/// Looks up the prototype for a calibration kind on a detector family.
///
/// The IFU has no flat prototypes.
pub fn prototype(kind: CalibrationKind, family: DetectorFamily) -> Option<Prototype> {
    use CalibrationKind::*;
    use DetectorFamily::*;

    let (do_category, mode, tech, obs_type, tplname) = match (kind, family) {
        (Dark, Lm) => (
            "DARK_2RG_RAW",
            InstrumentMode::ImgLm,
            Technique::ImageLm,
            ObsType::Dark,
            "METIS_img_lm_det_dark",
        ),
        (Dark, N) => (
            "DARK_GEO_RAW",
            InstrumentMode::ImgN,
            Technique::ImageN,
            ObsType::Dark,
            "METIS_img_n_det_dark",
        ),
        (Dark, Ifu) => (
            "DARK_IFU_RAW",
            InstrumentMode::Lms,
            Technique::Lms,
            ObsType::Dark,
            "METIS_lms_det_dark",
        ),
        (WcuOffDark, Lm) => (
            "LM_WCU_OFF_RAW",
            InstrumentMode::ImgLm,
            Technique::ImageLm,
            ObsType::DarkWcuOff,
            "METIS_img_lm_det_dark",
        ),
        (WcuOffDark, N) => (
            "N_WCU_OFF_RAW",
            InstrumentMode::ImgN,
            Technique::ImageN,
            ObsType::DarkWcuOff,
            "METIS_img_n_det_dark",
        ),
        (WcuOffDark, Ifu) => (
            "IFU_WCU_OFF_RAW",
            InstrumentMode::Lms,
            Technique::Lms,
            ObsType::DarkWcuOff,
            "METIS_lms_det_dark",
        ),
        (SkyFlat, Lm) => (
            "LM_FLAT_TWILIGHT_RAW",
            InstrumentMode::ImgLm,
            Technique::ImageLm,
            ObsType::FlatTwilight,
            "METIS_img_lm_det_flat",
        ),
        (SkyFlat, N) => (
            "N_FLAT_TWILIGHT_RAW",
            InstrumentMode::ImgN,
            Technique::ImageN,
            ObsType::FlatTwilight,
            "METIS_img_n_det_flat",
        ),
        (LampFlat, Lm) => (
            "LM_FLAT_LAMP_RAW",
            InstrumentMode::ImgLm,
            Technique::ImageLm,
            ObsType::FlatLamp,
            "METIS_img_lm_det_flat",
        ),
        (LampFlat, N) => (
            "N_FLAT_LAMP_RAW",
            InstrumentMode::ImgN,
            Technique::ImageN,
            ObsType::FlatLamp,
            "METIS_img_n_det_flat",
        ),
        (SkyFlat, Ifu) | (LampFlat, Ifu) => return None,
    };

    Some(Prototype {
        do_category,
        mode,
        tech,
        obs_type,
        tplname,
    })
}
