//! Keyword names and the per-technique header table.

pub const KEY_MJD_OBS: &str = "MJD-OBS";
pub const KEY_DPR_TECH: &str = "HIERARCH ESO DPR TECH";
pub const KEY_DPR_TYPE: &str = "HIERARCH ESO DPR TYPE";
pub const KEY_DPR_CATG: &str = "HIERARCH ESO DPR CATG";
pub const KEY_DRS_FILTER: &str = "HIERARCH ESO DRS FILTER";
pub const KEY_INS_MODE: &str = "HIERARCH ESO INS MODE";
pub const KEY_LASER1_NAME: &str = "HIERARCH ESO SEQ WCU LASER1 NAME";
pub const KEY_DRS_MASK: &str = "HIERARCH ESO DRS MASK";
pub const KEY_DRS_IFU: &str = "HIERARCH ESO DRS IFU";
pub const KEY_DRS_SLIT: &str = "HIERARCH ESO INS DRS SLIT";

const OPTI1: &str = "HIERARCH ESO INS OPTI1 NAME";
const OPTI3: &str = "HIERARCH ESO INS OPTI3 NAME";
const OPTI5: &str = "HIERARCH ESO INS OPTI5 NAME";
const OPTI6: &str = "HIERARCH ESO INS OPTI6 NAME";
const OPTI9: &str = "HIERARCH ESO INS OPTI9 NAME";
const OPTI10: &str = "HIERARCH ESO INS OPTI10 NAME";
const OPTI12: &str = "HIERARCH ESO INS OPTI12 NAME";
const OPTI13: &str = "HIERARCH ESO INS OPTI13 NAME";
const OPTI15: &str = "HIERARCH ESO INS OPTI15 NAME";

const SLIT: &str = "C-38_1";
const MASK_RAVC: &str = "VPM-L,RAP-LM,RLS-LMS";
const MASK_APP: &str = "VPM-L,RAP-LM,APP-LMS";

/// Source of a keyword's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Fixed(&'static str),
    /// Copied from the artifact's filter keyword.
    Filter,
}

/// Keywords written for one `DPR TECH` value, in write order.
#[derive(Debug)]
pub struct TechniqueRule {
    pub tech: &'static str,
    pub fields: &'static [(&'static str, FieldValue)],
}

use FieldValue::{Filter, Fixed};

static RULES: &[TechniqueRule] = &[
    TechniqueRule {
        tech: "LSS,LM",
        fields: &[
            (KEY_INS_MODE, Fixed("SPEC_LM")),
            (OPTI9, Filter),
            (KEY_DRS_SLIT, Fixed(SLIT)),
        ],
    },
    TechniqueRule {
        tech: "LSS,N",
        fields: &[
            (KEY_INS_MODE, Fixed("SPEC_N_LOW")),
            (OPTI12, Filter),
            (KEY_DRS_SLIT, Fixed(SLIT)),
        ],
    },
    TechniqueRule {
        tech: "IMAGE,LM",
        fields: &[(KEY_INS_MODE, Fixed("IMG_LM")), (OPTI10, Filter)],
    },
    TechniqueRule {
        tech: "IMAGE,N",
        fields: &[(KEY_INS_MODE, Fixed("IMG_N")), (OPTI13, Filter)],
    },
    TechniqueRule {
        tech: "LMS",
        fields: &[
            (KEY_INS_MODE, Fixed("IFU_nominal")),
            (OPTI6, Filter),
            (KEY_DRS_IFU, Filter),
            (KEY_DPR_TECH, Fixed("IFU")),
        ],
    },
    TechniqueRule {
        tech: "RAVC,LM",
        fields: &[
            (KEY_INS_MODE, Fixed("IMG_LM_RAVC")),
            (OPTI10, Filter),
            (KEY_DRS_MASK, Fixed(MASK_RAVC)),
            (OPTI1, Fixed("RAP-LM")),
            (OPTI3, Fixed("VPM-L")),
            (OPTI5, Fixed("RLS-LMS")),
            (KEY_DPR_TECH, Fixed("IMAGE,LM")),
        ],
    },
    TechniqueRule {
        tech: "APP,LM",
        fields: &[
            (KEY_INS_MODE, Fixed("IMG_LM_APP")),
            (OPTI10, Filter),
            (KEY_DPR_TECH, Fixed("IMAGE,LM")),
            (OPTI1, Fixed("RAP-LM")),
            (OPTI3, Fixed("VPM-L")),
            (OPTI5, Fixed("APP-LMS")),
            (KEY_DRS_MASK, Fixed(MASK_APP)),
        ],
    },
    TechniqueRule {
        tech: "RAVC,IFU",
        fields: &[
            (KEY_INS_MODE, Fixed("IFU_nominal_RAVC")),
            (OPTI6, Filter),
            (KEY_DRS_IFU, Filter),
            (KEY_DPR_TECH, Fixed("IFU")),
            (OPTI1, Fixed("RAP-LM")),
            (OPTI3, Fixed("VPM-L")),
            (OPTI5, Fixed("RLS-LMS")),
            (KEY_DRS_MASK, Fixed(MASK_RAVC)),
        ],
    },
    TechniqueRule {
        tech: "PUP,LM",
        fields: &[(KEY_INS_MODE, Fixed("IMG_LM")), (OPTI15, Fixed("PUPIL1"))],
    },
    TechniqueRule {
        tech: "PUP,N",
        fields: &[(KEY_INS_MODE, Fixed("IMG_N")), (OPTI15, Fixed("PUPIL2"))],
    },
];

/// Header rule for a `DPR TECH` value as written by the engine.
pub fn rule_for(tech: &str) -> Option<&'static TechniqueRule> {
    RULES.iter().find(|rule| rule.tech == tech)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Technique;

    #[test]
    fn test_every_technique_but_pup_m_has_a_rule() {
        for tech in Technique::ALL {
            if tech == Technique::PupM {
                assert!(rule_for(tech.as_str()).is_none());
            } else {
                assert!(rule_for(tech.as_str()).is_some(), "no rule for {tech}");
            }
        }
    }

    #[test]
    fn test_pupil_rules() {
        let rule = rule_for("PUP,N").expect("PUP,N rule");
        assert!(rule.fields.contains(&(OPTI15, Fixed("PUPIL2"))));
        assert!(rule_for("IFU").is_none());
    }
}
