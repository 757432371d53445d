//! Post-simulation header reconciliation.
//!
//! The engine does not know every keyword the data reduction expects, and
//! its own time handling is not trusted. [`HeaderReconciler::reconcile`] is
//! a pure `(artifact, timestamp) -> artifact` transform; [`HeaderReconciler::apply`]
//! wraps it with a read and an in-place write through an [`ArtifactStore`].

pub mod keywords;

pub use keywords::{rule_for, FieldValue, TechniqueRule};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::HeaderError;
use crate::recipe::ObsTime;
use crate::scheduler::ProducedFile;
use crate::simulation::{Artifact, ArtifactStore};
use keywords::{KEY_DPR_TECH, KEY_DPR_TYPE, KEY_DRS_FILTER, KEY_LASER1_NAME, KEY_MJD_OBS};

/// Rewrites produced artifacts so their headers match the data-reduction
/// design.
pub struct HeaderReconciler {
    store: Arc<dyn ArtifactStore>,
}

impl HeaderReconciler {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Corrects one artifact.
    ///
    /// - drops keywords that are not all upper case, from every HDU
    /// - sets `MJD-OBS` from `timestamp`
    /// - derives mode, optics, mask and slit keywords from `DPR TECH`
    /// - names the WCU laser for wavelength calibrations
    pub fn reconcile(mut artifact: Artifact, timestamp: &ObsTime) -> Artifact {
        for hdu in &mut artifact.hdus {
            hdu.header.retain(|card| {
                let keep = card.key.to_uppercase() == card.key;
                if !keep {
                    debug!(key = %card.key, "Removed lower-case keyword");
                }
                keep
            });
        }

        let Some(header) = artifact.primary_mut() else {
            return artifact;
        };

        header.set(KEY_MJD_OBS, timestamp.mjd());

        let tech = header.get_str(KEY_DPR_TECH).map(str::to_string);
        let filter = header.get_str(KEY_DRS_FILTER).map(str::to_string);

        match tech.as_deref().and_then(rule_for) {
            Some(rule) => {
                for (key, value) in rule.fields {
                    match (value, filter.as_deref()) {
                        (FieldValue::Fixed(fixed), _) => header.set(*key, *fixed),
                        (FieldValue::Filter, Some(filter)) => header.set(*key, filter),
                        (FieldValue::Filter, None) => {
                            warn!(key = %key, "No filter keyword, cannot derive value")
                        }
                    }
                }
            }
            None => debug!(tech = ?tech, "No header rule for technique"),
        }

        if header.get_str(KEY_DPR_TYPE) == Some("WAVE") {
            header.set(KEY_LASER1_NAME, "LASER1");
        }

        artifact
    }

    /// Reads, corrects and overwrites one produced artifact.
    pub async fn apply(&self, file: &ProducedFile) -> Result<(), HeaderError> {
        let artifact = self.store.read(&file.path).await?;
        if artifact.primary().is_none() {
            return Err(HeaderError::EmptyArtifact(file.path.clone()));
        }
        let corrected = Self::reconcile(artifact, &file.timestamp);
        self.store.write(&file.path, &corrected).await
    }

    /// Corrects every file, in the order given.
    pub async fn apply_all<'a, I>(&self, files: I) -> Result<usize, HeaderError>
    where
        I: IntoIterator<Item = &'a ProducedFile>,
    {
        let mut count = 0;
        for file in files {
            debug!(file = %file.path.display(), "Reconciling headers");
            self.apply(file).await?;
            count += 1;
        }
        info!(files = count, "Headers reconciled");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{Hdu, Header, HeaderValue, JsonArtifactStore};

    fn artifact(tech: &str, obs_type: &str, filter: &str) -> Artifact {
        let mut primary = Header::new();
        primary.set(KEY_DPR_TECH, tech);
        primary.set(KEY_DPR_TYPE, obs_type);
        primary.set(KEY_DRS_FILTER, filter);
        primary.set("MJD-OBS", "2000-01-01T00:00:00");
        primary.set("pixel_size", 0.00547);
        let mut ext = Header::new();
        ext.set("EXTNAME", "DET1.DATA");
        ext.set("Lower", 1i64);
        Artifact::new(vec![Hdu::with_header(primary), Hdu::with_header(ext)])
    }

    fn at(s: &str) -> ObsTime {
        s.parse().expect("failed to parse timestamp")
    }

    #[test]
    fn test_lowercase_keys_removed_everywhere() {
        let fixed = HeaderReconciler::reconcile(
            artifact("IMAGE,LM", "OBJECT", "Lp"),
            &at("2027-01-01 00:00:00"),
        );
        for hdu in &fixed.hdus {
            assert!(hdu.header.keys().all(|k| k.to_uppercase() == k));
        }
        assert!(fixed.hdus[1].header.contains("EXTNAME"));
    }

    #[test]
    fn test_mjd_overwritten_from_timestamp() {
        let t = at("2027-01-01 00:00:00");
        let fixed = HeaderReconciler::reconcile(artifact("IMAGE,N", "OBJECT", "N2"), &t);
        let primary = fixed.primary().expect("primary");
        assert_eq!(primary.get("MJD-OBS"), Some(&HeaderValue::Float(t.mjd())));
        assert_eq!(primary.get_str("HIERARCH ESO INS MODE"), Some("IMG_N"));
        assert_eq!(primary.get_str("HIERARCH ESO INS OPTI13 NAME"), Some("N2"));
    }

    #[test]
    fn test_lms_becomes_ifu() {
        let fixed = HeaderReconciler::reconcile(
            artifact("LMS", "OBJECT", "Br_alpha"),
            &at("2027-01-01 00:00:00"),
        );
        let primary = fixed.primary().expect("primary");
        assert_eq!(primary.get_str(KEY_DPR_TECH), Some("IFU"));
        assert_eq!(primary.get_str("HIERARCH ESO INS MODE"), Some("IFU_nominal"));
        assert_eq!(primary.get_str("HIERARCH ESO DRS IFU"), Some("Br_alpha"));
        assert_eq!(primary.get_str("HIERARCH ESO INS OPTI6 NAME"), Some("Br_alpha"));
    }

    #[test]
    fn test_coronagraph_masks() {
        let fixed = HeaderReconciler::reconcile(
            artifact("APP,LM", "OBJECT", "HCI_M"),
            &at("2027-01-01 00:00:00"),
        );
        let primary = fixed.primary().expect("primary");
        assert_eq!(primary.get_str(KEY_DPR_TECH), Some("IMAGE,LM"));
        assert_eq!(primary.get_str("HIERARCH ESO INS MODE"), Some("IMG_LM_APP"));
        assert_eq!(primary.get_str("HIERARCH ESO DRS MASK"), Some("VPM-L,RAP-LM,APP-LMS"));
        assert_eq!(primary.get_str("HIERARCH ESO INS OPTI5 NAME"), Some("APP-LMS"));
        assert_eq!(primary.get_str("HIERARCH ESO INS OPTI10 NAME"), Some("HCI_M"));
    }

    #[test]
    fn test_slit_and_laser() {
        let fixed = HeaderReconciler::reconcile(
            artifact("LSS,LM", "WAVE", "L_spec"),
            &at("2027-01-01 00:00:00"),
        );
        let primary = fixed.primary().expect("primary");
        assert_eq!(primary.get_str("HIERARCH ESO INS MODE"), Some("SPEC_LM"));
        assert_eq!(primary.get_str("HIERARCH ESO INS DRS SLIT"), Some("C-38_1"));
        assert_eq!(primary.get_str("HIERARCH ESO SEQ WCU LASER1 NAME"), Some("LASER1"));
    }

    #[test]
    fn test_unknown_technique_only_cleans_up() {
        let fixed = HeaderReconciler::reconcile(
            artifact("SOMETHING", "OBJECT", "open"),
            &at("2027-01-01 00:00:00"),
        );
        let primary = fixed.primary().expect("primary");
        assert!(!primary.contains("HIERARCH ESO INS MODE"));
        assert!(primary.contains("MJD-OBS"));
    }

    #[test]
    fn test_pup_m_keywords_left_untouched() {
        let original = artifact("PUP,M", "PUPIL", "open");
        let fixed = HeaderReconciler::reconcile(original.clone(), &at("2027-01-01 00:00:00"));
        let before = original.primary().expect("primary");
        let after = fixed.primary().expect("primary");

        assert!(!after.contains("HIERARCH ESO INS MODE"));
        assert!(!after.contains("HIERARCH ESO INS OPTI15 NAME"));
        assert_eq!(after.get_str(KEY_DPR_TECH), Some("PUP,M"));
        // Only the timestamp and the lower-case cleanup apply.
        let changed: Vec<&str> = after
            .keys()
            .filter(|key| before.get(key) != after.get(key))
            .collect();
        assert_eq!(changed, vec!["MJD-OBS"]);
        assert_eq!(after.len(), before.len() - 1);
    }

    #[tokio::test]
    async fn test_apply_rewrites_in_place() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("METIS.X.fits");
        let store = Arc::new(JsonArtifactStore);
        store
            .write(&path, &artifact("RAVC,IFU", "OBJECT", "open"))
            .await
            .expect("failed to seed artifact");

        let reconciler = HeaderReconciler::new(store.clone());
        let file = ProducedFile {
            path: path.clone(),
            timestamp: at("2027-01-01 00:00:00"),
        };
        assert_eq!(reconciler.apply_all([&file]).await.expect("apply failed"), 1);

        let back = store.read(&path).await.expect("failed to read back");
        let primary = back.primary().expect("primary");
        assert_eq!(primary.get_str("HIERARCH ESO INS MODE"), Some("IFU_nominal_RAVC"));
        assert!(!primary.contains("pixel_size"));
    }

    #[tokio::test]
    async fn test_apply_rejects_empty_artifact() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("empty.fits");
        let store = Arc::new(JsonArtifactStore);
        store
            .write(&path, &Artifact::default())
            .await
            .expect("failed to seed artifact");

        let file = ProducedFile {
            path,
            timestamp: at("2027-01-01 00:00:00"),
        };
        let err = HeaderReconciler::new(store)
            .apply(&file)
            .await
            .expect_err("empty artifact must fail");
        assert!(matches!(err, HeaderError::EmptyArtifact(_)));
    }
}
