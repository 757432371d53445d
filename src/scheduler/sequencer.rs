//! Observation time sequencing.
//!
//! Each exposure occupies `dit * ndit * 1.2 + 1` seconds of wall clock. In
//! sequence mode the clock starts once and advances by that gap after every
//! exposure; in explicit mode each expanded job restarts the clock at its own
//! `dateobs`.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use tracing::warn;

use super::filename::FilenameGenerator;
use super::job::TimestampedJob;
use crate::error::SequenceError;
use crate::recipe::{ExpandedJob, ObsTime};

/// Start time used in sequence mode when nothing better is available.
pub const DEFAULT_SEQUENCE_START: &str = "2027-01-25 00:00:00";

/// How observation times are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingMode {
    /// Auto-increment from `start`, or from the first template's `dateobs`.
    Sequence { start: Option<ObsTime> },
    /// Take every job's time from its template.
    Explicit,
}

impl TimingMode {
    /// Parses the command-line form: `1` for "first timestamp in the file",
    /// or an explicit start time.
    pub fn parse_sequence_flag(value: &str) -> Result<Self, SequenceError> {
        match value.trim() {
            "1" | "true" => Ok(TimingMode::Sequence { start: None }),
            other => Ok(TimingMode::Sequence {
                start: Some(other.parse()?),
            }),
        }
    }
}

#[derive(Debug, Clone)]
struct TemplateCursor {
    recipe: String,
    start: ObsTime,
    next_exposure: u32,
}

/// Assigns timestamps and filenames to expanded jobs.
#[derive(Debug, Clone)]
pub struct TimeSequencer {
    mode: TimingMode,
    filenames: FilenameGenerator,
    output_dir: PathBuf,
    current: Option<ObsTime>,
    pending_gap: TimeDelta,
    is_first: bool,
    template: Option<TemplateCursor>,
}

impl TimeSequencer {
    pub fn new(mode: TimingMode, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            filenames: FilenameGenerator::default(),
            output_dir: output_dir.into(),
            current: None,
            pending_gap: TimeDelta::zero(),
            is_first: true,
            template: None,
        }
    }

    pub fn with_filenames(mut self, filenames: FilenameGenerator) -> Self {
        self.filenames = filenames;
        self
    }

    pub fn mode(&self) -> TimingMode {
        self.mode
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Time of the most recently assigned exposure.
    pub fn current(&self) -> Option<ObsTime> {
        self.current
    }

    /// Continues the current timeline in sequence mode.
    ///
    /// Used for jobs that carry no `dateobs` of their own, such as inferred
    /// calibrations following an explicitly timed science block.
    pub fn continue_in_sequence(&mut self) {
        self.mode = TimingMode::Sequence {
            start: self.current,
        };
    }

    /// Forgets all state; the next job is treated as the first of a batch.
    pub fn reset(&mut self) {
        self.current = None;
        self.pending_gap = TimeDelta::zero();
        self.is_first = true;
        self.template = None;
    }

    /// Assigns times to the `nObs` exposures of one expanded job.
    pub fn schedule(&mut self, job: ExpandedJob) -> Result<Vec<TimestampedJob>, SequenceError> {
        let mut current = self.starting_point(&job)?;

        let n_obs = job.config.n_obs;
        let mut scheduled = Vec::with_capacity(n_obs.min(1024) as usize);
        for _ in 0..n_obs {
            current = advance(current, self.pending_gap, &job.recipe)?;
            self.pending_gap = overhead_gap(job.config.exposure_overhead_secs(), &job.recipe)?;

            let (template_start, exposure_number) = self.next_exposure(&job.recipe, current);
            let filename =
                self.filenames
                    .generate(&current, job.mode.as_str(), job.config.dit, &job.do_category);
            scheduled.push(TimestampedJob {
                output_path: self.output_dir.join(&filename),
                filename,
                timestamp: current,
                template_start,
                exposure_number,
                job: job.clone(),
            });
        }

        self.current = Some(current);
        Ok(scheduled)
    }

    fn starting_point(&mut self, job: &ExpandedJob) -> Result<ObsTime, SequenceError> {
        let missing = || SequenceError::MissingStartTime {
            recipe: job.recipe.clone(),
        };

        if self.is_first {
            let start = match self.mode {
                TimingMode::Sequence { start } => match start.or(job.config.dateobs) {
                    Some(start) => start,
                    None => {
                        warn!(
                            recipe = %job.recipe,
                            default = DEFAULT_SEQUENCE_START,
                            "No starting time found, using default"
                        );
                        DEFAULT_SEQUENCE_START.parse()?
                    }
                },
                TimingMode::Explicit => job.config.dateobs.ok_or_else(missing)?,
            };
            self.is_first = false;
            self.pending_gap = TimeDelta::zero();
            return Ok(start);
        }

        match self.mode {
            TimingMode::Sequence { .. } => self.current.ok_or_else(missing),
            TimingMode::Explicit => {
                let start = job.config.dateobs.ok_or_else(missing)?;
                self.pending_gap = TimeDelta::zero();
                Ok(start)
            }
        }
    }

    fn next_exposure(&mut self, recipe: &str, at: ObsTime) -> (ObsTime, u32) {
        let cursor = match self.template.take() {
            Some(cursor) if cursor.recipe == recipe => cursor,
            _ => TemplateCursor {
                recipe: recipe.to_string(),
                start: at,
                next_exposure: 0,
            },
        };
        let number = cursor.next_exposure;
        let start = cursor.start;
        self.template = Some(TemplateCursor {
            next_exposure: number + 1,
            ..cursor
        });
        (start, number)
    }
}

/// Converts an overhead in seconds to a gap with nanosecond resolution.
fn overhead_gap(seconds: f64, recipe: &str) -> Result<TimeDelta, SequenceError> {
    let nanos = (seconds * 1e9).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos >= i64::MAX as f64 {
        return Err(SequenceError::Overflow {
            recipe: recipe.to_string(),
        });
    }
    Ok(TimeDelta::nanoseconds(nanos as i64))
}

fn advance(at: ObsTime, gap: TimeDelta, recipe: &str) -> Result<ObsTime, SequenceError> {
    at.datetime()
        .checked_add_signed(gap)
        .map(ObsTime::new)
        .ok_or_else(|| SequenceError::Overflow {
            recipe: recipe.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{ParameterExpander, RecipeTemplate};

    fn template(dit: &str, n_obs: u32, dateobs: Option<&str>) -> RecipeTemplate {
        let dateobs = dateobs
            .map(|d| format!("  dateobs: \"{}\"\n", d))
            .unwrap_or_default();
        let yaml = format!(
            "do.catg: IMAGE_LM_RAW\nmode: img_lm\nproperties:\n  dit: {dit}\n  ndit: 1\n  filter_name: open\n  catg: SCIENCE\n  tech: IMAGE,LM\n  type: OBJECT\n  nObs: {n_obs}\n{dateobs}"
        );
        serde_yaml::from_str(&yaml).expect("failed to parse template")
    }

    fn schedule_all(
        sequencer: &mut TimeSequencer,
        name: &str,
        template: &RecipeTemplate,
    ) -> Result<Vec<TimestampedJob>, SequenceError> {
        let mut out = Vec::new();
        for job in ParameterExpander::default().expand(name, template) {
            out.extend(sequencer.schedule(job)?);
        }
        Ok(out)
    }

    fn at(s: &str) -> ObsTime {
        s.parse().expect("failed to parse timestamp")
    }

    #[test]
    fn test_sequence_mode_gaps() {
        let start = at("2027-01-01 00:00:00");
        let mut sequencer =
            TimeSequencer::new(TimingMode::Sequence { start: Some(start) }, "/out");
        let jobs = schedule_all(&mut sequencer, "r", &template("[1.0, 2.0]", 1, None))
            .expect("scheduling failed");

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].timestamp, start);
        assert_eq!(jobs[1].timestamp, at("2027-01-01 00:00:02.2"));
        assert_eq!(
            jobs[0].output_path,
            PathBuf::from("/out").join(&jobs[0].filename)
        );
    }

    #[test]
    fn test_gap_follows_previous_exposure() {
        let mut sequencer = TimeSequencer::new(
            TimingMode::Sequence {
                start: Some(at("2027-01-01 00:00:00")),
            },
            "/out",
        );
        let jobs = schedule_all(&mut sequencer, "r", &template("[10.0, 0.5]", 2, None))
            .expect("scheduling failed");
        let seconds: Vec<i64> = jobs
            .windows(2)
            .map(|w| (w[1].timestamp.datetime() - w[0].timestamp.datetime()).num_milliseconds())
            .collect();
        // 10*1.2+1 = 13s twice, then 0.5*1.2+1 = 1.6s once the 0.5s job runs.
        assert_eq!(seconds, vec![13_000, 13_000, 1_600]);
    }

    #[test]
    fn test_sequence_start_from_template() {
        let mut sequencer = TimeSequencer::new(TimingMode::Sequence { start: None }, "/out");
        let jobs = schedule_all(
            &mut sequencer,
            "r",
            &template("1.0", 1, Some("2027-03-01 12:00:00")),
        )
        .expect("scheduling failed");
        assert_eq!(jobs[0].timestamp, at("2027-03-01 12:00:00"));
    }

    #[test]
    fn test_sequence_default_start() {
        let mut sequencer = TimeSequencer::new(TimingMode::Sequence { start: None }, "/out");
        let jobs = schedule_all(&mut sequencer, "r", &template("1.0", 1, None))
            .expect("scheduling failed");
        assert_eq!(jobs[0].timestamp, at(DEFAULT_SEQUENCE_START));
    }

    #[test]
    fn test_explicit_mode_requires_dateobs() {
        let mut sequencer = TimeSequencer::new(TimingMode::Explicit, "/out");
        let err = schedule_all(&mut sequencer, "nodate", &template("1.0", 1, None))
            .expect_err("missing dateobs must fail");
        assert!(matches!(err, SequenceError::MissingStartTime { ref recipe } if recipe == "nodate"));
    }

    #[test]
    fn test_explicit_mode_resets_per_template() {
        let mut sequencer = TimeSequencer::new(TimingMode::Explicit, "/out");
        let first = schedule_all(
            &mut sequencer,
            "a",
            &template("1.0", 2, Some("2027-05-01 00:00:00")),
        )
        .expect("scheduling failed");
        let second = schedule_all(
            &mut sequencer,
            "b",
            &template("1.0", 1, Some("2027-04-01 00:00:00")),
        )
        .expect("scheduling failed");

        assert_eq!(first[0].timestamp, at("2027-05-01 00:00:00"));
        assert_eq!(first[1].timestamp, at("2027-05-01 00:00:02.2"));
        assert_eq!(second[0].timestamp, at("2027-04-01 00:00:00"));
    }

    #[test]
    fn test_continue_in_sequence_after_explicit_block() {
        let mut sequencer = TimeSequencer::new(TimingMode::Explicit, "/out");
        schedule_all(
            &mut sequencer,
            "sci",
            &template("1.0", 1, Some("2027-05-01 00:00:00")),
        )
        .expect("scheduling failed");

        sequencer.continue_in_sequence();
        let calib = schedule_all(&mut sequencer, "d0", &template("1.0", 1, None))
            .expect("undated job should follow the timeline");
        assert_eq!(calib[0].timestamp, at("2027-05-01 00:00:02.2"));
    }

    #[test]
    fn test_template_bookkeeping() {
        let mut sequencer = TimeSequencer::new(
            TimingMode::Sequence {
                start: Some(at("2027-01-01 00:00:00")),
            },
            "/out",
        );
        let a = schedule_all(&mut sequencer, "a", &template("[1.0, 2.0]", 2, None))
            .expect("scheduling failed");
        let b = schedule_all(&mut sequencer, "b", &template("1.0", 1, None))
            .expect("scheduling failed");

        let numbers: Vec<u32> = a.iter().map(|j| j.exposure_number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
        assert!(a.iter().all(|j| j.template_start == a[0].timestamp));
        assert_eq!(b[0].exposure_number, 0);
        assert_eq!(b[0].template_start, b[0].timestamp);
    }

    #[test]
    fn test_reset_starts_a_new_batch() {
        let start = at("2027-01-01 00:00:00");
        let mut sequencer =
            TimeSequencer::new(TimingMode::Sequence { start: Some(start) }, "/out");
        schedule_all(&mut sequencer, "a", &template("5.0", 3, None)).expect("scheduling failed");
        sequencer.reset();
        let jobs = schedule_all(&mut sequencer, "a", &template("5.0", 1, None))
            .expect("scheduling failed");
        assert_eq!(jobs[0].timestamp, start);
    }

    #[test]
    fn test_gap_beyond_range_rejected() {
        let mut sequencer = TimeSequencer::new(
            TimingMode::Sequence {
                start: Some(at("2027-01-01 00:00:00")),
            },
            "/out",
        );
        // 1e10 * 1.2 + 1 seconds does not fit in i64 nanoseconds.
        let err = schedule_all(&mut sequencer, "huge", &template("1.0e10", 2, None))
            .expect_err("gap should overflow");
        assert!(matches!(err, SequenceError::Overflow { ref recipe } if recipe == "huge"));
    }

    #[test]
    fn test_huge_n_obs_fails_without_preallocating() {
        let mut sequencer = TimeSequencer::new(
            TimingMode::Sequence {
                start: Some(at("2027-01-01 00:00:00")),
            },
            "/out",
        );
        let result = schedule_all(&mut sequencer, "many", &template("1.0e10", u32::MAX, None));
        assert!(matches!(result, Err(SequenceError::Overflow { .. })));
    }

    #[test]
    fn test_parse_sequence_flag() {
        assert_eq!(
            TimingMode::parse_sequence_flag("1").expect("flag"),
            TimingMode::Sequence { start: None }
        );
        assert_eq!(
            TimingMode::parse_sequence_flag("2027-01-01 00:00:00").expect("flag"),
            TimingMode::Sequence {
                start: Some(at("2027-01-01 00:00:00"))
            }
        );
        assert!(TimingMode::parse_sequence_flag("soon").is_err());
    }
}
