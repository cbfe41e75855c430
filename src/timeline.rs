//! Code for working with the master timeline and dividing it into stages.
//!
//! A [`Timeline`] is an evenly spaced sequence of instants. Each instant stands for the interval
//! which *ends* at that instant, so the state of the system before the first instant is the state
//! at [`Timeline::initial_time`].
//!
//! For a rolling-horizon run the timeline is divided into [`Stage`]s. Each stage covers a range of
//! instants which may extend past the part of the stage whose results are kept (the overlap), so
//! that decisions near the end of the kept part can take later conditions into account.
use anyhow::{Context, Result, ensure};
use chrono::{NaiveDateTime, TimeDelta};
use log::warn;
use std::ops::Range;

/// Tolerance used when checking whether a number of hours is a whole number of intervals
const STEP_TOLERANCE: f64 = 1e-9;

/// The number of seconds in an hour
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Convert a number of hours into a [`TimeDelta`]
pub fn hours_to_delta(hours: f64) -> TimeDelta {
    TimeDelta::milliseconds((hours * SECONDS_PER_HOUR * 1000.0).round() as i64)
}

/// Convert a [`TimeDelta`] into a number of hours
pub fn delta_to_hours(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / (SECONDS_PER_HOUR * 1000.0)
}

/// An ordered, evenly spaced sequence of instants
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    times: Vec<NaiveDateTime>,
    interval: TimeDelta,
}

impl Timeline {
    /// Create a timeline, inferring the interval from the spacing of the instants.
    ///
    /// There must be at least two instants, which must be strictly increasing and evenly spaced.
    pub fn new(times: Vec<NaiveDateTime>) -> Result<Self> {
        ensure!(
            times.len() >= 2,
            "At least two instants are needed to infer the interval of a timeline"
        );
        let interval = times[1] - times[0];
        Self::with_interval(times, interval)
    }

    /// Create a timeline with an explicit interval
    pub fn with_interval(times: Vec<NaiveDateTime>, interval: TimeDelta) -> Result<Self> {
        ensure!(!times.is_empty(), "Timeline cannot be empty");
        ensure!(
            interval > TimeDelta::zero(),
            "Timeline interval must be positive"
        );
        for (prev, next) in times.iter().zip(times.iter().skip(1)) {
            ensure!(
                *next - *prev == interval,
                "Instants must be strictly increasing and evenly spaced ({interval} apart), \
                but {prev} is followed by {next}"
            );
        }

        Ok(Self { times, interval })
    }

    /// The number of instants
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the timeline has no instants (never true for a valid timeline)
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The instant at the given index
    pub fn time(&self, idx: usize) -> NaiveDateTime {
        self.times[idx]
    }

    /// The spacing between instants, in hours
    pub fn interval_hours(&self) -> f64 {
        delta_to_hours(self.interval)
    }

    /// The instant before the first one, whose state is the starting condition
    pub fn initial_time(&self) -> NaiveDateTime {
        self.times[0] - self.interval
    }

    /// The instant whose state is the starting condition for a range starting at `start`
    fn initial_time_for(&self, start: usize) -> NaiveDateTime {
        if start == 0 {
            self.initial_time()
        } else {
            self.times[start - 1]
        }
    }

    /// Create a single stage covering the whole timeline
    pub fn single_stage(&self, interval_hours: Option<f64>) -> Stage {
        let n = self.len();
        Stage {
            index: 0,
            range: 0..n,
            non_overlap: 0..n,
            initial_time: self.initial_time(),
            interval_hours: interval_hours.unwrap_or_else(|| self.interval_hours()),
            times: self.times.clone(),
        }
    }

    /// Divide the timeline into overlapping stages.
    ///
    /// # Arguments
    ///
    /// * `stage_hours` - The number of hours in the non-overlapping part of each stage
    /// * `overlap_hours` - The number of extra hours solved at the end of each stage
    /// * `interval_hours` - The length of each interval (defaults to the timeline's interval)
    ///
    /// # Returns
    ///
    /// The stages in order. The non-overlapping parts of the stages partition the timeline.
    pub fn subdivide(
        &self,
        stage_hours: f64,
        overlap_hours: f64,
        interval_hours: Option<f64>,
    ) -> Result<Vec<Stage>> {
        let interval_hours = interval_hours.unwrap_or_else(|| self.interval_hours());
        ensure!(
            interval_hours > 0.0 && interval_hours.is_finite(),
            "Interval length must be a positive number of hours"
        );
        ensure!(
            stage_hours > 0.0 && stage_hours.is_finite(),
            "Stage length must be a positive number of hours"
        );
        ensure!(
            (0.0..stage_hours).contains(&overlap_hours),
            "Overlap length must be non-negative and less than the stage length \
            ({overlap_hours} vs {stage_hours} hours)"
        );

        let stage_steps = whole_steps(stage_hours, interval_hours).with_context(|| {
            format!(
                "Stage length ({stage_hours} hours) must be a whole number of intervals \
                ({interval_hours} hours)"
            )
        })?;
        let overlap_steps = whole_steps(overlap_hours, interval_hours).unwrap_or_else(|| {
            let steps = (overlap_hours / interval_hours).floor() as usize;
            warn!(
                "Overlap length ({overlap_hours} hours) is not a whole number of intervals \
                ({interval_hours} hours). Using {steps} intervals."
            );
            steps
        });
        ensure!(stage_steps >= 1, "Stage length is shorter than one interval");

        let n = self.len();
        let stages = (0..n)
            .step_by(stage_steps)
            .enumerate()
            .map(|(index, start)| Stage {
                index,
                range: start..(start + stage_steps + overlap_steps).min(n),
                non_overlap: start..(start + stage_steps).min(n),
                initial_time: self.initial_time_for(start),
                interval_hours,
                times: self.times[start..(start + stage_steps + overlap_steps).min(n)].to_vec(),
            })
            .collect();

        Ok(stages)
    }
}

/// The number of whole intervals in `hours`, if it is a whole number
fn whole_steps(hours: f64, interval_hours: f64) -> Option<usize> {
    let steps = hours / interval_hours;
    ((steps - steps.round()).abs() < STEP_TOLERANCE).then(|| steps.round() as usize)
}

/// A contiguous part of the master timeline, solved as a single optimisation problem
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// The position of the stage in the sequence of stages
    pub index: usize,
    /// Indices of all instants solved in this stage (including the overlap)
    pub range: Range<usize>,
    /// Indices of the instants whose results are kept
    pub non_overlap: Range<usize>,
    /// The instant whose state is the starting condition for the stage
    pub initial_time: NaiveDateTime,
    /// The length of each interval, in hours
    pub interval_hours: f64,
    times: Vec<NaiveDateTime>,
}

impl Stage {
    /// The first instant of the stage
    pub fn start_time(&self) -> NaiveDateTime {
        self.times[0]
    }

    /// Iterate over the global indices and instants of the stage
    pub fn iter(&self) -> impl Iterator<Item = (usize, NaiveDateTime)> + '_ {
        self.range.clone().zip(self.times.iter().copied())
    }

    /// Global index of the instant at which the final state is taken.
    ///
    /// This is the last instant of the non-overlapping part of the stage, i.e. the instant whose
    /// state is the starting condition for the next stage.
    pub fn boundary(&self) -> usize {
        self.non_overlap.end - 1
    }

    /// Whether the instant with the given global index is part of the non-overlapping range
    pub fn is_kept(&self, idx: usize) -> bool {
        self.non_overlap.contains(&idx)
    }

    /// A short timestamp used in file names, e.g. `2024-01-01--00-00`
    pub fn file_label(&self) -> String {
        self.start_time().format("%Y-%m-%d--%H-%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{hourly_timeline, time};
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;
    use rstest::rstest;

    /// Check that the non-overlapping ranges partition the timeline
    fn assert_partition(stages: &[Stage], n: usize) {
        let kept = stages
            .iter()
            .flat_map(|stage| stage.non_overlap.clone())
            .collect_vec();
        assert_eq!(kept, (0..n).collect_vec());
    }

    #[test]
    fn test_timeline_new() {
        let timeline = hourly_timeline(3);
        assert_eq!(timeline.len(), 3);
        assert_approx_eq!(f64, timeline.interval_hours(), 1.0);
        assert_eq!(timeline.initial_time(), time(2023, 12, 31, 23));
    }

    #[test]
    fn test_timeline_new_uneven() {
        let times = vec![time(2024, 1, 1, 0), time(2024, 1, 1, 1), time(2024, 1, 1, 3)];
        assert!(Timeline::new(times).is_err());
    }

    #[test]
    fn test_timeline_new_decreasing() {
        let times = vec![time(2024, 1, 1, 1), time(2024, 1, 1, 0)];
        assert!(Timeline::new(times).is_err());
    }

    #[test]
    fn test_timeline_single_instant() {
        assert!(Timeline::new(vec![time(2024, 1, 1, 0)]).is_err());
        let timeline =
            Timeline::with_interval(vec![time(2024, 1, 1, 0)], TimeDelta::hours(1)).unwrap();
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_subdivide_48_24_6() {
        let timeline = hourly_timeline(48);
        let stages = timeline.subdivide(24.0, 6.0, Some(1.0)).unwrap();
        assert_eq!(stages.len(), 2);

        assert_eq!(stages[0].range, 0..30);
        assert_eq!(stages[0].non_overlap, 0..24);
        assert_eq!(stages[0].initial_time, timeline.initial_time());
        assert_eq!(stages[0].boundary(), 23);

        assert_eq!(stages[1].range, 24..48);
        assert_eq!(stages[1].non_overlap, 24..48);
        assert_eq!(stages[1].initial_time, timeline.time(23));
        assert_eq!(stages[1].start_time(), timeline.time(24));
        assert_eq!(stages[1].boundary(), 47);

        assert_partition(&stages, 48);
    }

    #[rstest]
    #[case(48, 24.0, 0.0, 1.0)]
    #[case(50, 24.0, 6.0, 1.0)]
    #[case(7, 3.0, 2.0, 1.0)]
    #[case(10, 1.0, 0.0, 1.0)]
    #[case(24, 6.0, 2.5, 1.0)]
    #[case(12, 4.0, 3.0, 2.0)]
    fn test_subdivide_partition(
        #[case] n: usize,
        #[case] stage_hours: f64,
        #[case] overlap_hours: f64,
        #[case] interval_hours: f64,
    ) {
        let timeline = hourly_timeline(n);
        let stages = timeline
            .subdivide(stage_hours, overlap_hours, Some(interval_hours))
            .unwrap();
        assert_partition(&stages, n);

        // Each stage starts where the previous one's kept range ended
        for (prev, next) in stages.iter().tuple_windows() {
            assert_eq!(prev.non_overlap.end, next.range.start);
            assert_eq!(next.initial_time, timeline.time(prev.boundary()));
        }
    }

    #[test]
    fn test_subdivide_overlap_truncated() {
        let timeline = hourly_timeline(24);
        let stages = timeline.subdivide(6.0, 2.5, None).unwrap();
        assert_eq!(stages[0].range, 0..8);
        assert_eq!(stages[0].non_overlap, 0..6);
    }

    #[rstest]
    #[case(24.0, 24.0)]
    #[case(24.0, 30.0)]
    #[case(24.0, -1.0)]
    #[case(0.0, 0.0)]
    #[case(2.5, 0.0)]
    fn test_subdivide_invalid(#[case] stage_hours: f64, #[case] overlap_hours: f64) {
        let timeline = hourly_timeline(48);
        assert!(timeline.subdivide(stage_hours, overlap_hours, None).is_err());
    }

    #[test]
    fn test_single_stage() {
        let timeline = hourly_timeline(12);
        let stage = timeline.single_stage(None);
        assert_eq!(stage.range, 0..12);
        assert_eq!(stage.non_overlap, 0..12);
        assert_eq!(stage.boundary(), 11);
        assert_eq!(stage.start_time(), timeline.time(0));
        assert_eq!(stage.iter().last(), Some((11, timeline.time(11))));
        assert_eq!(stage.file_label(), "2024-01-01--00-00");
    }

    #[test]
    fn test_stage_kept() {
        let timeline = hourly_timeline(48);
        let stages = timeline.subdivide(24.0, 6.0, None).unwrap();
        assert!(stages[0].is_kept(23));
        assert!(!stages[0].is_kept(24));
        assert_eq!(stages[0].iter().count(), 30);
    }

    #[test]
    fn test_hours_conversion() {
        assert_eq!(hours_to_delta(1.5), TimeDelta::minutes(90));
        assert_approx_eq!(f64, delta_to_hours(TimeDelta::minutes(15)), 0.25);
    }
}
