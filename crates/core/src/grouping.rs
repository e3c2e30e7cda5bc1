//! Shot grouping for merged video generation.
//!
//! Partitions timeline shots into groups that are generated as one clip.
//! A group never spans two scenes, never exceeds `target + tolerance`
//! seconds (a single oversized shot is the only exception, and it always
//! stands alone), and only holds shots that are adjacent after sorting.

use serde::Serialize;

use crate::error::CoreError;
use crate::shot::ShotUnit;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Allowed overshoot past the target duration when merging shots.
pub const DEFAULT_TOLERANCE_SECS: f64 = 5.0;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How a batch of shots should be grouped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingOptions {
    /// When false every shot becomes its own group.
    pub merge: bool,
    /// Desired clip length in seconds. Required when `merge` is true.
    pub target_duration_secs: Option<f64>,
    /// Allowed overshoot past the target.
    pub tolerance_secs: f64,
}

impl GroupingOptions {
    /// One group per shot.
    pub fn singles() -> Self {
        Self {
            merge: false,
            target_duration_secs: None,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Merge adjacent same-scene shots toward `target` seconds.
    pub fn merged(target_duration_secs: f64, tolerance_secs: f64) -> Self {
        Self {
            merge: true,
            target_duration_secs: Some(target_duration_secs),
            tolerance_secs,
        }
    }

    /// Validate merge parameters. Non-merge options are always valid.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.merge {
            return Ok(());
        }
        match self.target_duration_secs {
            Some(t) if t > 0.0 && t.is_finite() => {}
            _ => {
                return Err(CoreError::Validation(
                    "max_duration is required and must be positive when merging shots".into(),
                ))
            }
        }
        if !(self.tolerance_secs >= 0.0 && self.tolerance_secs.is_finite()) {
            return Err(CoreError::Validation(
                "tolerance must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Upper bound on a merged group's total duration.
    fn limit(&self) -> f64 {
        self.target_duration_secs.unwrap_or(0.0) + self.tolerance_secs
    }
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self::singles()
    }
}

// ---------------------------------------------------------------------------
// ShotGroup
// ---------------------------------------------------------------------------

/// A set of adjacent shots generated as a single clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShotGroup {
    pub shots: Vec<ShotUnit>,
    /// Summed effective duration of the member shots.
    pub target_duration_secs: f64,
}

impl ShotGroup {
    fn from_shots(shots: Vec<ShotUnit>) -> Self {
        let target_duration_secs = shots.iter().map(ShotUnit::effective_duration).sum();
        Self {
            shots,
            target_duration_secs,
        }
    }

    /// The first shot; its id names the group's task.
    pub fn lead(&self) -> &ShotUnit {
        &self.shots[0]
    }

    pub fn shot_ids(&self) -> Vec<DbId> {
        self.shots.iter().map(|s| s.id).collect()
    }

    pub fn scene_id(&self) -> Option<DbId> {
        self.lead().scene_id
    }

    pub fn is_merged(&self) -> bool {
        self.shots.len() > 1
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Sort shots by timeline position, ties broken by id.
pub fn sort_by_timeline(shots: &mut [ShotUnit]) {
    shots.sort_by_key(|s| (s.timeline_position(), s.id));
}

/// Adjacent pairs (after sorting) whose positions jump by more than one.
///
/// Gaps are not an error: callers log them so users know a merged clip
/// skips part of the timeline.
pub fn timeline_gaps(sorted: &[ShotUnit]) -> Vec<(i64, i64)> {
    sorted
        .windows(2)
        .filter_map(|pair| {
            let prev = pair[0].timeline_position();
            let curr = pair[1].timeline_position();
            (curr - prev > 1).then_some((prev, curr))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Partition `shots` into generation groups.
///
/// Without merging, input order is kept and each shot is a singleton.
/// With merging, shots are sorted by timeline position and packed greedily:
///
/// 1. A shot longer than `target + tolerance` closes the open group and is
///    emitted alone.
/// 2. A shot from a different scene closes the open group.
/// 3. A shot that would push the open group past `target + tolerance`
///    closes it.
/// 4. Otherwise the shot joins the open group.
pub fn group_shots(
    mut shots: Vec<ShotUnit>,
    options: &GroupingOptions,
) -> Result<Vec<ShotGroup>, CoreError> {
    options.validate()?;

    if !options.merge {
        return Ok(shots
            .into_iter()
            .map(|s| ShotGroup::from_shots(vec![s]))
            .collect());
    }

    sort_by_timeline(&mut shots);
    let limit = options.limit();

    let mut groups = Vec::new();
    let mut open: Vec<ShotUnit> = Vec::new();
    let mut open_duration = 0.0;

    for shot in shots {
        let duration = shot.effective_duration();

        if duration > limit {
            if !open.is_empty() {
                groups.push(ShotGroup::from_shots(std::mem::take(&mut open)));
                open_duration = 0.0;
            }
            groups.push(ShotGroup::from_shots(vec![shot]));
            continue;
        }

        let scene_changed = open
            .first()
            .is_some_and(|first| first.scene_id != shot.scene_id);
        let overflows = open_duration + duration > limit;

        if !open.is_empty() && (scene_changed || overflows) {
            groups.push(ShotGroup::from_shots(std::mem::take(&mut open)));
            open_duration = 0.0;
        }

        open_duration += duration;
        open.push(shot);
    }

    if !open.is_empty() {
        groups.push(ShotGroup::from_shots(open));
    }

    Ok(groups)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn shot(id: DbId, order: i32, scene: DbId, duration: f64) -> ShotUnit {
        ShotUnit {
            id,
            project_id: 1,
            scene_id: Some(scene),
            order: Some(order),
            shot_number: None,
            duration_secs: Some(duration),
            description: None,
            camera: None,
            mood: None,
            dialogue: Vec::new(),
            characters: Vec::new(),
            existing_video_url: None,
        }
    }

    fn ids(groups: &[ShotGroup]) -> Vec<Vec<DbId>> {
        groups.iter().map(ShotGroup::shot_ids).collect()
    }

    fn pseudo_random_shots(seed: u64, count: usize) -> Vec<ShotUnit> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|i| {
                let scene: DbId = rng.random_range(1..=3);
                let duration = f64::from(rng.random_range(1..=20u32));
                shot(i as DbId + 1, i as i32, scene, duration)
            })
            .collect()
    }

    // -- Validation --

    #[test]
    fn merge_without_target_is_rejected() {
        let opts = GroupingOptions {
            merge: true,
            target_duration_secs: None,
            tolerance_secs: 2.0,
        };
        assert_matches!(opts.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn merge_with_zero_target_is_rejected() {
        assert_matches!(
            GroupingOptions::merged(0.0, 2.0).validate(),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        assert_matches!(
            GroupingOptions::merged(10.0, -1.0).validate(),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn singles_need_no_target() {
        assert!(GroupingOptions::singles().validate().is_ok());
    }

    // -- Scenarios --

    #[test]
    fn five_three_second_shots_pack_four_then_one() {
        let shots = (1..=5).map(|i| shot(i, i as i32, 1, 3.0)).collect();
        let groups = group_shots(shots, &GroupingOptions::merged(12.0, 2.0)).unwrap();
        assert_eq!(ids(&groups), vec![vec![1, 2, 3, 4], vec![5]]);
        assert_eq!(groups[0].target_duration_secs, 12.0);
        assert_eq!(groups[1].target_duration_secs, 3.0);
    }

    #[test]
    fn scene_change_closes_group_even_with_room_left() {
        let shots = vec![shot(1, 1, 1, 2.0), shot(2, 2, 2, 2.0), shot(3, 3, 2, 2.0)];
        let groups = group_shots(shots, &GroupingOptions::merged(30.0, 0.0)).unwrap();
        assert_eq!(ids(&groups), vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn oversized_shot_stands_alone_between_groups() {
        let shots = vec![
            shot(1, 1, 1, 3.0),
            shot(2, 2, 1, 40.0),
            shot(3, 3, 1, 3.0),
        ];
        let groups = group_shots(shots, &GroupingOptions::merged(10.0, 2.0)).unwrap();
        assert_eq!(ids(&groups), vec![vec![1], vec![2], vec![3]]);
        assert_eq!(groups[1].target_duration_secs, 40.0);
    }

    #[test]
    fn merge_sorts_by_timeline_order() {
        let shots = vec![shot(3, 3, 1, 1.0), shot(1, 1, 1, 1.0), shot(2, 2, 1, 1.0)];
        let groups = group_shots(shots, &GroupingOptions::merged(10.0, 0.0)).unwrap();
        assert_eq!(ids(&groups), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn exact_limit_is_allowed() {
        let shots = vec![shot(1, 1, 1, 7.0), shot(2, 2, 1, 7.0)];
        let groups = group_shots(shots, &GroupingOptions::merged(12.0, 2.0)).unwrap();
        assert_eq!(ids(&groups), vec![vec![1, 2]]);
    }

    #[test]
    fn missing_duration_counts_as_default() {
        let mut a = shot(1, 1, 1, 0.0);
        a.duration_secs = None;
        let b = shot(2, 2, 1, 3.0);
        let groups = group_shots(vec![a, b], &GroupingOptions::merged(6.0, 0.0)).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].target_duration_secs, 6.0);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let groups = group_shots(Vec::new(), &GroupingOptions::merged(10.0, 1.0)).unwrap();
        assert!(groups.is_empty());
    }

    // -- Properties --

    #[test]
    fn non_merge_yields_one_group_per_shot_in_input_order() {
        for seed in 0..20 {
            let shots = pseudo_random_shots(seed, 15);
            let expected: Vec<Vec<DbId>> = shots.iter().map(|s| vec![s.id]).collect();
            let groups = group_shots(shots, &GroupingOptions::singles()).unwrap();
            assert_eq!(ids(&groups), expected);
        }
    }

    #[test]
    fn merged_groups_respect_duration_bound_unless_oversized_singleton() {
        for seed in 0..50 {
            let opts = GroupingOptions::merged(12.0, 2.0);
            let groups = group_shots(pseudo_random_shots(seed, 25), &opts).unwrap();
            for g in &groups {
                let total: f64 = g.shots.iter().map(ShotUnit::effective_duration).sum();
                if total > 14.0 {
                    assert_eq!(g.shots.len(), 1, "only a singleton may exceed the bound");
                }
            }
        }
    }

    #[test]
    fn merged_groups_never_span_two_scenes() {
        for seed in 0..50 {
            let groups =
                group_shots(pseudo_random_shots(seed, 25), &GroupingOptions::merged(20.0, 5.0))
                    .unwrap();
            for g in &groups {
                assert!(g.shots.iter().all(|s| s.scene_id == g.scene_id()));
            }
        }
    }

    #[test]
    fn merged_groups_cover_every_shot_once_in_timeline_order() {
        for seed in 0..20 {
            let shots = pseudo_random_shots(seed, 30);
            let groups = group_shots(shots, &GroupingOptions::merged(9.0, 1.0)).unwrap();
            let flattened: Vec<DbId> = groups.iter().flat_map(ShotGroup::shot_ids).collect();
            assert_eq!(flattened, (1..=30).collect::<Vec<DbId>>());
        }
    }

    // -- Gaps --

    #[test]
    fn timeline_gaps_reports_jumps() {
        let shots = vec![shot(1, 1, 1, 1.0), shot(2, 2, 1, 1.0), shot(3, 5, 1, 1.0)];
        assert_eq!(timeline_gaps(&shots), vec![(2, 5)]);
    }
}
