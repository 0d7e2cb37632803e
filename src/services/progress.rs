//! Progress dashboard aggregation.
//!
//! Everything here is computed against a single `now` captured by the caller,
//! so a dashboard request is deterministic and repeatable: same stored data
//! plus same `now` yields an identical snapshot. The store reads are
//! independent and run concurrently; the arithmetic itself is pure and lives
//! in free functions below so it can be tested without a database.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::db::operations::events::{self, EVENT_PRACTICE_PRON};
use crate::db::operations::feedback::{self, ScoreSample};
use crate::db::DatabaseProxy;

const WEEK_DAYS: i64 = 7;
const MONTH_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub overall: f64,
    /// 30-day blended overall. The name is a legacy pass-through of the
    /// dashboard contract, not a fluency-only rating.
    pub fluency_rating: f64,
    pub count: i64,
    pub streak: i64,
    pub week_fluency: f64,
    pub week_accuracy: f64,
    pub week_pronunciation: f64,
    pub week_pronunciation_exercises: i64,
    pub percentile: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyScorePoint {
    pub date: NaiveDate,
    pub accuracy: f64,
    pub fluency: f64,
    pub pronunciation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressDashboard {
    pub stats: DashboardStats,
    pub data: Vec<DailyScorePoint>,
}

/// Builds the dashboard snapshot for one user. Read-only; the only failure
/// mode is a store error, which propagates unchanged.
pub async fn compute_dashboard(
    proxy: &DatabaseProxy,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<ProgressDashboard, sqlx::Error> {
    let week_cutoff = (now - Duration::days(WEEK_DAYS)).naive_utc();
    let month_cutoff = (now - Duration::days(MONTH_DAYS)).naive_utc();

    let (week_scores, month_scores, event_dates, lifetime_count, week_pron_count, cohort_scores) =
        tokio::try_join!(
            feedback::list_scores_since(proxy, user_id, week_cutoff),
            feedback::list_scores_since(proxy, user_id, month_cutoff),
            events::distinct_event_dates(proxy, user_id),
            events::count_events(proxy, user_id, None, None),
            events::count_events(proxy, user_id, Some(EVENT_PRACTICE_PRON), Some(week_cutoff)),
            feedback::list_all_user_scores_since(proxy, week_cutoff),
        )?;

    Ok(assemble(
        user_id,
        now,
        &week_scores,
        &month_scores,
        &event_dates,
        lifetime_count,
        week_pron_count,
        &cohort_scores,
    ))
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    user_id: &str,
    now: DateTime<Utc>,
    week_scores: &[ScoreSample],
    month_scores: &[ScoreSample],
    event_dates: &[NaiveDate],
    lifetime_count: i64,
    week_pron_count: i64,
    cohort_scores: &[(String, ScoreSample)],
) -> ProgressDashboard {
    let week = WindowMeans::from_samples(week_scores);
    let month = WindowMeans::from_samples(month_scores);

    let dates: HashSet<NaiveDate> = event_dates.iter().copied().collect();

    let stats = DashboardStats {
        overall: round2(week.overall),
        fluency_rating: round2(month.overall),
        count: lifetime_count,
        streak: streak_length(&dates, now.date_naive()),
        week_fluency: round2(week.fluency),
        week_accuracy: round2(week.accuracy),
        week_pronunciation: round2(week.pronunciation),
        week_pronunciation_exercises: week_pron_count,
        percentile: percentile_rank(user_id, cohort_scores),
    };

    ProgressDashboard {
        stats,
        data: daily_series(week_scores),
    }
}

/// Per-metric arithmetic means over one trailing window, plus the blended
/// overall. Completeness is carried in the samples but deliberately excluded
/// from the blend. Empty windows are all-zero, never NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WindowMeans {
    accuracy: f64,
    fluency: f64,
    pronunciation: f64,
    overall: f64,
}

impl WindowMeans {
    fn from_samples(samples: &[ScoreSample]) -> Self {
        if samples.is_empty() {
            return Self {
                accuracy: 0.0,
                fluency: 0.0,
                pronunciation: 0.0,
                overall: 0.0,
            };
        }

        let n = samples.len() as f64;
        let accuracy = samples.iter().map(|s| s.accuracy).sum::<f64>() / n;
        let fluency = samples.iter().map(|s| s.fluency).sum::<f64>() / n;
        let pronunciation = samples.iter().map(|s| s.pronunciation).sum::<f64>() / n;

        Self {
            accuracy,
            fluency,
            pronunciation,
            overall: (accuracy + fluency + pronunciation) / 3.0,
        }
    }
}

/// Consecutive-day walk. The start day is today when today has an event,
/// otherwise yesterday (a miss today does not zero the streak, it simply
/// does not count yet). Every present day on the walk counts, today
/// included; the walk stops at the first absent day.
fn streak_length(dates: &HashSet<NaiveDate>, today: NaiveDate) -> i64 {
    let mut day = if dates.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut count = 0;
    while dates.contains(&day) {
        count += 1;
        day -= Duration::days(1);
    }
    count
}

/// Rank among users with at least one scored attempt in the trailing week:
/// floor(100 * strictly-below / active-users). The scan input is already
/// restricted to active users, so a quiet user base costs nothing.
fn percentile_rank(user_id: &str, cohort_scores: &[(String, ScoreSample)]) -> i64 {
    if cohort_scores.is_empty() {
        return 0;
    }

    let mut per_user: HashMap<&str, Vec<&ScoreSample>> = HashMap::new();
    for (id, sample) in cohort_scores {
        per_user.entry(id.as_str()).or_default().push(sample);
    }

    let overall_of = |samples: &[&ScoreSample]| {
        let n = samples.len() as f64;
        let accuracy = samples.iter().map(|s| s.accuracy).sum::<f64>() / n;
        let fluency = samples.iter().map(|s| s.fluency).sum::<f64>() / n;
        let pronunciation = samples.iter().map(|s| s.pronunciation).sum::<f64>() / n;
        (accuracy + fluency + pronunciation) / 3.0
    };

    let own_overall = per_user
        .get(user_id)
        .map(|samples| overall_of(samples))
        .unwrap_or(0.0);

    let total = per_user.len() as i64;
    let mut lower = 0i64;
    for (id, samples) in &per_user {
        if *id != user_id && overall_of(samples) < own_overall {
            lower += 1;
        }
    }

    100 * lower / total
}

/// Groups the trailing-week samples by UTC date, ascending. Only dates with
/// at least one record appear.
fn daily_series(week_scores: &[ScoreSample]) -> Vec<DailyScorePoint> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&ScoreSample>> = BTreeMap::new();
    for sample in week_scores {
        by_date.entry(sample.timestamp.date()).or_default().push(sample);
    }

    by_date
        .into_iter()
        .map(|(date, samples)| {
            let n = samples.len() as f64;
            DailyScorePoint {
                date,
                accuracy: round2(samples.iter().map(|s| s.accuracy).sum::<f64>() / n),
                fluency: round2(samples.iter().map(|s| s.fluency).sum::<f64>() / n),
                pronunciation: round2(samples.iter().map(|s| s.pronunciation).sum::<f64>() / n),
            }
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    fn sample(at: DateTime<Utc>, accuracy: f64, fluency: f64, pronunciation: f64) -> ScoreSample {
        ScoreSample {
            timestamp: at.naive_utc(),
            accuracy,
            fluency,
            completeness: 90.0,
            pronunciation,
        }
    }

    fn days_ago(n: i64) -> DateTime<Utc> {
        now() - Duration::days(n)
    }

    #[test]
    fn empty_user_yields_all_zero_snapshot() {
        let dashboard = assemble("u1", now(), &[], &[], &[], 0, 0, &[]);

        assert_eq!(dashboard.stats.overall, 0.0);
        assert_eq!(dashboard.stats.fluency_rating, 0.0);
        assert_eq!(dashboard.stats.count, 0);
        assert_eq!(dashboard.stats.streak, 0);
        assert_eq!(dashboard.stats.week_fluency, 0.0);
        assert_eq!(dashboard.stats.week_accuracy, 0.0);
        assert_eq!(dashboard.stats.week_pronunciation, 0.0);
        assert_eq!(dashboard.stats.week_pronunciation_exercises, 0);
        assert_eq!(dashboard.stats.percentile, 0);
        assert!(dashboard.data.is_empty());
    }

    #[test]
    fn empty_windows_never_produce_nan() {
        let dashboard = assemble("u1", now(), &[], &[], &[], 0, 0, &[]);
        assert!(dashboard.stats.overall.is_finite());
        assert!(dashboard.stats.fluency_rating.is_finite());
        assert!(dashboard.stats.week_fluency.is_finite());
    }

    #[test]
    fn window_membership_splits_week_and_month() {
        let recent = sample(now(), 80.0, 85.0, 82.0);
        let old = sample(days_ago(20), 10.0, 10.0, 10.0);

        let week = vec![recent.clone()];
        let month = vec![recent, old];

        let dashboard = assemble("u1", now(), &week, &month, &[], 2, 1, &[]);

        // 7-day blend covers only the recent attempt.
        assert_eq!(dashboard.stats.overall, 82.33);
        assert_eq!(dashboard.stats.week_accuracy, 80.0);
        assert_eq!(dashboard.stats.week_fluency, 85.0);
        assert_eq!(dashboard.stats.week_pronunciation, 82.0);

        // 30-day blend averages per metric first, then blends:
        // acc 45, flu 47.5, pron 46 -> 46.17.
        assert_eq!(dashboard.stats.fluency_rating, 46.17);
    }

    #[test]
    fn completeness_is_excluded_from_the_blend() {
        let mut s = sample(now(), 60.0, 60.0, 60.0);
        s.completeness = 0.0;
        let dashboard = assemble("u1", now(), &[s.clone()], &[s], &[], 1, 1, &[]);
        assert_eq!(dashboard.stats.overall, 60.0);
    }

    #[test]
    fn streak_counts_today_and_yesterday() {
        let dates = vec![now().date_naive(), days_ago(1).date_naive()];
        let dashboard = assemble("u1", now(), &[], &[], &dates, 2, 0, &[]);
        assert_eq!(dashboard.stats.streak, 2);
    }

    #[test]
    fn streak_survives_a_miss_today() {
        // Nothing today, but yesterday and the day before are present.
        let dates = vec![days_ago(1).date_naive(), days_ago(2).date_naive()];
        let dashboard = assemble("u1", now(), &[], &[], &dates, 2, 0, &[]);
        assert_eq!(dashboard.stats.streak, 2);
    }

    #[test]
    fn streak_stops_at_the_first_gap() {
        let dates = vec![
            now().date_naive(),
            days_ago(1).date_naive(),
            // gap at day 2
            days_ago(3).date_naive(),
            days_ago(4).date_naive(),
        ];
        let dashboard = assemble("u1", now(), &[], &[], &dates, 4, 0, &[]);
        assert_eq!(dashboard.stats.streak, 2);
    }

    #[test]
    fn streak_is_zero_when_even_yesterday_is_missing() {
        let dates = vec![days_ago(2).date_naive(), days_ago(3).date_naive()];
        let dashboard = assemble("u1", now(), &[], &[], &dates, 2, 0, &[]);
        assert_eq!(dashboard.stats.streak, 0);
    }

    #[test]
    fn streak_today_only_is_one() {
        let dates = vec![now().date_naive()];
        let dashboard = assemble("u1", now(), &[], &[], &dates, 1, 0, &[]);
        assert_eq!(dashboard.stats.streak, 1);
    }

    #[test]
    fn percentile_for_a_lone_active_user_is_zero() {
        let cohort = vec![("u1".to_string(), sample(now(), 90.0, 90.0, 90.0))];
        let week = vec![sample(now(), 90.0, 90.0, 90.0)];
        let dashboard = assemble("u1", now(), &week, &week, &[], 1, 1, &cohort);
        assert_eq!(dashboard.stats.percentile, 0);
    }

    #[test]
    fn percentile_ranks_against_other_active_users() {
        let cohort = vec![
            ("low".to_string(), sample(now(), 10.0, 10.0, 10.0)),
            ("mid".to_string(), sample(now(), 50.0, 50.0, 50.0)),
            ("high".to_string(), sample(now(), 90.0, 90.0, 90.0)),
        ];

        let mid_week = vec![sample(now(), 50.0, 50.0, 50.0)];
        let dashboard = assemble("mid", now(), &mid_week, &mid_week, &[], 1, 1, &cohort);
        // One of three users is strictly below: floor(100 * 1 / 3) = 33.
        assert_eq!(dashboard.stats.percentile, 33);

        let high_week = vec![sample(now(), 90.0, 90.0, 90.0)];
        let dashboard = assemble("high", now(), &high_week, &high_week, &[], 1, 1, &cohort);
        assert_eq!(dashboard.stats.percentile, 66);
    }

    #[test]
    fn percentile_uses_per_user_means_not_per_sample() {
        // Two samples from "other" averaging below u1's single sample must
        // count as one user below, not two.
        let cohort = vec![
            ("u1".to_string(), sample(now(), 80.0, 80.0, 80.0)),
            ("other".to_string(), sample(now(), 20.0, 20.0, 20.0)),
            ("other".to_string(), sample(days_ago(1), 40.0, 40.0, 40.0)),
        ];
        let week = vec![sample(now(), 80.0, 80.0, 80.0)];
        let dashboard = assemble("u1", now(), &week, &week, &[], 1, 1, &cohort);
        assert_eq!(dashboard.stats.percentile, 50);
    }

    #[test]
    fn inactive_user_percentile_is_zero_even_with_active_cohort() {
        let cohort = vec![("other".to_string(), sample(now(), 40.0, 40.0, 40.0))];
        let dashboard = assemble("u1", now(), &[], &[], &[], 0, 0, &cohort);
        assert_eq!(dashboard.stats.percentile, 0);
    }

    #[test]
    fn daily_series_groups_by_date_in_ascending_order() {
        let week = vec![
            sample(now(), 80.0, 82.0, 84.0),
            sample(now() - Duration::hours(1), 60.0, 62.0, 64.0),
            sample(days_ago(2), 50.0, 50.0, 50.0),
        ];

        let dashboard = assemble("u1", now(), &week, &week, &[], 3, 3, &[]);

        assert_eq!(dashboard.data.len(), 2);
        assert_eq!(dashboard.data[0].date, days_ago(2).date_naive());
        assert_eq!(dashboard.data[0].accuracy, 50.0);
        assert_eq!(dashboard.data[1].date, now().date_naive());
        assert_eq!(dashboard.data[1].accuracy, 70.0);
        assert_eq!(dashboard.data[1].fluency, 72.0);
        assert_eq!(dashboard.data[1].pronunciation, 74.0);
    }

    #[test]
    fn snapshot_is_idempotent_for_fixed_inputs() {
        let week = vec![sample(now(), 71.5, 66.25, 90.0)];
        let month = vec![
            sample(now(), 71.5, 66.25, 90.0),
            sample(days_ago(12), 33.0, 40.0, 35.5),
        ];
        let dates = vec![now().date_naive(), days_ago(1).date_naive()];
        let cohort = vec![("u1".to_string(), sample(now(), 71.5, 66.25, 90.0))];

        let first = assemble("u1", now(), &week, &month, &dates, 5, 2, &cohort);
        let second = assemble("u1", now(), &week, &month, &dates, 5, 2, &cohort);
        assert_eq!(first, second);
    }

    #[test]
    fn overalls_are_rounded_to_two_decimals() {
        let week = vec![sample(now(), 33.333, 33.333, 33.333)];
        let dashboard = assemble("u1", now(), &week, &week, &[], 1, 1, &[]);
        assert_eq!(dashboard.stats.overall, 33.33);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn score_sample() -> impl Strategy<Value = ScoreSample> {
            (0i64..168, 0.0f64..=100.0, 0.0f64..=100.0, 0.0f64..=100.0, 0.0f64..=100.0).prop_map(
                |(hours_back, accuracy, fluency, completeness, pronunciation)| ScoreSample {
                    timestamp: (now() - Duration::hours(hours_back)).naive_utc(),
                    accuracy,
                    fluency,
                    completeness,
                    pronunciation,
                },
            )
        }

        fn cohort() -> impl Strategy<Value = Vec<(String, ScoreSample)>> {
            proptest::collection::vec(("u[0-9]", score_sample()), 0..24)
        }

        fn event_dates() -> impl Strategy<Value = Vec<NaiveDate>> {
            proptest::collection::vec(
                (0i64..60).prop_map(|days_back| (now() - Duration::days(days_back)).date_naive()),
                0..30,
            )
        }

        proptest! {
            #[test]
            fn snapshot_stays_finite_and_bounded(
                week in proptest::collection::vec(score_sample(), 0..16),
                month in proptest::collection::vec(score_sample(), 0..32),
                dates in event_dates(),
                cohort in cohort(),
                lifetime in 0i64..10_000,
                week_pron in 0i64..10_000,
            ) {
                let dashboard =
                    assemble("u1", now(), &week, &month, &dates, lifetime, week_pron, &cohort);

                let stats = &dashboard.stats;
                for value in [
                    stats.overall,
                    stats.fluency_rating,
                    stats.week_fluency,
                    stats.week_accuracy,
                    stats.week_pronunciation,
                ] {
                    prop_assert!(value.is_finite());
                    prop_assert!((0.0..=100.0).contains(&value));
                }
                prop_assert!((0..=100).contains(&stats.percentile));
                prop_assert!(stats.streak >= 0);
                prop_assert!(stats.count >= 0);
            }

            #[test]
            fn streak_never_exceeds_distinct_dates(dates in event_dates()) {
                let distinct: HashSet<NaiveDate> = dates.iter().copied().collect();
                let streak = streak_length(&distinct, now().date_naive());
                prop_assert!(streak >= 0);
                prop_assert!(streak as usize <= distinct.len());
            }

            #[test]
            fn assemble_is_deterministic(
                week in proptest::collection::vec(score_sample(), 0..8),
                dates in event_dates(),
                cohort in cohort(),
            ) {
                let first = assemble("u1", now(), &week, &week, &dates, 3, 1, &cohort);
                let second = assemble("u1", now(), &week, &week, &dates, 3, 1, &cohort);
                prop_assert_eq!(first, second);
            }
        }
    }
}
