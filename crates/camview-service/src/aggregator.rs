//! Per-day and per-range statistics over the partition index.

use std::collections::BTreeMap;

use camview_core::{CoreError, CoreResult};
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::partition_index::PartitionIndex;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Statistics for one day partition that holds at least one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    /// `YYYY-MM-DD`
    pub date: String,
    pub video_count: u64,
    pub total_bytes: u64,
    /// Video count per storage tier.
    pub tier_counts: BTreeMap<String, u64>,
}

/// Totals across the whole requested range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_videos: u64,
    pub total_bytes: u64,
    /// Binary megabytes (1024 * 1024 bytes).
    pub total_megabytes: f64,
    /// Days whose listing succeeded, empty or not.
    pub days_probed: u64,
    pub days_with_videos: u64,
    /// Mean over days that had videos; 0 when there were none.
    pub avg_videos_per_day: f64,
    pub tier_distribution: BTreeMap<String, u64>,
    pub start_date: String,
    pub end_date: String,
}

/// Result of one statistics query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub per_day: Vec<DailyStat>,
    pub summary: StatsSummary,
}

/// Walks a date range through the index.
#[derive(Clone)]
pub struct Aggregator {
    index: PartitionIndex,
    default_window_days: u32,
}

impl Aggregator {
    pub fn new(index: PartitionIndex, default_window_days: u32) -> Self {
        Self {
            index,
            default_window_days,
        }
    }

    /// Statistics for `[start, end]`, each bound defaulting relative to today.
    ///
    /// A missing `end` means today in the local calendar; a missing `start`
    /// means `end` minus the default window.
    pub async fn stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> CoreResult<StatsReport> {
        let end = end.unwrap_or_else(|| Local::now().date_naive());
        let start = match start {
            Some(start) => start,
            None => end
                .checked_sub_days(Days::new(u64::from(self.default_window_days)))
                .ok_or_else(|| {
                    CoreError::ValidationError(format!("date range before {end} is out of bounds"))
                })?,
        };

        self.stats_between(start, end).await
    }

    /// Statistics for the inclusive range `[start, end]`.
    ///
    /// Days whose listing fails are logged and left out of every total.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ValidationError` when `start > end`.
    pub async fn stats_between(&self, start: NaiveDate, end: NaiveDate) -> CoreResult<StatsReport> {
        if start > end {
            return Err(CoreError::ValidationError(format!(
                "start date {start} is after end date {end}"
            )));
        }

        let mut per_day = Vec::new();
        let mut days_probed = 0u64;
        let mut total_videos = 0u64;
        let mut total_bytes = 0u64;
        let mut tier_distribution: BTreeMap<String, u64> = BTreeMap::new();

        for date in start.iter_days().take_while(|d| *d <= end) {
            let objects = match self.index.list_objects_on(date).await {
                Ok(objects) => objects,
                Err(e) => {
                    tracing::warn!(date = %date, error = %e, "Skipping day in statistics");
                    continue;
                }
            };
            days_probed += 1;

            if objects.is_empty() {
                continue;
            }

            let mut stat = DailyStat {
                date: date.format("%Y-%m-%d").to_string(),
                video_count: 0,
                total_bytes: 0,
                tier_counts: BTreeMap::new(),
            };
            for object in &objects {
                stat.video_count += 1;
                stat.total_bytes += object.size_bytes;
                *stat
                    .tier_counts
                    .entry(object.storage_tier.clone())
                    .or_default() += 1;
            }

            total_videos += stat.video_count;
            total_bytes += stat.total_bytes;
            for (tier, count) in &stat.tier_counts {
                *tier_distribution.entry(tier.clone()).or_default() += count;
            }
            per_day.push(stat);
        }

        let days_with_videos = per_day.len() as u64;
        let avg_videos_per_day = if days_with_videos == 0 {
            0.0
        } else {
            total_videos as f64 / days_with_videos as f64
        };

        tracing::debug!(
            start = %start,
            end = %end,
            days_probed,
            days_with_videos,
            total_videos,
            "Computed archive statistics"
        );

        Ok(StatsReport {
            per_day,
            summary: StatsSummary {
                total_videos,
                total_bytes,
                total_megabytes: total_bytes as f64 / BYTES_PER_MEGABYTE,
                days_probed,
                days_with_videos,
                avg_videos_per_day,
                tier_distribution,
                start_date: start.format("%Y-%m-%d").to_string(),
                end_date: end.format("%Y-%m-%d").to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use camview_storage::MockObjectStore;
    use chrono::Utc;
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn aggregator(mock: &MockObjectStore) -> Aggregator {
        Aggregator::new(PartitionIndex::new(Arc::new(mock.clone())), 30)
    }

    #[tokio::test]
    async fn test_two_day_range() {
        let mock = MockObjectStore::new();
        mock.insert_sized("2024/01/01/a.mp4", 1000);
        mock.insert_sized("2024/01/02/b.mp4", 2000);

        let report = aggregator(&mock)
            .stats_between(date("2024-01-01"), date("2024-01-02"))
            .await
            .unwrap();

        assert_eq!(report.summary.total_videos, 2);
        assert_eq!(report.summary.total_bytes, 3000);
        assert_eq!(report.summary.days_with_videos, 2);
        assert_eq!(report.summary.days_probed, 2);
        assert!((report.summary.avg_videos_per_day - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.summary.start_date, "2024-01-01");
        assert_eq!(report.summary.end_date, "2024-01-02");
        assert_eq!(report.per_day[0].date, "2024-01-01");
        assert_eq!(report.per_day[1].total_bytes, 2000);
    }

    #[tokio::test]
    async fn test_empty_days_probed_but_omitted() {
        let mock = MockObjectStore::new();
        mock.insert_sized("2024/01/03/a.mp4", 1024 * 1024);
        mock.insert_sized("2024/01/03/a.jpg", 5);

        let report = aggregator(&mock)
            .stats_between(date("2024-01-01"), date("2024-01-05"))
            .await
            .unwrap();

        assert_eq!(report.per_day.len(), 1);
        assert_eq!(report.summary.days_probed, 5);
        assert_eq!(report.summary.total_videos, 1);
        assert!((report.summary.total_megabytes - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_no_videos_average_is_zero() {
        let mock = MockObjectStore::new();

        let report = aggregator(&mock)
            .stats_between(date("2024-01-01"), date("2024-01-01"))
            .await
            .unwrap();

        assert!(report.per_day.is_empty());
        assert_eq!(report.summary.avg_videos_per_day, 0.0);
    }

    #[tokio::test]
    async fn test_failing_day_skipped() {
        let mock = MockObjectStore::new();
        mock.insert_sized("2024/01/01/a.mp4", 10);
        mock.insert_sized("2024/01/02/b.mp4", 20);
        mock.fail_prefix("2024/01/02/");

        let report = aggregator(&mock)
            .stats_between(date("2024-01-01"), date("2024-01-02"))
            .await
            .unwrap();

        assert_eq!(report.summary.days_probed, 1);
        assert_eq!(report.summary.total_bytes, 10);
    }

    #[tokio::test]
    async fn test_tier_distribution() {
        let mock = MockObjectStore::new();
        let now = Utc::now();
        mock.insert_object("2024/01/01/a.mp4", Bytes::from("x"), now, "STANDARD");
        mock.insert_object("2024/01/01/b.mp4", Bytes::from("x"), now, "GLACIER");
        mock.insert_object("2024/01/02/c.mp4", Bytes::from("x"), now, "GLACIER");

        let report = aggregator(&mock)
            .stats_between(date("2024-01-01"), date("2024-01-02"))
            .await
            .unwrap();

        assert_eq!(report.per_day[0].tier_counts.get("GLACIER"), Some(&1));
        assert_eq!(report.summary.tier_distribution.get("GLACIER"), Some(&2));
        assert_eq!(report.summary.tier_distribution.get("STANDARD"), Some(&1));
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let mock = MockObjectStore::new();

        let err = aggregator(&mock)
            .stats_between(date("2024-01-02"), date("2024-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(mock.calls("list"), 0);
    }

    #[tokio::test]
    async fn test_default_window() {
        let mock = MockObjectStore::new();

        let report = Aggregator::new(PartitionIndex::new(Arc::new(mock.clone())), 2)
            .stats(None, Some(date("2024-03-01")))
            .await
            .unwrap();

        assert_eq!(report.summary.start_date, "2024-02-28");
        assert_eq!(report.summary.days_probed, 3);
    }

    #[tokio::test]
    async fn test_open_range_ends_today() {
        let mock = MockObjectStore::new();
        let today = Local::now().date_naive();
        mock.insert_sized(format!("{}/a.mp4", today.format("%Y/%m/%d")), 10);

        let report = aggregator(&mock).stats(None, None).await.unwrap();

        // A run straddling midnight sees tomorrow's date
        let end = date(&report.summary.end_date);
        assert!(end == today || end == today.succ_opt().unwrap());
        assert_eq!(report.summary.days_probed, 31);
        assert_eq!(
            date(&report.summary.start_date),
            end - Days::new(30)
        );
        if end == today {
            assert_eq!(report.summary.total_videos, 1);
        }
    }
}
