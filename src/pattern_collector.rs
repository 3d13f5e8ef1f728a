//! Date-partitioned persistence of execution patterns.

use crate::domain::{Pattern, PatternType};
use crate::error::PatternError;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

struct CounterState {
    last_second: i64,
    sequence: u32,
}

/// Aggregate counts returned by [`PatternCollector::get_statistics`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternStatistics {
    /// Total patterns currently on disk.
    pub total_patterns: usize,
    /// Count keyed by [`PatternType::file_prefix`].
    pub by_type: HashMap<String, usize>,
    /// Count keyed by `YYYY-MM-DD`.
    pub by_day: HashMap<String, usize>,
}

/// Persists [`Pattern`] records to `<root>/YYYY/MM/DD/<type>_<pattern_id>.json`.
///
/// The counter guarding `pattern_id` generation (and the directory-creation
/// that precedes a write) is held only long enough to reserve an id; the
/// file write itself happens with the lock released.
pub struct PatternCollector {
    root: PathBuf,
    counter: Mutex<CounterState>,
    retention_days: i64,
}

impl PatternCollector {
    /// A collector rooted at `root`, retaining patterns for `retention_days`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            root: root.into(),
            counter: Mutex::new(CounterState { last_second: 0, sequence: 0 }),
            retention_days,
        }
    }

    async fn reserve(&self, timestamp: chrono::DateTime<Utc>) -> (String, PathBuf) {
        let second = timestamp.timestamp();
        let sequence = {
            let mut counter = self.counter.lock().await;
            if counter.last_second != second {
                counter.last_second = second;
                counter.sequence = 0;
            }
            counter.sequence += 1;
            counter.sequence
        };
        let pattern_id = format!("pat-{}-{sequence:03}", timestamp.format("%Y%m%d-%H%M%S"));
        let dir = self
            .root
            .join(timestamp.format("%Y").to_string())
            .join(timestamp.format("%m").to_string())
            .join(timestamp.format("%d").to_string());
        (pattern_id, dir)
    }

    async fn write(&self, pattern: Pattern, dir: PathBuf) -> Result<String, PatternError> {
        tokio::fs::create_dir_all(&dir).await?;
        let filename = format!("{}_{}.json", pattern.pattern_type.file_prefix(), pattern.pattern_id);
        let path = dir.join(filename);
        let body = serde_json::to_vec_pretty(&pattern)?;
        if let Err(err) = tokio::fs::write(&path, body).await {
            warn!(path = %path.display(), %err, "failed to persist pattern");
            return Err(err.into());
        }
        Ok(pattern.pattern_id)
    }

    /// Record a completed task.
    #[instrument(skip(self, context))]
    pub async fn collect_task_completion(
        &self,
        task_type: &str,
        agent: &str,
        duration_ms: u64,
        success: bool,
        context: Value,
    ) -> Result<String, PatternError> {
        let now = Utc::now();
        let (pattern_id, dir) = self.reserve(now).await;
        let pattern = Pattern {
            pattern_id,
            pattern_type: PatternType::TaskCompletion,
            timestamp: now,
            data: serde_json::json!({
                "task_type": task_type,
                "agent": agent,
                "duration_ms": duration_ms,
                "success": success,
            }),
            context,
        };
        self.write(pattern, dir).await
    }

    /// Record an observed error, with an optional applied resolution.
    #[instrument(skip(self, context, resolution))]
    pub async fn collect_error_occurrence(
        &self,
        error_type: &str,
        error_message: &str,
        context: Value,
        resolution: Option<Value>,
    ) -> Result<String, PatternError> {
        let now = Utc::now();
        let (pattern_id, dir) = self.reserve(now).await;
        let pattern = Pattern {
            pattern_id,
            pattern_type: PatternType::ErrorOccurrence,
            timestamp: now,
            data: serde_json::json!({
                "error_type": error_type,
                "error_message": error_message,
                "resolution": resolution,
            }),
            context,
        };
        self.write(pattern, dir).await
    }

    /// Record an agent invocation.
    #[instrument(skip(self))]
    pub async fn collect_agent_usage(
        &self,
        agent_type: &str,
        task_type: &str,
        success: bool,
        duration_ms: u64,
    ) -> Result<String, PatternError> {
        let now = Utc::now();
        let (pattern_id, dir) = self.reserve(now).await;
        let pattern = Pattern {
            pattern_id,
            pattern_type: PatternType::AgentUsage,
            timestamp: now,
            data: serde_json::json!({
                "agent_type": agent_type,
                "task_type": task_type,
                "success": success,
                "duration_ms": duration_ms,
            }),
            context: Value::Null,
        };
        self.write(pattern, dir).await
    }

    /// Record a human correction applied to prior output.
    #[instrument(skip(self, context))]
    pub async fn collect_user_correction(
        &self,
        original: Value,
        corrected: Value,
        context: Value,
    ) -> Result<String, PatternError> {
        let now = Utc::now();
        let (pattern_id, dir) = self.reserve(now).await;
        let pattern = Pattern {
            pattern_id,
            pattern_type: PatternType::UserCorrection,
            timestamp: now,
            data: serde_json::json!({
                "original": original,
                "corrected": corrected,
            }),
            context,
        };
        self.write(pattern, dir).await
    }

    /// Aggregate counts over every pattern currently on disk.
    pub async fn get_statistics(&self) -> Result<PatternStatistics, PatternError> {
        let mut stats = PatternStatistics::default();
        for path in walk_pattern_files(&self.root).await? {
            let Ok(body) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let Ok(pattern) = serde_json::from_str::<Pattern>(&body) else {
                continue;
            };
            stats.total_patterns += 1;
            *stats
                .by_type
                .entry(pattern.pattern_type.file_prefix().to_string())
                .or_insert(0) += 1;
            *stats
                .by_day
                .entry(pattern.timestamp.date_naive().to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    /// Delete every `YYYY/MM/DD` partition older than `retention_days`,
    /// returning the number of pattern files removed.
    #[instrument(skip(self))]
    pub async fn cleanup_old_patterns(&self) -> Result<usize, PatternError> {
        let today = Utc::now().date_naive();
        let mut removed = 0usize;

        for day_dir in walk_day_partitions(&self.root).await? {
            let Some(date) = parse_partition_date(&self.root, &day_dir) else {
                continue;
            };
            let age_days = (today - date).num_days();
            if age_days <= self.retention_days {
                continue;
            }
            let count = count_files(&day_dir).await;
            if let Err(err) = tokio::fs::remove_dir_all(&day_dir).await {
                warn!(path = %day_dir.display(), %err, "failed to remove expired pattern partition");
                continue;
            }
            removed += count;
        }
        Ok(removed)
    }
}

async fn walk_pattern_files(root: &Path) -> Result<Vec<PathBuf>, PatternError> {
    let mut files = Vec::new();
    for day_dir in walk_day_partitions(root).await? {
        let mut entries = tokio::fs::read_dir(&day_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}

async fn walk_day_partitions(root: &Path) -> Result<Vec<PathBuf>, PatternError> {
    let mut days = Vec::new();
    let Ok(mut years) = tokio::fs::read_dir(root).await else {
        return Ok(days);
    };
    while let Some(year) = years.next_entry().await? {
        if !year.file_type().await?.is_dir() {
            continue;
        }
        let mut months = tokio::fs::read_dir(year.path()).await?;
        while let Some(month) = months.next_entry().await? {
            if !month.file_type().await?.is_dir() {
                continue;
            }
            let mut day_entries = tokio::fs::read_dir(month.path()).await?;
            while let Some(day) = day_entries.next_entry().await? {
                if day.file_type().await?.is_dir() {
                    days.push(day.path());
                }
            }
        }
    }
    Ok(days)
}

async fn count_files(dir: &Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.path().extension().is_some_and(|ext| ext == "json") {
            count += 1;
        }
    }
    count
}

fn parse_partition_date(root: &Path, day_dir: &Path) -> Option<NaiveDate> {
    let relative = day_dir.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let year: i32 = components.next()?.as_os_str().to_str()?.parse().ok()?;
    let month: u32 = components.next()?.as_os_str().to_str()?.parse().ok()?;
    let day: u32 = components.next()?.as_os_str().to_str()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn collect_task_completion_writes_expected_path() {
        let dir = tempdir().unwrap();
        let collector = PatternCollector::new(dir.path(), 30);
        let id = collector
            .collect_task_completion("build", "agent-1", 120, true, serde_json::json!({"task_id": "t1"}))
            .await
            .unwrap();

        assert!(id.starts_with("pat-"));
        let stats = collector.get_statistics().await.unwrap();
        assert_eq!(stats.total_patterns, 1);
        assert_eq!(stats.by_type["task_completion"], 1);
    }

    #[tokio::test]
    async fn pattern_ids_increment_within_same_second() {
        let dir = tempdir().unwrap();
        let collector = PatternCollector::new(dir.path(), 30);
        let a = collector
            .collect_agent_usage("worker", "build", true, 10)
            .await
            .unwrap();
        let b = collector
            .collect_agent_usage("worker", "build", true, 20)
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn get_statistics_on_empty_root_is_zero() {
        let dir = tempdir().unwrap();
        let collector = PatternCollector::new(dir.path(), 30);
        let stats = collector.get_statistics().await.unwrap();
        assert_eq!(stats.total_patterns, 0);
    }

    #[tokio::test]
    async fn collect_user_correction_writes_expected_type() {
        let dir = tempdir().unwrap();
        let collector = PatternCollector::new(dir.path(), 30);
        collector
            .collect_user_correction(
                serde_json::json!({"answer": "a"}),
                serde_json::json!({"answer": "b"}),
                serde_json::json!({"task_id": "t1"}),
            )
            .await
            .unwrap();

        let stats = collector.get_statistics().await.unwrap();
        assert_eq!(stats.by_type["user_correction"], 1);
    }

    #[tokio::test]
    async fn cleanup_removes_partitions_older_than_retention() {
        let dir = tempdir().unwrap();
        let collector = PatternCollector::new(dir.path(), 30);

        let old_date = Utc::now().date_naive() - chrono::Duration::days(60);
        let old_dir = dir
            .path()
            .join(old_date.format("%Y").to_string())
            .join(old_date.format("%m").to_string())
            .join(old_date.format("%d").to_string());
        tokio::fs::create_dir_all(&old_dir).await.unwrap();
        tokio::fs::write(old_dir.join("task_completion_pat-old.json"), b"{}")
            .await
            .unwrap();

        collector
            .collect_agent_usage("worker", "build", true, 5)
            .await
            .unwrap();

        let removed = collector.cleanup_old_patterns().await.unwrap();
        assert_eq!(removed, 1);
        assert!(!old_dir.exists());

        let stats = collector.get_statistics().await.unwrap();
        assert_eq!(stats.total_patterns, 1);
    }

    #[tokio::test]
    async fn error_occurrence_carries_optional_resolution() {
        let dir = tempdir().unwrap();
        let collector = PatternCollector::new(dir.path(), 30);
        collector
            .collect_error_occurrence("io_error", "disk full", serde_json::json!({}), Some(serde_json::json!("retry")))
            .await
            .unwrap();
        let stats = collector.get_statistics().await.unwrap();
        assert_eq!(stats.by_type["error_occurrence"], 1);
    }
}
