//! Retry counting over a configuration's status timeline.
//!
//! A retry is a transition from a retryable-error status back into
//! `Reconciling` on the same configuration, counted only after the most
//! recent non-retryable terminal (`Ready`). The timeline arrives most
//! recent first, already bounded to the caller's row window.

use crate::models::status::{ClusterStatus, ClusterStatusEntity};

/// Count retries on a timeline ordered most recent first.
///
/// Walks backwards through time: stops at the first `Ready` (nothing
/// before the latest successful reconciliation counts), and counts every
/// retryable status that is immediately followed, in forward time, by a
/// `Reconciling` status.
pub(crate) fn count_retries(
    timeline: &[ClusterStatusEntity],
    retryable: &[ClusterStatus],
) -> i64 {
    let mut count = 0;
    for (idx, entry) in timeline.iter().enumerate() {
        if entry.status == ClusterStatus::Ready {
            break;
        }
        if retryable.contains(&entry.status) {
            // The row before this one in the slice is the next status in
            // forward time.
            if idx > 0 && timeline[idx - 1].status == ClusterStatus::Reconciling {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    const RETRYABLE: [ClusterStatus; 2] = [
        ClusterStatus::ReconcileErrorRetryable,
        ClusterStatus::ReconcileError,
    ];

    /// Build a timeline from forward-time order, returning it most recent
    /// first the way the persistence query does.
    fn timeline(forward: &[ClusterStatus]) -> Vec<ClusterStatusEntity> {
        forward
            .iter()
            .enumerate()
            .map(|(idx, status)| ClusterStatusEntity {
                id: idx as i64 + 1,
                runtime_id: "runtime-a".to_string(),
                config_version: 1,
                status: *status,
                created: NaiveDateTime::default(),
            })
            .rev()
            .collect()
    }

    #[test]
    fn empty_timeline_counts_zero() {
        assert_eq!(count_retries(&[], &RETRYABLE), 0);
    }

    #[test]
    fn latest_ready_counts_zero() {
        let t = timeline(&[
            ClusterStatus::ReconcilePending,
            ClusterStatus::ReconcileErrorRetryable,
            ClusterStatus::Ready,
        ]);
        assert_eq!(count_retries(&t, &RETRYABLE), 0);
    }

    #[test]
    fn counts_error_reconciling_pairs_after_last_ready() {
        let mut forward = vec![
            ClusterStatus::ReconcilePending,
            ClusterStatus::ReconcileErrorRetryable,
            ClusterStatus::Ready,
        ];
        for _ in 0..50 {
            forward.push(ClusterStatus::ReconcileErrorRetryable);
            forward.push(ClusterStatus::Reconciling);
        }
        let t = timeline(&forward);
        assert_eq!(count_retries(&t, &RETRYABLE), 50);
    }

    #[test]
    fn trailing_error_without_reattempt_is_not_a_retry() {
        let t = timeline(&[
            ClusterStatus::ReconcilePending,
            ClusterStatus::Reconciling,
            ClusterStatus::ReconcileErrorRetryable,
        ]);
        assert_eq!(count_retries(&t, &RETRYABLE), 0);
    }

    #[test]
    fn non_retryable_error_also_counts_when_listed() {
        let t = timeline(&[
            ClusterStatus::ReconcilePending,
            ClusterStatus::ReconcileError,
            ClusterStatus::Reconciling,
            ClusterStatus::ReconcileErrorRetryable,
            ClusterStatus::Reconciling,
        ]);
        assert_eq!(count_retries(&t, &RETRYABLE), 2);
    }

    #[test]
    fn stops_at_ready_even_with_older_retries() {
        let t = timeline(&[
            ClusterStatus::ReconcileErrorRetryable,
            ClusterStatus::Reconciling,
            ClusterStatus::Ready,
            ClusterStatus::ReconcileErrorRetryable,
            ClusterStatus::Reconciling,
        ]);
        assert_eq!(count_retries(&t, &RETRYABLE), 1);
    }
}
