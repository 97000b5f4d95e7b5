//! Pure lifecycle rules deciding when a match moves `open -> live -> expired`.

use std::time::{Duration, SystemTime};

use crate::dao::models::{MatchEntity, MatchFields, MatchStatus, MatchUpdate};

/// Decide whether `entity` is due for a status transition at `now`.
///
/// * `open` becomes `live` once `date_time_start <= now`.
/// * `live` becomes `expired` once `now - date_time_start >= expiry_threshold`.
///
/// Matches without a start time never transition.
pub fn evaluate(
    entity: &MatchEntity,
    now: SystemTime,
    expiry_threshold: Duration,
) -> Option<MatchStatus> {
    let start = entity.date_time_start?;
    // `Err` means the start is still in the future.
    let elapsed = now.duration_since(start).ok()?;

    let next = match entity.status {
        MatchStatus::Open => MatchStatus::Live,
        MatchStatus::Live if elapsed >= expiry_threshold => MatchStatus::Expired,
        MatchStatus::Live | MatchStatus::Expired => return None,
    };

    debug_assert!(entity.status.can_advance_to(next));
    Some(next)
}

/// Status-only update for `entity` when a transition is due.
pub fn staged_update(
    entity: &MatchEntity,
    now: SystemTime,
    expiry_threshold: Duration,
) -> Option<MatchUpdate> {
    evaluate(entity, now, expiry_threshold)
        .map(|next| MatchUpdate::new(entity.id.clone(), MatchFields::status(next)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(90 * 60);

    fn minutes(value: u64) -> Duration {
        Duration::from_secs(value * 60)
    }

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn entity(status: MatchStatus, start: Option<SystemTime>) -> MatchEntity {
        MatchEntity {
            id: "m1".into(),
            status,
            date_time_start: start,
            visible: true,
        }
    }

    #[test]
    fn open_match_goes_live_once_started() {
        let started = entity(MatchStatus::Open, Some(now() - minutes(10)));
        assert_eq!(evaluate(&started, now(), THRESHOLD), Some(MatchStatus::Live));
    }

    #[test]
    fn open_match_goes_live_exactly_at_kick_off() {
        let kick_off = entity(MatchStatus::Open, Some(now()));
        assert_eq!(evaluate(&kick_off, now(), THRESHOLD), Some(MatchStatus::Live));
    }

    #[test]
    fn future_match_stays_open() {
        let upcoming = entity(MatchStatus::Open, Some(now() + minutes(1)));
        assert_eq!(evaluate(&upcoming, now(), THRESHOLD), None);
    }

    #[test]
    fn open_match_long_past_start_only_goes_live() {
        let stale = entity(MatchStatus::Open, Some(now() - minutes(500)));
        assert_eq!(evaluate(&stale, now(), THRESHOLD), Some(MatchStatus::Live));
    }

    #[test]
    fn live_match_expires_after_threshold() {
        let finished = entity(MatchStatus::Live, Some(now() - minutes(95)));
        assert_eq!(
            evaluate(&finished, now(), THRESHOLD),
            Some(MatchStatus::Expired)
        );

        let boundary = entity(MatchStatus::Live, Some(now() - THRESHOLD));
        assert_eq!(
            evaluate(&boundary, now(), THRESHOLD),
            Some(MatchStatus::Expired)
        );
    }

    #[test]
    fn live_match_within_threshold_is_unchanged() {
        let playing = entity(MatchStatus::Live, Some(now() - minutes(10)));
        assert_eq!(evaluate(&playing, now(), THRESHOLD), None);

        let almost = entity(
            MatchStatus::Live,
            Some(now() - THRESHOLD + Duration::from_secs(1)),
        );
        assert_eq!(evaluate(&almost, now(), THRESHOLD), None);
    }

    #[test]
    fn threshold_is_a_parameter() {
        let live = entity(MatchStatus::Live, Some(now() - minutes(95)));
        assert_eq!(evaluate(&live, now(), minutes(130)), None);
        assert_eq!(
            evaluate(&live, now(), minutes(90)),
            Some(MatchStatus::Expired)
        );
    }

    #[test]
    fn expired_and_unscheduled_matches_never_transition() {
        let expired = entity(MatchStatus::Expired, Some(now() - minutes(1_000)));
        assert_eq!(evaluate(&expired, now(), THRESHOLD), None);

        for status in [MatchStatus::Open, MatchStatus::Live, MatchStatus::Expired] {
            assert_eq!(evaluate(&entity(status, None), now(), THRESHOLD), None);
        }
    }

    #[test]
    fn staged_update_only_touches_status() {
        let started = entity(MatchStatus::Open, Some(now() - minutes(1)));
        let update = staged_update(&started, now(), THRESHOLD).unwrap();
        assert_eq!(update.id, "m1");
        assert_eq!(update.fields, MatchFields::status(MatchStatus::Live));
    }
}
