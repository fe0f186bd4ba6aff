//! Override tests: substituting a user into existing events

mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use common::{stores, sunday};
use rota::config::Config;
use rota::error::Result;
use rota::models::{EventId, NewEvent, UserId};
use rota::notifications::{ChangeKind, MemorySink};
use rota::scheduler::{
    override_events, EditPolicy, OverrideRequest, SchedulerContext, SchedulerError,
};
use rota::storage::{EventFilter, Gateway, MemoryStore, Store, StoreExt};

const SHIFT_MINUTES: i64 = 240;

struct Calendar {
    team_id: i64,
    role_id: i64,
    owner: UserId,
    substitute: UserId,
    other: UserId,
    event_ids: Vec<EventId>,
}

fn minutes(m: i64) -> DateTime<Utc> {
    sunday(1, 0) + Duration::minutes(m)
}

/// `shifts` consecutive four-hour events held by one user
fn seed(gw: &dyn Gateway, shifts: i64) -> Result<Calendar> {
    let team = gw.insert_team("ops", "UTC")?;
    let role = gw.insert_role("primary")?;
    let roster = gw.insert_roster(team.id, "main")?;
    let owner = gw.insert_user("owner", None)?;
    let substitute = gw.insert_user("substitute", None)?;
    let other = gw.insert_user("other", None)?;
    for (priority, user) in [&owner, &substitute, &other].iter().enumerate() {
        gw.add_roster_member(roster.id, user.id, true, priority as i64)?;
    }

    let events: Vec<NewEvent> = (0..shifts)
        .map(|i| {
            NewEvent::manual(
                team.id,
                role.id,
                owner.id,
                minutes(i * SHIFT_MINUTES),
                minutes((i + 1) * SHIFT_MINUTES),
            )
        })
        .collect();
    let event_ids = gw.insert_events(&events)?;

    Ok(Calendar {
        team_id: team.id,
        role_id: role.id,
        owner: owner.id,
        substitute: substitute.id,
        other: other.id,
        event_ids,
    })
}

fn policy() -> EditPolicy {
    EditPolicy::new(sunday(0, 0), Duration::days(1))
}

fn spans(events: &[rota::Event]) -> Vec<(i64, i64)> {
    events
        .iter()
        .map(|e| {
            (
                (e.start - minutes(0)).num_minutes(),
                (e.end - minutes(0)).num_minutes(),
            )
        })
        .collect()
}

// ============================================================================
// Classification Scenarios
// ============================================================================

#[test]
fn test_override_inside_single_event_splits_it() {
    for (name, store) in stores() {
        store
            .transaction(|gw| {
                let cal = seed(gw, 1)?;
                let request = OverrideRequest {
                    event_ids: cal.event_ids.clone(),
                    start: minutes(0) + Duration::seconds(100),
                    end: minutes(SHIFT_MINUTES) - Duration::seconds(100),
                    user_id: cal.substitute,
                };
                let outcome = override_events(gw, &request, &policy())?;

                assert_eq!(outcome.events.len(), 3, "backend {name}");
                assert_eq!(outcome.events[0].user_id, cal.owner);
                assert_eq!(outcome.events[1].user_id, cal.substitute);
                assert_eq!(outcome.events[2].user_id, cal.owner);
                assert_eq!(outcome.events[0].end, request.start);
                assert_eq!(outcome.events[2].start, request.end);
                assert_eq!(outcome.substitute, outcome.events[1]);

                // Remainders are plain manual events
                assert!(outcome.events[0].schedule_id.is_none());
                assert!(outcome.events[2].link_id.is_none());
                Ok(())
            })
            .unwrap();
    }
}

#[test]
fn test_override_across_boundary_trims_both_events() {
    for (name, store) in stores() {
        store
            .transaction(|gw| {
                let cal = seed(gw, 2)?;
                let request = OverrideRequest {
                    event_ids: cal.event_ids.clone(),
                    start: minutes(180),
                    end: minutes(300),
                    user_id: cal.substitute,
                };
                let outcome = override_events(gw, &request, &policy())?;

                assert_eq!(
                    spans(&outcome.events),
                    vec![(0, 180), (180, 300), (300, 480)],
                    "backend {name}"
                );
                // Originals are edited in place
                let ids: Vec<EventId> = outcome.events.iter().map(|e| e.id).collect();
                assert!(ids.contains(&cal.event_ids[0]));
                assert!(ids.contains(&cal.event_ids[1]));
                Ok(())
            })
            .unwrap();
    }
}

#[test]
fn test_override_whole_run_replaces_it() {
    for (name, store) in stores() {
        store
            .transaction(|gw| {
                let cal = seed(gw, 3)?;
                let request = OverrideRequest {
                    event_ids: cal.event_ids.clone(),
                    start: minutes(-60),
                    end: minutes(3 * SHIFT_MINUTES + 60),
                    user_id: cal.substitute,
                };
                let outcome = override_events(gw, &request, &policy())?;

                // Range is clamped to the run
                assert_eq!(spans(&outcome.events), vec![(0, 720)], "backend {name}");
                assert!(gw.events_by_id(&cal.event_ids)?.is_empty());
                Ok(())
            })
            .unwrap();
    }
}

// ============================================================================
// Validation Tests
// ============================================================================

fn override_error(
    store: &dyn Store,
    shifts: i64,
    build: impl Fn(&Calendar) -> OverrideRequest,
    policy: EditPolicy,
) -> SchedulerError {
    let err = store
        .transaction(|gw| {
            let cal = seed(gw, shifts)?;
            override_events(gw, &build(&cal), &policy)
        })
        .unwrap_err();
    err.as_scheduler().cloned().expect("scheduler error")
}

#[test]
fn test_override_validation_errors() {
    for (name, store) in stores() {
        let store = store.as_ref();

        let err = override_error(
            store,
            1,
            |cal| OverrideRequest {
                event_ids: vec![cal.event_ids[0], 999],
                start: minutes(0),
                end: minutes(60),
                user_id: cal.substitute,
            },
            policy(),
        );
        assert_eq!(err, SchedulerError::EventsNotFound { ids: vec![999] }, "backend {name}");

        let err = override_error(
            store,
            1,
            |cal| OverrideRequest {
                event_ids: cal.event_ids.clone(),
                start: minutes(60),
                end: minutes(60),
                user_id: cal.substitute,
            },
            policy(),
        );
        assert!(matches!(err, SchedulerError::InvalidRange { .. }));

        let err = override_error(
            store,
            1,
            |cal| OverrideRequest {
                event_ids: cal.event_ids.clone(),
                start: minutes(0),
                end: minutes(60),
                user_id: cal.substitute,
            },
            EditPolicy::new(minutes(0) + Duration::days(3), Duration::days(1)),
        );
        assert!(matches!(err, SchedulerError::EditInPast { .. }));
    }
}

#[test]
fn test_override_rejects_gaps() {
    for (name, store) in stores() {
        let err = store
            .transaction(|gw| {
                let cal = seed(gw, 1)?;
                let later = gw.insert_events(&[NewEvent::manual(
                    cal.team_id,
                    cal.role_id,
                    cal.owner,
                    minutes(2 * SHIFT_MINUTES),
                    minutes(3 * SHIFT_MINUTES),
                )])?;
                let request = OverrideRequest {
                    event_ids: vec![cal.event_ids[0], later[0]],
                    start: minutes(0),
                    end: minutes(3 * SHIFT_MINUTES),
                    user_id: cal.substitute,
                };
                override_events(gw, &request, &policy())
            })
            .unwrap_err();
        assert!(
            matches!(err.as_scheduler(), Some(SchedulerError::NonConsecutiveEvents { .. })),
            "backend {name}"
        );
    }
}

#[test]
fn test_override_rejects_mixed_users() {
    for (name, store) in stores() {
        let err = store
            .transaction(|gw| {
                let cal = seed(gw, 1)?;
                let next = gw.insert_events(&[NewEvent::manual(
                    cal.team_id,
                    cal.role_id,
                    cal.other,
                    minutes(SHIFT_MINUTES),
                    minutes(2 * SHIFT_MINUTES),
                )])?;
                let request = OverrideRequest {
                    event_ids: vec![cal.event_ids[0], next[0]],
                    start: minutes(0),
                    end: minutes(2 * SHIFT_MINUTES),
                    user_id: cal.substitute,
                };
                override_events(gw, &request, &policy())
            })
            .unwrap_err();
        assert_eq!(err.as_scheduler(), Some(&SchedulerError::MixedUsers), "backend {name}");
    }
}

#[test]
fn test_failed_override_leaves_calendar_untouched() {
    let store = MemoryStore::new();
    let ids = store.transaction(|gw| Ok(seed(gw, 2)?.event_ids)).unwrap();

    let result = store.transaction(|gw| {
        let request = OverrideRequest {
            event_ids: ids.clone(),
            start: minutes(100),
            end: minutes(300),
            user_id: 404,
        };
        override_events(gw, &request, &policy())
    });
    assert!(result.is_err());

    let events = store.transaction(|gw| gw.events_by_id(&ids)).unwrap();
    assert_eq!(spans(&events), vec![(0, 240), (240, 480)]);
}

#[test]
fn test_context_publishes_substitution() {
    let sink = Arc::new(MemorySink::new());
    let ctx = SchedulerContext::new(Config::default(), sink.clone());
    let store = MemoryStore::new();
    let cal = store.transaction(|gw| seed(gw, 1)).unwrap();

    let request = OverrideRequest {
        event_ids: cal.event_ids.clone(),
        start: minutes(60),
        end: minutes(120),
        user_id: cal.substitute,
    };
    ctx.override_events(&store, &request, sunday(0, 0), false)
        .unwrap();

    let changes = sink.take();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::EventSubstituted);
    assert_eq!(changes[0].start, minutes(60));
    assert_eq!(changes[0].end, minutes(120));
    let mut users = vec![cal.owner, cal.substitute];
    users.sort_unstable();
    assert_eq!(changes[0].user_ids, users);
}

// ============================================================================
// Property Tests
// ============================================================================

/// `(shifts, start, end)` in minutes, with the range touching every shift
fn override_case() -> impl Strategy<Value = (i64, i64, i64)> {
    (1i64..=4).prop_flat_map(|shifts| {
        let span = shifts * SHIFT_MINUTES;
        (-SHIFT_MINUTES..SHIFT_MINUTES).prop_flat_map(move |start| {
            let low = ((shifts - 1) * SHIFT_MINUTES).max(start.max(0)) + 1;
            (Just(shifts), Just(start), low..=(span + SHIFT_MINUTES))
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_override_conserves_coverage((shifts, start, end) in override_case()) {
        let store = MemoryStore::new();
        let (cal, outcome, stored) = store
            .transaction(|gw| {
                let cal = seed(gw, shifts)?;
                let request = OverrideRequest {
                    event_ids: cal.event_ids.clone(),
                    start: minutes(start),
                    end: minutes(end),
                    user_id: cal.substitute,
                };
                let outcome = override_events(gw, &request, &policy())?;
                let stored = gw.events(&EventFilter::new())?;
                Ok((cal, outcome, stored))
            })
            .unwrap();

        let span = shifts * SHIFT_MINUTES;
        let covered = spans(&outcome.events);

        // Contiguous cover of the original run, nothing else left behind
        prop_assert_eq!(covered.first().map(|s| s.0), Some(0));
        prop_assert_eq!(covered.last().map(|s| s.1), Some(span));
        for pair in covered.windows(2) {
            prop_assert_eq!(pair[0].1, pair[1].0);
        }
        prop_assert_eq!(&stored, &outcome.events);

        let substituted: Vec<(i64, i64)> = outcome
            .events
            .iter()
            .filter(|e| e.user_id == cal.substitute)
            .map(|e| ((e.start - minutes(0)).num_minutes(), (e.end - minutes(0)).num_minutes()))
            .collect();
        prop_assert_eq!(substituted, vec![(start.max(0), end.min(span))]);
        prop_assert!(outcome
            .events
            .iter()
            .all(|e| e.user_id == cal.substitute || e.user_id == cal.owner));
    }
}
