//! In-memory backend
//!
//! Each unit of work operates on a snapshot of the state; the snapshot
//! replaces the shared state only when the work commits.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, SubsecRound, Utc};

use super::{EventFilter, Gateway, Store, TxMode};
use crate::error::{Error, Result};
use crate::models::{
    Event, EventId, NewEvent, NewSchedule, Occurrence, Role, RoleId, Roster, RosterId,
    RosterMember, Schedule, ScheduleId, Team, TeamId, TeamSubscription, User, UserId,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    teams: BTreeMap<TeamId, Team>,
    roles: BTreeMap<RoleId, Role>,
    users: BTreeMap<UserId, User>,
    rosters: BTreeMap<RosterId, Roster>,
    /// (roster, user) -> (in_rotation, priority)
    roster_users: BTreeMap<(RosterId, UserId), (bool, i64)>,
    subscriptions: Vec<TeamSubscription>,
    schedules: BTreeMap<ScheduleId, Schedule>,
    /// Instants truncated to whole seconds, as in the SQLite columns
    events: BTreeMap<EventId, Event>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn sorted(mut events: Vec<Event>) -> Vec<Event> {
        events.sort_by_key(|e| (e.start, e.id));
        events
    }
}

/// Volatile [`Store`] for tests and previews
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn execute(
        &self,
        mode: TxMode,
        work: &mut dyn FnMut(&dyn Gateway) -> Result<()>,
    ) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::other("memory store lock poisoned"))?;

        let gateway = MemoryGateway {
            state: RefCell::new(state.clone()),
        };
        work(&gateway)?;

        if mode == TxMode::Commit {
            *state = gateway.state.into_inner();
        }
        Ok(())
    }
}

struct MemoryGateway {
    state: RefCell<MemoryState>,
}

impl MemoryGateway {
    fn update_events(&self, ids: &[EventId], mut apply: impl FnMut(&mut Event)) {
        let mut state = self.state.borrow_mut();
        for id in ids {
            if let Some(event) = state.events.get_mut(id) {
                apply(event);
            }
        }
    }
}

impl Gateway for MemoryGateway {
    fn insert_team(&self, name: &str, scheduling_timezone: &str) -> Result<Team> {
        let mut state = self.state.borrow_mut();
        let team = Team {
            id: state.allocate_id(),
            name: name.to_string(),
            scheduling_timezone: scheduling_timezone.to_string(),
            active: true,
        };
        state.teams.insert(team.id, team.clone());
        Ok(team)
    }

    fn team(&self, id: TeamId) -> Result<Option<Team>> {
        Ok(self.state.borrow().teams.get(&id).cloned())
    }

    fn active_teams(&self) -> Result<Vec<Team>> {
        Ok(self
            .state
            .borrow()
            .teams
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect())
    }

    fn set_team_active(&self, id: TeamId, active: bool) -> Result<()> {
        if let Some(team) = self.state.borrow_mut().teams.get_mut(&id) {
            team.active = active;
        }
        Ok(())
    }

    fn insert_role(&self, name: &str) -> Result<Role> {
        let mut state = self.state.borrow_mut();
        let role = Role {
            id: state.allocate_id(),
            name: name.to_string(),
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    fn insert_user(&self, name: &str, full_name: Option<&str>) -> Result<User> {
        let mut state = self.state.borrow_mut();
        let user = User {
            id: state.allocate_id(),
            name: name.to_string(),
            full_name: full_name.map(str::to_string),
            active: true,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.borrow().users.get(&id).cloned())
    }

    fn set_user_active(&self, id: UserId, active: bool) -> Result<()> {
        if let Some(user) = self.state.borrow_mut().users.get_mut(&id) {
            user.active = active;
        }
        Ok(())
    }

    fn insert_roster(&self, team_id: TeamId, name: &str) -> Result<Roster> {
        let mut state = self.state.borrow_mut();
        let roster = Roster {
            id: state.allocate_id(),
            team_id,
            name: name.to_string(),
        };
        state.rosters.insert(roster.id, roster.clone());
        Ok(roster)
    }

    fn add_roster_member(
        &self,
        roster_id: RosterId,
        user_id: UserId,
        in_rotation: bool,
        roster_priority: i64,
    ) -> Result<()> {
        self.state
            .borrow_mut()
            .roster_users
            .insert((roster_id, user_id), (in_rotation, roster_priority));
        Ok(())
    }

    fn roster_members(&self, roster_id: RosterId) -> Result<Vec<RosterMember>> {
        let state = self.state.borrow();
        let mut members: Vec<RosterMember> = state
            .roster_users
            .iter()
            .filter(|(key, _)| key.0 == roster_id)
            .filter_map(|(&(member_roster, user_id), &(in_rotation, roster_priority))| {
                state.users.get(&user_id).map(|user| RosterMember {
                    roster_id: member_roster,
                    user_id,
                    in_rotation,
                    roster_priority,
                    active: user.active,
                })
            })
            .collect();
        members.sort_by_key(|m| (m.roster_priority, m.user_id));
        Ok(members)
    }

    fn user_in_team(&self, user_id: UserId, team_id: TeamId) -> Result<bool> {
        let state = self.state.borrow();
        Ok(state.roster_users.keys().any(|&(roster_id, member)| {
            member == user_id
                && state
                    .rosters
                    .get(&roster_id)
                    .is_some_and(|r| r.team_id == team_id)
        }))
    }

    fn insert_subscription(&self, subscription: TeamSubscription) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.subscriptions.contains(&subscription) {
            state.subscriptions.push(subscription);
        }
        Ok(())
    }

    fn subscriptions(&self, team_id: TeamId) -> Result<Vec<TeamSubscription>> {
        let mut subs: Vec<_> = self
            .state
            .borrow()
            .subscriptions
            .iter()
            .filter(|s| s.team_id == team_id)
            .copied()
            .collect();
        subs.sort_by_key(|s| (s.subscription_team_id, s.role_id));
        Ok(subs)
    }

    fn insert_schedule(&self, schedule: &NewSchedule) -> Result<Schedule> {
        let mut state = self.state.borrow_mut();
        let schedule = Schedule {
            id: state.allocate_id(),
            team_id: schedule.team_id,
            roster_id: schedule.roster_id,
            role_id: schedule.role_id,
            auto_populate_threshold: schedule.auto_populate_threshold,
            advanced_mode: schedule.advanced_mode,
            strategy: schedule.strategy,
            order: schedule.order.clone(),
            events: schedule.events.clone(),
            last_epoch_scheduled: None,
            last_scheduled_user_id: None,
        };
        state.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    fn schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        Ok(self.state.borrow().schedules.get(&id).cloned())
    }

    fn team_schedules(&self, team_id: TeamId) -> Result<Vec<Schedule>> {
        Ok(self
            .state
            .borrow()
            .schedules
            .values()
            .filter(|s| s.team_id == team_id)
            .cloned()
            .collect())
    }

    fn set_last_epoch(&self, schedule_id: ScheduleId, watermark: DateTime<Utc>) -> Result<()> {
        if let Some(schedule) = self.state.borrow_mut().schedules.get_mut(&schedule_id) {
            schedule.last_epoch_scheduled = Some(watermark);
        }
        Ok(())
    }

    fn set_last_scheduled_user(
        &self,
        schedule_id: ScheduleId,
        user_id: Option<UserId>,
    ) -> Result<()> {
        if let Some(schedule) = self.state.borrow_mut().schedules.get_mut(&schedule_id) {
            schedule.last_scheduled_user_id = user_id;
        }
        Ok(())
    }

    fn events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let events = self
            .state
            .borrow()
            .events
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(MemoryState::sorted(events))
    }

    fn events_by_id(&self, ids: &[EventId]) -> Result<Vec<Event>> {
        let state = self.state.borrow();
        let mut events: Vec<Event> = ids
            .iter()
            .filter_map(|id| state.events.get(id).cloned())
            .collect();
        events.sort_by_key(|e| e.id);
        events.dedup_by_key(|e| e.id);
        Ok(MemoryState::sorted(events))
    }

    fn count_matching_events(
        &self,
        team_id: TeamId,
        role_id: RoleId,
        occurrences: &[Occurrence],
    ) -> Result<usize> {
        let state = self.state.borrow();
        Ok(occurrences
            .iter()
            .filter(|o| {
                state.events.values().any(|e| {
                    e.team_id == team_id && e.role_id == role_id && e.occurrence() == **o
                })
            })
            .count())
    }

    fn insert_events(&self, events: &[NewEvent]) -> Result<Vec<EventId>> {
        let mut state = self.state.borrow_mut();
        let mut ids = Vec::with_capacity(events.len());
        for new in events {
            let event = Event {
                id: state.allocate_id(),
                team_id: new.team_id,
                role_id: new.role_id,
                user_id: new.user_id,
                schedule_id: new.schedule_id,
                start: new.start.trunc_subsecs(0),
                end: new.end.trunc_subsecs(0),
                link_id: new.link_id.clone(),
                note: new.note.clone(),
            };
            ids.push(event.id);
            state.events.insert(event.id, event);
        }
        Ok(ids)
    }

    fn delete_events(&self, ids: &[EventId]) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        Ok(ids
            .iter()
            .filter(|&&id| state.events.remove(&id).is_some())
            .count())
    }

    fn set_event_start(&self, ids: &[EventId], start: DateTime<Utc>) -> Result<()> {
        let start = start.trunc_subsecs(0);
        self.update_events(ids, |e| e.start = start);
        Ok(())
    }

    fn set_event_end(&self, ids: &[EventId], end: DateTime<Utc>) -> Result<()> {
        let end = end.trunc_subsecs(0);
        self.update_events(ids, |e| e.end = end);
        Ok(())
    }

    fn reassign_events(&self, ids: &[EventId], user_id: UserId, clear_link: bool) -> Result<()> {
        self.update_events(ids, |e| {
            e.user_id = user_id;
            if clear_link {
                e.link_id = None;
            }
        });
        Ok(())
    }
}
