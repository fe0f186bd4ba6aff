//! Common test utilities

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rota::error::Result;
use rota::models::{NewSchedule, Role, Roster, Schedule, ScheduleEvent, Team, UserId};
use rota::scheduler::SelectionStrategy;
use rota::storage::{Gateway, MemoryStore, SqliteStore, Store};

pub const HOUR: i64 = 60 * 60;
pub const DAY: i64 = 24 * HOUR;

/// Sunday 2024-01-07 00:00 UTC shifted by days and hours
pub fn sunday(days: i64, hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap()
        + Duration::days(days)
        + Duration::hours(hours)
}

/// Both store backends, labelled for assertion messages
pub fn stores() -> Vec<(&'static str, Box<dyn Store>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("sqlite", Box::new(SqliteStore::in_memory().unwrap())),
    ]
}

/// Weekly shift handed off Monday 09:00
pub fn weekly_monday_template() -> Vec<ScheduleEvent> {
    vec![ScheduleEvent::new(DAY + 9 * HOUR, 7 * DAY)]
}

/// A team with one roster, one role and one schedule
#[derive(Debug, Clone)]
pub struct Fixture {
    pub team: Team,
    pub role: Role,
    pub roster: Roster,
    pub users: Vec<UserId>,
    pub schedule: Schedule,
}

pub struct FixtureBuilder {
    name: String,
    timezone: String,
    members: usize,
    strategy: SelectionStrategy,
    template: Vec<ScheduleEvent>,
    threshold: i64,
    order: Vec<usize>,
}

impl FixtureBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            timezone: "UTC".to_string(),
            members: 3,
            strategy: SelectionStrategy::Default,
            template: weekly_monday_template(),
            threshold: 21,
            order: Vec::new(),
        }
    }

    pub fn timezone(mut self, tz: &str) -> Self {
        self.timezone = tz.to_string();
        self
    }

    pub fn members(mut self, members: usize) -> Self {
        self.members = members;
        self
    }

    pub fn strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn template(mut self, template: Vec<ScheduleEvent>) -> Self {
        self.template = template;
        self
    }

    pub fn threshold(mut self, days: i64) -> Self {
        self.threshold = days;
        self
    }

    /// Explicit round-robin order as indices into the created users
    pub fn order(mut self, order: Vec<usize>) -> Self {
        self.order = order;
        self
    }

    pub fn build(self, gw: &dyn Gateway) -> Result<Fixture> {
        let team = gw.insert_team(&self.name, &self.timezone)?;
        let role = gw.insert_role(&format!("{}-primary", self.name))?;
        let roster = gw.insert_roster(team.id, &format!("{}-roster", self.name))?;

        let mut users = Vec::with_capacity(self.members);
        for i in 0..self.members {
            let user = gw.insert_user(&format!("{}-user{}", self.name, i), None)?;
            gw.add_roster_member(roster.id, user.id, true, i as i64)?;
            users.push(user.id);
        }

        let schedule = gw.insert_schedule(&NewSchedule {
            team_id: team.id,
            roster_id: roster.id,
            role_id: role.id,
            auto_populate_threshold: self.threshold,
            advanced_mode: false,
            strategy: self.strategy,
            order: self.order.iter().map(|&i| users[i]).collect(),
            events: self.template,
        })?;

        Ok(Fixture {
            team,
            role,
            roster,
            users,
            schedule,
        })
    }
}
