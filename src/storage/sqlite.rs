//! SQLite backend
//!
//! Instants are stored as unix seconds. A single connection sits behind a
//! mutex; every unit of work runs in its own SQLite transaction.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{EventFilter, Gateway, Store, TxMode};
use crate::error::{Error, Result};
use crate::models::{
    Event, EventId, NewEvent, NewSchedule, Occurrence, Role, RoleId, Roster, RosterId,
    RosterMember, Schedule, ScheduleEvent, ScheduleId, Team, TeamId, TeamSubscription, User,
    UserId,
};
use crate::scheduler::strategy::SelectionStrategy;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        scheduling_timezone TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        full_name TEXT,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS rosters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        team_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        UNIQUE (team_id, name)
    );

    CREATE TABLE IF NOT EXISTS roster_users (
        roster_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        in_rotation INTEGER NOT NULL DEFAULT 1,
        roster_priority INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (roster_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS team_subscriptions (
        team_id INTEGER NOT NULL,
        subscription_team_id INTEGER NOT NULL,
        role_id INTEGER NOT NULL,
        PRIMARY KEY (team_id, subscription_team_id, role_id)
    );

    CREATE TABLE IF NOT EXISTS schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        team_id INTEGER NOT NULL,
        roster_id INTEGER NOT NULL,
        role_id INTEGER NOT NULL,
        auto_populate_threshold INTEGER NOT NULL DEFAULT 21,
        advanced_mode INTEGER NOT NULL DEFAULT 0,
        scheduler TEXT NOT NULL DEFAULT 'default',
        last_epoch_scheduled INTEGER,
        last_scheduled_user_id INTEGER
    );

    CREATE TABLE IF NOT EXISTS schedule_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        schedule_id INTEGER NOT NULL,
        start_offset INTEGER NOT NULL,
        duration INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS schedule_order (
        schedule_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        priority INTEGER NOT NULL,
        PRIMARY KEY (schedule_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        team_id INTEGER NOT NULL,
        role_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        schedule_id INTEGER,
        start_at INTEGER NOT NULL,
        end_at INTEGER NOT NULL,
        link_id TEXT,
        note TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_events_team_role_start
        ON events(team_id, role_id, start_at);

    CREATE INDEX IF NOT EXISTS idx_events_user_start
        ON events(user_id, start_at);

    CREATE INDEX IF NOT EXISTS idx_events_schedule
        ON events(schedule_id);

    CREATE INDEX IF NOT EXISTS idx_events_link
        ON events(link_id);
"#;

const EVENT_COLUMNS: &str =
    "id, team_id, role_id, user_id, schedule_id, start_at, end_at, link_id, note";

/// SQLite-backed [`Store`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Store for SqliteStore {
    fn execute(
        &self,
        mode: TxMode,
        work: &mut dyn FnMut(&dyn Gateway) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| Error::other("SQLite connection lock poisoned"))?;
        let tx = conn.transaction()?;

        let outcome = work(&SqliteGateway { conn: &tx });
        match outcome {
            Ok(()) if mode == TxMode::Commit => {
                tx.commit()?;
                Ok(())
            }
            outcome => {
                tx.rollback()?;
                outcome
            }
        }
    }
}

/// [`Gateway`] over an open SQLite transaction
pub struct SqliteGateway<'a> {
    conn: &'a Connection,
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn ids_to_values(ids: &[i64]) -> Vec<Value> {
    ids.iter().map(|id| Value::Integer(*id)).collect()
}

fn instant_from_secs(secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(0, secs))
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        team_id: row.get(1)?,
        role_id: row.get(2)?,
        user_id: row.get(3)?,
        schedule_id: row.get(4)?,
        start: instant_from_secs(row.get(5)?)?,
        end: instant_from_secs(row.get(6)?)?,
        link_id: row.get(7)?,
        note: row.get(8)?,
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        scheduling_timezone: row.get(2)?,
        active: row.get(3)?,
    })
}

impl SqliteGateway<'_> {
    fn query_events(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(sql)?;
        let events = stmt
            .query_map(params_from_iter(values.iter()), event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn update_events(&self, set_clause: &str, mut values: Vec<Value>, ids: &[EventId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE events SET {set_clause} WHERE id IN ({})",
            placeholders(ids.len())
        );
        values.extend(ids_to_values(ids));
        Ok(self.conn.execute(&sql, params_from_iter(values.iter()))?)
    }
}

impl Gateway for SqliteGateway<'_> {
    fn insert_team(&self, name: &str, scheduling_timezone: &str) -> Result<Team> {
        self.conn.execute(
            "INSERT INTO teams (name, scheduling_timezone, active) VALUES (?1, ?2, 1)",
            params![name, scheduling_timezone],
        )?;
        Ok(Team {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            scheduling_timezone: scheduling_timezone.to_string(),
            active: true,
        })
    }

    fn team(&self, id: TeamId) -> Result<Option<Team>> {
        let team = self
            .conn
            .query_row(
                "SELECT id, name, scheduling_timezone, active FROM teams WHERE id = ?1",
                params![id],
                team_from_row,
            )
            .optional()?;
        Ok(team)
    }

    fn active_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, scheduling_timezone, active FROM teams WHERE active = 1 ORDER BY id",
        )?;
        let teams = stmt
            .query_map([], team_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(teams)
    }

    fn set_team_active(&self, id: TeamId, active: bool) -> Result<()> {
        self.conn
            .execute("UPDATE teams SET active = ?1 WHERE id = ?2", params![active, id])?;
        Ok(())
    }

    fn insert_role(&self, name: &str) -> Result<Role> {
        self.conn
            .execute("INSERT INTO roles (name) VALUES (?1)", params![name])?;
        Ok(Role {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn insert_user(&self, name: &str, full_name: Option<&str>) -> Result<User> {
        self.conn.execute(
            "INSERT INTO users (name, full_name, active) VALUES (?1, ?2, 1)",
            params![name, full_name],
        )?;
        Ok(User {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            full_name: full_name.map(str::to_string),
            active: true,
        })
    }

    fn user(&self, id: UserId) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, full_name, active FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        full_name: row.get(2)?,
                        active: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn set_user_active(&self, id: UserId, active: bool) -> Result<()> {
        self.conn
            .execute("UPDATE users SET active = ?1 WHERE id = ?2", params![active, id])?;
        Ok(())
    }

    fn insert_roster(&self, team_id: TeamId, name: &str) -> Result<Roster> {
        self.conn.execute(
            "INSERT INTO rosters (team_id, name) VALUES (?1, ?2)",
            params![team_id, name],
        )?;
        Ok(Roster {
            id: self.conn.last_insert_rowid(),
            team_id,
            name: name.to_string(),
        })
    }

    fn add_roster_member(
        &self,
        roster_id: RosterId,
        user_id: UserId,
        in_rotation: bool,
        roster_priority: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO roster_users (roster_id, user_id, in_rotation, roster_priority)
             VALUES (?1, ?2, ?3, ?4)",
            params![roster_id, user_id, in_rotation, roster_priority],
        )?;
        Ok(())
    }

    fn roster_members(&self, roster_id: RosterId) -> Result<Vec<RosterMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT ru.roster_id, ru.user_id, ru.in_rotation, ru.roster_priority, u.active
             FROM roster_users ru JOIN users u ON u.id = ru.user_id
             WHERE ru.roster_id = ?1
             ORDER BY ru.roster_priority, ru.user_id",
        )?;
        let members = stmt
            .query_map(params![roster_id], |row| {
                Ok(RosterMember {
                    roster_id: row.get(0)?,
                    user_id: row.get(1)?,
                    in_rotation: row.get(2)?,
                    roster_priority: row.get(3)?,
                    active: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    fn user_in_team(&self, user_id: UserId, team_id: TeamId) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM roster_users ru JOIN rosters r ON r.id = ru.roster_id
                WHERE ru.user_id = ?1 AND r.team_id = ?2
             )",
            params![user_id, team_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_subscription(&self, subscription: TeamSubscription) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO team_subscriptions (team_id, subscription_team_id, role_id)
             VALUES (?1, ?2, ?3)",
            params![
                subscription.team_id,
                subscription.subscription_team_id,
                subscription.role_id
            ],
        )?;
        Ok(())
    }

    fn subscriptions(&self, team_id: TeamId) -> Result<Vec<TeamSubscription>> {
        let mut stmt = self.conn.prepare(
            "SELECT team_id, subscription_team_id, role_id FROM team_subscriptions
             WHERE team_id = ?1 ORDER BY subscription_team_id, role_id",
        )?;
        let subs = stmt
            .query_map(params![team_id], |row| {
                Ok(TeamSubscription {
                    team_id: row.get(0)?,
                    subscription_team_id: row.get(1)?,
                    role_id: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subs)
    }

    fn insert_schedule(&self, schedule: &NewSchedule) -> Result<Schedule> {
        self.conn.execute(
            "INSERT INTO schedules
                (team_id, roster_id, role_id, auto_populate_threshold, advanced_mode, scheduler)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                schedule.team_id,
                schedule.roster_id,
                schedule.role_id,
                schedule.auto_populate_threshold,
                schedule.advanced_mode,
                schedule.strategy.as_str()
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        let mut insert_event = self.conn.prepare(
            "INSERT INTO schedule_events (schedule_id, start_offset, duration) VALUES (?1, ?2, ?3)",
        )?;
        for event in &schedule.events {
            insert_event.execute(params![id, event.start, event.duration])?;
        }

        let mut insert_order = self.conn.prepare(
            "INSERT INTO schedule_order (schedule_id, user_id, priority) VALUES (?1, ?2, ?3)",
        )?;
        for (priority, user_id) in schedule.order.iter().enumerate() {
            insert_order.execute(params![id, user_id, priority as i64])?;
        }

        self.schedule(id)?
            .ok_or_else(|| Error::other(format!("schedule {id} vanished after insert")))
    }

    fn schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, team_id, roster_id, role_id, auto_populate_threshold, advanced_mode,
                        scheduler, last_epoch_scheduled, last_scheduled_user_id
                 FROM schedules WHERE id = ?1",
                params![id],
                |row| {
                    let strategy: String = row.get(6)?;
                    let strategy = strategy.parse::<SelectionStrategy>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
                    })?;
                    let last_epoch: Option<i64> = row.get(7)?;
                    Ok(Schedule {
                        id: row.get(0)?,
                        team_id: row.get(1)?,
                        roster_id: row.get(2)?,
                        role_id: row.get(3)?,
                        auto_populate_threshold: row.get(4)?,
                        advanced_mode: row.get(5)?,
                        strategy,
                        order: Vec::new(),
                        events: Vec::new(),
                        last_epoch_scheduled: last_epoch.map(instant_from_secs).transpose()?,
                        last_scheduled_user_id: row.get(8)?,
                    })
                },
            )
            .optional()?;

        let Some(mut schedule) = row else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT start_offset, duration FROM schedule_events WHERE schedule_id = ?1 ORDER BY id",
        )?;
        schedule.events = stmt
            .query_map(params![id], |row| Ok(ScheduleEvent::new(row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM schedule_order WHERE schedule_id = ?1 ORDER BY priority",
        )?;
        schedule.order = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(schedule))
    }

    fn team_schedules(&self, team_id: TeamId) -> Result<Vec<Schedule>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM schedules WHERE team_id = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![team_id], |row| row.get::<_, ScheduleId>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut schedules = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(schedule) = self.schedule(id)? {
                schedules.push(schedule);
            }
        }
        Ok(schedules)
    }

    fn set_last_epoch(&self, schedule_id: ScheduleId, watermark: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE schedules SET last_epoch_scheduled = ?1 WHERE id = ?2",
            params![watermark.timestamp(), schedule_id],
        )?;
        Ok(())
    }

    fn set_last_scheduled_user(
        &self,
        schedule_id: ScheduleId,
        user_id: Option<UserId>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE schedules SET last_scheduled_user_id = ?1 WHERE id = ?2",
            params![user_id, schedule_id],
        )?;
        Ok(())
    }

    fn events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.scopes.is_empty() {
            let scopes: Vec<&str> = filter
                .scopes
                .iter()
                .map(|scope| {
                    values.push(Value::Integer(scope.team_id));
                    match scope.role_id {
                        Some(role_id) => {
                            values.push(Value::Integer(role_id));
                            "(team_id = ? AND role_id = ?)"
                        }
                        None => "(team_id = ?)",
                    }
                })
                .collect();
            clauses.push(format!("({})", scopes.join(" OR ")));
        }

        if !filter.user_ids.is_empty() {
            clauses.push(format!("user_id IN ({})", placeholders(filter.user_ids.len())));
            values.extend(ids_to_values(&filter.user_ids));
        }

        if !filter.overlapping.is_empty() {
            let ranges = vec!["(start_at < ? AND end_at > ?)"; filter.overlapping.len()];
            clauses.push(format!("({})", ranges.join(" OR ")));
            for range in &filter.overlapping {
                values.push(Value::Integer(range.end.timestamp()));
                values.push(Value::Integer(range.start.timestamp()));
            }
        }

        if let Some(schedule_id) = filter.schedule_id {
            clauses.push("schedule_id = ?".to_string());
            values.push(Value::Integer(schedule_id));
        }

        if let Some(link_id) = &filter.link_id {
            clauses.push("link_id = ?".to_string());
            values.push(Value::Text(link_id.clone()));
        }

        let bounds = [
            ("start_at >= ?", filter.starts_at_or_after),
            ("start_at < ?", filter.starts_before),
            ("start_at <= ?", filter.starts_at_or_before),
            ("end_at <= ?", filter.ends_at_or_before),
        ];
        for (clause, bound) in bounds {
            if let Some(instant) = bound {
                clauses.push(clause.to_string());
                values.push(Value::Integer(instant.timestamp()));
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events {where_clause} ORDER BY start_at, id");
        self.query_events(&sql, values)
    }

    fn events_by_id(&self, ids: &[EventId]) -> Result<Vec<Event>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id IN ({}) ORDER BY start_at, id",
            placeholders(ids.len())
        );
        self.query_events(&sql, ids_to_values(ids))
    }

    fn count_matching_events(
        &self,
        team_id: TeamId,
        role_id: RoleId,
        occurrences: &[Occurrence],
    ) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM events
             WHERE team_id = ?1 AND role_id = ?2 AND start_at = ?3 AND end_at = ?4)",
        )?;
        let mut matched = 0;
        for occurrence in occurrences {
            let exists: bool = stmt.query_row(
                params![
                    team_id,
                    role_id,
                    occurrence.start.timestamp(),
                    occurrence.end.timestamp()
                ],
                |row| row.get(0),
            )?;
            if exists {
                matched += 1;
            }
        }
        Ok(matched)
    }

    fn insert_events(&self, events: &[NewEvent]) -> Result<Vec<EventId>> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO events (team_id, role_id, user_id, schedule_id, start_at, end_at, link_id, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            let id = stmt.insert(params![
                event.team_id,
                event.role_id,
                event.user_id,
                event.schedule_id,
                event.start.timestamp(),
                event.end.timestamp(),
                event.link_id,
                event.note
            ])?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn delete_events(&self, ids: &[EventId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM events WHERE id IN ({})", placeholders(ids.len()));
        Ok(self
            .conn
            .execute(&sql, params_from_iter(ids_to_values(ids).iter()))?)
    }

    fn set_event_start(&self, ids: &[EventId], start: DateTime<Utc>) -> Result<()> {
        self.update_events("start_at = ?", vec![Value::Integer(start.timestamp())], ids)?;
        Ok(())
    }

    fn set_event_end(&self, ids: &[EventId], end: DateTime<Utc>) -> Result<()> {
        self.update_events("end_at = ?", vec![Value::Integer(end.timestamp())], ids)?;
        Ok(())
    }

    fn reassign_events(&self, ids: &[EventId], user_id: UserId, clear_link: bool) -> Result<()> {
        let set_clause = if clear_link {
            "user_id = ?, link_id = NULL"
        } else {
            "user_id = ?"
        };
        self.update_events(set_clause, vec![Value::Integer(user_id)], ids)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreExt;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("rota.db");

        let store = SqliteStore::open(&path).unwrap();
        store.transaction(|gw| gw.insert_team("infra", "UTC")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rota.db");
        let watermark = Utc.with_ymd_and_hms(2024, 1, 7, 8, 0, 0).unwrap();

        let schedule_id = {
            let store = SqliteStore::open(&path).unwrap();
            store
                .transaction(|gw| {
                    let team = gw.insert_team("infra", "US/Pacific")?;
                    let role = gw.insert_role("primary")?;
                    let roster = gw.insert_roster(team.id, "main")?;
                    let schedule = gw.insert_schedule(&NewSchedule {
                        team_id: team.id,
                        roster_id: roster.id,
                        role_id: role.id,
                        auto_populate_threshold: 14,
                        advanced_mode: false,
                        strategy: SelectionStrategy::RoundRobin,
                        order: Vec::new(),
                        events: vec![ScheduleEvent::new(0, 604_800)],
                    })?;
                    gw.set_last_epoch(schedule.id, watermark)?;
                    gw.set_last_scheduled_user(schedule.id, Some(42))?;
                    Ok(schedule.id)
                })
                .unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        let schedule = store
            .transaction(|gw| gw.schedule(schedule_id))
            .unwrap()
            .unwrap();
        assert_eq!(schedule.last_epoch_scheduled, Some(watermark));
        assert_eq!(schedule.last_scheduled_user_id, Some(42));
        assert_eq!(schedule.strategy, SelectionStrategy::RoundRobin);
    }

    #[test]
    fn test_empty_id_lists_are_noops() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .transaction(|gw| {
                assert!(gw.events_by_id(&[])?.is_empty());
                assert_eq!(gw.delete_events(&[])?, 0);
                gw.set_event_end(&[], Utc::now())?;
                assert_eq!(gw.count_matching_events(1, 1, &[])?, 0);
                Ok(())
            })
            .unwrap();
    }
}
