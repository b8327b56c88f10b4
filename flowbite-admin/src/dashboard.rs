//! Dashboard widgets
//!
//! Aggregates shown on the admin index page: KPI cards with week-over-week
//! change, a seven day activity chart, the most populated tables and the
//! viewer's recent actions. Everything is computed against an explicit `now`
//! so the numbers are reproducible.

use crate::error::AdminResult;
use crate::registry::ModelRegistry;
use crate::routes::{UrlRegistry, quote};
use crate::store::{QueryBackend, RowQuery};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use flowbite_log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of change recorded in the admin log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionFlag {
    Addition,
    Change,
    Deletion,
}

impl ActionFlag {
    /// Get icon for action
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Addition => "plus-circle",
            Self::Change => "edit",
            Self::Deletion => "trash",
        }
    }

    /// Get color for action
    pub fn color(&self) -> &'static str {
        match self {
            Self::Addition => "success",
            Self::Change => "warning",
            Self::Deletion => "error",
        }
    }
}

/// One admin log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub action_time: DateTime<Utc>,
    pub user_id: i64,
    pub app_label: Option<String>,
    pub model_name: Option<String>,
    pub object_id: Option<String>,
    pub object_repr: String,
    pub action_flag: ActionFlag,
    /// Free text, or the JSON change list written by the admin
    pub change_message: String,
}

impl LogEntry {
    /// Human readable change message.
    ///
    /// JSON change lists (`[{"changed": {"fields": ["Title"]}}]`) are
    /// rendered as sentences; plain text is returned as is.
    pub fn get_change_message(&self) -> String {
        if !self.change_message.starts_with('[') {
            return self.change_message.clone();
        }
        let Ok(serde_json::Value::Array(items)) =
            serde_json::from_str::<serde_json::Value>(&self.change_message)
        else {
            return self.change_message.clone();
        };

        let mut parts = Vec::new();
        for item in &items {
            if item.get("added").is_some() {
                parts.push("Added.".to_string());
            } else if let Some(changed) = item.get("changed") {
                let fields: Vec<&str> = changed
                    .get("fields")
                    .and_then(|f| f.as_array())
                    .map(|f| f.iter().filter_map(|v| v.as_str()).collect())
                    .unwrap_or_default();
                if fields.is_empty() {
                    parts.push("Changed.".to_string());
                } else {
                    parts.push(format!("Changed {}.", join_and(&fields)));
                }
            } else if item.get("deleted").is_some() {
                parts.push("Deleted.".to_string());
            }
        }
        if parts.is_empty() {
            "No fields changed.".to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Short description (`Added "Dune".`)
    pub fn summary(&self) -> String {
        match self.action_flag {
            ActionFlag::Addition => format!("Added \u{201c}{}\u{201d}.", self.object_repr),
            ActionFlag::Change => format!(
                "Changed \u{201c}{}\u{201d} - {}",
                self.object_repr,
                self.get_change_message()
            ),
            ActionFlag::Deletion => format!("Deleted \u{201c}{}.\u{201d}", self.object_repr),
        }
    }

    /// Change page of the logged object, if it still routes.
    pub fn get_admin_url(&self, routes: &UrlRegistry, site_name: &str) -> Option<String> {
        let (app, model, id) = (
            self.app_label.as_ref()?,
            self.model_name.as_ref()?,
            self.object_id.as_ref()?,
        );
        let name = format!("{}:{}_{}_change", site_name, app, model);
        let quoted = quote(id);
        routes.reverse(&name, &[quoted.as_str()]).ok()
    }
}

fn join_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [head @ .., last] => format!("{} and {}", head.join(", "), last),
    }
}

/// Account subsets counted by KPI cards; ranges are `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    All,
    Staff,
    LoggedInBetween {
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    },
    JoinedBetween {
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    },
}

/// Admin log query; results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub user_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Source of account and admin-log statistics
pub trait DashboardSource: Send + Sync {
    /// Whether accounts record their last login.
    fn tracks_last_login(&self) -> bool {
        true
    }

    /// Whether accounts record when they joined.
    fn tracks_date_joined(&self) -> bool {
        true
    }

    fn count_users(&self, filter: &UserFilter) -> AdminResult<usize>;

    fn log_entries(&self, query: &LogQuery) -> AdminResult<Vec<LogEntry>>;

    fn count_log_entries(&self, query: &LogQuery) -> AdminResult<usize> {
        Ok(self.log_entries(query)?.len())
    }
}

/// Week-over-week change in percent.
///
/// No previous activity yields `None` when nothing happened now either, and
/// a flat `+100%` otherwise.
pub fn percentage_change(current: usize, previous: usize) -> Option<f64> {
    if previous == 0 {
        return if current == 0 { None } else { Some(100.0) };
    }
    Some((current as f64 - previous as f64) / previous as f64 * 100.0)
}

/// One KPI card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiCard {
    pub id: String,
    pub title: String,
    pub value: usize,
    pub badge: String,
    pub change: Option<f64>,
}

impl KpiCard {
    fn new(id: &str, title: &str, value: usize, badge: &str, change: Option<f64>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            value,
            badge: badge.to_string(),
            change,
        }
    }
}

fn count_or_zero(result: AdminResult<usize>, what: &str) -> usize {
    result.unwrap_or_else(|e| {
        warn!("Dashboard could not count {}: {}", what, e);
        0
    })
}

/// KPI cards for the week ending at `now`.
pub fn kpi_cards(source: &dyn DashboardSource, now: DateTime<Utc>) -> Vec<KpiCard> {
    let week_ago = now - Duration::days(7);
    let previous_start = week_ago - Duration::days(7);

    let total = count_or_zero(source.count_users(&UserFilter::All), "users");
    let staff = count_or_zero(source.count_users(&UserFilter::Staff), "staff users");

    let mut cards = vec![
        KpiCard::new("total-users", "Total users", total, "All accounts", None),
        KpiCard::new("staff-users", "Staff members", staff, "With admin access", None),
    ];

    if source.tracks_last_login() {
        let current = count_or_zero(
            source.count_users(&UserFilter::LoggedInBetween { start: week_ago, end: None }),
            "active users",
        );
        let previous = count_or_zero(
            source.count_users(&UserFilter::LoggedInBetween {
                start: previous_start,
                end: Some(week_ago),
            }),
            "previously active users",
        );
        cards.push(KpiCard::new(
            "active-users",
            "Active this week",
            current,
            "Logins in last 7 days",
            percentage_change(current, previous),
        ));
    }

    if source.tracks_date_joined() {
        let current = count_or_zero(
            source.count_users(&UserFilter::JoinedBetween { start: week_ago, end: None }),
            "new users",
        );
        let previous = count_or_zero(
            source.count_users(&UserFilter::JoinedBetween {
                start: previous_start,
                end: Some(week_ago),
            }),
            "previously joined users",
        );
        cards.push(KpiCard::new(
            "new-users",
            "New accounts",
            current,
            "Joined in last 7 days",
            percentage_change(current, previous),
        ));
    }

    let current_actions = count_or_zero(
        source.count_log_entries(&LogQuery {
            since: Some(week_ago),
            ..LogQuery::default()
        }),
        "admin actions",
    );
    let previous_actions = count_or_zero(
        source.count_log_entries(&LogQuery {
            since: Some(previous_start),
            until: Some(week_ago),
            ..LogQuery::default()
        }),
        "previous admin actions",
    );
    cards.push(KpiCard::new(
        "recent-actions",
        "Admin activity",
        current_actions,
        "Changes in last 7 days",
        percentage_change(current_actions, previous_actions),
    ));

    cards
}

/// One Chart.js dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<usize>,
    pub background_color: String,
    pub border_color: String,
    pub fill: bool,
    pub tension: f64,
}

/// Chart.js data block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

const AP_MONTHS: [&str; 12] = [
    "Jan.", "Feb.", "March", "April", "May", "June", "July", "Aug.", "Sept.", "Oct.", "Nov.",
    "Dec.",
];

/// `Jan. 5`, `March 3`, `Sept. 9`
pub fn ap_date_label(date: NaiveDate) -> String {
    format!("{} {}", AP_MONTHS[date.month0() as usize], date.day())
}

fn dataset(label: &str, data: Vec<usize>, background: &str, border: &str) -> ChartDataset {
    ChartDataset {
        label: label.to_string(),
        data,
        background_color: background.to_string(),
        border_color: border.to_string(),
        fill: true,
        tension: 0.35,
    }
}

/// Additions, changes and deletions per day for the seven days ending `today`.
pub fn activity_chart(source: &dyn DashboardSource, today: NaiveDate) -> AdminResult<ChartConfig> {
    let start = today - Duration::days(6);
    let since = start
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc());
    let entries = source.log_entries(&LogQuery {
        since,
        ..LogQuery::default()
    })?;

    let mut totals: HashMap<(NaiveDate, ActionFlag), usize> = HashMap::new();
    for entry in &entries {
        *totals
            .entry((entry.action_time.date_naive(), entry.action_flag))
            .or_default() += 1;
    }

    let days: Vec<NaiveDate> = (0..7).map(|i| start + Duration::days(i)).collect();
    let series = |flag: ActionFlag| -> Vec<usize> {
        days.iter()
            .map(|day| totals.get(&(*day, flag)).copied().unwrap_or(0))
            .collect()
    };

    Ok(ChartConfig {
        labels: days.iter().map(|d| ap_date_label(*d)).collect(),
        datasets: vec![
            dataset(
                "Additions",
                series(ActionFlag::Addition),
                "rgba(59, 130, 246, 0.45)",
                "rgba(37, 99, 235, 0.9)",
            ),
            dataset(
                "Changes",
                series(ActionFlag::Change),
                "rgba(16, 185, 129, 0.45)",
                "rgba(5, 150, 105, 0.9)",
            ),
            dataset(
                "Deletions",
                series(ActionFlag::Deletion),
                "rgba(248, 113, 113, 0.35)",
                "rgba(220, 38, 38, 0.75)",
            ),
        ],
    })
}

/// Row count of one registered model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStat {
    pub app_label: String,
    pub verbose_name: String,
    pub count: usize,
    pub admin_url: Option<String>,
}

/// The most populated registered models, largest first.
///
/// Tables that cannot be counted or are empty are left out.
pub fn top_models(
    registry: &ModelRegistry,
    backend: &dyn QueryBackend,
    routes: &UrlRegistry,
    site_name: &str,
    limit: usize,
) -> Vec<ModelStat> {
    let mut stats: Vec<ModelStat> = registry
        .all()
        .into_iter()
        .filter_map(|model| {
            let count = match backend.count(model, &RowQuery::new()) {
                Ok(count) => count,
                Err(e) => {
                    warn!("Skipping {} in top models: {}", model.label(), e);
                    return None;
                }
            };
            if count == 0 {
                return None;
            }
            let name = format!("{}:{}_{}_changelist", site_name, model.app_label, model.model_name);
            Some(ModelStat {
                app_label: model.app_label.clone(),
                verbose_name: model.verbose_name_plural_capitalized(),
                count,
                admin_url: routes.reverse(&name, &[]).ok(),
            })
        })
        .collect();

    stats.sort_by(|a, b| b.count.cmp(&a.count));
    stats.truncate(limit);
    stats
}

/// The user's latest log entries.
pub fn recent_actions(
    source: &dyn DashboardSource,
    user_id: i64,
    limit: usize,
) -> AdminResult<Vec<LogEntry>> {
    source.log_entries(&LogQuery {
        user_id: Some(user_id),
        limit: Some(limit),
        ..LogQuery::default()
    })
}

const TIMESINCE_CHUNKS: [(i64, &str, &str); 6] = [
    (60 * 60 * 24 * 365, "year", "years"),
    (60 * 60 * 24 * 30, "month", "months"),
    (60 * 60 * 24 * 7, "week", "weeks"),
    (60 * 60 * 24, "day", "days"),
    (60 * 60, "hour", "hours"),
    (60, "minute", "minutes"),
];

fn unit(count: i64, singular: &str, plural: &str) -> String {
    format!("{} {}", count, if count == 1 { singular } else { plural })
}

/// Elapsed time in at most two adjacent units (`2 hours, 5 minutes`).
pub fn timesince(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 60 {
        return "0 minutes".to_string();
    }

    for (i, (size, singular, plural)) in TIMESINCE_CHUNKS.iter().enumerate() {
        let count = seconds / size;
        if count == 0 {
            continue;
        }
        let mut text = unit(count, singular, plural);
        if let Some((next_size, next_singular, next_plural)) = TIMESINCE_CHUNKS.get(i + 1) {
            let rest = (seconds - count * size) / next_size;
            if rest != 0 {
                text.push_str(", ");
                text.push_str(&unit(rest, next_singular, next_plural));
            }
        }
        return text;
    }
    "0 minutes".to_string()
}
