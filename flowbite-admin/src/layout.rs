//! Dashboard widget layout
//!
//! The widget order lives in the user's session. Every read and write is
//! normalized against the default widget set: unknown identifiers and
//! duplicates are dropped, missing defaults are appended in default order.

use crate::error::AdminResult;
use crate::session::Session;
use flowbite_log::debug;
use serde::{Deserialize, Serialize};

/// Every dashboard widget, in default order
pub const DEFAULT_WIDGETS: &[&str] = &[
    "kpi-cards",
    "activity-chart",
    "app-list",
    "top-models",
    "recent-actions",
];

/// Default layout as owned strings
pub fn default_layout() -> Vec<String> {
    DEFAULT_WIDGETS.iter().map(|w| w.to_string()).collect()
}

/// Drop unknown and repeated ids, then append missing defaults.
pub fn normalize_layout<S: AsRef<str>>(layout: &[S]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(DEFAULT_WIDGETS.len());
    for widget in layout {
        let widget = widget.as_ref();
        if DEFAULT_WIDGETS.contains(&widget) && !cleaned.iter().any(|w| w == widget) {
            cleaned.push(widget.to_string());
        }
    }
    for widget in DEFAULT_WIDGETS {
        if !cleaned.iter().any(|w| w == widget) {
            cleaned.push(widget.to_string());
        }
    }
    cleaned
}

/// Stored layout for the session; the defaults are stored on first visit.
pub fn get_widget_layout(session: &mut Session, key: &str) -> AdminResult<Vec<String>> {
    let stored: Option<Vec<String>> = session.get(key);
    let layout = match stored {
        Some(stored) if !stored.is_empty() => normalize_layout(&stored),
        _ => {
            let layout = default_layout();
            session.set(key, &layout)?;
            layout
        }
    };
    session.mark_modified();
    Ok(layout)
}

/// Normalize and persist a layout.
pub fn save_widget_layout<S: AsRef<str>>(
    session: &mut Session,
    key: &str,
    layout: &[S],
) -> AdminResult<Vec<String>> {
    let cleaned = normalize_layout(layout);
    session.set(key, &cleaned)?;
    Ok(cleaned)
}

/// Persist and return the default layout.
pub fn reset_widget_layout(session: &mut Session, key: &str) -> AdminResult<Vec<String>> {
    save_widget_layout(session, key, DEFAULT_WIDGETS)
}

/// Response of the layout AJAX endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LayoutResponse {
    Ok { layout: Vec<String> },
    Noop,
}

/// Handle a dashboard layout POST body.
///
/// Malformed JSON is treated as an empty payload. `{"action": "reset"}`
/// restores the defaults, `{"widget_order": [...]}` stores a new order and
/// anything else is a no-op.
pub fn handle_layout_request(
    session: &mut Session,
    key: &str,
    body: &[u8],
) -> AdminResult<LayoutResponse> {
    let payload: serde_json::Value = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(body).unwrap_or_else(|e| {
            debug!("Ignoring malformed layout payload: {}", e);
            serde_json::Value::Null
        })
    };

    if payload.get("action").and_then(|a| a.as_str()) == Some("reset") {
        let layout = reset_widget_layout(session, key)?;
        return Ok(LayoutResponse::Ok { layout });
    }

    if let Some(order) = payload.get("widget_order") {
        let requested: Vec<&str> = order
            .as_array()
            .map(|items| items.iter().filter_map(|item| item.as_str()).collect())
            .unwrap_or_default();
        let layout = save_widget_layout(session, key, &requested)?;
        return Ok(LayoutResponse::Ok { layout });
    }

    Ok(LayoutResponse::Noop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const KEY: &str = "flowbite_admin_widget_layout";

    fn session() -> Session {
        Session::new("test", Duration::from_secs(60))
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_layout(&["top-models", "kpi-cards"]);
        assert_eq!(
            once,
            vec!["top-models", "kpi-cards", "activity-chart", "app-list", "recent-actions"]
        );
        assert_eq!(normalize_layout(&once), once);
    }

    #[test]
    fn test_normalize_drops_unknown_and_duplicates() {
        let layout = normalize_layout(&["weather", "app-list", "app-list"]);
        assert_eq!(
            layout,
            vec!["app-list", "kpi-cards", "activity-chart", "top-models", "recent-actions"]
        );
    }

    #[test]
    fn test_first_visit_stores_defaults() {
        let mut session = session();
        let layout = get_widget_layout(&mut session, KEY).unwrap();
        assert_eq!(layout, default_layout());
        assert_eq!(session.get::<Vec<String>>(KEY), Some(default_layout()));
    }

    #[test]
    fn test_empty_stored_layout_is_replaced() {
        let mut session = session();
        session.set(KEY, Vec::<String>::new()).unwrap();
        assert_eq!(get_widget_layout(&mut session, KEY).unwrap(), default_layout());
    }

    #[test]
    fn test_ajax_protocol() {
        let mut session = session();

        let saved = handle_layout_request(
            &mut session,
            KEY,
            br#"{"widget_order": ["recent-actions", "bogus"]}"#,
        )
        .unwrap();
        match saved {
            LayoutResponse::Ok { layout } => assert_eq!(layout[0], "recent-actions"),
            LayoutResponse::Noop => panic!("expected ok"),
        }
        assert_eq!(get_widget_layout(&mut session, KEY).unwrap()[0], "recent-actions");

        let reset = handle_layout_request(&mut session, KEY, br#"{"action": "reset"}"#).unwrap();
        assert_eq!(reset, LayoutResponse::Ok { layout: default_layout() });

        assert_eq!(
            handle_layout_request(&mut session, KEY, b"{not json").unwrap(),
            LayoutResponse::Noop
        );
        assert_eq!(
            handle_layout_request(&mut session, KEY, br#"{"action": "shuffle"}"#).unwrap(),
            LayoutResponse::Noop
        );
    }

    #[test]
    fn test_response_shape() {
        let ok = serde_json::to_value(LayoutResponse::Ok { layout: vec!["app-list".into()] }).unwrap();
        assert_eq!(ok, serde_json::json!({"status": "ok", "layout": ["app-list"]}));
        let noop = serde_json::to_value(LayoutResponse::Noop).unwrap();
        assert_eq!(noop, serde_json::json!({"status": "noop"}));
    }
}
