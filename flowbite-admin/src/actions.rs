//! Per-row actions of the change list
//!
//! Capabilities come from an explicit [`CapabilityOracle`]; URLs come from the
//! route table. An action whose route cannot be reversed is left out.

use crate::model::ModelDefinition;
use crate::routes::{UrlRegistry, add_preserved_filters, quote};
use crate::store::{Row, display_value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Authenticated admin user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// `app_label.codename` strings (`library.change_book`)
    pub permissions: HashSet<String>,
}

impl AdminUser {
    /// Active staff account without permissions
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_active: true,
            is_staff: true,
            is_superuser: false,
            permissions: HashSet::new(),
        }
    }

    /// Grant every permission
    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    /// Grant one permission
    pub fn with_permission(mut self, perm: impl Into<String>) -> Self {
        self.permissions.insert(perm.into());
        self
    }

    /// Grant view/change/delete on a model
    pub fn with_model_permissions(self, model: &ModelDefinition, actions: &[&str]) -> Self {
        actions.iter().fold(self, |user, action| {
            user.with_permission(format!("{}.{}_{}", model.app_label, action, model.model_name))
        })
    }

    pub fn has_perm(&self, perm: &str) -> bool {
        self.is_active && (self.is_superuser || self.permissions.contains(perm))
    }
}

/// Capability checks for one actor against one object
pub trait CapabilityOracle: Send + Sync {
    fn can_view(&self, actor: &AdminUser, model: &ModelDefinition, row: &Row) -> bool;
    fn can_change(&self, actor: &AdminUser, model: &ModelDefinition, row: &Row) -> bool;
    fn can_delete(&self, actor: &AdminUser, model: &ModelDefinition, row: &Row) -> bool;
}

/// Model-level permissions taken from the user's permission set
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelPermissions;

fn perm(model: &ModelDefinition, action: &str) -> String {
    format!("{}.{}_{}", model.app_label, action, model.model_name)
}

impl CapabilityOracle for ModelPermissions {
    fn can_view(&self, actor: &AdminUser, model: &ModelDefinition, _row: &Row) -> bool {
        // change implies view
        actor.has_perm(&perm(model, "view")) || actor.has_perm(&perm(model, "change"))
    }

    fn can_change(&self, actor: &AdminUser, model: &ModelDefinition, _row: &Row) -> bool {
        actor.has_perm(&perm(model, "change"))
    }

    fn can_delete(&self, actor: &AdminUser, model: &ModelDefinition, _row: &Row) -> bool {
        actor.has_perm(&perm(model, "delete"))
    }
}

/// One entry of a row's action menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowAction {
    /// `view`, `edit` or `delete`
    pub key: String,
    pub label: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub danger: bool,
}

impl RowAction {
    fn new(key: &str, label: &str, url: String) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            url,
            external: false,
            target: None,
            rel: None,
            danger: false,
        }
    }

    fn external(mut self) -> Self {
        self.external = true;
        self.target = Some("_blank".to_string());
        self.rel = Some("noreferrer noopener".to_string());
        self
    }

    fn danger(mut self) -> Self {
        self.danger = true;
        self
    }
}

/// Everything the decorator needs besides the row
pub struct ActionContext<'a> {
    pub model: &'a ModelDefinition,
    pub routes: &'a UrlRegistry,
    pub site_name: &'a str,
    pub oracle: &'a dyn CapabilityOracle,
    pub actor: Option<&'a AdminUser>,
    /// Current change-list query, carried as `_changelist_filters`
    pub preserved_filters: &'a str,
}

impl ActionContext<'_> {
    fn model_url(&self, view: &str, pk: &str) -> Option<String> {
        if pk.is_empty() {
            return None;
        }
        let name = format!(
            "{}:{}_{}_{}",
            self.site_name, self.model.app_label, self.model.model_name, view
        );
        let quoted = quote(pk);
        self.routes
            .reverse(&name, &[quoted.as_str()])
            .ok()
            .map(|url| add_preserved_filters(&url, self.preserved_filters))
    }

    /// Change URL of a row (with preserved filters)
    pub fn change_url(&self, row: &Row) -> Option<String> {
        self.model_url("change", &pk_value(self.model, row))
    }
}

/// Primary key of a row as text
pub fn pk_value(model: &ModelDefinition, row: &Row) -> String {
    row.get(&model.primary_key)
        .map(display_value)
        .unwrap_or_default()
}

/// Ordered view/edit/delete actions for a row.
///
/// "view" only appears when it adds something: an external page, or a
/// read-only viewer for whom "edit" is not offered.
pub fn row_actions(ctx: &ActionContext<'_>, row: &Row) -> Vec<RowAction> {
    let Some(actor) = ctx.actor else {
        return Vec::new();
    };
    let pk = pk_value(ctx.model, row);
    let change_url = ctx.model_url("change", &pk);
    let can_view = ctx.oracle.can_view(actor, ctx.model, row);
    let can_change = ctx.oracle.can_change(actor, ctx.model, row);

    let mut actions = Vec::new();

    if can_view {
        let view_on_site = if pk.is_empty() {
            None
        } else {
            ctx.model.view_on_site_url(&pk)
        };
        let external = view_on_site.is_some();
        if let Some(url) = view_on_site.or_else(|| change_url.clone()) {
            if external || !can_change {
                let action = RowAction::new("view", "View", url);
                actions.push(if external { action.external() } else { action });
            }
        }
    }

    if can_change {
        if let Some(url) = change_url {
            actions.push(RowAction::new("edit", "Edit", url));
        }
    }

    if ctx.oracle.can_delete(actor, ctx.model, row) {
        if let Some(url) = ctx.model_url("delete", &pk) {
            actions.push(RowAction::new("delete", "Delete", url).danger());
        }
    }

    actions
}
