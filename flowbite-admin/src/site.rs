//! Admin site
//!
//! [`Admin`] collects configuration, models and collaborators once at startup
//! and builds an [`AdminSite`]. The site answers dashboard (including the
//! widget layout AJAX endpoint), change-list and settings requests, and
//! builds the navigation context shared by every page.

use crate::actions::{AdminUser, CapabilityOracle, ModelPermissions};
use crate::changelist::AdvancedChangeList;
use crate::config::{AdminConfig, Theme};
use crate::dashboard::{
    ChartConfig, DashboardSource, KpiCard, LogEntry, ModelStat, activity_chart, kpi_cards,
    recent_actions, timesince, top_models,
};
use crate::error::{AdminError, AdminResult};
use crate::layout::{LayoutResponse, get_widget_layout, handle_layout_request};
use crate::model::ModelDefinition;
use crate::query::{ERROR_FLAG, QueryParams};
use crate::registry::ModelRegistry;
use crate::routes::{MODEL_VIEWS, UrlRegistry, quote};
use crate::session::{MemorySessionStore, SessionStore};
use crate::store::{QueryBackend, Row};
use crate::views::{ChangeListView, UserSettingsView};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flowbite_log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Admin site builder
pub struct Admin {
    config: AdminConfig,
    registry: ModelRegistry,
    backend: Option<Arc<dyn QueryBackend>>,
    source: Option<Arc<dyn DashboardSource>>,
    sessions: Option<Arc<dyn SessionStore>>,
    oracle: Option<Arc<dyn CapabilityOracle>>,
}

impl Admin {
    /// Create a new admin builder
    pub fn new() -> Self {
        Self {
            config: AdminConfig::default(),
            registry: ModelRegistry::new(),
            backend: None,
            source: None,
            sessions: None,
            oracle: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: AdminConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the admin title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    /// Set the base URL path
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.config.base_path = path.into();
        self
    }

    /// Set the theme
    pub fn theme(mut self, theme: Theme) -> Self {
        self.config.theme = theme;
        self
    }

    /// Set items per page
    pub fn items_per_page(mut self, count: usize) -> Self {
        self.config.items_per_page = count;
        self
    }

    /// Register a model with the admin
    pub fn register_model(mut self, model: ModelDefinition) -> Self {
        self.registry.register(model);
        self
    }

    /// Query layer for change lists and table counts
    pub fn backend(mut self, backend: impl QueryBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Account and admin-log statistics
    pub fn dashboard_source(mut self, source: impl DashboardSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Session storage (in-process by default)
    pub fn session_store(mut self, store: impl SessionStore + 'static) -> Self {
        self.sessions = Some(Arc::new(store));
        self
    }

    /// Capability checks (model permissions by default)
    pub fn capability_oracle(mut self, oracle: impl CapabilityOracle + 'static) -> Self {
        self.oracle = Some(Arc::new(oracle));
        self
    }

    /// Validate the configuration and build the site.
    pub fn build(self) -> AdminResult<AdminSite> {
        let config = self.config.validated()?;
        let backend = self
            .backend
            .ok_or_else(|| AdminError::Config("no query backend configured".to_string()))?;
        let source = self
            .source
            .ok_or_else(|| AdminError::Config("no dashboard source configured".to_string()))?;

        let routes = UrlRegistry::for_site(&config, self.registry.all());
        info!(
            "Admin site '{}' mounted at {} with {} model(s)",
            config.site_name,
            config.base_path,
            self.registry.count()
        );

        Ok(AdminSite {
            config: Arc::new(config),
            registry: Arc::new(self.registry),
            routes: Arc::new(routes),
            backend,
            source,
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>),
            oracle: self
                .oracle
                .unwrap_or_else(|| Arc::new(ModelPermissions) as Arc<dyn CapabilityOracle>),
        })
    }
}

impl Default for Admin {
    fn default() -> Self {
        Self::new()
    }
}

/// Incoming request as seen by the site
#[derive(Debug, Clone, Default)]
pub struct AdminRequest {
    pub method: String,
    /// Path without the query string
    pub path: String,
    pub query: QueryParams,
    /// Lower-cased header names
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub user: Option<AdminUser>,
    pub session_id: Option<String>,
}

impl AdminRequest {
    /// GET request; `target` may carry a query string.
    pub fn get(target: &str) -> AdminResult<Self> {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Ok(Self {
            method: "GET".to_string(),
            path: path.to_string(),
            query: QueryParams::parse(query)?,
            ..Self::default()
        })
    }

    /// POST request with a body
    pub fn post(path: &str, body: impl Into<Bytes>) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.to_string(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn user(mut self, user: AdminUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn session(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// `X-Requested-With: XMLHttpRequest`
    pub fn is_ajax(&self) -> bool {
        self.get_header("x-requested-with") == Some("XMLHttpRequest")
    }

    fn staff_user(&self) -> AdminResult<&AdminUser> {
        self.user
            .as_ref()
            .filter(|user| user.is_active && user.is_staff)
            .ok_or_else(|| AdminError::PermissionDenied("staff login required".to_string()))
    }
}

/// Top-bar notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub message: String,
    pub url: Option<String>,
    /// `%m/%d/%Y %H:%M`
    pub timestamp: String,
    /// `2 hours, 5 minutes`
    pub relative: String,
    pub icon: String,
    /// Badge colour of the action kind
    pub color: String,
}

/// Context shared by every admin page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteContext {
    pub site_title: String,
    pub site_header: String,
    pub index_url: Option<String>,
    pub theme_css: String,
    pub html_class: Option<String>,
    pub topbar_notifications: Vec<Notification>,
    pub user_profile_url: Option<String>,
    pub available_apps: Vec<AppEntry>,
}

/// Sidebar entry for a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppModel {
    /// Capitalized plural name
    pub name: String,
    pub object_name: String,
    pub admin_url: Option<String>,
    pub add_url: Option<String>,
    pub icon: Option<String>,
    pub is_active_model: bool,
}

/// Sidebar entry for an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub app_label: String,
    pub app_url: Option<String>,
    pub models: Vec<AppModel>,
    pub is_active_app: bool,
}

/// Charts of the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardCharts {
    pub activity: ChartConfig,
}

/// Dashboard page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardContext {
    pub site: SiteContext,
    pub title: String,
    pub app_list: Vec<AppEntry>,
    pub kpi_cards: Vec<KpiCard>,
    pub chart_config: DashboardCharts,
    pub top_models: Vec<ModelStat>,
    pub recent_logs: Vec<LogEntry>,
    pub widget_layout: Vec<String>,
    pub can_manage_widgets: bool,
}

/// Body of a dashboard response
#[derive(Debug, Clone)]
pub enum IndexBody {
    /// JSON answer of the layout endpoint
    Layout(LayoutResponse),
    Dashboard(Box<DashboardContext>),
}

/// Dashboard response with the session the browser should keep
#[derive(Debug, Clone)]
pub struct IndexResponse {
    pub session_id: String,
    pub body: IndexBody,
}

/// Change list page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeListPage {
    pub site: SiteContext,
    pub view: ChangeListView,
}

/// Outcome of a change-list request
#[derive(Debug, Clone)]
pub enum ChangeListResponse {
    Page(Box<ChangeListPage>),
    /// Bad lookup parameters: reload with the error flag
    Redirect(String),
}

/// Account settings page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsPage {
    pub site: SiteContext,
    pub view: UserSettingsView,
}

/// Built admin site
#[derive(Clone)]
pub struct AdminSite {
    config: Arc<AdminConfig>,
    registry: Arc<ModelRegistry>,
    routes: Arc<UrlRegistry>,
    backend: Arc<dyn QueryBackend>,
    source: Arc<dyn DashboardSource>,
    sessions: Arc<dyn SessionStore>,
    oracle: Arc<dyn CapabilityOracle>,
}

impl AdminSite {
    /// Get the configuration
    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    /// Get the model registry
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn routes(&self) -> &UrlRegistry {
        &self.routes
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    fn url(&self, name: &str, args: &[&str]) -> Option<String> {
        self.routes
            .reverse(&format!("{}:{}", self.config.site_name, name), args)
            .ok()
    }

    /// Dashboard, or the layout AJAX endpoint for XHR POSTs.
    pub async fn index(&self, request: &AdminRequest) -> AdminResult<IndexResponse> {
        self.index_at(request, Utc::now()).await
    }

    /// [`Self::index`] with an explicit clock.
    pub async fn index_at(&self, request: &AdminRequest, now: DateTime<Utc>) -> AdminResult<IndexResponse> {
        let user = request.staff_user()?;
        let key = self.config.widget_session_key.as_str();
        let mut session = self
            .sessions
            .load_or_create(request.session_id.as_deref())
            .await?;

        if request.method.eq_ignore_ascii_case("POST") && request.is_ajax() {
            let response = handle_layout_request(&mut session, key, &request.body)?;
            if session.is_modified() {
                self.sessions.save(&session).await?;
            }
            return Ok(IndexResponse {
                session_id: session.id,
                body: IndexBody::Layout(response),
            });
        }

        let widget_layout = get_widget_layout(&mut session, key)?;
        self.sessions.save(&session).await?;

        let activity = activity_chart(self.source.as_ref(), now.date_naive()).unwrap_or_else(|e| {
            warn!("Activity chart unavailable: {}", e);
            ChartConfig {
                labels: Vec::new(),
                datasets: Vec::new(),
            }
        });
        let recent_logs = recent_actions(self.source.as_ref(), user.id, self.config.recent_actions_limit)
            .unwrap_or_else(|e| {
                warn!("Recent actions unavailable: {}", e);
                Vec::new()
            });

        let context = DashboardContext {
            site: self.each_context_at(request, now),
            title: self.config.index_title.clone(),
            app_list: self.get_app_list(request, None),
            kpi_cards: kpi_cards(self.source.as_ref(), now),
            chart_config: DashboardCharts { activity },
            top_models: top_models(
                &self.registry,
                self.backend.as_ref(),
                &self.routes,
                &self.config.site_name,
                self.config.top_models_limit,
            ),
            recent_logs,
            widget_layout,
            can_manage_widgets: user.is_superuser,
        };

        Ok(IndexResponse {
            session_id: session.id,
            body: IndexBody::Dashboard(Box::new(context)),
        })
    }

    /// Change list of one model.
    ///
    /// Bad lookup parameters redirect to `?e=1`; a request already carrying
    /// the flag fails instead of looping.
    pub fn changelist_view(
        &self,
        request: &AdminRequest,
        app_label: &str,
        model_name: &str,
    ) -> AdminResult<ChangeListResponse> {
        let user = request.staff_user()?;
        let model = self
            .registry
            .get(app_label, model_name)
            .ok_or_else(|| AdminError::ModelNotFound(format!("{}.{}", app_label, model_name)))?;

        if !self.can_view_model(user, model) {
            return Err(AdminError::PermissionDenied(format!("view {}", model.label())));
        }

        let cl = match AdvancedChangeList::new(model, &self.config, &request.query, self.backend.as_ref()) {
            Ok(cl) => cl,
            Err(AdminError::IncorrectLookupParameters(key)) => {
                if request.query.contains_key(ERROR_FLAG) {
                    return Err(AdminError::IncorrectLookupParameters(key));
                }
                return Ok(ChangeListResponse::Redirect(format!("{}?{}=1", request.path, ERROR_FLAG)));
            }
            Err(e) => return Err(e),
        };

        let view = ChangeListView::new(&cl, &self.routes, self.oracle.as_ref(), Some(user));
        Ok(ChangeListResponse::Page(Box::new(ChangeListPage {
            site: self.each_context(request),
            view,
        })))
    }

    /// Account settings page
    pub fn user_settings(&self, request: &AdminRequest) -> AdminResult<SettingsPage> {
        request.staff_user()?;
        Ok(SettingsPage {
            site: self.each_context(request),
            view: UserSettingsView::new(self.url("index", &[])),
        })
    }

    /// Context every page template receives
    pub fn each_context(&self, request: &AdminRequest) -> SiteContext {
        self.each_context_at(request, Utc::now())
    }

    fn each_context_at(&self, request: &AdminRequest, now: DateTime<Utc>) -> SiteContext {
        SiteContext {
            site_title: self.config.title.clone(),
            site_header: self.config.site_header.clone(),
            index_url: self.url("index", &[]),
            theme_css: self.config.theme.to_css_variables(),
            html_class: self.config.theme.html_class().map(str::to_string),
            topbar_notifications: self.topbar_notifications(request, now),
            user_profile_url: self.user_profile_url(request),
            available_apps: self.get_app_list(request, None),
        }
    }

    /// The user's latest log entries for the header dropdown
    pub fn topbar_notifications(&self, request: &AdminRequest, now: DateTime<Utc>) -> Vec<Notification> {
        let Some(user) = request.user.as_ref().filter(|u| u.is_active) else {
            return Vec::new();
        };

        let entries = recent_actions(self.source.as_ref(), user.id, self.config.notifications_limit)
            .unwrap_or_else(|e| {
                warn!("Notifications unavailable: {}", e);
                Vec::new()
            });

        entries
            .into_iter()
            .map(|entry| Notification {
                id: entry.id,
                message: entry.get_change_message(),
                url: entry.get_admin_url(&self.routes, &self.config.site_name),
                timestamp: entry.action_time.format("%m/%d/%Y %H:%M").to_string(),
                relative: timesince(entry.action_time, now),
                icon: entry.action_flag.icon().to_string(),
                color: entry.action_flag.color().to_string(),
            })
            .collect()
    }

    /// Change page of the current user in the configured user model
    pub fn user_profile_url(&self, request: &AdminRequest) -> Option<String> {
        let user = request.user.as_ref().filter(|u| u.is_active)?;
        let name = format!(
            "{}_{}_change",
            self.config.user_model.app_label, self.config.user_model.model_name
        );
        let id = quote(&user.id.to_string());
        self.url(&name, &[id.as_str()])
    }

    fn can_view_model(&self, user: &AdminUser, model: &ModelDefinition) -> bool {
        self.oracle.can_view(user, model, &Row::new())
    }

    fn can_add_model(&self, user: &AdminUser, model: &ModelDefinition) -> bool {
        user.has_perm(&format!("{}.add_{}", model.app_label, model.model_name))
    }

    /// Active app label and `app_model` key for a path
    fn resolve_active_targets(&self, path: &str) -> (Option<String>, Option<String>) {
        let Some(matched) = self.routes.resolve(path) else {
            return (None, None);
        };
        if matched.namespace != self.config.site_name {
            return (None, None);
        }

        let mut app_label = matched.kwargs.get("app_label").cloned();
        let mut model_key = match (&app_label, matched.kwargs.get("model_name")) {
            (Some(app), Some(model)) => Some(format!("{}_{}", app, model)),
            _ => None,
        };

        if model_key.is_none() {
            let inferred = MODEL_VIEWS.iter().find_map(|view| {
                matched
                    .url_name
                    .strip_suffix(&format!("_{}", view))
                    .map(str::to_string)
            });
            if let Some(key) = inferred {
                let registered = self
                    .registry
                    .all()
                    .into_iter()
                    .find(|m| format!("{}_{}", m.app_label, m.model_name) == key);
                if let Some(model) = registered {
                    app_label = app_label.or_else(|| Some(model.app_label.clone()));
                    model_key = Some(key);
                }
            }
        }

        (app_label, model_key)
    }

    /// Apps and models the user may see, with active markers for the current path.
    pub fn get_app_list(&self, request: &AdminRequest, only_app: Option<&str>) -> Vec<AppEntry> {
        let Some(user) = request.user.as_ref() else {
            return Vec::new();
        };
        let (active_app, active_model) = self.resolve_active_targets(&request.path);

        let mut apps = Vec::new();
        for (app_label, models) in self.registry.by_app() {
            if only_app.is_some_and(|only| only != app_label) {
                continue;
            }

            let mut entries: Vec<AppModel> = models
                .into_iter()
                .filter(|model| self.can_view_model(user, model) || self.can_add_model(user, model))
                .map(|model| {
                    let key = format!("{}_{}", model.app_label, model.model_name);
                    AppModel {
                        name: model.verbose_name_plural_capitalized(),
                        object_name: model.model_name.clone(),
                        admin_url: self
                            .can_view_model(user, model)
                            .then(|| self.url(&format!("{}_changelist", key), &[]))
                            .flatten(),
                        add_url: self
                            .can_add_model(user, model)
                            .then(|| self.url(&format!("{}_add", key), &[]))
                            .flatten(),
                        icon: model.icon.clone(),
                        is_active_model: active_model.as_deref() == Some(key.as_str()),
                    }
                })
                .collect();
            if entries.is_empty() {
                continue;
            }
            entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

            let is_active_app = active_app.as_deref() == Some(app_label)
                || entries.iter().any(|m| m.is_active_model);
            apps.push(AppEntry {
                name: crate::field::title_case(&app_label.replace('_', " ")),
                app_label: app_label.to_string(),
                app_url: self.url("app_list", &[app_label]),
                models: entries,
                is_active_app,
            });
        }
        apps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::ActionFlag;
    use crate::field::{FieldDescriptor, FieldType};
    use crate::memory::{MemoryActivity, MemoryBackend, UserRecord};
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, min, 0).unwrap()
    }

    fn book() -> ModelDefinition {
        ModelDefinition::builder("library", "book")
            .id_field()
            .field(FieldDescriptor::new("title", FieldType::String))
            .field(FieldDescriptor::new("published", FieldType::Date))
            .build()
    }

    fn user_model() -> ModelDefinition {
        ModelDefinition::builder("auth", "user")
            .id_field()
            .field(FieldDescriptor::new("username", FieldType::String))
            .build()
    }

    fn site() -> AdminSite {
        let backend = MemoryBackend::new();
        backend
            .insert("library.book", json!({"id": 1, "title": "Dune", "published": "2024-02-01"}))
            .unwrap();
        backend
            .insert("auth.user", json!({"id": 1, "username": "root"}))
            .unwrap();

        let activity = MemoryActivity::new();
        activity.add_user(UserRecord::new(1, "root").staff());
        activity.log(LogEntry {
            id: 1,
            action_time: at(10, 0),
            user_id: 1,
            app_label: Some("library".into()),
            model_name: Some("book".into()),
            object_id: Some("1".into()),
            object_repr: "Dune".into(),
            action_flag: ActionFlag::Addition,
            change_message: r#"[{"added": {}}]"#.into(),
        });

        Admin::new()
            .register_model(book())
            .register_model(user_model())
            .backend(backend)
            .dashboard_source(activity)
            .build()
            .unwrap()
    }

    fn root() -> AdminUser {
        AdminUser::new(1, "root").superuser()
    }

    #[test]
    fn test_build_requires_collaborators() {
        assert!(matches!(Admin::new().build(), Err(AdminError::Config(_))));
        let invalid = Admin::new()
            .items_per_page(0)
            .backend(MemoryBackend::new())
            .dashboard_source(MemoryActivity::new())
            .build();
        assert!(matches!(invalid, Err(AdminError::Config(_))));
    }

    #[test]
    fn test_app_list_marks_active_model() {
        let site = site();
        let request = AdminRequest::get("/admin/library/book/1/change/").unwrap().user(root());
        let apps = site.get_app_list(&request, None);

        assert_eq!(apps.iter().map(|a| a.app_label.as_str()).collect::<Vec<_>>(), vec!["auth", "library"]);
        let library = &apps[1];
        assert!(library.is_active_app);
        assert!(library.models[0].is_active_model);
        assert_eq!(library.models[0].admin_url.as_deref(), Some("/admin/library/book/"));
        assert!(!apps[0].is_active_app);

        let app_page = AdminRequest::get("/admin/library/").unwrap().user(root());
        let apps = site.get_app_list(&app_page, Some("library"));
        assert_eq!(apps.len(), 1);
        assert!(apps[0].is_active_app);
        assert!(!apps[0].models[0].is_active_model);
    }

    #[test]
    fn test_app_list_respects_permissions() {
        let site = site();
        let model = book();
        let reader = AdminUser::new(2, "reader").with_model_permissions(&model, &["view"]);
        let apps = site.get_app_list(&AdminRequest::get("/admin/").unwrap().user(reader), None);

        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].models[0].add_url, None);
        assert!(site.get_app_list(&AdminRequest::get("/admin/").unwrap(), None).is_empty());
    }

    #[test]
    fn test_notifications_and_profile() {
        let site = site();
        let request = AdminRequest::get("/admin/").unwrap().user(root());
        let notifications = site.topbar_notifications(&request, at(12, 5));

        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, "Added.");
        assert_eq!(notifications[0].timestamp, "03/10/2024 10:00");
        assert_eq!(notifications[0].relative, "2 hours, 5 minutes");
        assert_eq!(notifications[0].icon, "plus-circle");
        assert_eq!(notifications[0].color, "success");
        assert_eq!(notifications[0].url.as_deref(), Some("/admin/library/book/1/change/"));
        assert_eq!(site.user_profile_url(&request).as_deref(), Some("/admin/auth/user/1/change/"));

        let anonymous = AdminRequest::get("/admin/").unwrap();
        assert!(site.topbar_notifications(&anonymous, at(12, 5)).is_empty());
        assert_eq!(site.user_profile_url(&anonymous), None);
    }

    #[test]
    fn test_changelist_redirects_on_bad_lookup() {
        let site = site();
        let request = AdminRequest::get("/admin/library/book/?isbn=1").unwrap().user(root());
        match site.changelist_view(&request, "library", "book").unwrap() {
            ChangeListResponse::Redirect(url) => assert_eq!(url, "/admin/library/book/?e=1"),
            ChangeListResponse::Page(_) => panic!("expected redirect"),
        }

        let flagged = AdminRequest::get("/admin/library/book/?isbn=1&e=1").unwrap().user(root());
        assert!(site.changelist_view(&flagged, "library", "book").is_err());
    }

    #[test]
    fn test_changelist_access() {
        let site = site();
        let anonymous = AdminRequest::get("/admin/library/book/").unwrap();
        assert!(matches!(
            site.changelist_view(&anonymous, "library", "book"),
            Err(AdminError::PermissionDenied(_))
        ));

        let request = AdminRequest::get("/admin/library/book/").unwrap().user(root());
        assert!(matches!(
            site.changelist_view(&request, "library", "missing"),
            Err(AdminError::ModelNotFound(_))
        ));
        match site.changelist_view(&request, "library", "book").unwrap() {
            ChangeListResponse::Page(page) => {
                assert_eq!(page.view.rows.len(), 1);
                assert_eq!(page.site.site_title, "Flowbite Admin");
            }
            ChangeListResponse::Redirect(url) => panic!("unexpected redirect to {}", url),
        }
    }

    #[test]
    fn test_user_settings() {
        let site = site();
        let page = site
            .user_settings(&AdminRequest::get("/admin/settings/").unwrap().user(root()))
            .unwrap();
        assert_eq!(page.view.title, "Account settings");
        assert_eq!(page.view.breadcrumbs[0].url.as_deref(), Some("/admin/"));
    }

    #[test]
    fn test_request_helpers() {
        let request = AdminRequest::post("/admin/", "{}").header("X-Requested-With", "XMLHttpRequest");
        assert!(request.is_ajax());
        assert_eq!(request.get_header("x-requested-with"), Some("XMLHttpRequest"));
        assert!(!AdminRequest::post("/admin/", "{}").is_ajax());

        let request = AdminRequest::get("/admin/library/book/?q=dune&o=1").unwrap();
        assert_eq!(request.path, "/admin/library/book/");
        assert_eq!(request.query.get("q"), Some("dune"));
    }

    #[tokio::test]
    async fn test_index_context() {
        let site = site();
        let request = AdminRequest::get("/admin/").unwrap().user(root());
        let response = site.index_at(&request, at(12, 0)).await.unwrap();

        let IndexBody::Dashboard(context) = response.body else {
            panic!("expected dashboard");
        };
        assert!(context.can_manage_widgets);
        assert_eq!(context.title, "Dashboard");
        assert_eq!(context.widget_layout, crate::layout::default_layout());
        assert_eq!(context.chart_config.activity.labels.len(), 7);
        assert_eq!(context.top_models.len(), 2);
        assert_eq!(context.recent_logs.len(), 1);
        assert_eq!(context.kpi_cards[0].id, "total-users");
        assert!(site.sessions().exists(&response.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_index_layout_ajax() {
        let site = site();
        let request = AdminRequest::post("/admin/", r#"{"widget_order": ["recent-actions"]}"#)
            .header("X-Requested-With", "XMLHttpRequest")
            .user(root());
        let response = site.index(&request).await.unwrap();
        let IndexBody::Layout(LayoutResponse::Ok { layout }) = response.body else {
            panic!("expected layout response");
        };
        assert_eq!(layout[0], "recent-actions");

        let follow_up = AdminRequest::get("/admin/").unwrap().user(root()).session(response.session_id);
        let IndexBody::Dashboard(context) = site.index(&follow_up).await.unwrap().body else {
            panic!("expected dashboard");
        };
        assert_eq!(context.widget_layout[0], "recent-actions");

        let denied = AdminRequest::post("/admin/", "{}").header("X-Requested-With", "XMLHttpRequest");
        assert!(matches!(site.index(&denied).await, Err(AdminError::PermissionDenied(_))));
    }
}
