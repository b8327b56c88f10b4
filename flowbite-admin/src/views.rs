//! Page contexts handed to the templates

use crate::actions::{AdminUser, CapabilityOracle};
use crate::changelist::{AdvancedChangeList, ResultRow};
use crate::forms::FilterInput;
use crate::model::ModelDefinition;
use crate::routes::UrlRegistry;
use crate::ui::{Breadcrumb, PageNumber, Pagination, TableColumn};
use serde::{Deserialize, Serialize};

/// Pages shown either side of the current one
const PAGES_ON_EACH_SIDE: usize = 3;

/// Advanced filter panel of the change list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedFilterPanel {
    /// Query-string prefix of the inputs
    pub prefix: String,
    /// One control per (field, operator)
    pub inputs: Vec<FilterInput>,
    /// Any submitted value was rejected
    pub has_errors: bool,
    /// At least one advanced lookup is applied
    pub is_active: bool,
    /// Hidden inputs carrying the rest of the query
    pub preserved_params: Vec<(String, String)>,
    /// Link that drops the advanced filters
    pub reset_query: String,
}

/// Pagination entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// `None` for an ellipsis
    pub number: Option<usize>,
    pub url: Option<String>,
    pub is_current: bool,
}

/// Change list page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeListView {
    /// Page title
    pub title: String,
    pub app_label: String,
    pub model_name: String,
    pub verbose_name_plural: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<ResultRow>,
    pub pagination: Pagination,
    pub page_links: Vec<PageLink>,
    pub show_all_url: Option<String>,
    pub result_count: usize,
    pub full_result_count: usize,
    /// Current search query
    pub search_query: String,
    pub has_search: bool,
    pub search_placeholder: String,
    pub has_filters: bool,
    pub clear_all_filters_query: String,
    pub advanced_filter: AdvancedFilterPanel,
    /// Add URL, when the user may add
    pub add_url: Option<String>,
    pub is_popup: bool,
}

impl ChangeListView {
    /// Build the page from an evaluated change list
    pub fn new(
        cl: &AdvancedChangeList<'_>,
        routes: &UrlRegistry,
        oracle: &dyn CapabilityOracle,
        actor: Option<&AdminUser>,
    ) -> Self {
        let model = cl.base.model;
        let site_name = cl.base.config().site_name.as_str();
        let pagination = cl.base.pagination();

        let page_links = if cl.base.multi_page && !cl.base.show_all {
            pagination
                .page_numbers(PAGES_ON_EACH_SIDE)
                .into_iter()
                .map(|page| match page {
                    PageNumber::Page(n) => PageLink {
                        number: Some(n),
                        url: Some(cl.base.page_url(n)),
                        is_current: n == pagination.page,
                    },
                    PageNumber::Ellipsis => PageLink {
                        number: None,
                        url: None,
                        is_current: false,
                    },
                })
                .collect()
        } else {
            Vec::new()
        };

        let add_perm = format!("{}.add_{}", model.app_label, model.model_name);
        let add_url = actor
            .filter(|user| user.has_perm(&add_perm))
            .and_then(|_| {
                routes
                    .reverse(&format!("{}:{}_{}_add", site_name, model.app_label, model.model_name), &[])
                    .ok()
            });

        let search_fields: Vec<&str> = model
            .searchable_fields()
            .iter()
            .map(|f| f.label.as_str())
            .collect();

        Self {
            title: format!("Select {} to change", model.verbose_name),
            app_label: model.app_label.clone(),
            model_name: model.model_name.clone(),
            verbose_name_plural: model.verbose_name_plural_capitalized(),
            breadcrumbs: model_breadcrumbs(model, routes, site_name),
            columns: cl.base.result_headers(),
            rows: cl.get_result_rows(routes, oracle, actor),
            page_links,
            show_all_url: cl.base.show_all_url(),
            result_count: cl.base.result_count,
            full_result_count: cl.base.full_result_count,
            search_query: cl.base.query.clone(),
            has_search: !search_fields.is_empty(),
            search_placeholder: format!("Search {}...", search_fields.join(", ").to_lowercase()),
            has_filters: cl.has_filters(),
            clear_all_filters_query: cl.clear_all_filters_query(),
            advanced_filter: AdvancedFilterPanel {
                prefix: cl.form.prefix().to_string(),
                inputs: cl.form.inputs().to_vec(),
                has_errors: cl.form.is_bound() && !cl.form.is_valid(),
                is_active: cl.has_active_advanced_filters(),
                preserved_params: cl.advanced_filter_preserved_params(),
                reset_query: cl.advanced_filter_reset_query(),
            },
            add_url,
            is_popup: cl.base.is_popup,
            pagination,
        }
    }
}

fn model_breadcrumbs(model: &ModelDefinition, routes: &UrlRegistry, site_name: &str) -> Vec<Breadcrumb> {
    let mut home = Breadcrumb::new("Dashboard");
    if let Ok(url) = routes.reverse(&format!("{}:index", site_name), &[]) {
        home = home.url(url);
    }
    let mut app = Breadcrumb::new(crate::field::title_case(&model.app_label.replace('_', " ")));
    if let Ok(url) = routes.reverse(&format!("{}:app_list", site_name), &[model.app_label.as_str()]) {
        app = app.url(url);
    }
    vec![home, app, Breadcrumb::new(model.verbose_name_plural_capitalized())]
}

/// Account settings page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettingsView {
    pub title: String,
    pub settings_description: String,
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl UserSettingsView {
    pub fn new(index_url: Option<String>) -> Self {
        let mut home = Breadcrumb::new("Dashboard");
        if let Some(url) = index_url {
            home = home.url(url);
        }
        Self {
            title: "Account settings".to_string(),
            settings_description: "Adjust admin preferences, shortcuts, and personal details to tailor the dashboard to your workflow.".to_string(),
            breadcrumbs: vec![home, Breadcrumb::new("Account settings")],
        }
    }
}
