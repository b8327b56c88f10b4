//! Change-list pipeline
//!
//! [`ChangeList`] is the host list machinery: reserved query keys, standard
//! (sidebar) filters, search, ordering and pagination. [`AdvancedChangeList`]
//! binds the advanced filter form to the same request, merges its lookups
//! into the filter set and rewrites query-string construction so that reset,
//! pagination and clear links stay consistent with both kinds of filter.

use crate::actions::{ActionContext, AdminUser, CapabilityOracle, RowAction, pk_value, row_actions};
use crate::config::AdminConfig;
use crate::error::{AdminError, AdminResult};
use crate::field::FieldCategory;
use crate::forms::{AdvancedFilterForm, FilterValue};
use crate::lookup::{AdvancedLookup, LOOKUP_SEP, normalize_lookup};
use crate::model::{ModelDefinition, OrderingField, column_label};
use crate::query::{ALL_VAR, ERROR_FLAG, IS_POPUP_VAR, ORDER_VAR, PAGE_VAR, QueryParams, SEARCH_VAR, TO_FIELD_VAR, is_reserved};
use crate::routes::{UrlRegistry, quote};
use crate::store::{FilterClause, QueryBackend, Row, RowQuery, SUPPORTED_LOOKUPS, SearchClause};
use crate::ui::{CellType, Pagination, SortDirection, TableCell, TableColumn, render_value};
use flowbite_log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Standard change list for one model and one request
#[derive(Debug, Clone)]
pub struct ChangeList<'a> {
    pub model: &'a ModelDefinition,
    config: &'a AdminConfig,
    /// Parameters carried into generated query strings (request minus `p`, `e`)
    params: BTreeMap<String, Vec<String>>,
    /// Search box value
    pub query: String,
    /// Current page, 1-based
    pub page_num: usize,
    pub show_all: bool,
    pub is_popup: bool,
    pub to_field: Option<String>,
    /// Effective ordering handed to the backend
    pub ordering: Vec<OrderingField>,
    /// Sorted columns: `list_display` index and direction, by priority
    ordering_columns: Vec<(usize, SortDirection)>,
    pub result_list: Vec<Row>,
    /// Rows matching filters and search
    pub result_count: usize,
    /// Rows in the table
    pub full_result_count: usize,
    pub can_show_all: bool,
    pub multi_page: bool,
    /// Current request, urlencoded, for `_changelist_filters`
    pub preserved_filters: String,
}

impl<'a> ChangeList<'a> {
    /// Read the reserved keys of a request. No query runs until [`Self::run`].
    pub fn new(model: &'a ModelDefinition, config: &'a AdminConfig, request: &QueryParams) -> Self {
        let page_num = request
            .get(PAGE_VAR)
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in request.iter() {
            if key == PAGE_VAR || key == ERROR_FLAG {
                continue;
            }
            params.entry(key.to_string()).or_default().push(value.to_string());
        }

        let ordering_columns = ordering_columns(model, request.get(ORDER_VAR));
        let ordering = effective_ordering(model, &ordering_columns);

        Self {
            model,
            config,
            params,
            query: request.get(SEARCH_VAR).unwrap_or_default().to_string(),
            page_num,
            show_all: request.contains_key(ALL_VAR),
            is_popup: request.contains_key(IS_POPUP_VAR),
            to_field: request.get(TO_FIELD_VAR).map(str::to_string),
            ordering,
            ordering_columns,
            result_list: Vec::new(),
            result_count: 0,
            full_result_count: 0,
            can_show_all: false,
            multi_page: false,
            preserved_filters: request.urlencode(),
        }
    }

    /// Standard filter parameters: every carried, non-reserved key.
    ///
    /// Keys starting with `skip_prefix` are left out. A key naming an unknown
    /// field or an unsupported lookup is rejected.
    pub fn get_filters_params(
        &self,
        skip_prefix: Option<&str>,
    ) -> AdminResult<BTreeMap<String, Vec<FilterValue>>> {
        let mut filters = BTreeMap::new();
        for (key, values) in &self.params {
            if is_reserved(key) || skip_prefix.is_some_and(|prefix| key.starts_with(prefix)) {
                continue;
            }
            self.check_lookup(key)?;
            filters.insert(
                key.clone(),
                values.iter().map(|v| FilterValue::Text(v.clone())).collect(),
            );
        }
        Ok(filters)
    }

    fn check_lookup(&self, key: &str) -> AdminResult<()> {
        let incorrect = || AdminError::IncorrectLookupParameters(key.to_string());
        let mut segments: Vec<&str> = key.split(LOOKUP_SEP).collect();
        let field = segments.remove(0);
        let Some(field) = self.model.get_field(field) else {
            return Err(incorrect());
        };

        if segments.iter().any(|s| s.is_empty()) {
            return Err(incorrect());
        }

        // relation paths (`author__id__exact`) reach into the related model
        let relation = field.category() == FieldCategory::Relation;
        match segments.as_slice() {
            [] => Ok(()),
            [lookup] if SUPPORTED_LOOKUPS.contains(lookup) => Ok(()),
            [_] if relation => Ok(()),
            [_, .., lookup] if relation && SUPPORTED_LOOKUPS.contains(lookup) => Ok(()),
            _ => Err(incorrect()),
        }
    }

    /// Carry a parameter into generated query strings, replacing earlier values.
    pub fn carry(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), vec![value.to_string()]);
    }

    /// Parameters carried into generated query strings
    pub fn params(&self) -> &BTreeMap<String, Vec<String>> {
        &self.params
    }

    pub fn config(&self) -> &'a AdminConfig {
        self.config
    }

    pub fn per_page(&self) -> usize {
        self.config.items_per_page
    }

    /// Count and fetch the requested page.
    pub fn run(
        &mut self,
        backend: &dyn QueryBackend,
        filters: BTreeMap<String, Vec<FilterValue>>,
    ) -> AdminResult<()> {
        let search_fields: Vec<String> = self
            .model
            .searchable_fields()
            .iter()
            .map(|f| f.name.clone())
            .collect();

        let mut query = RowQuery {
            filters: filters
                .into_iter()
                .filter(|(_, values)| !values.is_empty())
                .map(|(lookup, values)| FilterClause::new(lookup, values))
                .collect(),
            search: SearchClause::new(&search_fields, &self.query),
            ordering: self.ordering.clone(),
            ..RowQuery::default()
        };

        self.full_result_count = backend.count(self.model, &RowQuery::new())?;
        self.result_count = backend.count(self.model, &query.for_count())?;

        let per_page = self.per_page();
        self.can_show_all = self.result_count <= self.config.max_show_all;
        self.multi_page = self.result_count > per_page;

        let last_page = self.result_count.div_ceil(per_page).max(1);
        if self.page_num > last_page {
            return Err(AdminError::IncorrectLookupParameters(format!(
                "page {} of {}",
                self.page_num, last_page
            )));
        }

        if !(self.show_all && self.can_show_all) {
            query.offset = (self.page_num - 1) * per_page;
            query.limit = Some(per_page);
        }

        self.result_list = backend.fetch(self.model, &query)?;
        Ok(())
    }

    /// Carried parameters with `remove` dropped and `new_params` applied.
    ///
    /// `None` values delete a key. Keys come out sorted, with a leading `?`.
    pub fn get_query_string(&self, new_params: &[(&str, Option<&str>)], remove: &[&str]) -> String {
        let mut params = self.params.clone();
        for key in remove {
            params.remove(*key);
        }
        for (key, value) in new_params {
            match value {
                Some(value) => {
                    params.insert(key.to_string(), vec![value.to_string()]);
                }
                None => {
                    params.remove(*key);
                }
            }
        }

        let pairs: Vec<(&str, &str)> = params
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())))
            .collect();
        format!("?{}", serde_urlencoded::to_string(pairs).unwrap_or_default())
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page_num, self.per_page(), self.result_count)
    }

    /// Link to a page (1-based)
    pub fn page_url(&self, page: usize) -> String {
        let page = page.to_string();
        self.get_query_string(&[(PAGE_VAR, Some(page.as_str())), (ALL_VAR, None)], &[])
    }

    /// "Show all" link, when the result set is small enough
    pub fn show_all_url(&self) -> Option<String> {
        (self.multi_page && self.can_show_all && !self.show_all)
            .then(|| self.get_query_string(&[(ALL_VAR, Some(""))], &[]))
    }

    /// Column headers with sort state and toggle links
    pub fn result_headers(&self) -> Vec<TableColumn> {
        self.model
            .list_display
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let sortable = self.model.get_field(name).is_some();
                let position = self.ordering_columns.iter().position(|(i, _)| *i == index);
                let direction = position.map(|p| self.ordering_columns[p].1);

                let sort_url = sortable.then(|| {
                    let next = direction.map_or(SortDirection::Asc, |d| d.toggle());
                    let mut order = vec![order_token(index, next)];
                    order.extend(
                        self.ordering_columns
                            .iter()
                            .filter(|(i, _)| *i != index)
                            .map(|(i, d)| order_token(*i, *d)),
                    );
                    let order = order.join(".");
                    self.get_query_string(&[(ORDER_VAR, Some(order.as_str()))], &[])
                });

                TableColumn {
                    field: name.clone(),
                    label: column_label(self.model, name),
                    sortable,
                    sort_direction: direction,
                    sort_priority: position.map(|p| p + 1),
                    sort_url,
                }
            })
            .collect()
    }

    /// Rendered cells of one row, in `list_display` order
    pub fn row_cells(&self, row: &Row) -> Vec<TableCell> {
        self.model
            .list_display
            .iter()
            .map(|name| {
                let field = self.model.get_field(name);
                let column = field.map_or(name.as_str(), |f| f.name.as_str());
                let value = row.get(column).cloned().unwrap_or(serde_json::Value::Null);
                TableCell {
                    field: name.clone(),
                    cell_type: field.map_or(CellType::Text, |f| CellType::for_field(f.field_type)),
                    rendered: render_value(&value),
                    value,
                }
            })
            .collect()
    }
}

fn order_token(index: usize, direction: SortDirection) -> String {
    match direction {
        SortDirection::Asc => format!("{}", index + 1),
        SortDirection::Desc => format!("-{}", index + 1),
    }
}

/// Sorted columns from `o` (`2.-1`), else from the model ordering.
fn ordering_columns(model: &ModelDefinition, order: Option<&str>) -> Vec<(usize, SortDirection)> {
    let mut columns: Vec<(usize, SortDirection)> = Vec::new();

    match order {
        Some(order) => {
            for token in order.split('.') {
                let (direction, number) = match token.strip_prefix('-') {
                    Some(number) => (SortDirection::Desc, number),
                    None => (SortDirection::Asc, token),
                };
                let Some(index) = number
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                else {
                    continue;
                };
                let sortable = model
                    .list_display
                    .get(index)
                    .is_some_and(|name| model.get_field(name).is_some());
                if sortable && !columns.iter().any(|(i, _)| *i == index) {
                    columns.push((index, direction));
                }
            }
        }
        None => {
            for field in &model.ordering {
                if let Some(index) = model.list_display.iter().position(|n| *n == field.field) {
                    let direction = if field.descending { SortDirection::Desc } else { SortDirection::Asc };
                    columns.push((index, direction));
                }
            }
        }
    }

    columns
}

/// Ordering for the backend, with a descending pk tiebreak.
fn effective_ordering(model: &ModelDefinition, columns: &[(usize, SortDirection)]) -> Vec<OrderingField> {
    let mut ordering: Vec<OrderingField> = if columns.is_empty() {
        model.ordering.clone()
    } else {
        columns
            .iter()
            .map(|(index, direction)| {
                let name = &model.list_display[*index];
                let field = model.get_field(name).map_or(name.as_str(), |f| f.name.as_str());
                match direction {
                    SortDirection::Asc => OrderingField::asc(field),
                    SortDirection::Desc => OrderingField::desc(field),
                }
            })
            .collect()
    };

    let has_pk = ordering
        .iter()
        .any(|o| o.field == "pk" || o.field == model.primary_key);
    if !has_pk {
        ordering.push(OrderingField::desc("pk"));
    }
    ordering
}

/// Request-local view of the applied advanced filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    /// Applied lookups with their validated, non-empty values
    pub bound_values: Vec<(AdvancedLookup, FilterValue)>,
    /// ORM lookup -> one-element value list
    pub orm_parameters: BTreeMap<String, Vec<FilterValue>>,
    /// Advanced parameter name -> ORM lookup, for applied lookups only
    pub query_lookups: BTreeMap<String, String>,
    /// ORM lookups also constrained by a non-advanced request key
    pub sidebar_satisfied: BTreeSet<String>,
}

impl FilterState {
    /// Derive the state from a bound form; an invalid form yields the empty state.
    pub fn from_form(form: &AdvancedFilterForm, request: &QueryParams) -> Self {
        let mut state = Self::default();

        for (input, value) in form.cleaned_lookups() {
            let orm = input.lookup.orm_lookup();
            state.bound_values.push((input.lookup.clone(), value.clone()));
            state.orm_parameters.insert(orm.clone(), vec![value.clone()]);
            state.query_lookups.insert(input.name.clone(), orm);
        }

        for orm in state.orm_parameters.keys() {
            if !sidebar_keys(request, form.prefix(), orm).is_empty() {
                state.sidebar_satisfied.insert(orm.clone());
            }
        }

        state
    }

    pub fn is_empty(&self) -> bool {
        self.orm_parameters.is_empty()
    }
}

/// Non-advanced, non-reserved request keys resolving to the same lookup as `orm`.
fn sidebar_keys<'q>(request: &'q QueryParams, prefix: &str, orm: &str) -> Vec<&'q str> {
    let target = normalize_lookup(orm);
    request
        .keys()
        .into_iter()
        .filter(|key| !key.starts_with(prefix) && !is_reserved(key))
        .filter(|key| normalize_lookup(key) == target)
        .collect()
}

/// One rendered change-list row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub pk: String,
    pub cells: Vec<TableCell>,
    pub actions: Vec<RowAction>,
    /// DOM id of the row's action dropdown
    pub dropdown_id: String,
    pub menu_id: String,
    /// Fetched row
    pub object: Row,
}

/// Change list with the advanced filter form wired in
#[derive(Debug, Clone)]
pub struct AdvancedChangeList<'a> {
    pub base: ChangeList<'a>,
    pub form: AdvancedFilterForm,
    pub state: FilterState,
    request: QueryParams,
}

impl<'a> AdvancedChangeList<'a> {
    /// Bind the form, merge the filters and fetch the requested page.
    ///
    /// Invalid advanced input never fails the request: the form keeps its
    /// errors and contributes nothing. Unknown standard filter fields and out
    /// of range pages fail with [`AdminError::IncorrectLookupParameters`].
    pub fn new(
        model: &'a ModelDefinition,
        config: &'a AdminConfig,
        request: &QueryParams,
        backend: &dyn QueryBackend,
    ) -> AdminResult<Self> {
        let prefix = config.advanced_filter_prefix.as_str();
        let form = AdvancedFilterForm::new(model, Some(request), prefix)
            .with_input_class(&config.theme.input_class);

        if form.is_bound() && !form.is_valid() {
            debug!(
                "Advanced filters for {} ignored, invalid fields: {:?}",
                model.label(),
                form.errors().keys().collect::<Vec<_>>()
            );
        }
        let state = FilterState::from_form(&form, request);

        let known = form.get_query_parameter_names();
        for key in request.keys() {
            if key.starts_with(prefix) && !known.iter().any(|name| name == key) {
                debug!("Ignoring unknown advanced filter parameter {}", key);
            }
        }

        let mut base = ChangeList::new(model, config, request);
        let mut filters = base.get_filters_params(Some(prefix))?;
        // an advanced value replaces sidebar values for the same lookup
        filters.retain(|key, _| {
            let target = normalize_lookup(key);
            !state.orm_parameters.keys().any(|orm| normalize_lookup(orm) == target)
        });
        filters.extend(state.orm_parameters.clone());

        for (orm, values) in &state.orm_parameters {
            if let Some(value) = values.last() {
                base.carry(orm, &value.to_query_value());
            }
        }

        base.run(backend, filters)?;

        Ok(Self {
            base,
            form,
            state,
            request: request.clone(),
        })
    }

    /// Query string with advanced-filter aware key removal.
    ///
    /// Removing an advanced key also removes the lookup it carried, and when
    /// that lookup was also supplied through the sidebar, the sidebar keys.
    /// Removing a sidebar key also removes advanced keys for the same lookup.
    pub fn get_query_string(&self, new_params: &[(&str, Option<&str>)], remove: &[&str]) -> String {
        let removals = self.expand_removals(remove);
        let removals: Vec<&str> = removals.iter().map(String::as_str).collect();
        self.base.get_query_string(new_params, &removals)
    }

    fn expand_removals(&self, remove: &[&str]) -> Vec<String> {
        let prefix = self.form.prefix();
        let mut expanded: Vec<String> = remove.iter().map(|key| key.to_string()).collect();

        for key in remove {
            if key.starts_with(prefix) {
                let Some(orm) = self.state.query_lookups.get(*key) else {
                    continue;
                };
                expanded.push(orm.clone());
                if self.state.sidebar_satisfied.contains(orm) {
                    expanded.extend(
                        sidebar_keys(&self.request, prefix, orm)
                            .into_iter()
                            .map(str::to_string),
                    );
                }
            } else if !is_reserved(key) {
                let target = normalize_lookup(key);
                for input in self.form.inputs() {
                    if normalize_lookup(&input.lookup.orm_lookup()) != target {
                        continue;
                    }
                    expanded.push(input.name.clone());
                    if let Some(orm) = self.state.query_lookups.get(&input.name) {
                        expanded.push(orm.clone());
                    }
                }
            }
        }

        let mut seen = BTreeSet::new();
        expanded.retain(|key| seen.insert(key.clone()));
        expanded
    }

    /// Current query with every submitted advanced key removed
    pub fn advanced_filter_reset_query(&self) -> String {
        let present: Vec<String> = self
            .form
            .get_query_parameter_names()
            .into_iter()
            .filter(|name| self.request.contains_key(name))
            .collect();
        let present: Vec<&str> = present.iter().map(String::as_str).collect();
        self.get_query_string(&[], &present)
    }

    /// Pairs kept as hidden inputs of the advanced form
    pub fn advanced_filter_preserved_params(&self) -> Vec<(String, String)> {
        let prefix = self.form.prefix();
        self.request
            .iter()
            .filter(|(key, _)| *key != PAGE_VAR && *key != ALL_VAR && !key.starts_with(prefix))
            .filter(|(key, _)| !self.state.query_lookups.values().any(|orm| orm.as_str() == *key))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    /// Query string with every filter (standard and advanced) removed
    pub fn clear_all_filters_query(&self) -> String {
        let filters: Vec<&str> = self
            .base
            .params()
            .keys()
            .map(String::as_str)
            .filter(|key| !is_reserved(key))
            .collect();
        self.base.get_query_string(&[], &filters)
    }

    pub fn has_active_advanced_filters(&self) -> bool {
        !self.state.is_empty()
    }

    /// Whether any standard or advanced filter is applied
    pub fn has_filters(&self) -> bool {
        self.base.params().keys().any(|key| !is_reserved(key))
    }

    /// Fetched rows with rendered cells, actions and DOM ids.
    pub fn get_result_rows(
        &self,
        routes: &UrlRegistry,
        oracle: &dyn CapabilityOracle,
        actor: Option<&AdminUser>,
    ) -> Vec<ResultRow> {
        let model = self.base.model;
        let ctx = ActionContext {
            model,
            routes,
            site_name: &self.base.config.site_name,
            oracle,
            actor,
            preserved_filters: &self.base.preserved_filters,
        };

        self.base
            .result_list
            .iter()
            .map(|row| {
                let pk = pk_value(model, row);
                let dropdown_id = format!("{}-row-actions-{}", model.model_name, quote(&pk));
                ResultRow {
                    cells: self.base.row_cells(row),
                    actions: row_actions(&ctx, row),
                    menu_id: format!("{}-menu", dropdown_id),
                    dropdown_id,
                    pk,
                    object: row.clone(),
                }
            })
            .collect()
    }
}
