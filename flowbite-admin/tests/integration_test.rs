//! Integration tests for flowbite-admin

use chrono::{Duration, TimeZone, Utc};
use flowbite_admin::*;
use serde_json::json;

fn book() -> ModelDefinition {
    ModelDefinition::builder("library", "book")
        .id_field()
        .field(FieldDescriptor::new("title", FieldType::String))
        .field(FieldDescriptor::new("pages", FieldType::Integer))
        .field(FieldDescriptor::new("published", FieldType::Date))
        .field(FieldDescriptor::new("in_print", FieldType::Boolean))
        .list_display(["id", "title", "pages", "published"])
        .search_fields(["title"])
        .build()
}

fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    for row in [
        json!({"id": 1, "title": "Dune", "pages": 412, "published": "2024-02-01", "in_print": true}),
        json!({"id": 2, "title": "Dune Messiah", "pages": 256, "published": "2024-02-01", "in_print": true}),
        json!({"id": 3, "title": "dune (abridged)", "pages": 120, "published": "2023-07-01", "in_print": false}),
        json!({"id": 4, "title": "Hyperion", "pages": 482, "published": "2024-02-01", "in_print": false}),
        json!({"id": 5, "title": "Neuromancer", "pages": 271, "published": "2023-07-01", "in_print": true}),
    ] {
        backend.insert("library.book", row).unwrap();
    }
    backend
}

fn site() -> AdminSite {
    Admin::new()
        .register_model(book())
        .backend(backend())
        .dashboard_source(MemoryActivity::new())
        .build()
        .unwrap()
}

fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

fn root() -> AdminUser {
    AdminUser::new(1, "root").superuser()
}

fn page(site: &AdminSite, target: &str) -> ChangeListPage {
    let request = AdminRequest::get(target).unwrap().user(root());
    match site.changelist_view(&request, "library", "book").unwrap() {
        ChangeListResponse::Page(page) => *page,
        ChangeListResponse::Redirect(url) => panic!("unexpected redirect to {}", url),
    }
}

fn pks(page: &ChangeListPage) -> Vec<String> {
    let mut pks: Vec<String> = page.view.rows.iter().map(|r| r.pk.clone()).collect();
    pks.sort();
    pks
}

#[test]
fn test_every_field_type_offers_exact() {
    let types = [
        FieldType::Auto,
        FieldType::Integer,
        FieldType::Decimal,
        FieldType::Duration,
        FieldType::String,
        FieldType::Email,
        FieldType::Uuid,
        FieldType::Enum,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::DateTime,
        FieldType::Time,
        FieldType::ForeignKey,
        FieldType::Json,
        FieldType::Binary,
    ];
    for field_type in types {
        let field = FieldDescriptor::new("f", field_type);
        let first = operators_for(&field);
        assert!(!first.is_empty(), "{:?}", field_type);
        assert!(first.contains(&LookupOperator::Exact), "{:?}", field_type);
        assert_eq!(first, operators_for(&field));
    }
}

#[test]
fn test_contains_is_case_sensitive() {
    let site = site();
    let page = page(&site, "/admin/library/book/?af__title__contains=Dune");

    assert_eq!(pks(&page), vec!["1", "2"]);
    assert!(page.view.advanced_filter.is_active);
    assert_eq!(page.view.result_count, 2);
    assert_eq!(page.view.full_result_count, 5);
}

#[test]
fn test_icontains_ignores_case() {
    let site = site();
    let page = page(&site, "/admin/library/book/?af__title__icontains=dune");
    assert_eq!(pks(&page), vec!["1", "2", "3"]);
}

#[test]
fn test_invalid_value_fails_closed() {
    let site = site();
    let page = page(
        &site,
        "/admin/library/book/?af__pages__gt=lots&af__title__contains=Dune",
    );

    assert_eq!(page.view.rows.len(), 5);
    assert!(page.view.advanced_filter.has_errors);
    assert!(!page.view.advanced_filter.is_active);
    let rejected = page
        .view
        .advanced_filter
        .inputs
        .iter()
        .find(|input| input.name == "af__pages__gt")
        .unwrap();
    assert!(rejected.has_errors());
    assert_eq!(rejected.value.as_deref(), Some("lots"));
}

#[test]
fn test_standard_and_advanced_filters_intersect() {
    let site = site();
    let page = page(
        &site,
        "/admin/library/book/?published__exact=2024-02-01&af__pages__gt=300",
    );

    assert_eq!(pks(&page), vec!["1", "4"]);
    assert_eq!(
        page.view.advanced_filter.reset_query,
        "?published__exact=2024-02-01"
    );

    // the reset link keeps the sidebar filter
    let reset = page.view.advanced_filter.reset_query.clone();
    let after = self::page(&site, &format!("/admin/library/book/{}", reset));
    assert_eq!(pks(&after), vec!["1", "2", "4"]);
}

#[test]
fn test_shared_lookup_reset_round_trip() {
    let site = site();
    let page = page(
        &site,
        "/admin/library/book/?published__exact=2024-02-01&af__published__exact=2024-02-01",
    );
    assert_eq!(pks(&page), vec!["1", "2", "4"]);
    assert_eq!(page.view.advanced_filter.reset_query, "?");

    let after = self::page(
        &site,
        &format!("/admin/library/book/{}", page.view.advanced_filter.reset_query),
    );
    assert_eq!(after.view.rows.len(), 5);
    assert!(!after.view.has_filters);
}

#[test]
fn test_advanced_value_takes_precedence_over_sidebar() {
    let site = site();
    let page = page(
        &site,
        "/admin/library/book/?published__exact=2024-02-01&af__published__exact=2023-07-01",
    );
    assert_eq!(pks(&page), vec!["3", "5"]);
    assert_eq!(page.view.result_count, 2);
}

#[test]
fn test_boolean_filter_tri_state() {
    let site = site();
    assert_eq!(
        pks(&page(&site, "/admin/library/book/?af__in_print__exact=0")),
        vec!["3", "4"]
    );
    assert_eq!(
        page(&site, "/admin/library/book/?af__in_print__exact=").view.rows.len(),
        5
    );
}

#[test]
fn test_incorrect_lookup_redirects() {
    let site = site();
    let request = AdminRequest::get("/admin/library/book/?isbn__exact=1")
        .unwrap()
        .user(root());
    match site.changelist_view(&request, "library", "book").unwrap() {
        ChangeListResponse::Redirect(url) => assert_eq!(url, "/admin/library/book/?e=1"),
        ChangeListResponse::Page(_) => panic!("expected redirect"),
    }
}

#[test]
fn test_row_actions_avoid_duplicate_view() {
    let model = book();
    let routes = UrlRegistry::for_site(&AdminConfig::default(), [&model]);
    let editor = AdminUser::new(2, "editor").with_model_permissions(&model, &["view", "change"]);
    let ctx = ActionContext {
        model: &model,
        routes: &routes,
        site_name: "admin",
        oracle: &ModelPermissions,
        actor: Some(&editor),
        preserved_filters: "",
    };
    let row = row(json!({"id": 7, "title": "Dune"}));
    let keys: Vec<String> = row_actions(&ctx, &row).into_iter().map(|a| a.key).collect();
    assert_eq!(keys, vec!["edit"]);

    let reader = AdminUser::new(3, "reader").with_model_permissions(&model, &["view"]);
    let ctx = ActionContext {
        actor: Some(&reader),
        ..ctx
    };
    let actions = row_actions(&ctx, &row);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].key, "view");
    assert_eq!(actions[0].url, "/admin/library/book/7/change/");
}

#[test]
fn test_row_actions_with_public_page() {
    let model = ModelDefinition::builder("library", "book")
        .id_field()
        .view_on_site("/books/{pk}/")
        .build();
    let routes = UrlRegistry::for_site(&AdminConfig::default(), [&model]);
    let root = AdminUser::new(1, "root").superuser();
    let ctx = ActionContext {
        model: &model,
        routes: &routes,
        site_name: "admin",
        oracle: &ModelPermissions,
        actor: Some(&root),
        preserved_filters: "q=dune",
    };
    let actions = row_actions(&ctx, &row(json!({"id": 7})));

    let keys: Vec<&str> = actions.iter().map(|a| a.key.as_str()).collect();
    assert_eq!(keys, vec!["view", "edit", "delete"]);
    assert!(actions[0].external);
    assert_eq!(actions[0].url, "/books/7/");
    assert_eq!(
        actions[1].url,
        "/admin/library/book/7/change/?_changelist_filters=q%3Ddune"
    );
    assert!(actions[2].danger);
}

#[test]
fn test_percentage_change() {
    assert_eq!(percentage_change(0, 0), None);
    assert_eq!(percentage_change(5, 0), Some(100.0));
    assert_eq!(percentage_change(10, 5), Some(100.0));
    assert_eq!(percentage_change(5, 10), Some(-50.0));
}

#[test]
fn test_layout_normalization() {
    let normalized = normalize_layout(&["recent-actions", "kpi-cards"]);
    assert_eq!(normalize_layout(&normalized), normalized);

    let cleaned = normalize_layout(&["bogus", "top-models"]);
    assert_eq!(
        cleaned,
        vec!["top-models", "kpi-cards", "activity-chart", "app-list", "recent-actions"]
    );
}

#[test]
fn test_activity_chart_is_zero_filled() {
    let activity = MemoryActivity::new();
    let today = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
    activity.log(LogEntry {
        id: 1,
        action_time: today - Duration::days(2),
        user_id: 1,
        app_label: Some("library".into()),
        model_name: Some("book".into()),
        object_id: Some("1".into()),
        object_repr: "Dune".into(),
        action_flag: ActionFlag::Change,
        change_message: "Changed title.".into(),
    });

    let chart = activity_chart(&activity, today.date_naive()).unwrap();
    assert_eq!(chart.labels.len(), 7);
    assert_eq!(chart.labels[6], "March 10");
    assert_eq!(chart.datasets.len(), 3);
    let total: usize = chart
        .datasets
        .iter()
        .flat_map(|d| d.data.iter().copied())
        .sum();
    assert_eq!(total, 1);
}

#[test]
fn test_top_models_skip_failing_tables() {
    let author = ModelDefinition::builder("library", "author").id_field().build();
    let backend = backend();
    backend.insert("library.author", json!({"id": 1})).unwrap();
    backend.fail_table("library.book");

    let mut registry = ModelRegistry::new();
    registry.register(book());
    registry.register(author.clone());
    let routes = UrlRegistry::for_site(&AdminConfig::default(), [&author]);

    let stats = top_models(&registry, &backend, &routes, "admin", 5);
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].verbose_name, "Authors");
    assert_eq!(stats[0].admin_url.as_deref(), Some("/admin/library/author/"));
}

#[tokio::test]
async fn test_dashboard_layout_ajax_protocol() {
    let site = site();
    let ajax = |body: &'static str| {
        AdminRequest::post("/admin/", body)
            .header("X-Requested-With", "XMLHttpRequest")
            .user(root())
    };

    let saved = site
        .index(&ajax(r#"{"widget_order": ["top-models", "nope"]}"#))
        .await
        .unwrap();
    let IndexBody::Layout(LayoutResponse::Ok { layout }) = saved.body else {
        panic!("expected ok response");
    };
    assert_eq!(layout[0], "top-models");
    assert_eq!(layout.len(), 5);

    let session = saved.session_id;
    let noop = site
        .index(&ajax("not json").session(session.clone()))
        .await
        .unwrap();
    assert!(matches!(noop.body, IndexBody::Layout(LayoutResponse::Noop)));

    let reset = site
        .index(&ajax(r#"{"action": "reset"}"#).session(session))
        .await
        .unwrap();
    let IndexBody::Layout(response) = reset.body else {
        panic!("expected layout response");
    };
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"status": "ok", "layout": default_layout()})
    );
}
