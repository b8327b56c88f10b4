//! Flowbite-themed admin layer
//!
//! Builds the data behind a Tailwind/Flowbite admin: a dashboard with
//! re-orderable widgets, change lists with an advanced filter panel, per-row
//! action menus and the site-wide navigation context. Rendering is left to
//! the templates; every page is a serializable context.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Top bar: notifications · profile                            │
//! ├───────────────┬──────────────────────────────────────────────┤
//! │  Library      │  Books                                       │
//! │    Authors    │  [Search] [Advanced filters ▾]     [+ Add]   │
//! │  » Books      │  ┌────┬────────┬────────────┬──────────┐     │
//! │  Auth         │  │ ID │ Title  │ Published  │    ⋯     │     │
//! │    Users      │  ├────┼────────┼────────────┼──────────┤     │
//! │               │  │ 1  │ Dune   │ 1965-08-01 │ View ... │     │
//! │               │  └────┴────────┴────────────┴──────────┘     │
//! └───────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowbite_admin::*;
//!
//! let book = ModelDefinition::builder("library", "book")
//!     .id_field()
//!     .field(FieldDescriptor::new("title", FieldType::String))
//!     .field(FieldDescriptor::new("published", FieldType::Date))
//!     .search_fields(["title"])
//!     .build();
//!
//! let site = Admin::new()
//!     .title("Library Admin")
//!     .register_model(book)
//!     .backend(MemoryBackend::new())
//!     .dashboard_source(MemoryActivity::new())
//!     .build()?;
//!
//! let request = AdminRequest::get("/admin/library/book/?af__title__icontains=dune")?
//!     .user(AdminUser::new(1, "root").superuser());
//! let page = site.changelist_view(&request, "library", "book")?;
//! ```

pub mod actions;
pub mod changelist;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod field;
pub mod forms;
pub mod layout;
pub mod lookup;
pub mod memory;
pub mod model;
pub mod query;
pub mod registry;
pub mod routes;
pub mod session;
pub mod site;
pub mod store;
pub mod ui;
pub mod views;

pub use actions::*;
pub use changelist::*;
pub use config::*;
pub use dashboard::*;
pub use error::*;
pub use field::*;
pub use forms::*;
pub use layout::*;
pub use lookup::*;
pub use memory::*;
pub use model::*;
pub use query::*;
pub use registry::*;
pub use routes::*;
pub use session::*;
pub use site::*;
pub use store::*;
pub use ui::*;
pub use views::*;
