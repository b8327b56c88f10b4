// Flowbite - a Tailwind/Flowbite admin layer for Rust
//
// This library bundles the admin components (dashboard, advanced change
// lists, row actions) with the logging backend they report through.

// Re-export the admin layer
pub use flowbite_admin::*;

// Re-export logging
pub use flowbite_log;

// Re-export commonly used external crates
pub use serde;
pub use serde_json;

/// Everything needed to assemble and query an admin site.
pub mod prelude {
    pub use flowbite_admin::{
        Admin, AdminConfig, AdminError, AdminRequest, AdminResult, AdminSite, AdminUser,
        CapabilityOracle, ChangeListResponse, DashboardSource, FieldDescriptor, FieldType,
        IndexBody, LayoutResponse, MemoryActivity, MemoryBackend, MemorySessionStore,
        ModelDefinition, ModelPermissions, OrderingField, QueryBackend, SessionStore, Theme,
    };
    pub use flowbite_log::{debug, error, info, trace, warn};
}
