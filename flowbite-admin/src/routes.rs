//! Route table for the admin site
//!
//! Route names are injective: `{site}:{app}_{model}_{view}` maps to exactly one
//! pattern. Reversal substitutes positional arguments into `{}` / `{name}`
//! placeholders; resolution runs the other way and reports named
//! placeholders as kwargs.

use crate::config::AdminConfig;
use crate::error::{AdminError, AdminResult};
use crate::model::ModelDefinition;
use flowbite_log::debug;
use std::collections::BTreeMap;

/// Per-model admin views, in registration order
pub const MODEL_VIEWS: &[&str] = &["changelist", "add", "history", "delete", "change"];

/// Characters escaped by [`quote`]
const UNSAFE_CHARS: &str = ":/_#?;@&=+$,\"[]<>%\n\\";

/// Escape a primary key for use as one URL path segment (`_XX` hex escapes).
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if UNSAFE_CHARS.contains(c) {
            out.push_str(&format!("_{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverse [`quote`].
pub fn unquote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '_' {
            if let Some(decoded) = value
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(decoded as char);
                chars.next();
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Append `_changelist_filters=<preserved>` to a URL.
pub fn add_preserved_filters(url: &str, preserved_filters: &str) -> String {
    if preserved_filters.is_empty() {
        return url.to_string();
    }
    let encoded = serde_urlencoded::to_string(vec![("_changelist_filters", preserved_filters)])
        .unwrap_or_default();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, encoded)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Positional (`{}`) or named (`{app_label}`) placeholder
    Param(Option<String>),
}

#[derive(Debug, Clone)]
struct Route {
    namespace: String,
    url_name: String,
    segments: Vec<Segment>,
    kwargs: BTreeMap<String, String>,
}

impl Route {
    fn params(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count()
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some("") => Segment::Param(None),
            Some(name) => Segment::Param(Some(name.to_string())),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

/// Outcome of resolving a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverMatch {
    pub namespace: String,
    pub url_name: String,
    pub args: Vec<String>,
    pub kwargs: BTreeMap<String, String>,
}

impl ResolverMatch {
    /// `namespace:url_name`
    pub fn view_name(&self) -> String {
        format!("{}:{}", self.namespace, self.url_name)
    }
}

/// Route-name -> path table
#[derive(Debug, Clone, Default)]
pub struct UrlRegistry {
    routes: Vec<Route>,
}

impl UrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes of an admin site with the given models.
    pub fn for_site<'a>(
        config: &AdminConfig,
        models: impl IntoIterator<Item = &'a ModelDefinition>,
    ) -> Self {
        let base = config.base_path.as_str();
        let ns = config.site_name.as_str();
        let mut registry = Self::new();

        registry.add(ns, "index", &format!("{}/", base), BTreeMap::new());
        registry.add(ns, "user-settings", &format!("{}/settings/", base), BTreeMap::new());

        let mut app_labels: Vec<&str> = Vec::new();
        for model in models {
            let mut kwargs = BTreeMap::new();
            kwargs.insert("app_label".to_string(), model.app_label.clone());
            kwargs.insert("model_name".to_string(), model.model_name.clone());
            let prefix = format!("{}/{}/{}", base, model.app_label, model.model_name);

            for view in MODEL_VIEWS {
                let pattern = match *view {
                    "changelist" => format!("{}/", prefix),
                    "add" => format!("{}/add/", prefix),
                    other => format!("{}/{{}}/{}/", prefix, other),
                };
                let name = format!("{}_{}_{}", model.app_label, model.model_name, view);
                registry.add(ns, &name, &pattern, kwargs.clone());
            }
            if !app_labels.contains(&model.app_label.as_str()) {
                app_labels.push(&model.app_label);
            }
        }

        if !app_labels.is_empty() {
            registry.add(ns, "app_list", &format!("{}/{{app_label}}/", base), BTreeMap::new());
        }

        registry
    }

    /// Register a route. Re-registering a name replaces the earlier pattern.
    pub fn add(
        &mut self,
        namespace: &str,
        url_name: &str,
        pattern: &str,
        kwargs: BTreeMap<String, String>,
    ) {
        self.routes
            .retain(|r| !(r.namespace == namespace && r.url_name == url_name));
        self.routes.push(Route {
            namespace: namespace.to_string(),
            url_name: url_name.to_string(),
            segments: parse_pattern(pattern),
            kwargs,
        });
    }

    /// Path for `namespace:url_name` with positional arguments.
    pub fn reverse(&self, name: &str, args: &[&str]) -> AdminResult<String> {
        let (namespace, url_name) = name.split_once(':').unwrap_or(("", name));
        let route = self
            .routes
            .iter()
            .find(|r| r.namespace == namespace && r.url_name == url_name)
            .filter(|r| r.params() == args.len())
            .ok_or_else(|| {
                debug!("No reverse match for {} with {} argument(s)", name, args.len());
                AdminError::NoReverseMatch(name.to_string())
            })?;

        let mut args = args.iter();
        let mut path = String::from("/");
        for segment in &route.segments {
            match segment {
                Segment::Literal(s) => path.push_str(s),
                Segment::Param(_) => path.push_str(args.next().copied().unwrap_or_default()),
            }
            path.push('/');
        }
        Ok(path)
    }

    /// Match a path (query string ignored) against the table.
    pub fn resolve(&self, path: &str) -> Option<ResolverMatch> {
        let path = path.split('?').next().unwrap_or(path);
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        self.routes.iter().find_map(|route| {
            if route.segments.len() != parts.len() {
                return None;
            }
            let mut args = Vec::new();
            let mut kwargs = route.kwargs.clone();
            for (segment, part) in route.segments.iter().zip(&parts) {
                match segment {
                    Segment::Literal(s) if s == part => {}
                    Segment::Literal(_) => return None,
                    Segment::Param(None) => args.push(part.to_string()),
                    Segment::Param(Some(name)) => {
                        kwargs.insert(name.clone(), part.to_string());
                    }
                }
            }
            Some(ResolverMatch {
                namespace: route.namespace.clone(),
                url_name: route.url_name.clone(),
                args,
                kwargs,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
