//! Route registration and resolution.
//!
//! The router maps [`RouteDescriptor`]s to handlers. REST routes are matched
//! by method and path pattern; GraphQL routes by parent type and field; direct
//! routes by their opaque key. Registration order is preserved for the
//! manifest and for breaking ties between equally specific patterns.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use roster_core::route::{normalize_path, split_path};
use roster_core::{PathPattern, PatternError, RouteDescriptor};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::DispatchError;
use super::handler::Handler;

// ---------------------------------------------------------------------------
// Resolution results
// ---------------------------------------------------------------------------

/// A resolved route and its handler.
#[derive(Clone)]
pub struct Resolved<'r> {
    pub descriptor: &'r RouteDescriptor,
    pub handler: Arc<dyn Handler>,
}

/// A resolved REST route with the values bound to its wildcards.
#[derive(Clone)]
pub struct RestMatch<'r> {
    pub descriptor: &'r RouteDescriptor,
    pub handler: Arc<dyn Handler>,
    pub bindings: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestEndpoint {
    pub method: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphqlEndpoint {
    pub parent: String,
    pub field: String,
}

/// Registered routes, grouped by kind, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteManifest {
    pub rest: Vec<RestEndpoint>,
    pub graphql: Vec<GraphqlEndpoint>,
    pub direct: Vec<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

struct Entry {
    descriptor: RouteDescriptor,
    handler: Arc<dyn Handler>,
}

/// Maps route descriptors to handlers.
///
/// Registering a descriptor that already exists replaces its handler in
/// place (last write wins) and is counted in [`Router::collisions`].
#[derive(Default)]
pub struct Router {
    entries: Vec<Entry>,
    index: HashMap<RouteDescriptor, usize>,
    collisions: usize,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under an already-built descriptor.
    pub fn register<H: Handler>(&mut self, descriptor: RouteDescriptor, handler: H) {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        if let Some(&pos) = self.index.get(&descriptor) {
            warn!(route = %descriptor, "route registered twice, replacing handler");
            self.collisions += 1;
            self.entries[pos].handler = handler;
            return;
        }
        debug!(route = %descriptor, "route registered");
        self.index.insert(descriptor.clone(), self.entries.len());
        self.entries.push(Entry {
            descriptor,
            handler,
        });
    }

    /// Registers a REST handler for `method` and a `{name}`-templated path.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if `path_pattern` is malformed.
    pub fn register_rest<H: Handler>(
        &mut self,
        method: &str,
        path_pattern: &str,
        handler: H,
    ) -> Result<(), PatternError> {
        self.register(RouteDescriptor::rest(method, path_pattern)?, handler);
        Ok(())
    }

    pub fn register_graphql<H: Handler>(&mut self, parent_type: &str, field_name: &str, handler: H) {
        self.register(RouteDescriptor::graphql(parent_type, field_name), handler);
    }

    pub fn register_direct<H: Handler>(&mut self, route_key: &str, handler: H) {
        self.register(RouteDescriptor::direct(route_key), handler);
    }

    /// Number of registrations that replaced an existing route.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a REST request.
    ///
    /// Among the patterns that match `path`, literal segments beat wildcards,
    /// compared from the left; equally specific patterns resolve to the one
    /// registered first.
    ///
    /// # Errors
    ///
    /// [`DispatchError::MethodNotAllowed`] when the path matches only under
    /// other methods, otherwise [`DispatchError::NotFound`].
    pub fn resolve_rest(&self, method: &str, path: &str) -> Result<RestMatch<'_>, DispatchError> {
        let method = method.to_ascii_uppercase();
        let normalized = normalize_path(path);
        let segments = split_path(&normalized);

        let mut best: Option<(&Entry, &PathPattern, Vec<(String, String)>)> = None;
        let mut allowed: Vec<String> = Vec::new();

        for entry in &self.entries {
            let RouteDescriptor::Rest {
                method: route_method,
                pattern,
            } = &entry.descriptor
            else {
                continue;
            };
            let Some(bindings) = pattern.match_segments(&segments) else {
                continue;
            };
            if *route_method != method {
                if !allowed.contains(route_method) {
                    allowed.push(route_method.clone());
                }
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, current, _)) => pattern.specificity_cmp(current) == Ordering::Greater,
            };
            if better {
                best = Some((entry, pattern, bindings));
            }
        }

        if let Some((entry, _, bindings)) = best {
            return Ok(RestMatch {
                descriptor: &entry.descriptor,
                handler: Arc::clone(&entry.handler),
                bindings,
            });
        }

        if allowed.is_empty() {
            Err(DispatchError::NotFound {
                route: format!("{method} {normalized}"),
            })
        } else {
            allowed.sort();
            Err(DispatchError::MethodNotAllowed {
                method,
                path: normalized,
                allowed,
            })
        }
    }

    /// Resolves a GraphQL field resolver.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] when nothing is registered.
    pub fn resolve_graphql(
        &self,
        parent_type: &str,
        field_name: &str,
    ) -> Result<Resolved<'_>, DispatchError> {
        self.resolve_exact(RouteDescriptor::graphql(parent_type, field_name))
    }

    /// Resolves a direct route key.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] when nothing is registered.
    pub fn resolve_direct(&self, route_key: &str) -> Result<Resolved<'_>, DispatchError> {
        self.resolve_exact(RouteDescriptor::direct(route_key))
    }

    fn resolve_exact(&self, descriptor: RouteDescriptor) -> Result<Resolved<'_>, DispatchError> {
        match self.index.get(&descriptor) {
            Some(&pos) => {
                let entry = &self.entries[pos];
                Ok(Resolved {
                    descriptor: &entry.descriptor,
                    handler: Arc::clone(&entry.handler),
                })
            }
            None => Err(DispatchError::NotFound {
                route: descriptor.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn rest_endpoints(&self) -> Vec<RestEndpoint> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.descriptor {
                RouteDescriptor::Rest { method, pattern } => Some(RestEndpoint {
                    method: method.clone(),
                    path: pattern.as_str().to_string(),
                }),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn graphql_endpoints(&self) -> Vec<GraphqlEndpoint> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.descriptor {
                RouteDescriptor::Graphql {
                    parent_type,
                    field_name,
                } => Some(GraphqlEndpoint {
                    parent: parent_type.clone(),
                    field: field_name.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn direct_routes(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.descriptor {
                RouteDescriptor::Direct { route_key } => Some(route_key.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn manifest(&self) -> RouteManifest {
        RouteManifest {
            rest: self.rest_endpoints(),
            graphql: self.graphql_endpoints(),
            direct: self.direct_routes(),
        }
    }

    /// The manifest as JSON for deployment tooling.
    #[must_use]
    pub fn manifest_json(&self) -> Value {
        serde_json::to_value(self.manifest()).unwrap_or(Value::Null)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field(
                "routes",
                &self
                    .entries
                    .iter()
                    .map(|e| e.descriptor.to_string())
                    .collect::<Vec<_>>(),
            )
            .field("collisions", &self.collisions)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use roster_core::Arguments;
    use serde_json::json;

    use super::*;
    use crate::service::handler::handler_fn;
    use crate::session::{Connector, Credentials, DataAccess, MemoryDatabase};

    /// Handler that returns a fixed tag so tests can tell handlers apart.
    fn tagged(tag: &'static str) -> impl Handler {
        handler_fn(move |_db, _args| Box::pin(async move { Ok(json!(tag)) }))
    }

    async fn tag_of(handler: Arc<dyn Handler>) -> Value {
        let db = MemoryDatabase::new();
        let mut conn = db.connect(&Credentials::new("u", "p")).await.unwrap();
        let access: &mut dyn DataAccess = conn.data_access();
        handler.call(access, Arguments::new()).await.unwrap()
    }

    fn students_router() -> Router {
        let mut router = Router::new();
        router.register_rest("GET", "/students", tagged("list")).unwrap();
        router
            .register_rest("GET", "/students/{studentId}", tagged("get"))
            .unwrap();
        router
            .register_rest("DELETE", "/students/{studentId}", tagged("delete"))
            .unwrap();
        router
    }

    #[tokio::test]
    async fn resolves_path_and_binds_wildcards() {
        let router = students_router();
        let found = router.resolve_rest("GET", "/students/1").unwrap();

        assert_eq!(found.descriptor.to_string(), "GET /students/{studentId}");
        assert_eq!(
            found.bindings,
            vec![("studentId".to_string(), "1".to_string())]
        );
        assert_eq!(tag_of(found.handler).await, json!("get"));
    }

    #[test]
    fn method_is_case_insensitive_and_trailing_slash_ignored() {
        let router = students_router();
        assert!(router.resolve_rest("get", "/students/").is_ok());
    }

    #[test]
    fn wrong_method_is_not_allowed() {
        let router = students_router();
        match router.resolve_rest("PATCH", "/students/9") {
            Err(DispatchError::MethodNotAllowed { allowed, path, .. }) => {
                assert_eq!(allowed, vec!["DELETE".to_string(), "GET".to_string()]);
                assert_eq!(path, "/students/9");
            }
            other => panic!("expected MethodNotAllowed, got {:?}", other.err()),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        let router = students_router();
        assert!(matches!(
            router.resolve_rest("GET", "/courses"),
            Err(DispatchError::NotFound { .. })
        ));
        assert!(matches!(
            router.resolve_rest("GET", "/students/1/classes"),
            Err(DispatchError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn literal_segment_beats_wildcard_regardless_of_order() {
        let mut router = Router::new();
        router
            .register_rest("GET", "/students/{studentId}", tagged("by-id"))
            .unwrap();
        router
            .register_rest("GET", "/students/count", tagged("count"))
            .unwrap();

        let count = router.resolve_rest("GET", "/students/count").unwrap();
        assert_eq!(tag_of(count.handler).await, json!("count"));
        assert!(count.bindings.is_empty());

        let by_id = router.resolve_rest("GET", "/students/7").unwrap();
        assert_eq!(tag_of(by_id.handler).await, json!("by-id"));
    }

    #[tokio::test]
    async fn equally_specific_patterns_resolve_to_first_registered() {
        let mut router = Router::new();
        router.register_rest("GET", "/a/{x}", tagged("first")).unwrap();
        router.register_rest("GET", "/a/{y}", tagged("second")).unwrap();

        let found = router.resolve_rest("GET", "/a/1").unwrap();
        assert_eq!(tag_of(found.handler).await, json!("first"));
    }

    #[tokio::test]
    async fn reregistering_replaces_in_place_and_counts() {
        let mut router = Router::new();
        router.register_direct("list_students", tagged("old"));
        router.register_direct("list_students", tagged("new"));

        assert_eq!(router.len(), 1);
        assert_eq!(router.collisions(), 1);
        let found = router.resolve_direct("list_students").unwrap();
        assert_eq!(tag_of(found.handler).await, json!("new"));
    }

    #[tokio::test]
    async fn graphql_and_direct_resolve_exactly() {
        let mut router = Router::new();
        router.register_graphql("Query", "getStudent", tagged("gql"));
        router.register_direct("getStudent", tagged("direct"));

        let gql = router.resolve_graphql("Query", "getStudent").unwrap();
        assert_eq!(tag_of(gql.handler).await, json!("gql"));
        assert!(matches!(
            router.resolve_graphql("Mutation", "getStudent"),
            Err(DispatchError::NotFound { .. })
        ));
        match router.resolve_direct("missing") {
            Err(DispatchError::NotFound { route }) => assert_eq!(route, "direct:missing"),
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let mut router = Router::new();
        assert!(router.register_rest("GET", "students", tagged("x")).is_err());
        assert!(router.is_empty());
    }

    #[test]
    fn manifest_lists_routes_in_registration_order() {
        let mut router = students_router();
        router.register_graphql("Query", "listStudents", tagged("q"));
        router.register_direct("list_students", tagged("d"));

        assert_eq!(
            router.manifest_json(),
            json!({
                "rest": [
                    {"method": "GET", "path": "/students"},
                    {"method": "GET", "path": "/students/{studentId}"},
                    {"method": "DELETE", "path": "/students/{studentId}"},
                ],
                "graphql": [{"parent": "Query", "field": "listStudents"}],
                "direct": ["list_students"],
            })
        );
    }

    fn segment() -> impl Strategy<Value = (bool, String)> {
        (any::<bool>(), "[a-z]{1,8}")
    }

    proptest! {
        #[test]
        fn substituted_path_resolves_to_its_own_route(
            segments in prop::collection::vec(segment(), 1..5),
            value in "[A-Za-z0-9]{1,12}",
        ) {
            let mut template = String::new();
            let mut concrete = String::new();
            for (i, (wild, name)) in segments.iter().enumerate() {
                if *wild {
                    template.push_str(&format!("/{{{name}{i}}}"));
                    concrete.push_str(&format!("/{value}"));
                } else {
                    template.push_str(&format!("/{name}"));
                    concrete.push_str(&format!("/{name}"));
                }
            }

            let mut router = Router::new();
            router.register_rest("GET", &template, tagged("target")).unwrap();
            router.register_rest("POST", &template, tagged("other-method")).unwrap();
            router.register_rest("GET", &format!("{template}/extra"), tagged("longer")).unwrap();

            let found = router.resolve_rest("GET", &concrete).unwrap();
            prop_assert_eq!(found.descriptor.to_string(), format!("GET {template}"));
            let wildcards = segments.iter().filter(|(wild, _)| *wild).count();
            prop_assert_eq!(found.bindings.len(), wildcards);
            prop_assert!(found.bindings.iter().all(|(_, v)| v == &value));
        }
    }
}
