use crate::app::AppContext;
use axum::Router;

/// Trait for composable route modules
///
/// Each module contributes a group of routes that share the [`AppContext`]
/// state. The webhook endpoint is mounted this way.
///
/// # Example
///
/// ```ignore
/// struct AdminModule;
///
/// impl RouteModule for AdminModule {
///     fn routes(&self) -> Router<AppContext> {
///         Router::new().route("/deliveries", get(list_deliveries))
///     }
///
///     fn prefix(&self) -> Option<&str> {
///         Some("/admin")
///     }
/// }
/// ```
pub trait RouteModule {
    /// Returns a router with all routes for this module
    ///
    /// The router should NOT have state applied - state is applied by the
    /// App once all modules are merged.
    fn routes(&self) -> Router<AppContext>
    where
        Self: Sized;

    /// Optional: specify a path prefix for all routes in this module
    fn prefix(&self) -> Option<&str> {
        None
    }

    /// Registers this module's routes into the application router
    fn register(self, router: Router<AppContext>) -> Router<AppContext>
    where
        Self: Sized,
    {
        let routes = self.routes();

        if let Some(prefix) = self.prefix() {
            router.nest(prefix, routes)
        } else {
            router.merge(routes)
        }
    }
}
