//! The dispatch engine.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info_span, warn};

use crate::config::ConfigSource;
use crate::controller::{ControllerRegistry, Layout};
use crate::dispatch::render::{RenderTarget, Renderer};
use crate::dispatch::script::{is_script_path, Script, ScriptCatalog, ScriptContext, ScriptTable};
use crate::dispatch::{DispatchError, DispatchOutcome};
use crate::observability::metrics;
use crate::routing::route::{is_alphanumeric, is_identifier, INDEX};
use crate::routing::{normalize_path, DefaultCasing, NameCasing, Route, RouteResolver};
use crate::security::auth::Authenticator;
use crate::session::{HandlerInstance, SessionContext};

/// Longest chain of internal redirects a single request may follow.
pub const MAX_REDIRECTS: usize = 8;

/// Per-request state handed to the dispatcher.
pub struct Exchange<'a> {
    pub session: &'a mut SessionContext,
    pub auth: &'a mut dyn Authenticator,
    /// Rendered output.
    pub body: String,
}

impl<'a> Exchange<'a> {
    pub fn new(session: &'a mut SessionContext, auth: &'a mut dyn Authenticator) -> Self {
        Self {
            session,
            auth,
            body: String::new(),
        }
    }
}

/// Maps routes to controller actions or scripts and renders the result.
pub struct Dispatcher {
    controllers: Arc<ControllerRegistry>,
    scripts: Arc<dyn ScriptCatalog>,
    renderer: Arc<dyn Renderer>,
    config: Arc<dyn ConfigSource>,
    casing: Arc<dyn NameCasing>,
}

impl Dispatcher {
    pub fn new(
        controllers: Arc<ControllerRegistry>,
        renderer: Arc<dyn Renderer>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            controllers,
            scripts: Arc::new(ScriptTable::new()),
            renderer,
            config,
            casing: Arc::new(DefaultCasing),
        }
    }

    pub fn with_scripts(mut self, scripts: Arc<dyn ScriptCatalog>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_casing(mut self, casing: Arc<dyn NameCasing>) -> Self {
        self.casing = casing;
        self
    }

    pub fn controllers(&self) -> &Arc<ControllerRegistry> {
        &self.controllers
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Resolver honoring the configured default handler.
    pub fn resolver(&self) -> RouteResolver {
        let default_handler = self
            .config
            .get_str("application", "default_controller")
            .filter(|name| is_identifier(name))
            .unwrap_or_else(|| INDEX.to_string());
        RouteResolver::new(self.casing.clone()).with_default_handler(default_handler)
    }

    /// Dispatch a raw request path: a matching script first, then the
    /// resolved controller route.
    pub fn dispatch_path(
        &self,
        raw: &str,
        ex: &mut Exchange<'_>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let span = info_span!("dispatch", path = %raw, session = %ex.session.id());
        let _enter = span.enter();

        let start = Instant::now();
        let result = self.route_path(raw, ex);
        record(&result, start);
        result
    }

    /// Dispatch an already resolved route. Scripts are not considered.
    pub fn dispatch(
        &self,
        route: &Route,
        ex: &mut Exchange<'_>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let span = info_span!("dispatch", route = %route, session = %ex.session.id());
        let _enter = span.enter();

        let start = Instant::now();
        let result = self.run(route, ex, 0);
        record(&result, start);
        result
    }

    fn route_path(&self, raw: &str, ex: &mut Exchange<'_>) -> Result<DispatchOutcome, DispatchError> {
        let path = normalize_path(raw);
        if let Some(script) = self.scripts.find(&path) {
            if !is_script_path(&path) {
                debug!(path = %path, "Script path has invalid characters");
                return Ok(DispatchOutcome::NotFound);
            }
            return self.run_script(&path, script.as_ref(), ex);
        }

        let route = self.resolver().resolve(raw)?;
        self.run(&route, ex, 0)
    }

    fn auth_enabled(&self) -> bool {
        self.config.get_bool("auth", "enabled")
    }

    fn run_script(
        &self,
        path: &str,
        script: &dyn Script,
        ex: &mut Exchange<'_>,
    ) -> Result<DispatchOutcome, DispatchError> {
        if self.auth_enabled() && !ex.auth.is_authenticated() {
            let allowed = self
                .config
                .get_list("auth", "allowed_routes")
                .iter()
                .any(|route| route.trim_matches('/') == path);
            if !allowed {
                warn!(path = %path, "Script requires authentication");
                metrics::record_access_denied(path);
                ex.auth.on_not_authorized();
                return Ok(DispatchOutcome::NotAuthorized);
            }
        }

        let mut layout = Layout::new(self.config.get_str("layout", "default").unwrap_or_default());
        script
            .run(&mut ScriptContext {
                layout: &mut layout,
                body: &mut ex.body,
            })
            .map_err(|source| DispatchError::Script {
                path: path.to_string(),
                source,
            })?;

        if !layout.name().is_empty() {
            self.renderer.render(
                RenderTarget::Layout {
                    layout: &layout,
                    view: None,
                },
                &mut ex.body,
            )?;
        }

        ex.session.set_current_route(path);
        debug!(path = %path, "Script executed");
        Ok(DispatchOutcome::Rendered)
    }

    fn run(
        &self,
        route: &Route,
        ex: &mut Exchange<'_>,
        depth: usize,
    ) -> Result<DispatchOutcome, DispatchError> {
        let (handler, action) = (route.handler(), route.action());
        if !is_alphanumeric(handler) || !is_alphanumeric(action) {
            debug!(route = %route, "Route names are not alphanumeric");
            return Ok(DispatchOutcome::NotFound);
        }

        let Some(entry) = self.controllers.get(handler) else {
            debug!(handler = %handler, "No controller registered");
            return Ok(DispatchOutcome::NotFound);
        };
        let descriptor = entry.descriptor;
        let Some(spec) = descriptor.action(action).copied() else {
            debug!(controller = %descriptor.type_name(), action = %action, "Action not declared");
            return Ok(DispatchOutcome::NotFound);
        };

        let (instance, started) = ex
            .session
            .handlers
            .get_or_try_insert_with(handler, || HandlerInstance::start(entry.create()))
            .map_err(|source| DispatchError::Startup {
                handler: handler.to_string(),
                source,
            })?;
        if started {
            debug!(controller = %descriptor.type_name(), "Controller started");
        }

        if self.auth_enabled() {
            let reachable = instance.access().is_reachable(
                action,
                ex.auth.current_auth_level(),
                ex.auth.is_authenticated(),
            )?;
            if !reachable {
                warn!(
                    route = %route,
                    level = ex.auth.current_auth_level(),
                    "Caller may not reach action"
                );
                metrics::record_access_denied(handler);
                ex.auth.on_not_authorized();
                return Ok(DispatchOutcome::NotAuthorized);
            }
        }

        let actual = route.params().len();
        if !spec.accepts(actual) {
            return Err(DispatchError::Arity {
                route: route.action_key(),
                required: spec.required,
                optional: spec.optional,
                actual,
            });
        }

        let redirect = instance
            .invoke(handler, action, route.params())
            .map_err(|source| DispatchError::Action {
                route: route.action_key(),
                source,
            })?;

        if let Some(target) = redirect {
            if depth >= MAX_REDIRECTS {
                return Err(DispatchError::RedirectLoop(MAX_REDIRECTS));
            }
            debug!(from = %route, to = %target, "Internal redirect");
            return self.run(&target, ex, depth + 1);
        }

        let view = instance.view();
        if view.should_render() {
            let target = match instance.layout() {
                Some(layout) => RenderTarget::Layout {
                    layout,
                    view: Some(view),
                },
                None => RenderTarget::View(view),
            };
            self.renderer.render(target, &mut ex.body)?;
        }

        ex.session.set_current_route(route.to_string());
        Ok(DispatchOutcome::Rendered)
    }
}

fn record(result: &Result<DispatchOutcome, DispatchError>, start: Instant) {
    match result {
        Ok(outcome) => {
            debug!(outcome = outcome.as_str(), "Dispatch finished");
            metrics::record_dispatch_outcome(outcome.as_str(), start);
        }
        Err(e) => {
            warn!(error = %e, "Dispatch failed");
            metrics::record_dispatch_error(e.kind(), start);
        }
    }
}
