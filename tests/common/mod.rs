//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use front_controller::config::{parse_config, ConfigStore};
use front_controller::controller::{
    ActionContext, ActionError, ActionSpec, Controller, ControllerDescriptor, ControllerRegistry,
    Layout, Setup,
};
use front_controller::dispatch::{Dispatcher, JsonRenderer, ScriptTable};
use front_controller::lifecycle::{Application, Shutdown};
use front_controller::routing::Route;
use front_controller::HttpServer;

pub static BLOG: ControllerDescriptor = ControllerDescriptor {
    name: "blog",
    actions: &[
        ActionSpec::new("index", 0).with_optional(1),
        ActionSpec::new("show", 1),
        ActionSpec::new("edit", 1),
        ActionSpec::new("admin", 0),
        ActionSpec::new("jump", 0),
        ActionSpec::new("spin", 0),
        ActionSpec::new("quiet", 0),
        ActionSpec::new("broken", 0),
    ],
};

/// Blog controller. `index` and `show` are open, `edit` needs level 2
/// unless `open_edit` is set, `admin` needs level 5, everything else the
/// default level 1.
pub struct BlogController {
    starts: Arc<AtomicUsize>,
    open_edit: bool,
    views: u64,
}

impl Controller for BlogController {
    fn descriptor(&self) -> &'static ControllerDescriptor {
        &BLOG
    }

    fn start(&mut self, setup: &mut Setup<'_>) -> Result<(), ActionError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        setup.access.open_actions(["index", "show"])?;
        setup.access.set_level_for_action("edit", 2)?;
        setup.access.set_level_for_action("admin", 5)?;
        if self.open_edit {
            setup.access.open_action("edit")?;
        }
        *setup.layout = Some(Layout::new("main"));
        Ok(())
    }

    fn invoke(
        &mut self,
        action: &str,
        params: &[String],
        ctx: &mut ActionContext<'_>,
    ) -> Result<(), ActionError> {
        self.views += 1;
        ctx.view.assign("views", self.views);
        match action {
            "index" => {
                if let Some(page) = params.first() {
                    ctx.view.assign("page", page.as_str());
                }
            }
            "show" | "edit" => ctx.view.assign("id", params[0].as_str()),
            "jump" => ctx.redirect(Route::new("blog", "show", vec!["1".to_string()])),
            "spin" => ctx.redirect(Route::new("blog", "spin", Vec::new())),
            "quiet" => ctx.view.no_render(),
            "broken" => return Err(ActionError::failed("database unavailable")),
            _ => {}
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Value, ActionError> {
        Ok(serde_json::json!({ "views": self.views }))
    }

    fn restore(&mut self, state: Value) -> Result<(), ActionError> {
        self.views = state["views"].as_u64().unwrap_or_default();
        Ok(())
    }
}

/// Registry holding the blog controller, plus its startup counter.
pub fn blog_registry(open_edit: bool) -> (ControllerRegistry, Arc<AtomicUsize>) {
    let starts = Arc::new(AtomicUsize::new(0));
    let counter = starts.clone();
    let mut registry = ControllerRegistry::new();
    registry
        .register(&BLOG, move || {
            Box::new(BlogController {
                starts: counter.clone(),
                open_edit,
                views: 0,
            })
        })
        .unwrap();
    (registry, starts)
}

pub fn config(document: &str) -> Arc<ConfigStore> {
    let (config, extra) = parse_config(document).unwrap();
    Arc::new(ConfigStore::with_extra(config, extra).unwrap())
}

pub const AUTH_ON: &str = "[auth]\nenabled = true\n";

pub fn dispatcher(registry: ControllerRegistry, config: Arc<ConfigStore>) -> Dispatcher {
    Dispatcher::new(Arc::new(registry), Arc::new(JsonRenderer), config)
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

/// Serve `app` on an ephemeral port. The handle completes once the server
/// has drained and flushed its sessions.
pub async fn start_server(app: Application) -> (SocketAddr, Shutdown, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(app);
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown, handle)
}

/// Application with the blog controller and an `about` script.
pub fn blog_app(document: &str, open_edit: bool) -> (Application, Arc<AtomicUsize>) {
    let (registry, starts) = blog_registry(open_edit);
    let mut scripts = ScriptTable::new();
    scripts.insert_fn("about", |ctx| {
        ctx.body.push_str("about us");
        Ok(())
    });

    let app = Application::build(config(document), registry, Arc::new(scripts), Arc::new(JsonRenderer))
        .unwrap();
    (app, starts)
}
