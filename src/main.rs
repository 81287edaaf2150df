//! Front controller server.
//!
//! ```text
//! front-controller --config app.toml
//! ```
//!
//! Serves a small `index` controller to show the dispatcher end to end.
//! Applications embed the library and register their own controllers.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tokio::net::TcpListener;

use front_controller::config::{load_store, AppConfig, ConfigStore};
use front_controller::controller::{
    ActionContext, ActionError, ActionSpec, Controller, ControllerDescriptor, ControllerRegistry, Setup,
};
use front_controller::dispatch::{JsonRenderer, ScriptTable};
use front_controller::lifecycle::{signals, Application, Shutdown};
use front_controller::observability::logging;
use front_controller::HttpServer;

#[derive(Parser)]
#[command(name = "front-controller")]
#[command(about = "Session-aware front controller", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

static INDEX: ControllerDescriptor = ControllerDescriptor {
    name: "index",
    actions: &[ActionSpec::new("index", 0), ActionSpec::new("hello", 0).with_optional(1)],
};

/// Greets callers and counts visits per session.
#[derive(Default)]
struct IndexController {
    visits: u64,
}

impl Controller for IndexController {
    fn descriptor(&self) -> &'static ControllerDescriptor {
        &INDEX
    }

    fn start(&mut self, setup: &mut Setup<'_>) -> Result<(), ActionError> {
        setup.access.open_all();
        Ok(())
    }

    fn invoke(
        &mut self,
        action: &str,
        params: &[String],
        ctx: &mut ActionContext<'_>,
    ) -> Result<(), ActionError> {
        self.visits += 1;
        ctx.view.assign("visits", self.visits);
        if action == "hello" {
            let name = params.first().map(String::as_str).unwrap_or("world");
            ctx.view.assign("greeting", format!("Hello, {name}!"));
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Value, ActionError> {
        Ok(Value::from(self.visits))
    }

    fn restore(&mut self, state: Value) -> Result<(), ActionError> {
        self.visits = state.as_u64().unwrap_or_default();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => load_store(path)?,
        None => ConfigStore::new(AppConfig::default())?,
    };
    let config = Arc::new(store);
    let settings = config.config();

    logging::init_logging(&settings.observability)?;
    tracing::info!("front-controller v{} starting", env!("CARGO_PKG_VERSION"));

    let mut controllers = ControllerRegistry::new();
    controllers.register(&INDEX, || Box::new(IndexController::default()))?;

    let app = Application::build(
        config,
        controllers,
        Arc::new(ScriptTable::new()),
        Arc::new(JsonRenderer),
    )?;
    app.start_metrics();

    // Dropping the watcher stops reloads.
    let _watcher = match &cli.config {
        Some(path) => Some(app.watch_config(path)?),
        None => None,
    };

    let listener = TcpListener::bind(&settings.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        request_timeout_secs = settings.timeouts.request_secs,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    app.spawn_session_sweeper(&shutdown);

    HttpServer::new(app).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
