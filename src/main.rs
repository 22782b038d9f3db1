// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use wms_rs::steps::{FileStorage, MemoryStorage, StepWorkflowStore, Storage};
use wms_rs::wms::config::Settings;
use wms_rs::wms::graphql::{Forwarder, HttpGraphqlClient, RouteLoader};
use wms_rs::wms::server::{self, AppState};
use wms_rs::wms::workflow::{PlanLoader, PlanRegistry, StepDriver};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides WMS_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Forward routes file (overrides WMS_ROUTES_FILE)
        #[arg(short, long)]
        routes: Option<PathBuf>,

        /// Extra process plans (overrides WMS_PLANS_FILE)
        #[arg(long)]
        plans: Option<PathBuf>,

        /// Workflow state directory (overrides WMS_STORAGE_DIR)
        #[arg(long)]
        storage_dir: Option<PathBuf>,

        /// Keep workflow state in memory only
        #[arg(long)]
        memory: bool,
    },
    /// Inspect or drive a process state in the file store
    Step {
        #[command(subcommand)]
        action: StepAction,

        /// Workflow state directory (overrides WMS_STORAGE_DIR)
        #[arg(long, global = true)]
        storage_dir: Option<PathBuf>,
    },
    /// List the registered process plans
    Plans {
        /// Extra process plans (overrides WMS_PLANS_FILE)
        #[arg(long)]
        plans: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum StepAction {
    /// Print the state of a process
    Show { process: String },
    /// Enter the first step of the process plan
    Start { process: String },
    /// Enter an arbitrary first step
    Init { process: String, first: u32 },
    /// Claim a later step, optionally completing it
    Advance {
        process: String,
        target: u32,
        /// JSON payload completing the step
        #[arg(long)]
        data: Option<String>,
    },
    /// Store the payload of the current step
    Complete {
        process: String,
        step: u32,
        data: String,
    },
    /// Complete a step and claim the next plan step
    Submit {
        process: String,
        step: u32,
        data: String,
    },
    /// Go back from a step to its predecessor
    Back { process: String, step: u32 },
    /// Drop the state of a process
    Reset { process: String },
    /// Drop the state of every process
    ResetAll,
    /// List processes that have state
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    match args.command {
        Commands::Serve {
            port,
            routes,
            plans,
            storage_dir,
            memory,
        } => {
            server::init_tracing();

            let storage: Arc<dyn Storage> = if memory {
                log::warn!("Workflow state is kept in memory and lost on exit");
                Arc::new(MemoryStorage::new())
            } else {
                let dir = storage_dir.unwrap_or_else(|| settings.storage_dir.clone());
                Arc::new(FileStorage::open(&dir).with_context(|| format!("opening {:?}", dir))?)
            };

            let routes = match routes.or_else(|| settings.routes_file.clone()) {
                Some(path) => RouteLoader::load_routes(&path)
                    .with_context(|| format!("loading routes from {:?}", path))?,
                None => {
                    log::warn!("No routes file configured, only passthrough is available");
                    Vec::new()
                }
            };
            for route in &routes {
                log::info!("Registered route: {}", route.name);
            }

            let backend = Arc::new(HttpGraphqlClient::new(settings.graphql_url.clone()));
            log::info!("Forwarding to {}", backend.endpoint());

            let state = AppState {
                store: StepWorkflowStore::new(storage),
                plans: load_plans(plans.or_else(|| settings.plans_file.clone())).await?,
                forwarder: Arc::new(Forwarder::new(backend, routes)),
                token_cookie: settings.token_cookie.clone(),
            };
            server::serve(state, port.unwrap_or(settings.port)).await?;
        }
        Commands::Step {
            action,
            storage_dir,
        } => {
            let dir = storage_dir.unwrap_or_else(|| settings.storage_dir.clone());
            let store = StepWorkflowStore::new(Arc::new(FileStorage::open(&dir)?));
            let plans = load_plans(settings.plans_file.clone()).await?;
            run_step_action(&store, &plans, action).await?;
        }
        Commands::Plans { plans } => {
            let registry = load_plans(plans.or(settings.plans_file)).await?;
            for name in registry.names().await {
                if let Some(plan) = registry.get(&name).await {
                    println!("{}: {}", plan.process, plan.description);
                    for step in &plan.steps {
                        let marker = if step.auto_skip { " (auto-skip)" } else { "" };
                        println!("  {:>4}  {}{}", step.number, step.label, marker);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn load_plans(path: Option<PathBuf>) -> anyhow::Result<PlanRegistry> {
    let registry = PlanRegistry::with_builtins();
    if let Some(path) = path {
        let plans = PlanLoader::new()
            .load_plans(&path)
            .with_context(|| format!("loading plans from {:?}", path))?;
        for plan in plans {
            log::info!("Registered plan: {}", plan.process);
            registry.register(plan).await;
        }
    }
    Ok(registry)
}

async fn driver_for(
    store: &StepWorkflowStore,
    plans: &PlanRegistry,
    process: &str,
) -> anyhow::Result<StepDriver> {
    let plan = plans
        .get(process)
        .await
        .with_context(|| format!("no plan for process '{}'", process))?;
    Ok(StepDriver::new(store.clone(), plan)?)
}

fn parse_data(data: &str) -> anyhow::Result<Value> {
    serde_json::from_str(data).with_context(|| format!("invalid JSON payload: {}", data))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_step_action(
    store: &StepWorkflowStore,
    plans: &PlanRegistry,
    action: StepAction,
) -> anyhow::Result<()> {
    match action {
        StepAction::Show { process } => print_json(&store.load(&process)?),
        StepAction::Start { process } => {
            let driver = driver_for(store, plans, &process).await?;
            print_json(&driver.start()?)
        }
        StepAction::Init { process, first } => print_json(&store.initialize(&process, first)?),
        StepAction::Advance {
            process,
            target,
            data,
        } => {
            let data = data.as_deref().map(parse_data).transpose()?;
            let state = store.load(&process)?;
            print_json(&store.advance(&process, &state, target, data)?)
        }
        StepAction::Complete {
            process,
            step,
            data,
        } => print_json(&store.complete(&process, step, parse_data(&data)?)?),
        StepAction::Submit {
            process,
            step,
            data,
        } => {
            let driver = driver_for(store, plans, &process).await?;
            print_json(&driver.submit(step, parse_data(&data)?)?)
        }
        StepAction::Back { process, step } => {
            let state = store.load(&process)?;
            print_json(&store.back(&process, &state, step)?)
        }
        StepAction::Reset { process } => {
            store.reset(&process)?;
            println!("Reset {}", process);
            Ok(())
        }
        StepAction::ResetAll => {
            let removed = store.reset_all()?;
            println!("Removed {} process state(s)", removed);
            Ok(())
        }
        StepAction::List => {
            for process in store.processes()? {
                println!("{}", process);
            }
            Ok(())
        }
    }
}
