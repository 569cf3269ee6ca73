use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use oracle_adapters::default_registry;
use oracle_core::{InMemoryStore, StandardCron, Store};
use oracle_node::{NodeConfig, NodeError, OracleNode};
use oracle_persistence::pg::{build_pool, PgStore, PoolProvider};

/// Nodo oráculo: jobs, service agreements y ejecución programada.
#[derive(Parser, Debug)]
#[command(name = "oracle-node", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scheduler + workers hasta Ctrl-C.
    Serve {
        /// JobSpecs a crear antes de arrancar.
        #[arg(long = "jobs")]
        jobs: Vec<PathBuf>,
    },
    /// Crea un JobSpec desde un archivo JSON.
    CreateJob { file: PathBuf },
    /// Crea un service agreement desde un archivo JSON.
    CreateAgreement { file: PathBuf },
    /// Muestra un JobSpec y sus runs.
    ShowJob { id: String },
    /// Dispara un run web y lo ejecuta.
    RunJob {
        id: String,
        /// Input JSON del primer task.
        #[arg(long)]
        input: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oracle_node=info,oracle_core=info,oracle_persistence=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let config = NodeConfig::from_env().context("configuración inválida")?;

    let registry = default_registry();
    let cron = Arc::new(StandardCron);
    match &config.database {
        Some(db) => {
            let pool = build_pool(&db.url, db.min_connections, db.max_connections).context("no se pudo conectar a Postgres")?;
            let store = Arc::new(PgStore::new(PoolProvider { pool }));
            dispatch(OracleNode::new(store, registry, cron), cli.command, &config).await
        }
        None => {
            warn!("DATABASE_URL no definido: usando store en memoria (nada persiste al salir)");
            let store = Arc::new(InMemoryStore::new());
            dispatch(OracleNode::new(store, registry, cron), cli.command, &config).await
        }
    }
}

async fn dispatch<S: Store + 'static>(node: OracleNode<S>, command: Command, config: &NodeConfig) -> Result<ExitCode> {
    match command {
        Command::Serve { jobs } => {
            for path in &jobs {
                let raw = fs::read(path).with_context(|| format!("no se pudo leer {}", path.display()))?;
                match node.create_job(&raw) {
                    Ok(spec) => info!("job {} cargado desde {}", spec.id, path.display()),
                    Err(e) => return Ok(report(&e)),
                }
            }
            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C recibido, deteniendo");
                    let _ = stop_tx.send(true);
                }
            });
            node.serve(config.worker_concurrency, config.scheduler_interval, stop_rx).await?;
        }
        Command::CreateJob { file } => {
            let raw = fs::read(&file).with_context(|| format!("no se pudo leer {}", file.display()))?;
            match node.create_job(&raw) {
                Ok(spec) => print_json(&spec)?,
                Err(e) => return Ok(report(&e)),
            }
        }
        Command::CreateAgreement { file } => {
            let raw = fs::read(&file).with_context(|| format!("no se pudo leer {}", file.display()))?;
            let signer = config.signer()?;
            match node.create_service_agreement(&raw, &signer) {
                Ok(agreement) => print_json(&agreement)?,
                Err(e) => return Ok(report(&e)),
            }
        }
        Command::ShowJob { id } => {
            let shown = node.job_spec(&id).and_then(|spec| Ok((spec, node.job_runs_for(&id)?)));
            match shown {
                Ok((spec, runs)) => print_json(&serde_json::json!({ "job": spec, "runs": runs }))?,
                Err(e) => return Ok(report(&e)),
            }
        }
        Command::RunJob { id, input } => {
            let input: Value = match input {
                Some(raw) => serde_json::from_str(&raw).context("--input no es JSON válido")?,
                None => Value::Null,
            };
            let run = match node.trigger_web(&id, input) {
                Ok(Some(run)) => run,
                Ok(None) => {
                    warn!("job {} fuera de su ventana de validez; no se creó ningún run", id);
                    return Ok(ExitCode::SUCCESS);
                }
                Err(e) => return Ok(report(&e)),
            };
            match node.execute_run(&run.id).await {
                Ok(done) => print_json(&done)?,
                Err(e) => return Ok(report(&e)),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Imprime el documento `{"errors":[...]}` y elige el código de salida.
fn report(err: &NodeError) -> ExitCode {
    println!("{}", err.to_document().to_json());
    if err.is_not_found() {
        ExitCode::from(4)
    } else {
        ExitCode::from(2)
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
