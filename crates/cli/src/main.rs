use api_shared::{HealthService, MapSetDto, MappingDto, PlanRes, ReconcileRes};
use clap::{Parser, Subcommand};
use rms_core::constants::INTERNATIONAL_MODULE_ID;
use rms_core::planner::{plan, PlanInput};
use rms_core::precedence::resolve_active;
use rms_core::{CoreConfig, Mapping, MappingService};
use rms_types::BranchPath;
use serde::de::DeserializeOwned;
use snowstorm_client::SnowstormClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "rms")]
#[command(about = "SNOMED CT map reconciliation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the CLI is wired up
    Health,
    /// Plan a reconciliation offline from JSON mapping files
    Plan {
        /// Submitted mapping (JSON)
        #[arg(long)]
        submitted: PathBuf,
        /// Every active remote entry of the source code, International and local (JSON)
        #[arg(long)]
        active: PathBuf,
        /// Active International entries (JSON); taken from `--active` when omitted
        #[arg(long)]
        international: Option<PathBuf>,
        /// Inactive local entries (JSON)
        #[arg(long)]
        inactive: Option<PathBuf>,
        /// Local edition module id
        #[arg(long)]
        module: String,
        /// International module id
        #[arg(long, default_value = INTERNATIONAL_MODULE_ID)]
        international_module: String,
    },
    /// Reconcile a mapping against the configured terminology server
    Reconcile {
        /// Map set (JSON)
        #[arg(long)]
        map_set: PathBuf,
        /// Submitted mapping (JSON)
        #[arg(long)]
        mapping: PathBuf,
    },
    /// Merge one branch into another on the configured terminology server
    Merge {
        /// Source branch path
        source: String,
        /// Target branch path
        target: String,
        /// Commit comment
        #[arg(long)]
        comment: Option<String>,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("rms=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => {
            let health = HealthService::check_health();
            println!("{}", health.message);
        }
        Some(Commands::Plan {
            submitted,
            active,
            international,
            inactive,
            module,
            international_module,
        }) => match plan_offline(
            &submitted,
            &active,
            international.as_deref(),
            inactive.as_deref(),
            &module,
            &international_module,
        ) {
            Ok(res) => println!("{}", serde_json::to_string_pretty(&res)?),
            Err(e) => eprintln!("Error planning mapping: {}", e),
        },
        Some(Commands::Reconcile { map_set, mapping }) => {
            match reconcile(&map_set, &mapping).await {
                Ok(res) => println!("{}", serde_json::to_string_pretty(&res)?),
                Err(e) => eprintln!("Error reconciling mapping: {}", e),
            }
        }
        Some(Commands::Merge {
            source,
            target,
            comment,
        }) => match merge(source, target, comment).await {
            Ok(status) => println!("Merge finished with status {}", status),
            Err(e) => eprintln!("Error merging branches: {}", e),
        },
        None => {
            println!("Use 'rms --help' for commands");
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?)
}

fn read_mapping(path: &Path) -> CliResult<Mapping> {
    Ok(Mapping::from(read_json::<MappingDto>(path)?))
}

fn plan_offline(
    submitted: &Path,
    active: &Path,
    international: Option<&Path>,
    inactive: Option<&Path>,
    module: &str,
    international_module: &str,
) -> CliResult<PlanRes> {
    let submitted = read_mapping(submitted)?;
    let pool = read_mapping(active)?;
    let international = match international {
        Some(path) => read_mapping(path)?,
        None => Mapping::new(
            pool.code.clone(),
            pool.entries
                .iter()
                .filter(|e| e.module_id == international_module)
                .cloned()
                .collect(),
        ),
    };
    let inactive = match inactive {
        Some(path) => read_mapping(path)?,
        None => Mapping::new(submitted.code.clone(), Vec::new()),
    };
    let active = Mapping::new(
        pool.code.clone(),
        resolve_active(pool.entries, international_module).entries,
    );

    let planned = plan(&PlanInput {
        submitted: &submitted,
        existing_active: &active,
        existing_active_international: &international,
        existing_inactive_local: &inactive,
        local_module_id: module,
        international_module_id: international_module,
    })?;
    Ok(PlanRes::from(&planned))
}

fn service_from_env() -> CliResult<MappingService> {
    let cfg = Arc::new(CoreConfig::from_lookup(|name| std::env::var(name).ok())?);
    let client = Arc::new(SnowstormClient::from_config(&cfg)?);
    Ok(MappingService::new(cfg, client.clone(), Some(client)))
}

async fn reconcile(map_set: &Path, mapping: &Path) -> CliResult<ReconcileRes> {
    let service = service_from_env()?;
    let map_set = read_json::<MapSetDto>(map_set)?
        .into_map_set(service.config().module_id().as_str())?;
    let outcome = service.reconcile(&map_set, read_mapping(mapping)?).await?;
    Ok(ReconcileRes::from(&outcome))
}

async fn merge(source: String, target: String, comment: Option<String>) -> CliResult<String> {
    let service = service_from_env()?;
    let source = BranchPath::new(source)?;
    let target = BranchPath::new(target)?;
    let comment = comment.unwrap_or_else(|| format!("Merge {} into {}", source, target));
    let status = service.merge(&source, &target, &comment).await?;
    Ok(status.status)
}
