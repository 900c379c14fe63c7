use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use substrate_replenishment::cli::{self, CheckArgs, Cli, Commands, GlobalOpts, RunArgs};
use substrate_replenishment::config::{self, APP_NAME, APP_VERSION};
use substrate_replenishment::db::{open_database, repository::count_documents};
use substrate_replenishment::pipeline::diagnostic::resolve_dump_dir;
use substrate_replenishment::pipeline::inference::{InferenceError, OpenRouterClient};
use substrate_replenishment::pipeline::replenishment::prompt::load_system_prompt;
use substrate_replenishment::pipeline::replenishment::{
    BatchRunner, DecisionEngine, JsonCheckpointStore, ReplenishmentError, ResponseParser,
    SqliteStockStore, StockDocumentStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    substrate_replenishment::init_tracing(cli.global.verbose);
    tracing::info!("{} v{}", APP_NAME, APP_VERSION);

    let outcome = match cli.command {
        Some(Commands::Families) => list_families(&cli.global),
        Some(Commands::Check(args)) => check(&cli.global, &args),
        None => run_batch(&cli.global, &cli.run).await,
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            eprintln!("Error: {e}");
            if let ReplenishmentError::FamilyNotFound { available, .. } = &e {
                eprintln!("Available families:");
                for key in available {
                    eprintln!("  {key}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run_batch(global: &GlobalOpts, args: &RunArgs) -> Result<ExitCode, ReplenishmentError> {
    let mut settings = args.settings(global);
    settings.api_key = config::api_key_from_env();
    if !config::is_known_model(&settings.model) {
        tracing::warn!(
            model = %settings.model,
            known = ?config::KNOWN_MODELS,
            "Model is not among the known models, its output format is unverified"
        );
    }

    let system_prompt = load_system_prompt(settings.system_prompt_path.as_deref())?;
    let store = SqliteStockStore::new(open_database(&settings.database_path)?);
    let checkpoint = JsonCheckpointStore::new(&settings.checkpoint_path);

    let api_key = settings.api_key.as_deref().ok_or(InferenceError::MissingApiKey)?;
    let mut client = OpenRouterClient::new(
        &settings.endpoint,
        api_key,
        Some(settings.batch.request_timeout),
        settings.batch.retry_policy(),
    )?;
    if let Ok(referer) = std::env::var(config::REFERER_VAR) {
        client = client.with_referer(referer);
    }

    let parser = ResponseParser::with_dump_dir(resolve_dump_dir(Some(&settings.debug_dir)));
    let engine = DecisionEngine::new(Arc::new(client), parser, system_prompt, settings.model.clone());
    let runner = BatchRunner::new(engine, settings.batch.clone());

    let summary = runner.run(&store, &checkpoint, &args.options()).await?;
    println!("{summary}");
    println!("Checkpoint: {}", checkpoint.path().display());
    Ok(ExitCode::SUCCESS)
}

fn list_families(global: &GlobalOpts) -> Result<ExitCode, ReplenishmentError> {
    let store = SqliteStockStore::new(open_database(&cli::database_path(global))?);
    let families = store.load_families()?;
    for family in families.values() {
        println!("{}\t{}", family.key, family.len());
    }
    println!("{} families", families.len());
    Ok(ExitCode::SUCCESS)
}

fn check(global: &GlobalOpts, args: &CheckArgs) -> Result<ExitCode, ReplenishmentError> {
    let mut healthy = true;

    match config::api_key_from_env() {
        Some(_) => println!("API key:   found"),
        None => {
            healthy = false;
            println!("API key:   missing (set {})", config::API_KEY_VARS.join(" or "));
        }
    }

    let db_path = cli::database_path(global);
    match open_database(&db_path).and_then(|conn| count_documents(&conn)) {
        Ok(count) => println!("Database:  {} ({count} documents)", db_path.display()),
        Err(e) => {
            healthy = false;
            println!("Database:  {} unusable: {e}", db_path.display());
        }
    }

    match load_system_prompt(args.system_prompt.as_deref()) {
        Ok(prompt) => println!("Prompt:    {} chars", prompt.chars().count()),
        Err(e) => {
            healthy = false;
            println!("Prompt:    {e}");
        }
    }

    println!("Models:    {}", config::KNOWN_MODELS.join(", "));

    Ok(if healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
