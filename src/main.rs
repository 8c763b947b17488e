use skywise::app::App;
use skywise::catalog::CourseRecord;
use skywise::cli::{Cli, Commands, ConfigAction, IndexAction};
use skywise::config::{Config, ConfigValidator};
use skywise::error::{Result, SkywiseError};
use skywise::indexing::{RebuildOutcome, SyncOutcome};
use skywise::recommend::SearchQuery;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error [{}]: {}", e.status().http_code(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Index { action } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_index(&config, action).await?;
        }
        Commands::Search {
            query,
            exclude,
            top_n,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let mut query =
                SearchQuery::text(query).with_top_n(top_n.unwrap_or(config.recommend.default_top_n));
            if let Some(course_id) = exclude {
                query = query.with_exclude(course_id);
            }
            let app = start_app(&config).await?;
            print_courses(app.service.search(&query).await, json)?;
        }
        Commands::Similar {
            course_id,
            top_n,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let query = SearchQuery::similar_to(course_id)
                .with_top_n(top_n.unwrap_or(config.recommend.default_top_n));
            let app = start_app(&config).await?;
            print_courses(app.service.search(&query).await, json)?;
        }
        Commands::Recommend {
            user_id,
            top_n,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let top_n = top_n.unwrap_or(config.recommend.default_top_n);
            let app = start_app(&config).await?;
            print_courses(app.service.recommend_for_user(user_id, top_n).await, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "skywise=debug" } else { "skywise=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the app and wait for the startup sync so one-shot queries see a
/// populated index
async fn start_app(config: &Config) -> Result<App> {
    let app = App::from_config(config)?;
    if let Some(handle) = app.start() {
        if let Err(e) = handle.await {
            tracing::warn!("Startup sync task ended abnormally: {}", e);
        }
    }
    Ok(app)
}

async fn cmd_index(config: &Config, action: IndexAction) -> Result<()> {
    let app = App::from_config(config)?;

    match action {
        IndexAction::Status { json } => {
            let health = app.controller.health()?;
            if json {
                println!("{}", to_json(&health)?);
                return Ok(());
            }

            println!("Index status: {}", health.status);
            println!("  Embedded courses: {}", health.indexed);
            println!("  Public courses:   {}", health.catalog_size);
            let stats = app.store.stats()?;
            if !stats.models.is_empty() {
                println!("  Models: {}", stats.models.join(", "));
            }
            if !stats.dimensions.is_empty() {
                let dims: Vec<String> = stats.dimensions.iter().map(|d| d.to_string()).collect();
                println!("  Dimensions: {}", dims.join(", "));
            }
        }
        IndexAction::Sync => match app.controller.ensure_synced().await? {
            SyncOutcome::AlreadySynced => println!("✓ Index already in sync"),
            SyncOutcome::InProgress => println!("Index rebuild already in progress"),
            SyncOutcome::NothingToIndex => println!("Catalog has no public courses to index"),
            SyncOutcome::Rebuilt(report) => println!(
                "✓ Indexed {} courses in {} batches ({} ms)",
                report.courses, report.batches, report.duration_ms
            ),
        },
        IndexAction::Rebuild => match app.controller.rebuild_all().await? {
            RebuildOutcome::AlreadyRunning => println!("Index rebuild already in progress"),
            RebuildOutcome::Completed(report) => println!(
                "✓ Indexed {} courses in {} batches ({} ms)",
                report.courses, report.batches, report.duration_ms
            ),
        },
        IndexAction::Embed { course_ids } => {
            let added = app.controller.embed_subset(&course_ids).await?;
            println!("✓ Embedded {} new courses", added);
        }
    }

    Ok(())
}

fn print_courses(result: Result<Vec<CourseRecord>>, json: bool) -> Result<()> {
    let courses = match result {
        Ok(courses) => courses,
        Err(e) => {
            if json {
                let body = serde_json::json!({
                    "status": e.status().http_code(),
                    "error": e.to_string(),
                });
                println!("{}", to_json(&body)?);
            }
            return Err(e);
        }
    };

    if json {
        let body = serde_json::json!({ "status": 200, "courses": courses });
        println!("{}", to_json(&body)?);
        return Ok(());
    }

    println!("200 OK ({} courses)", courses.len());
    for (position, course) in courses.iter().enumerate() {
        println!("  {}. [{}] {}", position + 1, course.id, course.name);
        if !course.description.is_empty() {
            println!("     {}", course.description);
        }
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            println!("{}", to_json(&config)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!(
                "  Embedding: {} ({}, {} dims)",
                config.embedding.model, config.embedding.mode, config.embedding.dimension
            );
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SkywiseError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'skywise config init' to create one."
        );
        let mut config = Config::default();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| SkywiseError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}
