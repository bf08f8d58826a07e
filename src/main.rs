use clap::Parser;
use wfs_extractor::config::{CheckArgs, Command, FilterArgs};
use wfs_extractor::core::query::intersects_filter;
use wfs_extractor::domain::model::{AttributeDescriptor, AttributeType, GeometryKind, RemoteSchema};
use wfs_extractor::utils::{logger, validation::Validate};
use wfs_extractor::{CliConfig, ExtractorConfig, ExtractorError, PermissionChecker, TrustPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    let file_config = match load_file_config(&config) {
        Ok(file_config) => file_config,
        Err(e) => fail(e),
    };

    // 初始化日誌
    match &file_config {
        Some(file_config) if file_config.json_logging() => {
            logger::init_json_logger(if config.verbose {
                "debug"
            } else {
                file_config.log_level()
            })
        }
        _ => logger::init_cli_logger(config.verbose),
    }

    tracing::info!("Starting wfs-extractor CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        fail(e);
    }

    let outcome = match &config.command {
        Command::Check(args) => run_check(args, file_config.as_ref()).await,
        Command::Filter(args) => run_filter(args),
    };

    if let Err(e) = outcome {
        tracing::error!("{} (Category: {:?})", e, e.category());
        fail(e);
    }

    Ok(())
}

fn load_file_config(config: &CliConfig) -> wfs_extractor::Result<Option<ExtractorConfig>> {
    let Some(path) = &config.config else {
        return Ok(None);
    };
    let file_config = ExtractorConfig::from_file(path)?;
    file_config.validate()?;
    Ok(Some(file_config))
}

async fn run_check(
    args: &CheckArgs,
    file_config: Option<&ExtractorConfig>,
) -> wfs_extractor::Result<()> {
    let checker = file_config
        .map(PermissionChecker::from_config)
        .unwrap_or_else(|| PermissionChecker::new(TrustPolicy::new(args.secure_host.clone())));
    let resolved = checker
        .check_permission(args.to_request()?, &args.caller())
        .await?;

    println!("{}", resolved.wfs_name());
    Ok(())
}

fn run_filter(args: &FilterArgs) -> wfs_extractor::Result<()> {
    let schema = RemoteSchema {
        type_name: String::new(),
        attributes: vec![AttributeDescriptor::new(
            args.geometry_attribute.clone(),
            AttributeType::Geometry(GeometryKind::Geometry),
        )],
        geometry_attribute: args.geometry_attribute.clone(),
        native_crs: args.native_crs,
    };

    let filter = intersects_filter(&args.envelope()?, &schema)?;
    println!("{}", filter.to_xml());
    Ok(())
}

fn fail(e: ExtractorError) -> ! {
    eprintln!("{}", e.user_friendly_message());
    std::process::exit(e.exit_code());
}
