use anyhow::{Context as _, Result};
use tether::links::TETHER_VERSION;
use tether::{link, runner, unlink, Context, LinkReport, Resolver, Settings};
use crate::cli::{TetherCommand, CLI};

/// Env var that overrides the configured log level.
const LOG_ENV: &str = "TETHER_LOG";

/// Runs one command and returns the process exit code.
pub fn execute(cli: CLI) -> Result<i32> {
    if cli.command == TetherCommand::Version {
        println!("tether {TETHER_VERSION}");
        return Ok(0);
    }

    let ctx = Context::load().context("Failed to load tether configuration")?;
    init_logging(&ctx.settings);
    for source in &ctx.settings.sources {
        log::debug!("Loaded settings from {}", source.display());
    }

    match cli.command {
        TetherCommand::Link { names, overwrite } => {
            execute_link(&ctx, &names, overwrite)
        }
        TetherCommand::Unlink { names, force } => {
            execute_unlink(&ctx, &names, force)
        }
        TetherCommand::Run { bin, version, name, args } => {
            execute_run(&ctx, &name, bin.as_deref(), version.as_deref(), &args)
        }
        TetherCommand::SyncCatalog => {
            execute_sync_catalog(&ctx)
        }
        TetherCommand::List => {
            execute_list(&ctx)
        }
        TetherCommand::Test { name, version } => {
            let status = runner::self_test(&ctx, &name, version.as_deref())
                .with_context(|| format!("Self-test of {name} failed"))?;
            Ok(status.code().unwrap_or(1))
        }
        TetherCommand::Version => Ok(0),
    }
}

fn init_logging(settings: &Settings) {
    env_logger::Builder::new()
        .filter_level(settings.log_level)
        .parse_env(env_logger::Env::new().filter(LOG_ENV))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn exit_code(report: &LinkReport) -> i32 {
    report.failures().min(255) as i32
}

pub fn execute_link(ctx: &Context, names: &[String], overwrite: bool) -> Result<i32> {
    let report = link(ctx, names, overwrite)?;
    for name in &report.not_found {
        eprintln!("No package found named {name}. Linked it as its own binary.");
    }
    Ok(exit_code(&report))
}

pub fn execute_unlink(ctx: &Context, names: &[String], force: bool) -> Result<i32> {
    let report = unlink(ctx, names, force)?;
    Ok(exit_code(&report))
}

pub fn execute_run(
    ctx: &Context,
    name: &str,
    bin: Option<&str>,
    version: Option<&str>,
    args: &[String],
) -> Result<i32> {
    let status = runner::run(ctx, name, bin, version, args)
        .with_context(|| format!("Failed to run {name}"))?;
    Ok(status.code().unwrap_or(1))
}

pub fn execute_sync_catalog(ctx: &Context) -> Result<i32> {
    let catalog = ctx.catalog()?;
    catalog.sync()?;
    println!("Catalog synced at {}", catalog.path().display());
    Ok(0)
}

pub fn execute_list(ctx: &Context) -> Result<i32> {
    let catalog = ctx.catalog()?;
    catalog.ensure_present()?;
    let names = catalog.packages()?;
    if names.is_empty() {
        println!("No packages");
        return Ok(0);
    }
    let resolver = Resolver::new(ctx, catalog.as_ref());
    for name in names {
        match resolver.template(&name) {
            Ok(template) if !template.description.is_empty() => {
                println!("{name}@{}: {}", template.version, template.description);
            }
            Ok(template) => println!("{name}@{}", template.version),
            Err(e) => println!("{name}: {e}"),
        }
    }
    Ok(0)
}
