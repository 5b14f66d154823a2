use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use capcall::config::CapcallConfig;
use capcall::kernel::{Dispatcher, TracingObserver};
use capcall::primitives::{CallerId, OperationId, ToolLogger};
use capcall::telemetry::{TracingLogger, init_tracing};
use capcall::tools::{CancelReason, CancellationToken, InvocationContext, ToolRegistry};
use capcall_package_updater::selection::parse_selection;
use capcall_package_updater::summary::render_summary;
use capcall_package_updater::{
    Catalogue, INSTALL_PACKAGE, LIST_PACKAGES, PackageState, ShellRunner, UPDATE_PACKAGE,
    register_tools,
};
use clap::Parser;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

/// Update user-installed packages from various sources.
#[derive(Debug, Parser)]
#[command(
    name = "package-updater",
    version,
    after_help = "Examples:\n  package-updater                    interactive selection\n  package-updater --all              update all installed packages\n  package-updater crush qwen         update specific packages\n  package-updater --list             list installed packages\n  package-updater --install fzf bat  install specific packages"
)]
struct Cli {
    /// Specific packages to update (or install with `--install`).
    packages: Vec<String>,
    /// Update all installed packages.
    #[arg(long)]
    all: bool,
    /// Install packages instead of updating.
    #[arg(long)]
    install: bool,
    /// List installed packages and exit.
    #[arg(long)]
    list: bool,
    /// Show the scripts that would run without running them.
    #[arg(long)]
    dry_run: bool,
    /// Path to a capcall TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

struct App {
    dispatcher: Dispatcher,
    caller: CallerId,
    // Session token flipped by Ctrl-C; each call runs on a child of it.
    token: CancellationToken,
    dry_run: bool,
}

impl App {
    async fn call(&self, tool: &str, input: Value) -> Result<Value, String> {
        let operation_id = OperationId::random();
        let logger: Arc<dyn ToolLogger> = Arc::new(TracingLogger::new(operation_id, tool));
        let ctx = InvocationContext::builder(self.caller.clone())
            .operation_id(operation_id)
            .logger(logger)
            .build();
        self.dispatcher
            .invoke(tool, input, ctx, self.token.child_token())
            .await
            .map(capcall::tools::ResultEnvelope::into_data)
            .map_err(|err| err.to_string())
    }

    async fn installed(&self) -> Result<Vec<(String, String)>> {
        let data = self
            .call(LIST_PACKAGES, json!({ "installed_only": true }))
            .await
            .map_err(anyhow::Error::msg)?;
        let packages = data["packages"]
            .as_array()
            .context("list_packages returned no package array")?;
        Ok(packages
            .iter()
            .filter_map(|entry| {
                Some((
                    entry["name"].as_str()?.to_owned(),
                    entry["source"].as_str()?.to_owned(),
                ))
            })
            .collect())
    }

    async fn print_installed(&self) -> Result<Vec<String>> {
        let installed = self.installed().await?;
        if installed.is_empty() {
            println!("No packages from the configured list are installed.");
            return Ok(Vec::new());
        }
        println!("\nInstalled packages:");
        for (index, (name, source)) in installed.iter().enumerate() {
            println!("  {}. {name} (source: {source})", index + 1);
        }
        Ok(installed.into_iter().map(|(name, _)| name).collect())
    }

    async fn apply(&self, tool: &str, name: &str) -> Result<(), String> {
        let (verb, done) = if tool == INSTALL_PACKAGE {
            ("installation", "installed")
        } else {
            ("update", "updated")
        };
        match self
            .call(tool, json!({ "name": name, "dry_run": self.dry_run }))
            .await
        {
            Ok(data) => {
                if self.dry_run {
                    println!("• {name}: would run `{}`", data["script"].as_str().unwrap_or_default());
                } else {
                    println!("✓ {name} {done} successfully");
                    if let Some(output) = data["output"].as_str().filter(|text| !text.is_empty()) {
                        println!("  {output}");
                    }
                }
                Ok(())
            }
            Err(message) => {
                println!("✗ {name} {verb} failed");
                println!("  Error: {message}");
                Err(message)
            }
        }
    }

    async fn apply_all(&self, tool: &str, names: &[String]) -> Vec<(String, Result<(), String>)> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            if self.token.is_cancelled() {
                break;
            }
            let outcome = self.apply(tool, name).await;
            results.push((name.clone(), outcome));
        }
        results
    }
}

async fn prompt_selection(installed: &[String]) -> Result<Vec<String>> {
    let choices: Vec<&str> = installed.iter().map(String::as_str).collect();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout
            .write_all(b"\nEnter package numbers to update (e.g., 1,3,5) or 'all': ")
            .await?;
        stdout.flush().await?;
        let Some(reply) = lines.next_line().await? else {
            return Ok(Vec::new());
        };
        if reply.trim().is_empty() {
            continue;
        }
        match parse_selection(&reply, &choices) {
            Ok(selected) => return Ok(selected.into_iter().map(str::to_owned).collect()),
            Err(message) => println!("{message}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CapcallConfig::load(cli.config.as_deref())?;
    init_tracing(&config.telemetry)?;

    let user = std::env::var("USER").unwrap_or_else(|_| "package-updater".to_owned());
    let caller = CallerId::new(user).context("caller identity")?;

    let state = PackageState::detect(Catalogue::builtin(), Arc::new(ShellRunner)).await;
    let registry = Arc::new(ToolRegistry::new());
    register_tools(&registry, &state)?;
    let dispatcher = Dispatcher::new(registry, config.dispatch_config())
        .with_observer(Arc::new(TracingObserver));

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling running tool");
            interrupt.cancel_with(CancelReason::Disconnected);
        }
    });

    let app = App {
        dispatcher,
        caller,
        token,
        dry_run: cli.dry_run,
    };

    if cli.list {
        app.print_installed().await?;
        return Ok(());
    }

    if cli.install {
        if cli.packages.is_empty() {
            bail!("no packages specified for installation, use: package-updater --install <package>...");
        }
        app.apply_all(INSTALL_PACKAGE, &cli.packages).await;
        return Ok(());
    }

    if cli.all {
        let installed: Vec<String> = app.installed().await?.into_iter().map(|(name, _)| name).collect();
        if installed.is_empty() {
            println!("No packages from the configured list are installed.");
            return Ok(());
        }
        println!("Updating {} packages...", installed.len());
        let results = app.apply_all(UPDATE_PACKAGE, &installed).await;

        print!("\n{}", render_summary(&results));
        return Ok(());
    }

    let selected = if cli.packages.is_empty() {
        let installed = app.print_installed().await?;
        if installed.is_empty() {
            return Ok(());
        }
        prompt_selection(&installed).await?
    } else {
        cli.packages.clone()
    };

    if selected.is_empty() {
        println!("No packages selected for update.");
        return Ok(());
    }
    app.apply_all(UPDATE_PACKAGE, &selected).await;
    Ok(())
}
