//! Package tools registered with the dispatcher.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use capcall::primitives::{LogLevel, Tag};
use capcall::schema::{FieldSpec, FieldType, ParameterSchema, ValidatedInput};
use capcall::tools::{
    CancellationToken, ExecutorError, ExecutorResult, InvocationContext, RegistryError,
    RegistryResult, ToolDescriptor, ToolExecutor, ToolOutput, ToolRegistry,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::catalogue::{Catalogue, Package};
use crate::runner::CommandRunner;

/// Limit applied to install and upgrade scripts.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Name of the listing tool.
pub const LIST_PACKAGES: &str = "list_packages";
/// Name of the upgrade tool.
pub const UPDATE_PACKAGE: &str = "update_package";
/// Name of the install tool.
pub const INSTALL_PACKAGE: &str = "install_package";

/// Catalogue plus the set of packages detected on this machine.
pub struct PackageState {
    catalogue: Catalogue,
    runner: Arc<dyn CommandRunner>,
    installed: RwLock<BTreeSet<&'static str>>,
}

impl PackageState {
    /// Probes every catalogue entry and records which are installed.
    pub async fn detect(catalogue: Catalogue, runner: Arc<dyn CommandRunner>) -> Arc<Self> {
        let state = Arc::new(Self {
            catalogue,
            runner,
            installed: RwLock::new(BTreeSet::new()),
        });
        state.refresh().await;
        state
    }

    /// Re-probes the catalogue.
    ///
    /// # Panics
    ///
    /// Panics if the installed-set lock is poisoned.
    pub async fn refresh(&self) {
        let mut found = BTreeSet::new();
        for package in self.catalogue.iter() {
            if self.runner.is_available(package.command).await {
                found.insert(package.name);
            }
        }
        debug!(installed = found.len(), known = self.catalogue.len(), "package detection finished");
        *self.installed.write().expect("installed set poisoned") = found;
    }

    /// Returns `true` when the named package was detected.
    ///
    /// # Panics
    ///
    /// Panics if the installed-set lock is poisoned.
    #[must_use]
    pub fn is_installed(&self, name: &str) -> bool {
        self.installed
            .read()
            .expect("installed set poisoned")
            .contains(name)
    }

    /// Installed package names in order.
    ///
    /// # Panics
    ///
    /// Panics if the installed-set lock is poisoned.
    #[must_use]
    pub fn installed(&self) -> Vec<&'static str> {
        self.installed
            .read()
            .expect("installed set poisoned")
            .iter()
            .copied()
            .collect()
    }

    /// Backing catalogue.
    #[must_use]
    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    fn lookup(&self, name: &str) -> ExecutorResult<&Package> {
        self.catalogue
            .get(name)
            .ok_or_else(|| ExecutorError::failed(format!("package `{name}` not found in configuration")))
    }
}

#[derive(Debug, Deserialize)]
struct PackageParams {
    name: String,
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    installed_only: bool,
}

fn params<T: serde::de::DeserializeOwned>(input: &ValidatedInput) -> ExecutorResult<T> {
    input
        .deserialize()
        .map_err(|err| ExecutorError::Internal(anyhow::Error::new(err).context("unexpected tool input shape")))
}

#[derive(Clone, Copy)]
enum Action {
    Upgrade,
    Install,
}

impl Action {
    const fn label(self) -> &'static str {
        match self {
            Self::Upgrade => "upgrade",
            Self::Install => "install",
        }
    }

    const fn script(self, package: &Package) -> &'static str {
        match self {
            Self::Upgrade => package.upgrade,
            Self::Install => package.install,
        }
    }
}

struct ListPackages {
    state: Arc<PackageState>,
}

#[async_trait]
impl ToolExecutor for ListPackages {
    async fn execute(
        &self,
        input: ValidatedInput,
        _ctx: InvocationContext,
        token: CancellationToken,
    ) -> ExecutorResult<ToolOutput> {
        let ListParams { installed_only } = params(&input)?;
        token.check()?;

        let packages: Vec<_> = self
            .state
            .catalogue()
            .iter()
            .map(|package| (package, self.state.is_installed(package.name)))
            .filter(|(_, installed)| *installed || !installed_only)
            .map(|(package, installed)| {
                json!({
                    "name": package.name,
                    "command": package.command,
                    "source": package.source,
                    "installed": installed,
                })
            })
            .collect();

        Ok(ToolOutput::new(json!({ "packages": packages }))
            .with_metadata("installedCount", self.state.installed().len()))
    }
}

struct RunScript {
    state: Arc<PackageState>,
    action: Action,
}

#[async_trait]
impl ToolExecutor for RunScript {
    async fn execute(
        &self,
        input: ValidatedInput,
        ctx: InvocationContext,
        token: CancellationToken,
    ) -> ExecutorResult<ToolOutput> {
        let PackageParams { name, dry_run } = params(&input)?;
        let package = self.state.lookup(&name)?;
        let installed = self.state.is_installed(package.name);
        match self.action {
            Action::Upgrade if !installed => {
                return Err(ExecutorError::failed(format!("package `{name}` is not installed")));
            }
            Action::Install if installed => {
                return Err(ExecutorError::failed(format!("package `{name}` is already installed")));
            }
            _ => {}
        }

        let script = self.action.script(package);
        let action = self.action.label();
        if dry_run {
            return Ok(script_output(package, action, script, "", true));
        }

        token.check()?;
        ctx.log(LogLevel::Info, &format!("running {action} for {name}"));
        let result = self.state.runner.run(script, &token).await?;
        let output = result.output.trim().to_owned();
        if !result.success {
            return Err(ExecutorError::failed(format!("{action} of `{name}` failed: {output}")));
        }
        if matches!(self.action, Action::Install) {
            self.state.refresh().await;
        }

        Ok(script_output(package, action, script, &output, false))
    }
}

fn script_output(package: &Package, action: &str, script: &str, output: &str, dry_run: bool) -> ToolOutput {
    ToolOutput::new(json!({
        "name": package.name,
        "action": action,
        "script": script,
        "output": output,
        "dryRun": dry_run,
    }))
    .with_metadata("source", package.source.to_string())
}

fn tag(raw: &str) -> RegistryResult<Tag> {
    Tag::new(raw).map_err(|err| RegistryError::InvalidDescriptor {
        reason: err.to_string(),
    })
}

fn invalid_schema(err: impl std::fmt::Display) -> RegistryError {
    RegistryError::InvalidDescriptor {
        reason: err.to_string(),
    }
}

fn package_schema(verb: &str) -> RegistryResult<ParameterSchema> {
    ParameterSchema::builder()
        .field(FieldSpec::required(
            "name",
            FieldType::String,
            format!("catalogue name of the package to {verb}"),
        ))
        .field(
            FieldSpec::optional("dry_run", FieldType::Boolean, "report the script without running it")
                .with_default(false),
        )
        .build()
        .map_err(invalid_schema)
}

/// Registers the three package tools.
///
/// # Errors
///
/// Returns [`RegistryError`] if a tool name is already taken.
pub fn register_tools(registry: &ToolRegistry, state: &Arc<PackageState>) -> RegistryResult<()> {
    let list_schema = ParameterSchema::builder()
        .field(
            FieldSpec::optional("installed_only", FieldType::Boolean, "only report installed packages")
                .with_default(false),
        )
        .build()
        .map_err(invalid_schema)?;

    registry.register(
        ToolDescriptor::builder(LIST_PACKAGES)
            .description("List catalogue packages with their installation status")
            .schema(list_schema)
            .tags([tag("packages")?, tag("read-only")?])
            .build(ListPackages {
                state: Arc::clone(state),
            })?,
    )?;
    registry.register(
        ToolDescriptor::builder(UPDATE_PACKAGE)
            .description("Upgrade an installed catalogue package")
            .schema(package_schema("upgrade")?)
            .tags([tag("packages")?, tag("mutating")?])
            .timeout(SCRIPT_TIMEOUT)
            .build(RunScript {
                state: Arc::clone(state),
                action: Action::Upgrade,
            })?,
    )?;
    registry.register(
        ToolDescriptor::builder(INSTALL_PACKAGE)
            .description("Install a catalogue package that is not present yet")
            .schema(package_schema("install")?)
            .tags([tag("packages")?, tag("mutating")?])
            .timeout(SCRIPT_TIMEOUT)
            .build(RunScript {
                state: Arc::clone(state),
                action: Action::Install,
            })?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use capcall::kernel::{DispatchConfig, Dispatcher, ErrorKind, InvokeError};
    use capcall::primitives::CallerId;
    use capcall::tools::CancelReason;

    use super::*;
    use crate::catalogue::Source;
    use crate::runner::CommandOutput;

    #[derive(Default)]
    struct FakeRunner {
        available: Mutex<BTreeSet<String>>,
        scripts: Mutex<Vec<String>>,
        fail: bool,
        hang: bool,
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn is_available(&self, command: &str) -> bool {
            self.available.lock().unwrap().contains(command)
        }

        async fn run(&self, script: &str, token: &CancellationToken) -> ExecutorResult<CommandOutput> {
            self.scripts.lock().unwrap().push(script.to_owned());
            if self.hang {
                token.cancelled().await;
                return Err(ExecutorError::Cancelled);
            }
            if let Some(binary) = script.strip_prefix("install ") {
                self.available.lock().unwrap().insert(binary.to_owned());
            }
            Ok(CommandOutput {
                success: !self.fail,
                output: "done\n".into(),
            })
        }
    }

    fn catalogue() -> Catalogue {
        Catalogue::from_packages(vec![
            Package {
                name: "ripgrep",
                command: "rg",
                install: "install rg",
                upgrade: "upgrade rg",
                source: Source::Apt,
            },
            Package {
                name: "fzf",
                command: "fzf",
                install: "install fzf",
                upgrade: "upgrade fzf",
                source: Source::Shell,
            },
        ])
    }

    async fn dispatcher(runner: FakeRunner) -> (Dispatcher, Arc<FakeRunner>) {
        runner.available.lock().unwrap().insert("rg".into());
        let runner = Arc::new(runner);
        let state = PackageState::detect(catalogue(), runner.clone()).await;
        let registry = ToolRegistry::new();
        register_tools(&registry, &state).unwrap();
        (
            Dispatcher::new(Arc::new(registry), DispatchConfig::new()),
            runner,
        )
    }

    fn ctx() -> InvocationContext {
        InvocationContext::builder(CallerId::new("tester").unwrap()).build()
    }

    #[tokio::test]
    async fn lists_with_installation_status() {
        let (dispatcher, _) = dispatcher(FakeRunner::default()).await;

        let all = dispatcher
            .invoke(LIST_PACKAGES, json!({}), ctx(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(all.data()["packages"].as_array().unwrap().len(), 2);
        assert_eq!(all.metadata().extra()["installedCount"], 1);

        let installed = dispatcher
            .invoke(
                LIST_PACKAGES,
                json!({ "installed_only": true }),
                ctx(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            installed.data()["packages"],
            json!([{ "name": "ripgrep", "command": "rg", "source": "apt", "installed": true }])
        );
    }

    #[tokio::test]
    async fn update_runs_upgrade_script() {
        let (dispatcher, runner) = dispatcher(FakeRunner::default()).await;

        let envelope = dispatcher
            .invoke(UPDATE_PACKAGE, json!({ "name": "ripgrep" }), ctx(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(envelope.data()["output"], "done");
        assert_eq!(envelope.metadata().extra()["source"], "apt");
        assert_eq!(*runner.scripts.lock().unwrap(), vec!["upgrade rg".to_owned()]);
    }

    #[tokio::test]
    async fn update_refuses_missing_and_unknown_packages() {
        let (dispatcher, runner) = dispatcher(FakeRunner::default()).await;

        for (name, expected) in [("fzf", "not installed"), ("emacs", "not found")] {
            let err = dispatcher
                .invoke(UPDATE_PACKAGE, json!({ "name": name }), ctx(), CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Execution);
            assert!(err.to_string().contains(expected), "{err}");
        }
        assert!(runner.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_skips_the_script() {
        let (dispatcher, runner) = dispatcher(FakeRunner::default()).await;

        let envelope = dispatcher
            .invoke(
                INSTALL_PACKAGE,
                json!({ "name": "fzf", "dry_run": true }),
                ctx(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(envelope.data()["script"], "install fzf");
        assert!(runner.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_and_real_runs_share_one_data_shape() {
        let (dispatcher, _) = dispatcher(FakeRunner::default()).await;
        let keys = |data: &serde_json::Value| -> Vec<String> {
            data.as_object().unwrap().keys().cloned().collect()
        };

        let dry = dispatcher
            .invoke(
                UPDATE_PACKAGE,
                json!({ "name": "ripgrep", "dry_run": true }),
                ctx(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let real = dispatcher
            .invoke(UPDATE_PACKAGE, json!({ "name": "ripgrep" }), ctx(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(keys(dry.data()), keys(real.data()));
        assert_eq!(dry.data()["output"], "");
        assert_eq!(real.data()["script"], "upgrade rg");
        assert_eq!(dry.metadata().extra()["source"], "apt");
    }

    #[tokio::test]
    async fn install_refreshes_detection() {
        let (dispatcher, _) = dispatcher(FakeRunner::default()).await;

        dispatcher
            .invoke(INSTALL_PACKAGE, json!({ "name": "fzf" }), ctx(), CancellationToken::new())
            .await
            .unwrap();
        let err = dispatcher
            .invoke(INSTALL_PACKAGE, json!({ "name": "fzf" }), ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already installed"));
    }

    #[tokio::test]
    async fn failing_script_is_an_execution_error() {
        let (dispatcher, _) = dispatcher(FakeRunner {
            fail: true,
            ..FakeRunner::default()
        })
        .await;

        let err = dispatcher
            .invoke(UPDATE_PACKAGE, json!({ "name": "ripgrep" }), ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            InvokeError::Execution { source: ExecutorError::Failed { reason }, .. }
                if reason.contains("upgrade of `ripgrep` failed: done")
        ));
    }

    #[tokio::test]
    async fn cancellation_stops_a_running_script() {
        let (dispatcher, _) = dispatcher(FakeRunner {
            hang: true,
            ..FakeRunner::default()
        })
        .await;
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel_with(CancelReason::Disconnected);
        });

        let err = dispatcher
            .invoke(UPDATE_PACKAGE, json!({ "name": "ripgrep" }), ctx(), token)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Cancelled {
                reason: CancelReason::Disconnected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_name_is_a_validation_error() {
        let (dispatcher, runner) = dispatcher(FakeRunner::default()).await;
        let err = dispatcher
            .invoke(UPDATE_PACKAGE, json!({ "dry_run": true }), ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(runner.scripts.lock().unwrap().is_empty());
    }
}
