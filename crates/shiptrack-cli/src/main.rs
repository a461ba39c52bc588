#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use shiptrack_core::coordination::release::{
    discover_versions, trigger_deployments, MobileRelease, WebDeployRequest, WebRelease,
};
use shiptrack_core::coordination::{resolve_tag, RefreshScope, SyncDriver};
use shiptrack_core::http::{DeployTriggerClient, GitHubApiClient};
use shiptrack_core::notify::LogNotifier;
use shiptrack_core::secrets::ChainedSecretStore;
use shiptrack_core::settings::Settings;
use shiptrack_core::store::WorkItemStore;
use shiptrack_core::traits::SecretStore;
use shiptrack_core::vcs::GitCli;
use shiptrack_core::{ModuleVersionMap, RepoId, WorkItem};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "shiptrack", version, about = "Track work items from ticket to deployment")]
struct Cli {
    /// Settings file (default: per-user config directory)
    #[arg(long, global = true, env = "SHIPTRACK_SETTINGS")]
    settings: Option<PathBuf>,

    /// Work-item store (default: per-user data directory)
    #[arg(long, global = true, env = "SHIPTRACK_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start tracking a ticket's branch
    Track {
        #[arg(long)]
        ticket: String,
        /// Source repository (owner/name)
        #[arg(long)]
        repo: RepoId,
        #[arg(long)]
        branch: String,
    },
    /// List tracked work items
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Refresh all items, or one with --id
    Refresh {
        #[arg(long, value_parser = parse_id)]
        id: Option<Uuid>,
    },
    /// Refresh periodically until interrupted
    Watch {
        /// Overrides refresh_interval_secs from the settings
        #[arg(long, env = "SHIPTRACK_REFRESH_INTERVAL_SECS")]
        interval_secs: Option<u64>,
    },
    /// Resolve the tag published by the latest successful build
    ResolveTag {
        #[arg(long)]
        repo: RepoId,
        /// Workflow file name or id
        #[arg(long)]
        workflow: String,
        #[arg(long)]
        branch: String,
    },
    /// Discover module versions from recent container jobs
    Discover {
        #[arg(long)]
        repo: RepoId,
        #[arg(long)]
        branch: String,
        #[arg(long, value_delimiter = ',', required = true)]
        modules: Vec<String>,
    },
    /// Write an item's tag into a mobile deployment repo and open a PR
    DeployMobile {
        #[arg(long, value_parser = parse_id)]
        id: Uuid,
        /// Configured deployment repository (owner/name)
        #[arg(long)]
        deploy_repo: RepoId,
    },
    /// Open a values-repo PR for modules × environments
    DeployWeb {
        #[arg(long, value_parser = parse_id)]
        id: Uuid,
        #[arg(long, value_delimiter = ',', required = true)]
        modules: Vec<String>,
        #[arg(long, value_delimiter = ',', required = true)]
        environments: Vec<String>,
        /// Explicit module=version; others are discovered from the item's branch
        #[arg(long = "version", value_parser = parse_module_version)]
        versions: Vec<(String, String)>,
        /// Squash-merge the PR after opening it
        #[arg(long)]
        merge: bool,
        /// Trigger one deployment per module × environment
        #[arg(long)]
        trigger: bool,
    },
    /// Manage stored credentials
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(clap::Subcommand)]
enum TokenAction {
    /// Store a credential (reads stdin when VALUE is omitted)
    Set { key: String, value: Option<String> },
}

fn parse_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|e| format!("invalid work item id: {}", e))
}

fn parse_module_version(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((module, version)) if !module.trim().is_empty() && !version.trim().is_empty() => {
            Ok((module.trim().to_string(), version.trim().to_string()))
        }
        _ => Err(format!("expected module=version, got '{}'", raw)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SHIPTRACK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build();
    let rt = match rt {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let code = match rt.block_on(run(cli)) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

/// Collaborators shared by every command
struct App {
    settings: Settings,
    secrets: Arc<ChainedSecretStore>,
    api: Arc<GitHubApiClient>,
    store: WorkItemStore,
}

impl App {
    fn load(cli: &Cli) -> anyhow::Result<Self> {
        let settings_path = match &cli.settings {
            Some(path) => path.clone(),
            None => Settings::default_path()?,
        };
        let settings = Settings::load(&settings_path)
            .with_context(|| format!("loading settings from {}", settings_path.display()))?;

        let store = match &cli.store {
            Some(path) => WorkItemStore::new(path),
            None => WorkItemStore::default_location()?,
        };

        let secrets = Arc::new(ChainedSecretStore::user_default()?);
        let api = Arc::new(GitHubApiClient::from_env(secrets.clone()));
        Ok(Self {
            settings,
            secrets,
            api,
            store,
        })
    }

    fn driver(&self) -> anyhow::Result<SyncDriver<GitHubApiClient>> {
        let driver = SyncDriver::new(
            self.api.clone(),
            Arc::new(LogNotifier),
            self.settings.driver_config(),
        )
        .with_store(self.store.clone())
        .with_context(|| format!("loading work items from {}", self.store.path().display()))?;
        Ok(driver)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::load(&cli)?;

    match cli.command {
        Commands::Track {
            ticket,
            repo,
            branch,
        } => {
            let driver = app.driver()?;
            if app.settings.source_repo(&repo).is_none() {
                tracing::warn!(%repo, "Repository has no source config; tags will not resolve");
            }
            let id = driver.add_item(WorkItem::new(ticket, repo, branch))?;
            println!("{}", id);
        }
        Commands::List { json } => {
            let items = app.driver()?.items();
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in &items {
                    print_item(item);
                }
            }
        }
        Commands::Refresh { id } => {
            let driver = app.driver()?;
            let scope = id.map_or(RefreshScope::All, RefreshScope::Item);
            let summary = driver.request_refresh(scope).await?;
            for (id, outcome) in &summary.outcomes {
                if let Some(error) = &outcome.error {
                    eprintln!("{}: {}", id, error);
                }
            }
            println!(
                "refreshed {} item(s), {} failed, {} notification(s)",
                summary.refreshed(),
                summary.failed(),
                summary.events()
            );
        }
        Commands::Watch { interval_secs } => {
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| app.settings.refresh_interval());
            let driver = Arc::new(app.driver()?);
            tracing::info!(interval_secs = interval.as_secs(), "Watching work items");

            let handle = driver.spawn_periodic(interval);
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            handle.abort();
        }
        Commands::ResolveTag {
            repo,
            workflow,
            branch,
        } => {
            let resolved = resolve_tag(app.api.as_ref(), &repo, &workflow, &branch).await?;
            println!("{}\t{}", resolved.tag, resolved.run_url);
        }
        Commands::Discover {
            repo,
            branch,
            modules,
        } => {
            let found = discover_versions(app.api.as_ref(), &repo, &branch, &modules).await?;
            println!("{}", serde_json::to_string_pretty(&found)?);
            let missing = found.missing(&modules);
            if !missing.is_empty() {
                eprintln!("not found: {}", missing.join(", "));
            }
        }
        Commands::DeployMobile { id, deploy_repo } => {
            let driver = app.driver()?;
            let item = driver
                .get(id)
                .ok_or_else(|| anyhow!("no work item {}", id))?;
            let deploy = app
                .settings
                .deployment_repo(&deploy_repo)
                .ok_or_else(|| anyhow!("{} is not a configured deployment repository", deploy_repo))?;

            let vcs = GitCli::default();
            let result = MobileRelease::new(app.api.as_ref(), &vcs)
                .update_deployment_config(deploy, &item)
                .await?;
            driver.record_deployment_pr(id, &result.pr_url)?;
            println!("{}\t{}", result.branch, result.pr_url);
        }
        Commands::DeployWeb {
            id,
            modules,
            environments,
            versions,
            merge,
            trigger,
        } => {
            let driver = app.driver()?;
            let item = driver
                .get(id)
                .ok_or_else(|| anyhow!("no work item {}", id))?;
            let target = app
                .settings
                .web_target
                .as_ref()
                .ok_or_else(|| anyhow!("settings have no web_target"))?;

            let mut known: ModuleVersionMap = versions.into_iter().collect();
            let missing: Vec<String> = known
                .missing(&modules)
                .into_iter()
                .map(str::to_string)
                .collect();
            if !missing.is_empty() {
                let discovered =
                    discover_versions(app.api.as_ref(), &item.repo, &item.branch, &missing)
                        .await
                        .context("discovering module versions")?;
                known.merge_first_wins(discovered);
            }

            let request = WebDeployRequest {
                item: &item,
                modules: &modules,
                environments: &environments,
                versions: &known,
            };
            let release = WebRelease::new(app.api.as_ref(), target);
            let pr = release.create_deployment_pr(&request).await?;
            driver.record_deployment_pr(id, &pr.pr_url)?;
            for outcome in pr.outcomes.iter().filter(|o| !o.is_updated()) {
                eprintln!("skipped {}: {:?}", outcome.path, outcome.status);
            }
            println!("{}\t{}\t{} file(s)", pr.branch, pr.pr_url, pr.updated_files);

            if merge {
                release.merge_deployment_pr(pr.pr_number).await?;
                println!("merged #{}", pr.pr_number);
            }

            if trigger {
                let config = app
                    .settings
                    .deploy_trigger
                    .clone()
                    .ok_or_else(|| anyhow!("settings have no deploy_trigger"))?;
                let client = DeployTriggerClient::new(config, app.secrets.clone());
                let report = trigger_deployments(&client, client.pipeline(), &request).await?;
                for url in &report.execution_urls {
                    println!("{}", url);
                }
                for (module, environment, reason) in &report.skipped {
                    eprintln!("trigger skipped {}/{}: {}", module, environment, reason);
                }
            }
        }
        Commands::Token {
            action: TokenAction::Set { key, value },
        } => {
            let value = match value {
                Some(value) => value,
                None => {
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    line
                }
            };
            if value.trim().is_empty() {
                bail!("refusing to store an empty credential");
            }
            app.secrets.save_token(&key, &value)?;
            println!("stored '{}'", key);
        }
    }
    Ok(())
}

fn print_item(item: &WorkItem) {
    println!(
        "{}  {:<12} {:<28} {:<7} {:<7} {:<10} {}",
        item.id,
        item.ticket,
        format!("{}:{}", item.repo, item.branch),
        item.pr_state.as_str(),
        item.check_state.as_str(),
        item.latest_tag.as_deref().unwrap_or("-"),
        item.last_error.as_deref().unwrap_or("")
    );
}
