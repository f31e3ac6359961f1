use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use repo_digest_filter::app::commands::{self, SettingsEdit};
use repo_digest_filter::app::{
    FilterSettingsStore, HttpTransport, InvalidatingProxy, StoreEvent, SummaryCache,
};
use repo_digest_filter::config::ClientConfig;
use repo_digest_filter::core::{DigestSummary, FilterSettings, PatternKind, RepoKey};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "repo-digest-filter", version, about = "Manage include/exclude filters for repository digests")]
struct Cli {
    /// Path to the client config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL; overrides the config file.
    #[arg(long, global = true, env = "DIGEST_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RepoArgs {
    author: String,
    name: String,
}

impl RepoArgs {
    fn key(&self) -> RepoKey {
        RepoKey::new(&self.author, &self.name)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Include,
    Exclude,
}

impl From<KindArg> for PatternKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Include => PatternKind::Include,
            KindArg::Exclude => PatternKind::Exclude,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the repositories the backend has cloned.
    Repos,
    /// Show one repository.
    Repo(RepoArgs),
    /// Print the backend's digest summary of a repository.
    Summary {
        #[command(flatten)]
        repo: RepoArgs,
        /// Narrow the summary with an AI filter prompt.
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Generate a digest and save it as `{author}_{name}_digest.txt`.
    Digest {
        #[command(flatten)]
        repo: RepoArgs,
        #[arg(long)]
        prompt: Option<String>,
        /// Directory the digest file is written to.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Print the stored filter settings.
    Show(RepoArgs),
    /// Add include or exclude patterns.
    Add {
        #[command(flatten)]
        repo: RepoArgs,
        #[arg(value_enum)]
        kind: KindArg,
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Remove include or exclude patterns.
    Remove {
        #[command(flatten)]
        repo: RepoArgs,
        #[arg(value_enum)]
        kind: KindArg,
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Set the per-file size or token threshold.
    Threshold {
        #[command(flatten)]
        repo: RepoArgs,
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Store the natural-language inclusion prompt.
    Prompt {
        #[command(flatten)]
        repo: RepoArgs,
        text: String,
    },
    /// Run the backend's AI file filter with a prompt.
    AiFilter {
        #[command(flatten)]
        repo: RepoArgs,
        prompt: String,
    },
    /// Show which files of a local checkout the digest would include.
    Preview {
        #[command(flatten)]
        repo: RepoArgs,
        path: PathBuf,
    },
}

impl Command {
    fn repo(&self) -> Option<&RepoArgs> {
        match self {
            Self::Repos => None,
            Self::Repo(repo) | Self::Show(repo) => Some(repo),
            Self::Summary { repo, .. }
            | Self::Digest { repo, .. }
            | Self::Add { repo, .. }
            | Self::Remove { repo, .. }
            | Self::Threshold { repo, .. }
            | Self::Prompt { repo, .. }
            | Self::AiFilter { repo, .. }
            | Self::Preview { repo, .. } => Some(repo),
        }
    }
}

fn print_summary(summary: &DigestSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn print_settings(settings: &FilterSettings) {
    println!("Include patterns:");
    for pattern in &settings.include_patterns {
        println!("  {pattern}");
    }
    println!("Exclude patterns:");
    for pattern in &settings.exclude_patterns {
        println!("  {pattern}");
    }
    println!("Size threshold: {}", settings.size_threshold);
    if !settings.ai_prompt.is_empty() {
        println!("AI prompt: {}", settings.ai_prompt);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    let transport = Arc::new(HttpTransport::new(
        &config.api_base_url,
        config.request_timeout(),
    )?);

    let key = match cli.command.repo() {
        Some(repo) => repo.key(),
        None => {
            for repo in commands::list_repositories(&*transport).await? {
                println!("{}\t{}\t{}", repo.key(), repo.url, repo.updated_at);
            }
            return Ok(());
        }
    };

    // Notifications are printed the way the UI would show toasts.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<StoreEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                StoreEvent::SettingsChanged { .. } | StoreEvent::Loaded { .. } => {
                    tracing::debug!("{}", event.message());
                }
                _ if event.is_error() => eprintln!("✗ {}", event.message()),
                _ => eprintln!("✓ {}", event.message()),
            }
        }
    });

    let cache = Arc::new(Mutex::new(SummaryCache::new()));
    let store = FilterSettingsStore::with_defaults(
        key.clone(),
        transport.clone(),
        InvalidatingProxy::new(cache.clone(), event_tx),
        config.default_filter_settings(),
    );

    let result = match cli.command {
        Command::Repos => Ok(()),
        Command::Repo(_) => commands::show_repository(&*transport, &key)
            .await
            .and_then(|repo| {
                println!("{}", serde_json::to_string_pretty(&repo)?);
                Ok(())
            }),
        Command::Summary { prompt, .. } => {
            commands::fetch_summary(&*transport, &cache, &key, prompt.as_deref())
                .await
                .and_then(|summary| print_summary(&summary))
        }
        Command::Digest {
            prompt, output_dir, ..
        } => commands::generate_digest(&*transport, &key, prompt.as_deref(), &output_dir)
            .await
            .map(|path| println!("Saved {}", path.display())),
        Command::Show(_) => commands::show_settings(&store)
            .await
            .map(|settings| print_settings(&settings)),
        Command::Add { kind, patterns, .. } => {
            commands::apply_edit(&store, SettingsEdit::AddPatterns(kind.into(), patterns))
                .await
                .map(|settings| print_settings(&settings))
        }
        Command::Remove { kind, patterns, .. } => {
            commands::apply_edit(&store, SettingsEdit::RemovePatterns(kind.into(), patterns))
                .await
                .map(|settings| print_settings(&settings))
        }
        Command::Threshold { value, .. } => {
            commands::apply_edit(&store, SettingsEdit::SetThreshold(value))
                .await
                .map(|settings| print_settings(&settings))
        }
        Command::Prompt { text, .. } => commands::apply_edit(&store, SettingsEdit::SetAiPrompt(text))
            .await
            .map(|settings| print_settings(&settings)),
        Command::AiFilter { prompt, .. } => match commands::run_ai_filter(&store, &prompt).await {
            // The run invalidated any cached summary, so this one is fresh.
            Ok(()) => commands::fetch_summary(&*transport, &cache, &key, None)
                .await
                .and_then(|summary| print_summary(&summary)),
            Err(e) => Err(e),
        },
        Command::Preview { path, .. } => {
            commands::preview_directory(&store, &path, &config)
                .await
                .and_then(|preview| {
                    print_summary(&preview.summary)?;
                    for (path, rule) in &preview.excluded {
                        println!("excluded {path}: {rule:?}");
                    }
                    Ok(())
                })
        }
    };

    // Dropping the store closes the event channel so the printer can finish.
    drop(store);
    printer.await.ok();
    result
}
