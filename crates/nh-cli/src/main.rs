//! NoobHeaders CLI
//!
//! Edits a JSON configuration store, compiles it into header-modification
//! rules and keeps a rules file in sync, the way the extension's background
//! worker does against browser storage.

mod store;
mod watch;

use std::fs;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use nh_compiler::{compile_config, compile_profile, ConfigStore, DebouncePolicy, Orchestrator, Trigger};
use nh_core::profiles::{self, HeaderUpdate};
use nh_core::select::{auto_switch, badge_text, contributing_profiles};
use nh_core::{
    badge_count, detect_filter_type, export_profiles, import_profiles, is_valid_domain, matches, Filter,
    FilterKind, GlobalConfig, HeaderKind, ProfileError, StorageKey,
};

use store::{FileRuleLayer, FileStore};
use watch::WatchOptions;

type App = Orchestrator<FileStore, FileRuleLayer>;

#[derive(Parser)]
#[command(name = "nh-cli")]
#[command(about = "NoobHeaders profile manager and rule compiler")]
struct Cli {
    /// Configuration store file
    #[arg(long, global = true, default_value = "noobheaders.json")]
    store: String,

    /// Installed rules file
    #[arg(long, global = true, default_value = "noobheaders-rules.json")]
    rules: String,

    /// Edit the store without updating the rules file
    #[arg(long, global = true)]
    no_apply: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a store holding a default profile
    Init {
        /// Overwrite an existing store
        #[arg(long)]
        force: bool,
    },

    /// Print the compiled rules without installing them
    Compile {
        /// Compile only this profile
        #[arg(short, long)]
        profile: Option<String>,

        /// First rule id when compiling a single profile
        #[arg(long, default_value_t = 1)]
        offset: u32,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replace the installed rules with the compiled store
    Apply,

    /// Activate the profile whose filters match a URL
    Switch { url: String },

    /// Number of headers that apply to a URL
    Badge { url: Option<String> },

    /// Test a URL against a filter value
    Match {
        url: String,
        filter: String,

        /// Filter kind (detected from the value if omitted)
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Classify filter values as domain or URL pattern
    Detect {
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Export profiles as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replace all profiles with an exported file
    Import { input: String },

    /// Follow store changes and keep the rules file current
    Watch {
        /// Store polling interval in milliseconds
        #[arg(long, default_value_t = 250)]
        interval_ms: u64,

        /// Quiet period before recompiling, in milliseconds
        #[arg(long, default_value_t = 300)]
        debounce_ms: u64,
    },

    /// Turn header modification on or off
    Global {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },

    /// Manage a profile's headers
    Header {
        #[command(subcommand)]
        action: HeaderCommand,
    },

    /// Manage a profile's filters
    Filter {
        #[command(subcommand)]
        action: FilterCommand,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// List profiles
    List,
    /// Create an empty profile and activate it
    Add { name: String },
    /// Copy a profile and activate the copy
    Duplicate { id: String },
    /// Delete a profile
    Delete { id: String },
    /// Rename a profile
    Rename { id: String, name: String },
    /// Make a profile the active one
    Activate { id: String },
    /// Mark a profile as enabled for multi-profile mode
    Enable { id: String },
    /// Clear a profile's enabled mark
    Disable { id: String },
}

#[derive(Subcommand)]
enum HeaderCommand {
    /// Append a header
    Add {
        profile: String,
        name: String,
        /// Empty value removes the header
        #[arg(default_value = "")]
        value: String,
        /// Modify the response instead of the request
        #[arg(long)]
        response: bool,
    },
    /// Remove the header at an index
    Remove { profile: String, index: usize },
    Enable { profile: String, index: usize },
    Disable { profile: String, index: usize },
}

#[derive(Subcommand)]
enum FilterCommand {
    /// Append a filter; its kind is detected from the value
    Add { profile: String, value: String },
    /// Remove the filter at an index
    Remove { profile: String, index: usize },
    Enable { profile: String, index: usize },
    Disable { profile: String, index: usize },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Domain,
    Url,
}

impl From<KindArg> for FilterKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Domain => FilterKind::Domain,
            KindArg::Url => FilterKind::UrlPattern,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { log::Level::Debug } else { log::Level::Info };
    if let Err(e) = simple_logger::init_with_level(level) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    let app = Orchestrator::new(FileStore::new(&cli.store), FileRuleLayer::new(&cli.rules));
    let ctx = Context {
        app,
        apply: !cli.no_apply,
    };

    let result = match cli.command {
        Commands::Init { force } => cmd_init(&ctx, force).await,
        Commands::Compile {
            profile,
            offset,
            output,
        } => cmd_compile(&ctx, profile.as_deref(), offset, output.as_deref()).await,
        Commands::Apply => cmd_apply(&ctx).await,
        Commands::Switch { url } => cmd_switch(&ctx, &url).await,
        Commands::Badge { url } => cmd_badge(&ctx, url.as_deref()).await,
        Commands::Match { url, filter, kind } => cmd_match(&url, &filter, kind),
        Commands::Detect { values } => cmd_detect(&values),
        Commands::Export { output } => cmd_export(&ctx, output.as_deref()).await,
        Commands::Import { input } => cmd_import(&ctx, &input).await,
        Commands::Watch {
            interval_ms,
            debounce_ms,
        } => cmd_watch(&ctx, interval_ms, debounce_ms).await,
        Commands::Global { state } => cmd_global(&ctx, state).await,
        Commands::Profile { action } => cmd_profile(&ctx, action).await,
        Commands::Header { action } => cmd_header(&ctx, action).await,
        Commands::Filter { action } => cmd_filter(&ctx, action).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

struct Context {
    app: App,
    apply: bool,
}

impl Context {
    async fn load(&self) -> Result<GlobalConfig, String> {
        let mut config = self.app.store().load().await.map_err(|e| e.to_string())?;
        config.normalize();
        Ok(config)
    }

    /// Route changed keys the way a store change event would.
    async fn apply_changes(&self, changed: Vec<StorageKey>) -> Result<(), String> {
        if !self.apply {
            return Ok(());
        }
        let outcome = self
            .app
            .handle(Trigger::ConfigChanged(changed))
            .await
            .map_err(|e| e.to_string())?;
        if let Some(outcome) = outcome {
            println!("Installed {} rules (replaced {})", outcome.installed, outcome.removed);
        }
        Ok(())
    }

    /// Run a profile edit, save it and bring the rules up to date.
    async fn edit<T, F>(&self, edit: F) -> Result<T, String>
    where
        F: FnOnce(&mut GlobalConfig) -> Result<T, ProfileError> + Send,
        T: Send,
    {
        let (result, changed) = self.app.modify(edit).await.map_err(|e| e.to_string())?;
        let value = result.map_err(|e| e.to_string())?;
        self.apply_changes(changed).await?;
        Ok(value)
    }
}

fn kind_name(kind: FilterKind) -> &'static str {
    match kind {
        FilterKind::Domain => "domain",
        FilterKind::UrlPattern => "url",
    }
}

fn write_output(output: Option<&str>, text: &str) -> Result<(), String> {
    match output {
        Some(path) => {
            fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            println!("Wrote '{}'", path);
            Ok(())
        }
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

async fn cmd_init(ctx: &Context, force: bool) -> Result<(), String> {
    if ctx.app.store().exists().await && !force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            ctx.app.store().path().display()
        ));
    }

    let mut config = GlobalConfig {
        global_enabled: true,
        ..GlobalConfig::default()
    };
    config.normalize();
    ctx.app.store().save(&config).await.map_err(|e| e.to_string())?;

    println!("Created '{}'", ctx.app.store().path().display());
    ctx.apply_changes(StorageKey::ALL.to_vec()).await
}

async fn cmd_compile(ctx: &Context, profile: Option<&str>, offset: u32, output: Option<&str>) -> Result<(), String> {
    let config = ctx.load().await?;
    let rules = match profile {
        Some(id) => {
            let profile = config
                .profile(id)
                .ok_or_else(|| ProfileError::NotFound(id.to_string()).to_string())?;
            compile_profile(profile, config.global_enabled, offset.max(1))
        }
        None => compile_config(&config),
    };
    let text = serde_json::to_string_pretty(&rules).map_err(|e| e.to_string())?;
    write_output(output, &text)
}

async fn cmd_apply(ctx: &Context) -> Result<(), String> {
    let outcome = ctx.app.recompute().await.map_err(|e| e.to_string())?;
    println!("Installed {} rules (replaced {})", outcome.installed, outcome.removed);
    Ok(())
}

async fn cmd_switch(ctx: &Context, url: &str) -> Result<(), String> {
    let switched = if ctx.apply {
        ctx.app.auto_switch(url).await.map_err(|e| e.to_string())?
    } else {
        ctx.edit(|c| Ok(auto_switch(c, url))).await?
    };
    match switched {
        Some(id) => {
            let config = ctx.load().await?;
            let name = config.profile(&id).map(|p| p.name.as_str()).unwrap_or_default();
            println!("Switched to '{}' ({})", name, id);
        }
        None => println!("Active profile unchanged"),
    }
    Ok(())
}

async fn cmd_badge(ctx: &Context, url: Option<&str>) -> Result<(), String> {
    let config = ctx.load().await?;
    let count = badge_count(&config, url);
    // The badge is hidden at zero.
    match badge_text(count).as_str() {
        "" => println!("0 (no badge)"),
        text => println!("{}", text),
    }
    Ok(())
}

fn cmd_match(url: &str, value: &str, kind: Option<KindArg>) -> Result<(), String> {
    let filter = match kind {
        Some(kind) => Filter::new(kind.into(), value),
        None => Filter::detected(value),
    };
    let matched = matches(url, &filter);
    println!(
        "{} ({} filter)",
        if matched { "match" } else { "no match" },
        kind_name(filter.kind)
    );
    Ok(())
}

fn cmd_detect(values: &[String]) -> Result<(), String> {
    for value in values {
        let kind = detect_filter_type(value);
        if kind == FilterKind::Domain && !is_valid_domain(value) {
            println!("{}\t{}\t(invalid domain)", value, kind_name(kind));
        } else {
            println!("{}\t{}", value, kind_name(kind));
        }
    }
    Ok(())
}

async fn cmd_export(ctx: &Context, output: Option<&str>) -> Result<(), String> {
    let config = ctx.load().await?;
    let text = export_profiles(&config.profiles).map_err(|e| e.to_string())?;
    write_output(output, &text)
}

async fn cmd_import(ctx: &Context, input: &str) -> Result<(), String> {
    let text = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let imported = import_profiles(&text).map_err(|e| format!("Import failed: {}", e))?;
    let count = imported.len();

    ctx.edit(move |config| {
        config.replace_profiles(imported);
        Ok(())
    })
    .await?;

    println!("Imported {} profiles", count);
    Ok(())
}

async fn cmd_watch(ctx: &Context, interval_ms: u64, debounce_ms: u64) -> Result<(), String> {
    let options = WatchOptions {
        interval: Duration::from_millis(interval_ms.max(1)),
        debounce: DebouncePolicy {
            delay: Duration::from_millis(debounce_ms),
        },
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("cannot listen for interrupt: {}", e);
            std::future::pending::<()>().await;
        }
    };
    watch::watch(&ctx.app, options, shutdown).await
}

async fn cmd_global(ctx: &Context, state: Toggle) -> Result<(), String> {
    let enabled = matches!(state, Toggle::On);
    ctx.edit(move |config| {
        profiles::set_global_enabled(config, enabled);
        Ok(())
    })
    .await?;
    println!("Header modification {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

async fn cmd_profile(ctx: &Context, action: ProfileCommand) -> Result<(), String> {
    match action {
        ProfileCommand::List => {
            let config = ctx.load().await?;
            let contributing: Vec<&str> = contributing_profiles(&config).iter().map(|p| p.id.as_str()).collect();
            println!(
                "Header modification {}",
                if config.global_enabled { "enabled" } else { "disabled" }
            );
            for profile in &config.profiles {
                let active = config.active_profile_id.as_deref() == Some(profile.id.as_str());
                println!(
                    "{} {} {}  {} ({} headers, {} filters)",
                    if active { "*" } else { " " },
                    if contributing.contains(&profile.id.as_str()) { "+" } else { " " },
                    profile.id,
                    profile.name,
                    profile.headers.len(),
                    profile.filters.len()
                );
            }
        }
        ProfileCommand::Add { name } => {
            let id = ctx.edit(move |c| profiles::add_profile(c, &name)).await?;
            println!("Created profile {}", id);
        }
        ProfileCommand::Duplicate { id } => {
            let new_id = ctx.edit(move |c| profiles::duplicate_profile(c, &id)).await?;
            println!("Created profile {}", new_id);
        }
        ProfileCommand::Delete { id } => {
            let removed = ctx.edit(move |c| profiles::delete_profile(c, &id)).await?;
            println!("Deleted profile '{}'", removed.name);
        }
        ProfileCommand::Rename { id, name } => {
            ctx.edit(move |c| profiles::rename_profile(c, &id, &name)).await?;
        }
        ProfileCommand::Activate { id } => {
            ctx.edit(move |c| profiles::set_active_profile(c, &id)).await?;
        }
        ProfileCommand::Enable { id } => {
            ctx.edit(move |c| profiles::set_profile_enabled(c, &id, true)).await?;
        }
        ProfileCommand::Disable { id } => {
            ctx.edit(move |c| profiles::set_profile_enabled(c, &id, false)).await?;
        }
    }
    Ok(())
}

async fn cmd_header(ctx: &Context, action: HeaderCommand) -> Result<(), String> {
    match action {
        HeaderCommand::Add {
            profile,
            name,
            value,
            response,
        } => {
            let update = HeaderUpdate {
                kind: Some(if response { HeaderKind::Response } else { HeaderKind::Request }),
                name: Some(name),
                value: Some(value),
                ..HeaderUpdate::default()
            };
            let index = ctx
                .edit(move |c| {
                    let index = profiles::add_header(c, &profile)?;
                    profiles::update_header(c, &profile, index, update)?;
                    Ok(index)
                })
                .await?;
            println!("Added header {}", index);
        }
        HeaderCommand::Remove { profile, index } => {
            let removed = ctx.edit(move |c| profiles::remove_header(c, &profile, index)).await?;
            println!("Removed header '{}'", removed.name);
        }
        HeaderCommand::Enable { profile, index } => set_header_enabled(ctx, profile, index, true).await?,
        HeaderCommand::Disable { profile, index } => set_header_enabled(ctx, profile, index, false).await?,
    }
    Ok(())
}

async fn set_header_enabled(ctx: &Context, profile: String, index: usize, enabled: bool) -> Result<(), String> {
    let update = HeaderUpdate {
        enabled: Some(enabled),
        ..HeaderUpdate::default()
    };
    ctx.edit(move |c| profiles::update_header(c, &profile, index, update)).await
}

async fn cmd_filter(ctx: &Context, action: FilterCommand) -> Result<(), String> {
    match action {
        FilterCommand::Add { profile, value } => {
            if detect_filter_type(&value) == FilterKind::Domain && !is_valid_domain(&value) {
                log::warn!("'{}' does not look like a valid domain", value);
            }
            let (index, kind) = ctx
                .edit(move |c| {
                    let index = profiles::add_filter(c, &profile)?;
                    let kind = profiles::set_filter_value(c, &profile, index, &value)?;
                    Ok((index, kind))
                })
                .await?;
            println!("Added {} filter {}", kind_name(kind), index);
        }
        FilterCommand::Remove { profile, index } => {
            let removed = ctx.edit(move |c| profiles::remove_filter(c, &profile, index)).await?;
            println!("Removed filter '{}'", removed.value);
        }
        FilterCommand::Enable { profile, index } => {
            ctx.edit(move |c| profiles::set_filter_enabled(c, &profile, index, true))
                .await?;
        }
        FilterCommand::Disable { profile, index } => {
            ctx.edit(move |c| profiles::set_filter_enabled(c, &profile, index, false))
                .await?;
        }
    }
    Ok(())
}
