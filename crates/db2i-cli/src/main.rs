//! `db2i-mcp` binary: argument parsing, environment wiring, startup.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use db2i_core::config::Config;
use db2i_core::loader::{self, ConfigSource};
use db2i_core::settings::{Settings, TransportKind};
use db2i_mcp::McpServer;

#[derive(Parser, Debug)]
#[command(
    name = "db2i-mcp",
    version,
    about = "MCP server exposing declarative SQL tools for Db2 for i"
)]
struct Cli {
    /// Tools configuration: a YAML file, a directory or a glob.
    /// Overrides TOOLS_YAML_PATH.
    #[arg(long)]
    tools: Option<String>,

    /// Comma-separated toolset allow-list; only tools in these toolsets are
    /// registered. Overrides SELECTED_TOOLSETS.
    #[arg(long)]
    toolsets: Option<String>,

    /// Transport to serve: stdio or http. Overrides MCP_TRANSPORT_TYPE.
    #[arg(long)]
    transport: Option<String>,

    /// Load the configuration, print its toolsets and exit.
    #[arg(long, default_value_t = false)]
    list_toolsets: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Protocol frames own stdout on the stdio transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help / --version land here too and must stay successful.
            let is_error = e.use_stderr();
            let _ = e.print();
            return if is_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::from_env();

    if let Some(transport) = &cli.transport {
        settings.transport = TransportKind::parse(transport)
            .ok_or_else(|| anyhow::anyhow!("invalid --transport '{transport}' (stdio|http)"))?;
    }
    if let Some(toolsets) = &cli.toolsets {
        settings.selected_toolsets = toolsets
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    let tools_path = cli.tools.clone().or_else(|| settings.tools_path.clone());

    let (mut config, sources, resolved_paths) = match tools_path {
        Some(path) => {
            let sources = vec![ConfigSource::auto(path)];
            let outcome = loader::load(&sources, &settings.merge);
            for problem in &outcome.errors {
                match &problem.file {
                    Some(file) => {
                        error!(file = %file.display(), "{}", problem.message)
                    }
                    None => error!("{}", problem.message),
                }
            }
            let Some(config) = outcome.config.filter(|_| outcome.success) else {
                anyhow::bail!("configuration load failed");
            };
            info!(
                files = outcome.stats.sources_loaded,
                tools = outcome.stats.tools_total,
                toolsets = outcome.stats.toolsets_total,
                sources = outcome.stats.sources_total,
                "configuration loaded"
            );
            (config, sources, outcome.resolved_paths)
        }
        None => (Config::default(), Vec::new(), Vec::new()),
    };

    // The env-configured system becomes the `default` source unless the
    // YAML already defines one.
    if let Some(static_source) = settings.static_source.clone() {
        config
            .sources
            .entry("default".to_string())
            .or_insert(static_source);
    }

    if config.is_empty() {
        anyhow::bail!(
            "nothing to serve: provide --tools / TOOLS_YAML_PATH or DB2i_HOST credentials"
        );
    }

    if cli.list_toolsets {
        print_toolsets(&config);
        return Ok(());
    }

    let server = Arc::new(McpServer::new(settings, config, sources, resolved_paths)?);
    server.run().await?;
    Ok(())
}

fn print_toolsets(config: &Config) {
    if config.toolsets.is_empty() {
        println!("No toolsets defined.");
        return;
    }
    println!("Toolsets ({}):", config.toolsets.len());
    for (name, toolset) in &config.toolsets {
        let title = toolset.title.as_deref().unwrap_or("-");
        println!(
            "  {:<24} {:<32} {} tool(s): {}",
            name,
            title,
            toolset.tools.len(),
            toolset.tools.join(", ")
        );
    }
}
