//! multiquery - query several AI models and get the best merged response

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multiquery::app::App;
use multiquery::config::{Config, Credentials};
use multiquery::ui::Renderer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Query prompt to send to all endpoints
    #[arg(short, long)]
    prompt: Option<String>,

    /// Show individual responses from each endpoint
    #[arg(short = 'i', long)]
    show_individual: bool,

    /// Run in interactive mode
    #[arg(long)]
    interactive: bool,

    /// Show credential status and setup instructions
    #[arg(long)]
    setup: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let dotenv = dotenvy::dotenv();

    // Initialize logging; stdout is reserved for results
    let filter = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    if args.init_config {
        let path = args.config.clone().unwrap_or_else(Config::default_path);
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        Config::default().save(&path)?;
        println!("Wrote default config to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(args.config.as_deref())?;
    let credentials = Credentials::from_env(&config);
    let color = atty::is(atty::Stream::Stdout);

    if args.setup {
        print!("{}", Renderer::new(&config.display, color).setup(&config, &credentials));
        return Ok(ExitCode::SUCCESS);
    }

    let app = App::new(&config, &credentials, color);
    println!("{}", app.renderer().banner());

    if args.interactive {
        app.run_interactive().await?;
        Ok(ExitCode::SUCCESS)
    } else if let Some(prompt) = args.prompt {
        if app.run_query(&prompt, args.show_individual).await? {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::FAILURE)
        }
    } else {
        eprintln!("Please provide a prompt with -p or use --interactive mode");
        eprintln!("Use --help for more options");
        Ok(ExitCode::from(2))
    }
}
