use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "finwatch")]
#[command(about = "Finwatch alert engine", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the alert pipeline once and print the persisted count
    Run,
    /// List persisted alerts
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Some(config) = args.config {
        std::env::set_var("FINWATCH_CONFIG", config);
    }

    match args.command {
        Command::Run => {
            let persisted = finwatch_bootstrap::run_pipeline().await?;
            println!("{persisted}");
        }
        Command::List {
            page,
            per_page,
            kind,
            priority,
            status,
            category,
        } => {
            let query = finwatch_bootstrap::build_query(
                page, per_page, kind, priority, status, category,
            );
            let result = finwatch_bootstrap::list_alerts(query).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}
