use clap::{Parser, Subcommand, builder::styling};
use etl_pipeline::cli;
use etl_pipeline::config::SourceKind;
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// etlp: extract a dataset from an API or CSV source, transform it and load it into a store
#[derive(Parser)]
#[command(name = "etlp", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source store credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// The source registry mapping dataset names to URLs and files
    #[arg(short, long, global = true, default_value = "data_config.json")]
    config: PathBuf,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one dataset through extract, transform and load
    Run {
        /// Source kind: api, csv or database
        #[arg(value_enum, ignore_case = true)]
        source: SourceKind,

        /// Dataset name as registered in the source config
        dataset: String,

        /// Write the records to this NDJSON file instead of the configured store
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the known routes and whether their datasets are configured
    List,

    /// Print the rows stored in a relational table
    Show {
        /// Table to read
        #[arg(default_value = "Crypto")]
        table: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    cli::load_env_file(&args.env)?;

    let log_level = match args.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match args.command {
        Commands::Run {
            source,
            dataset,
            output,
        } => {
            log::info!(
                "Running {} dataset {}",
                source.cyan(),
                dataset.bright_black()
            );
            let result = cli::run_dataset(&args.config, source, &dataset, output.as_deref()).await?;
            println!(
                "{} {} record(s) into {}",
                "✓".green(),
                result.inserted,
                result.target.bright_black()
            );
        }
        Commands::List => {
            let dispatcher = cli::build_dispatcher(&args.config, None)?;
            for line in cli::describe_routes(&dispatcher) {
                println!("{}", line);
            }
        }
        Commands::Show { table } => {
            log::info!("Reading {} from {}", table.cyan(), cli::sqlite_path().display());
            let rows = cli::show_table(&table)?;
            for row in &rows {
                println!("{}", row.to_json());
            }
            log::info!("{} row(s)", rows.len());
        }
    }

    Ok(())
}
