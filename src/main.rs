use anyhow::{Context, Result};
use casedash::ir::Outcome;
use casedash::runtime::{self, Session};
use casedash::{ColumnMap, DashboardOptions, OutputFormat};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "casedash")]
#[command(about = "Explore refusal and litigation case counts by country, year and category", long_about = None)]
struct Args {
    /// Input data file (.csv or .json)
    #[arg(short, long)]
    data: PathBuf,

    /// Column layout preset (overrides the config file)
    #[arg(long, value_enum)]
    schema: Option<Schema>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter expression, e.g. 'country=India,Iran; year=2018..2020'. Repeatable.
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the selected views as JSON
    Views {
        #[arg(long)]
        pretty: bool,
    },
    /// Write the filtered records as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Render every view to an image file
    Render {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long, value_enum)]
        format: Option<ImageFormat>,
    },
    /// Print key metrics for the filtered data
    Summary,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Schema {
    A34,
    Litigation,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ImageFormat {
    Png,
    Svg,
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose > 0 || std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        });
    }
    builder.init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut options = match &args.config {
        Some(path) => DashboardOptions::from_path(path)?,
        None => DashboardOptions::default(),
    };
    if let Some(schema) = args.schema {
        options.columns = match schema {
            Schema::A34 => ColumnMap::a34(),
            Schema::Litigation => ColumnMap::litigation(),
        };
    }

    let source = runtime::load_dataset(&args.data, &options.columns, &options.load)?;
    let mut session = Session::new(Arc::new(source), options.selector.clone());
    for expression in &args.filters {
        session.apply_expression(expression)?;
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match args.command {
        Command::Views { pretty } => {
            let outcome = session.dashboard()?;
            let json = if pretty {
                serde_json::to_string_pretty(&outcome)
            } else {
                serde_json::to_string(&outcome)
            }
            .context("Failed to serialize views")?;
            writeln!(handle, "{}", json).context("Failed to write to stdout")?;
        }
        Command::Export { out } => match out {
            Some(path) => {
                let file = fs::File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                session.export_csv(&options.columns, io::BufWriter::new(file))?;
                info!("Wrote {}", path.display());
            }
            None => session.export_csv(&options.columns, &mut handle)?,
        },
        Command::Render {
            out,
            width,
            height,
            format,
        } => {
            let mut render = options.render.clone();
            render.width = width.unwrap_or(render.width);
            render.height = height.unwrap_or(render.height);
            if let Some(format) = format {
                render.format = match format {
                    ImageFormat::Png => OutputFormat::Png,
                    ImageFormat::Svg => OutputFormat::Svg,
                };
            }

            match session.dashboard()? {
                Outcome::NoData { message } => writeln!(handle, "{}", message).context("Failed to write to stdout")?,
                Outcome::Ready(dashboard) => {
                    fs::create_dir_all(&out).with_context(|| format!("Failed to create {}", out.display()))?;
                    for (name, bytes) in runtime::render_dashboard(&dashboard, &render)? {
                        let path = out.join(name);
                        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
                        writeln!(handle, "{}", path.display()).context("Failed to write to stdout")?;
                    }
                }
            }
        }
        Command::Summary => match session.dashboard()? {
            Outcome::NoData { message } => writeln!(handle, "{}", message).context("Failed to write to stdout")?,
            Outcome::Ready(dashboard) => {
                writeln!(handle, "{}", dashboard.filters).context("Failed to write to stdout")?;
                writeln!(handle, "View: {}", serde_json::to_string(&dashboard.state)?.trim_matches('"'))
                    .context("Failed to write to stdout")?;
                write!(handle, "{}", dashboard.metrics).context("Failed to write to stdout")?;
                if let Some(split) = dashboard.resident_split {
                    writeln!(handle, "{:<18} {}", "Permanent:", split.permanent).context("Failed to write to stdout")?;
                    writeln!(handle, "{:<18} {}", "Temporary:", split.temporary).context("Failed to write to stdout")?;
                }
            }
        },
    }

    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
