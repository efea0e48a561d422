use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use conefor_cli::{ProjectConfig, conefor_pairs};
use conefor_common::{Event, EventBus, InfoSection, Outcome, Settings};
use conefor_driver::ConeforDriver;
use conefor_inputs::{Crs, Processor, RunReport, io};
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file remembering the last output directory and selection mode
    #[arg(long, global = true, default_value = "conefor-inputs.toml")]
    settings: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Conefor inputs for the layers of a project file
    Process {
        /// Path to the TOML or JSON project file
        #[arg(short, long)]
        config: PathBuf,
        /// Output directory, overriding the project file
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Only process selected features
        #[arg(long, conflicts_with = "all")]
        selected: bool,
        /// Process every feature, ignoring selections
        #[arg(long)]
        all: bool,
        /// Run Conefor on the generated files afterwards
        #[arg(long)]
        run_conefor: bool,
    },
    /// List the fields of a GeoJSON layer
    Fields {
        #[arg(short, long)]
        layer: PathBuf,
        /// Only list fields usable as node ids
        #[arg(long)]
        unique: bool,
    },
    /// Print the JSON schema of the project file
    Schema,
    /// Show or update the saved settings
    Settings {
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        only_selected: Option<bool>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Process {
            config,
            output_dir,
            selected,
            all,
            run_conefor,
        } => {
            let selection = match (selected, all) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            process_project(&cli.settings, config, output_dir.clone(), selection, *run_conefor)?;
        }
        Commands::Fields { layer, unique } => {
            list_fields(layer, *unique)?;
        }
        Commands::Schema => {
            println!("{}", ProjectConfig::json_schema()?);
        }
        Commands::Settings {
            output_dir,
            only_selected,
        } => {
            update_settings(&cli.settings, output_dir.as_deref(), *only_selected)?;
        }
    }

    Ok(())
}

fn process_project(
    settings_path: &Path,
    config_path: &Path,
    output_dir: Option<PathBuf>,
    selection: Option<bool>,
    run_conefor: bool,
) -> Result<()> {
    let mut settings = Settings::load(settings_path)?;
    let project = ProjectConfig::from_file(config_path)?;
    info!("Loaded project from {}", config_path.display());

    let output_dir = match output_dir {
        Some(dir) => dir,
        None => project.resolve_output_dir(settings.last_output_dir())?,
    };
    let use_selected = selection
        .or(project.use_selected)
        .unwrap_or_else(|| settings.only_selected());

    let layers = project.parameters()?;
    let mut processor = Processor::new(&output_dir).use_selected(use_selected);
    if let Some(crs) = &project.project_crs {
        processor = processor.project_crs(crs.clone());
    }

    let events = processor.subscribe();
    let worker = processor.spawn(layers);
    relay_events(&events);
    let report = worker
        .join()
        .map_err(|_| eyre!("processing thread panicked"))?;

    settings.set_last_output_dir(&output_dir);
    settings.set_only_selected(use_selected);
    settings.save(settings_path)?;

    print_report(&report);
    if let Outcome::Failure { message } = &report.outcome {
        return Err(eyre!("processing failed: {}", message));
    }
    if report.outcome == Outcome::Cancelled {
        return Err(eyre!("processing was cancelled"));
    }

    if run_conefor {
        run_conefor_on(&project, &report, &output_dir)?;
    }

    Ok(())
}

/// Log worker events until the run finishes
fn relay_events(events: &Receiver<Event>) {
    let mut last_logged = 0;
    for event in events.iter() {
        match event {
            Event::Progress(percent) => {
                if percent >= last_logged + 10 || percent < last_logged {
                    info!("Progress: {}%", percent);
                    last_logged = percent;
                } else {
                    debug!("Progress: {}%", percent);
                }
            }
            Event::Info { message, section } => log_info(&message, section),
            Event::Finished(_) => break,
        }
    }
}

fn log_info(message: &str, section: InfoSection) {
    match section {
        InfoSection::Warning => warn!("{}", message),
        InfoSection::Error => error!("{}", message),
        InfoSection::External => info!("conefor: {}", message),
        InfoSection::Run | InfoSection::Layer => info!("{}", message),
    }
}

fn print_report(report: &RunReport) {
    for file in &report.files {
        println!("{}\t{}\t{}", file.layer, file.kind, file.path.display());
    }
}

fn run_conefor_on(project: &ProjectConfig, report: &RunReport, output_dir: &Path) -> Result<()> {
    let conefor = project
        .conefor
        .as_ref()
        .ok_or_else(|| eyre!("--run-conefor needs a [conefor] section in the project file"))?;

    let driver = match &conefor.executable {
        Some(path) => ConeforDriver::with_path(path)?,
        None => ConeforDriver::find()?,
    };

    let pairs = conefor_pairs(&report.files);
    if pairs.is_empty() {
        warn!("No node and connection file pair to run Conefor on");
        return Ok(());
    }

    let bus = EventBus::new();
    let events = bus.subscribe();
    let relay = thread::spawn(move || {
        for event in events.iter() {
            if let Event::Info { message, section } = event {
                log_info(&message, section);
            }
        }
    });

    let mut result = Ok(());
    for (node_file, connection_file) in &pairs {
        info!(
            "Running Conefor on {} and {}",
            node_file.display(),
            connection_file.display()
        );
        let options = conefor.options(node_file, connection_file);
        match driver.run(&options, output_dir, &bus) {
            Ok(files) => {
                for file in files {
                    println!("conefor\t{}", file.display());
                }
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    drop(bus);
    let _ = relay.join();
    Ok(result?)
}

fn list_fields(path: &Path, unique: bool) -> Result<()> {
    let layer = io::load_layer(path, Crs::wgs84())?;
    let fields = if unique {
        conefor_inputs::get_unique_numeric_fields(&layer)
    } else {
        conefor_inputs::fields_of(&layer)
    };
    for field in fields {
        println!("{}", field);
    }
    Ok(())
}

fn update_settings(path: &Path, output_dir: Option<&Path>, only_selected: Option<bool>) -> Result<()> {
    let mut settings = Settings::load(path)?;
    let changed = output_dir.is_some() || only_selected.is_some();

    if let Some(dir) = output_dir {
        settings.set_last_output_dir(dir);
    }
    if let Some(only_selected) = only_selected {
        settings.set_only_selected(only_selected);
    }
    if changed {
        settings.save(path)?;
        info!("Saved settings to {}", path.display());
    }

    match settings.last_output_dir() {
        Some(dir) => println!("last_output_dir\t{}", dir.display()),
        None => println!("last_output_dir\t"),
    }
    println!("only_selected\t{}", settings.only_selected());
    Ok(())
}
