use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use rigcfg::args::{KeyStoreClient, MapKeyStore};
use rigcfg::definition::BundledResources;
use rigcfg::{ClassRegistry, ConfigurationFactory, DocumentLocator};

/// Load a test-rig configuration, apply command-line overrides and report it
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory searched for configuration documents (repeatable)
    #[arg(short = 'd', long = "search-dir")]
    search_dirs: Vec<PathBuf>,

    /// Directory whose .xml documents are registered as bundled configurations
    #[arg(long)]
    bundle_dir: Option<PathBuf>,

    /// YAML file of key store entries for USE_KEYSTORE@ values
    #[arg(long)]
    keystore: Option<PathBuf>,

    /// Print the resolved configuration as XML
    #[arg(long)]
    dump_xml: bool,

    /// Type or class name to leave out of the XML dump (repeatable)
    #[arg(long, requires = "dump_xml")]
    exclude: Vec<String>,

    /// Print every option with its value and provenance as JSON
    #[arg(long)]
    json: bool,

    /// Print help for the configuration's important options
    #[arg(long)]
    help_options: bool,

    /// With --help-options, include every option
    #[arg(long, requires = "help_options")]
    all_options: bool,

    /// Name of the configuration to load
    config: String,

    /// Option overrides and --template:map pairs for the configuration
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    options: Vec<String>,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Configuration: {}", args.config);
    let mut locator = DocumentLocator::new().with_search_dirs(args.search_dirs.clone());
    if let Some(dir) = &args.bundle_dir {
        let resources = BundledResources::from_dir(dir)
            .wrap_err_with(|| format!("Failed to bundle configurations from '{}'", dir.display()))?;
        locator = locator.with_resources(Box::new(resources));
    }
    let keystore = match &args.keystore {
        Some(path) => Some(
            MapKeyStore::from_yaml_file(path)
                .wrap_err_with(|| format!("Failed to load key store '{}'", path.display()))?,
        ),
        None => None,
    };

    let factory = ConfigurationFactory::new(ClassRegistry::with_builtins(), locator);
    let mut command = Vec::with_capacity(args.options.len() + 1);
    command.push(args.config.clone());
    command.extend(args.options.iter().cloned());
    let config = factory
        .create_configuration_from_args(&command, keystore.as_ref().map(|k| k as &dyn KeyStoreClient))
        .wrap_err_with(|| format!("Failed to create configuration '{}'", args.config))?;

    if args.help_options {
        print!("{}", config.print_command_usage(!args.all_options));
        return Ok(());
    }

    config.validate_options().wrap_err("Configuration is not valid")?;

    if args.json {
        let usage = serde_json::to_string_pretty(&config.json_command_usage())
            .wrap_err("Failed to serialize option usage")?;
        println!("{}", usage);
    }
    if args.dump_xml {
        print!("{}", config.dump_xml(&args.exclude));
    }
    if !args.json && !args.dump_xml {
        for placed in config.all_objects() {
            match placed.device.filter(|_| config.is_multi_device()) {
                Some(device) => info!("{} [{}]: {}", placed.type_name, device.name(), placed.object().class_name()),
                None => info!("{}: {}", placed.type_name, placed.object().class_name()),
            }
        }
    }

    info!("Configuration '{}' resolved successfully", config.name());
    Ok(())
}
