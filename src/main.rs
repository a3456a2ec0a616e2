use clap::{Parser, Subcommand};
use showreel::catalog::{Catalog, load_catalog};
use showreel::gallery::{CategoryFilter, Gallery, GalleryOptions};
use showreel::platform::{ConnectionInfo, Frame, NetworkInfo, PlatformError};
use showreel::poster::{PosterOptions, encode_poster};
use showreel::profiler::ConnectionProfiler;
use showreel::{config, output};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "showreel")]
#[command(about = "Inspect a portfolio catalog and its media delivery settings")]
#[command(long_about = "\
Inspect a portfolio catalog and its media delivery settings

The catalog lists every asset shown in the gallery grid. Videos open the
overlay player; images are shown as-is.

  catalog.toml
  [[assets]]
  id = 7
  title = \"Luxury GYM Design in Guwahati\"
  category = \"commercial\"
  url = \"/videos/GYM.mp4\"
  thumbnail = \"https://images.pexels.com/photos/380768/pexels-photo-380768.jpeg\"

Delivery settings (visibility margin, encodings, poster capture, playback)
live in an optional config.toml. Run 'showreel gen-config' for a documented
stock file.")]
#[command(version)]
struct Cli {
    /// Catalog file
    #[arg(long, default_value = "catalog.toml", global = true)]
    catalog: PathBuf,

    /// Directory holding config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate config and catalog
    Check,
    /// List catalog assets, optionally filtered by category
    List {
        /// Category to show ("all" for everything)
        #[arg(long, default_value = "all")]
        category: String,
        /// Print assets as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the quality tier for a connection and the sources it selects
    Tier {
        /// Effective connection type reported by the client (4g, 3g, 2g, slow-2g)
        #[arg(long)]
        effective_type: Option<String>,
        /// Client has data saver enabled
        #[arg(long)]
        save_data: bool,
        /// Video URL to expand into source candidates
        #[arg(long, default_value = "/videos/sample.mp4")]
        url: String,
    },
    /// Encode a still image through the poster encoder
    Poster {
        /// Image to encode
        image: PathBuf,
        /// Write the data URL here instead of stdout
        #[arg(long = "output")]
        destination: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Connection snapshot given on the command line.
struct CliNetwork(Option<ConnectionInfo>);

impl NetworkInfo for CliNetwork {
    fn connection(&self) -> Result<ConnectionInfo, PlatformError> {
        self.0.clone().ok_or(PlatformError::ConnectionInfoUnavailable)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("showreel=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check => {
            let config = config::load_config(&cli.config_dir)?;
            let catalog = load_catalog(&cli.catalog)?;
            output::print_config(&config);
            println!();
            list(catalog, &config, CategoryFilter::All)?;
            println!("==> Config and catalog are valid");
        }
        Command::List { category, json } => {
            let config = config::load_config(&cli.config_dir)?;
            let catalog = load_catalog(&cli.catalog)?;
            let filter = CategoryFilter::parse(&category);
            if json {
                let gallery = gallery(catalog, &config, filter)?;
                println!("{}", serde_json::to_string_pretty(&gallery.visible_assets())?);
            } else {
                list(catalog, &config, filter)?;
            }
        }
        Command::Tier {
            effective_type,
            save_data,
            url,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let info = (effective_type.is_some() || save_data).then(|| ConnectionInfo {
                effective_type,
                save_data,
            });
            let network = CliNetwork(info);
            let profiler = ConnectionProfiler::detect(&network, config.quality.fallback_tier);
            output::print_tier(network.0.as_ref(), profiler.current_tier(), &url, &config);
        }
        Command::Poster { image, destination } => {
            let config = config::load_config(&cli.config_dir)?;
            let (dimensions, data_url) = poster(&image, &PosterOptions::from(&config.poster))?;
            match destination {
                Some(path) => {
                    std::fs::write(&path, &data_url)?;
                    output::print_poster(&image, dimensions, &data_url, &path);
                }
                None => println!("{data_url}"),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn gallery(
    catalog: Catalog,
    config: &config::ReelConfig,
    filter: CategoryFilter,
) -> Result<Gallery, Box<dyn std::error::Error>> {
    let mut gallery = Gallery::new(catalog, GalleryOptions::from_config(config)?)?;
    gallery.set_filter(filter);
    Ok(gallery)
}

fn list(
    catalog: Catalog,
    config: &config::ReelConfig,
    filter: CategoryFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    let gallery = gallery(catalog, config, filter)?;
    output::print_catalog(
        &gallery.visible_assets(),
        gallery.filter(),
        &gallery.categories(),
    );
    Ok(())
}

fn poster(
    path: &Path,
    options: &PosterOptions,
) -> Result<((u32, u32), String), Box<dyn std::error::Error>> {
    let raster = image::open(path)?.to_rgba8();
    let dimensions = raster.dimensions();
    debug!(path = %path.display(), width = dimensions.0, height = dimensions.1, "decoded still");
    let frame = Frame {
        width: dimensions.0,
        height: dimensions.1,
        rgba: raster.into_raw(),
    };
    Ok((dimensions, encode_poster(&frame, options)?))
}
