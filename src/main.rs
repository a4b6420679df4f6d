use clap::{Parser, Subcommand};
use staticpage::data::DataStore;
use staticpage::minify::TextMinifier;
use staticpage::pipeline::{self, Collaborators};
use staticpage::render::TeraRenderer;
use staticpage::store::{ObjectStore, S3Store};
use staticpage::stylesheet::GrassCompiler;
use staticpage::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "staticpage")]
#[command(about = "Static site builder with minify/gzip variants and incremental CDN publishing")]
#[command(long_about = "\
Static site builder with minify/gzip variants and incremental CDN publishing

A build runs up to four stages, each enabled in staticpage.toml:

  pages    render .html templates and .md documents into the site root
  static   copy static assets under the static URL path
  sass     compile .scss/.sass into css/ (site or CDN staging)
  cdn      upload the CDN staging tree, skipping unchanged objects

Minified (.min) and gzipped (.gz) variants are written next to outputs whose
extension is listed under [minify] / [gzip].

Set RUST_LOG (e.g. RUST_LOG=staticpage=debug) for diagnostic logging.
Run 'staticpage gen-config' to generate a documented staticpage.toml.")]
#[command(version)]
struct Cli {
    /// Config file; relative directories inside it resolve against its location
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the enabled stages: clean → pages → static → sass → cdn
    Build,
    /// Validate the config and show which stages would run
    Check,
    /// Print a stock staticpage.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build => {
            let site_config = config::load_config(&cli.config)?;
            init_thread_pool(&site_config.processing);

            let renderer = TeraRenderer::new(
                &site_config.dirs.pages,
                &site_config.dirs.templates,
                DataStore::new(&site_config.dirs.data),
            )?;
            let compiler = GrassCompiler::new().with_load_path(&site_config.dirs.sass);
            let store = if site_config.cdn.execute {
                Some(S3Store::new(&site_config.cdn)?)
            } else {
                None
            };
            let collaborators = Collaborators {
                renderer: &renderer,
                compiler: &compiler,
                minifier: &TextMinifier,
                store: store.as_ref().map(|s| s as &dyn ObjectStore),
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_build_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = pipeline::build(&site_config, collaborators, Some(&tx));
            drop(tx);
            printer.join().ok();

            let report = result?;
            println!();
            output::print_build_report(&report);
        }
        Command::Check => {
            let site_config = config::load_config(&cli.config)?;
            output::print_check_output(&cli.config, &pipeline::stage_plan(&site_config));
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
