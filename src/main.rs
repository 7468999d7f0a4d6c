use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use manga_overlay::FitPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "manga-overlay",
    version,
    about = "Overlay translated text onto manga pages"
)]
struct Cli {
    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the overlay for one page
    Render {
        /// Captured page image
        #[arg(short = 'i', long = "image")]
        image: PathBuf,

        /// Recognition JSON with panels, bubbles and outside_text
        #[arg(short = 'p', long = "panels")]
        panels: PathBuf,

        /// Display width in px (default: native width)
        #[arg(short = 'w', long = "width")]
        width: Option<f32>,

        /// Font fitting policy (default: from settings)
        #[arg(long = "policy", value_enum)]
        policy: Option<FitPolicy>,

        /// Outline every region box
        #[arg(long = "debug")]
        debug: bool,

        /// Output image path; the format follows the extension. Writes to stdout when omitted
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Print the font size assignment as JSON
        #[arg(long = "sizes")]
        sizes: bool,
    },
    /// Serve the overlay endpoint for the capture extension
    Serve {
        /// Listen address (default: from settings [server])
        #[arg(short = 'a', long = "addr")]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    manga_overlay::logging::init(cli.verbose)?;

    match cli.command {
        Command::Serve { addr } => manga_overlay::serve(cli.read_settings.as_deref(), addr).await,
        Command::Render {
            image,
            panels,
            width,
            policy,
            debug,
            output,
            sizes,
        } => {
            let config = manga_overlay::Config {
                image,
                panels,
                width,
                policy,
                debug,
                output,
                settings_path: cli.read_settings,
            };
            let result = tokio::task::spawn_blocking(move || manga_overlay::run(config)).await??;
            let mut stdout = io::stdout().lock();
            if sizes {
                writeln!(stdout, "{}", result.sizes_json()?)?;
            } else if result.written_to.is_none() {
                stdout.write_all(&result.page.bytes)?;
            }
            stdout.flush()?;
            Ok(())
        }
    }
}
