use clap::{Parser, Subcommand};
use stacey::config::{self, RunInfo};
use stacey::{output, site};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("STACEY_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("STACEY_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "stacey")]
#[command(about = "Static site generator for numbered content trees")]
#[command(long_about = "\
Static site generator for numbered content trees

Your filesystem is the data source. Directories named <int>.<slug> become
pages, the number orders siblings (highest first), and the slug becomes the
URL segment. Each page directory holds one content file.

Content structure:

  content/
  ├── 1.journal/                   # /journal/ (gallery: has children)
  │   ├── index.md                 # Header fields + Markdown body
  │   ├── thumb.jpg                # Preview image, used by parent listings
  │   ├── 1.winter/                # /journal/winter/ (leaf)
  │   │   ├── index.md
  │   │   └── photo.jpg            # Copied next to the page, listed in `images`
  │   └── 2.spring-trip/           # /journal/spring-trip/
  │       └── index.md
  ├── 2.about/
  │   └── index.md
  └── scratch/                     # No number prefix = not a page

Content file:

  title: Spring Trip
  date: 2024-03-01
  tags: travel, notes
  template: gallery                # Optional; gallery/leaf chosen otherwise
  content:
  Markdown body follows the content: line.

Run 'stacey gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Log debug detail (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Config file shared by commands that read the content tree.
#[derive(clap::Args, Clone)]
struct SiteArgs {
    /// Site config file; stock defaults in the working directory if omitted
    config: Option<PathBuf>,
}

#[derive(clap::Args, Clone)]
struct BuildArgs {
    #[command(flatten)]
    site: SiteArgs,

    /// Only render pages whose content changed since the last build
    #[arg(short, long)]
    incremental: bool,

    /// Walk and link only, print the inventory, write nothing
    #[arg(short = 'd', long)]
    dry_run: bool,

    /// Write the list of updated files as JSON
    #[arg(long, value_name = "FILE")]
    changed_list: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Render the site: walk → link → render → feed
    Build(BuildArgs),
    /// Validate the content tree and templates without writing anything
    Check(SiteArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Build(args) => {
            let site_config = config::load_or_default(args.site.config.as_deref())?
                .with_run(RunInfo::now(args.incremental));

            if args.dry_run {
                println!("==> Dry run: {}", site_config.src_root.display());
                let tree = site::check(site_config)?;
                output::print_check_output(&tree);
                return Ok(());
            }

            println!("==> Building {}", site_config.dest_root.display());
            let build = site::build(site_config)?;
            output::print_build_output(&build.tree, build.feed.as_deref());

            if let Some(path) = args.changed_list {
                let json = serde_json::to_string_pretty(&build.changed_files())?;
                std::fs::write(&path, json)?;
                println!("==> Changed files → {}", path.display());
            }
        }
        Command::Check(args) => {
            let site_config =
                config::load_or_default(args.config.as_deref())?.with_run(RunInfo::now(false));
            println!("==> Checking {}", site_config.src_root.display());
            let tree = site::check(site_config)?;
            output::print_check_output(&tree);
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
