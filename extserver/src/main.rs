mod apply;
mod catalog;
mod declaration;
mod logging;
mod options;
mod server;
mod state;

use std::{future::Future, process::exit};

use anyhow::Result;
use clap::{CommandFactory as _, Parser, Subcommand};
use options::Options;

fn main() {
    let args = Args::parse();
    handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    let _frontend = logging::set_up(logging::Options {
        verbose: args.options.verbose,
        color: args.options.use_color(),
    })?;
    match &args.command {
        Commands::Apply(subargs) => block_on(apply::apply(&args.options, subargs)),
        Commands::Plan(subargs) => block_on(apply::plan(&args.options, subargs)),
        Commands::Read(subargs) => block_on(server::read(&args.options, subargs)),
        Commands::Delete(subargs) => block_on(server::delete(&args.options, subargs)),
        Commands::Variants => catalog::variants(),
        Commands::Attributes { variant } => catalog::attributes(variant),
        Commands::GenerateMan => (|| {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        })(),
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(*shell, &mut cmd, "extserver", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// The store is a local file; one thread is plenty.
fn block_on<T>(f: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(f)
}

fn handle_result(r: Result<()>) {
    match r {
        Ok(()) => {}
        Err(e) => {
            eprintln!("extserver error: {:#}", e);
            exit(1);
        }
    }
}

/// Manage external server configurations declaratively
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, update and remove external servers so that the store matches the declarations
    #[command()]
    Apply(apply::Args),

    /// Show what `apply` would do, without changing anything
    #[command()]
    Plan(apply::Args),

    /// Refresh one external server from the store and report drift
    #[command()]
    Read(server::Args),

    /// Delete one external server, or forget it if it was adopted
    #[command()]
    Delete(server::Args),

    /// List the supported external server types
    Variants,

    /// List the attributes of an external server type
    Attributes {
        /// The external server type, e.g. `smtp`
        variant: String,
    },

    /// Generate markdown documentation for extserver
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for extserver
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for extserver
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
