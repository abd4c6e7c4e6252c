use std::{io::IsTerminal as _, path::PathBuf};

use clap::{ColorChoice, Parser};
use extserver_core::ProductVersion;

#[derive(Parser, Debug, Clone)]
pub struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// What extserver knows about the servers it manages
    #[arg(long, global = true, default_value = "extserver-state.json")]
    pub state: PathBuf,

    /// The configuration store to converge
    #[arg(long, global = true, default_value = "extserver-store.json")]
    pub store: PathBuf,

    /// Version of the product the configuration store belongs to
    #[arg(long, global = true, default_value = "10.1.0.0")]
    pub product_version: ProductVersion,
}

impl Options {
    pub fn use_color(&self) -> bool {
        match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::stderr().is_terminal(),
        }
    }
}
