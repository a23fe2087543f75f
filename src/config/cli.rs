use clap::Parser;

#[cfg(unix)]
const CONFIG_FILE_PATH: &str = "/etc/opt/haa-config.json";

#[cfg(not(unix))]
const CONFIG_FILE_PATH: &str = "./config.json";

/// Boot-time CLI (spec.md §6 "CLI/boot semantics"): everything else
/// that once lived in non-volatile config is loaded from the same
/// persisted document this flag points at.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// JSON configuration document path
    #[clap(short = 'c', long = "config", default_value = CONFIG_FILE_PATH)]
    pub config: std::path::PathBuf,

    /// Force setup mode regardless of the persisted flag
    #[clap(long)]
    pub force_setup: bool,
}
