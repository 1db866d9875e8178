use std::fs::{self, File};

use anyhow::{Context, Result};
use env_logger::{Env, Target};
use wschat::{config, config::Config, tui};

fn main() -> Result<()> {
    let dir = config::config_dir()?;
    fs::create_dir_all(&dir)?;

    // the terminal belongs to the UI, so logs go to a file
    let log_file = File::create(dir.join("client.log")).context("creating client.log")?;
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(log_file)))
        .init();

    let config_path = config::config_path()?;
    let mut config = Config::load_or_create(&config_path)?;
    if let Some(url) = std::env::args().nth(1) {
        config.server_url = url;
    }

    tui::start(config, &config_path)
}
