use std::path::PathBuf;

use anyhow::Result;
use platereader::{export, pipeline, ExperimentConfig};

fn main() -> Result<()> {
    env_logger::init();

    // Optional path to an experiment JSON; defaults otherwise.
    let config = match std::env::args_os().nth(1) {
        Some(path) => ExperimentConfig::load(&PathBuf::from(path))?,
        None => ExperimentConfig::default(),
    };

    let table = pipeline::run(&config)?;
    println!("{}", export::head(&table, 5)?);

    for path in pipeline::write_outputs(&config, &table)? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
