use clonality_cli::pipeline::{self, AnalysisConfig};
use std::io::Read;
use std::path::PathBuf;
#[macro_use]
extern crate log;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = clonality_cli::clonality_commands::clonality_parser().get_matches();
    let (name, sub_m) = match matches.subcommand() {
        Some(subcommand) => subcommand,
        None => unreachable!(),
    };
    let path: &PathBuf = sub_m.get_one("config").ok_or("--config is required")?;
    let mut config = load_config(path)?;
    let level = match sub_m.get_count("verbose") as usize + config.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    debug!("CONFIG\t{}", path.display());
    match name {
        "run" => {
            if let Some(&threads) = sub_m.get_one::<usize>("threads") {
                config.threads = threads;
            }
            if let Some(&num_iters) = sub_m.get_one::<usize>("num_iters") {
                config.num_iters = num_iters;
            }
            if let Some(&seed) = sub_m.get_one::<u64>("seed") {
                config.seed = seed;
            }
            pipeline::run_analysis(&config)?;
        }
        "summarize" => {
            let output: &PathBuf = sub_m.get_one("output").ok_or("--output is required")?;
            let burnin = sub_m.get_one::<usize>("burnin").copied().unwrap_or(0);
            let thin = sub_m.get_one::<usize>("thin").copied().unwrap_or(1);
            pipeline::summarize(&config, output, burnin, thin)?;
        }
        _ => unreachable!(),
    }
    Ok(())
}

fn load_config(path: &std::path::Path) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let mut rdr = std::fs::File::open(path).map(std::io::BufReader::new)?;
    let mut file = String::new();
    rdr.read_to_string(&mut file)?;
    let config: AnalysisConfig = toml::from_str(&file)?;
    Ok(config)
}
