use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn arg_config() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("TOML")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file. See demos/config.toml for an example.")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Debug mode")
}

fn subcommand_run() -> Command {
    Command::new("run")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Sample the posterior of the clonal prevalences and write the trace.")
        .arg(arg_config())
        .arg(arg_verbose())
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(value_parser!(usize))
                .help("Number of threads. Overrides the configuration."),
        )
        .arg(
            Arg::new("num_iters")
                .long("num_iters")
                .value_name("ITER")
                .value_parser(value_parser!(usize))
                .help("Number of sweeps. Overrides the configuration."),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Seed of the random number generator. Overrides the configuration."),
        )
}

fn subcommand_summarize() -> Command {
    Command::new("summarize")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Summarize the trace into a TSV of posterior prevalences and clusters.")
        .arg(arg_config())
        .arg(arg_verbose())
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATH")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("burnin")
                .long("burnin")
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Number of records discarded from the beginning."),
        )
        .arg(
            Arg::new("thin")
                .long("thin")
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Keep every THIN-th record after the burn-in."),
        )
}

pub fn clonality_parser() -> Command {
    Command::new("clonality")
        .version("0.1")
        .author("Bansho Masutani <ban-m@g.ecc.u-tokyo.ac.jp>")
        .about("Clonal prevalence inference by a Dirichlet process mixture")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(subcommand_run())
        .subcommand(subcommand_summarize())
}
