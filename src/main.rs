use asmint::{Vm, VmConfig};
use clap::{Arg, ArgMatches, Command};
use std::error::Error;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn args() -> ArgMatches {
    Command::new("asmint")
        .about("a small interpreter for a toy register assembly language")
        .version("0.1.0")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .takes_value(true)
                .required(true)
                .help("assembly source file to interpret"),
        )
        .arg(
            Arg::new("ir")
                .short('i')
                .long("ir")
                .required(false)
                .takes_value(false)
                .help("prints the linked instructions and exits without running them"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .takes_value(false)
                .required(false)
                .help("logs registers and call stack before each executed instruction"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .required(false)
                .takes_value(false)
                .help("suppresses all output other than what the program is producing"),
        )
        .get_matches()
}

fn init_logging(debug: bool, quiet: bool) {
    let default = if debug {
        "asmint=trace"
    } else if quiet {
        "warn"
    } else {
        "asmint=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = args();
    let file_name = args.value_of("file").unwrap_or_default();
    let ir = args.is_present("ir");
    let debug = args.is_present("debug");
    let quiet = args.is_present("quiet");
    init_logging(debug, quiet);

    info!(file = file_name, "loading and linking the provided source");
    let start = Instant::now();
    let config = VmConfig::from_file(file_name)?
        .with_raw(ir)
        .with_debug(debug);
    let mut vm = Vm::new(config)?;
    let elapsed = start.elapsed();
    info!(
        "initialized in {} ms ({} ns)",
        elapsed.as_millis(),
        elapsed.as_nanos()
    );

    if !ir {
        let start = Instant::now();
        let outcome = vm.run()?;
        let elapsed = start.elapsed();
        info!(
            "routine took {} ms ({} ns)",
            elapsed.as_millis(),
            elapsed.as_nanos()
        );
        println!("{}", outcome);
    }

    Ok(())
}
