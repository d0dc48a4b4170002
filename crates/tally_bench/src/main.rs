use clap::Parser;
use tally_bench::BenchArguments;
use tally_error::Result;

fn main() -> Result<()> {
    let args = BenchArguments::parse();
    logutil::configure_global_logger(
        logutil::level_from_verbosity(args.verbose),
        args.log_format.into(),
        std::io::stderr,
    );

    let report = tally_bench::run(&args)?;
    println!("{report}");

    Ok(())
}
