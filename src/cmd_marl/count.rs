use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use itertools::Itertools;
use marl::libs::chip::Chip;
use marl::libs::counter::EmbeddingCounter;
use std::io::Write;

pub fn make_subcommand() -> Command {
    Command::new("count")
        .about("Number of valid embeddings per probe")
        .after_help(
            r###"Probes with very few embeddings make good pivots: they cannot be
re-embedded much, so placement heuristics anchor on them. On paired chips
counts are per pair (both middle-base orderings summed) and reported under
the PM probe ID.

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Input layout file. [stdin] for screen"),
        )
        .arg(
            Arg::new("pivots")
                .long("pivots")
                .value_parser(clap::value_parser!(usize))
                .help("Only report the N probes with the fewest embeddings"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let infile = args.get_one::<String>("infile").unwrap();
    let outfile = args.get_one::<String>("outfile").unwrap();

    let chip = Chip::read_layout(&mut marl::reader(infile))?;
    let mut writer = marl::writer(outfile);
    let mut counter = EmbeddingCounter::new();

    let step = if chip.is_paired() { 2 } else { 1 };
    let counts: Vec<(usize, u64)> = (0..chip.num_probes)
        .step_by(step)
        .map(|id| (id, counter.count(&chip, id)))
        .collect();

    match args.get_one::<usize>("pivots").copied() {
        Some(n) => {
            for (id, count) in counts
                .iter()
                .sorted_by_key(|&&(id, count)| (count, id))
                .take(n)
            {
                writeln!(writer, "{}\t{}", id, count)?;
            }
        }
        None => {
            for (id, count) in &counts {
                writeln!(writer, "{}\t{}", id, count)?;
            }
        }
    }

    Ok(())
}
