use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use marl::libs::chip::{Chip, Topology, AFFY_DEP_SEQ};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub fn make_subcommand() -> Command {
    Command::new("make")
        .about("Generate a random chip layout")
        .after_help(
            r###"Fills the grid with uniformly random valid embeddings. On paired
chips (--pairs) each PM probe gets a synchronized MM partner on the spot
directly below it.

The deposition sequence can be given literally or as the keyword "affy"
(TGCA repeated over 74 steps, Affymetrix style).

"###,
        )
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(usize))
                .default_value("16")
                .help("Number of rows of spots"),
        )
        .arg(
            Arg::new("cols")
                .long("cols")
                .value_parser(clap::value_parser!(usize))
                .default_value("16")
                .help("Number of columns of spots"),
        )
        .arg(
            Arg::new("probes")
                .long("probes")
                .value_parser(clap::value_parser!(usize))
                .help("Number of probes (default: fill every spot)"),
        )
        .arg(
            Arg::new("probe_len")
                .long("probe-len")
                .value_parser(clap::value_parser!(usize))
                .default_value("25")
                .help("Probe length"),
        )
        .arg(
            Arg::new("dep_seq")
                .long("dep-seq")
                .default_value("affy")
                .help("Deposition sequence, or \"affy\""),
        )
        .arg(
            Arg::new("pairs")
                .long("pairs")
                .action(clap::ArgAction::SetTrue)
                .help("Generate PM/MM probe pairs"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(clap::value_parser!(u64))
                .help("RNG seed for reproducible layouts"),
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
    let rows = *args.get_one::<usize>("rows").unwrap();
    let cols = *args.get_one::<usize>("cols").unwrap();
    let probe_len = *args.get_one::<usize>("probe_len").unwrap();
    let pairs = args.get_flag("pairs");
    let outfile = args.get_one::<String>("outfile").unwrap();

    let dep_seq = match args.get_one::<String>("dep_seq").unwrap().as_str() {
        "affy" => AFFY_DEP_SEQ.to_string(),
        s => s.to_ascii_uppercase(),
    };

    let topology = if pairs { Topology::PmPair } else { Topology::Single };
    let capacity = if pairs {
        cols * 2 * (rows / 2)
    } else {
        rows * cols
    };
    let probes = args.get_one::<usize>("probes").copied().unwrap_or(capacity);

    let mut chip = Chip::new(rows, cols, probes, probe_len, &dep_seq, topology)?;

    let mut rng = match args.get_one::<u64>("seed") {
        Some(&s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    chip.randomize(&mut rng)?;

    let mut writer = marl::writer(outfile);
    chip.write_layout(&mut writer)?;

    Ok(())
}
