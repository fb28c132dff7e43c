use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use marl::libs::chip::Chip;
use marl::libs::conflict::ConflictModel;
use marl::libs::reembed::{sequential_reembed, ReembedOptions};

pub fn make_subcommand() -> Command {
    Command::new("reembed")
        .about("Optimally re-embed probes in place")
        .after_help(
            r###"Runs sequential Optimum Single-Probe Embedding passes over the
layout: each spot is re-embedded with minimum conflict to its neighbors,
repeatedly, until the relative improvement of a pass drops below the
threshold. Spots never move; only the embeddings change.

Conflict models: border, default, simplified, unbalanced.

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Input layout file. [stdin] for screen"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .default_value("border")
                .help("Conflict model"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_parser(clap::value_parser!(f64))
                .default_value("0.001")
                .help("Stop when a pass improves less than this fraction"),
        )
        .arg(
            Arg::new("reset_first")
                .long("reset-first")
                .action(clap::ArgAction::SetTrue)
                .help("First pass sees only probes already re-embedded"),
        )
        .arg(
            Arg::new("max_passes")
                .long("max-passes")
                .value_parser(clap::value_parser!(usize))
                .default_value("0")
                .help("Hard cap on passes, 0 = until converged"),
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
    let model = ConflictModel::from_name(args.get_one::<String>("model").unwrap())?;

    let opts = ReembedOptions {
        threshold: *args.get_one::<f64>("threshold").unwrap(),
        reset_first: args.get_flag("reset_first"),
        max_passes: *args.get_one::<usize>("max_passes").unwrap(),
    };

    let mut chip = Chip::read_layout(&mut marl::reader(infile))?;
    let stats = sequential_reembed(&mut chip, &model, &opts)?;
    eprintln!(
        "{} passes, quality {} -> {}",
        stats.passes, stats.initial, stats.current
    );

    let mut writer = marl::writer(outfile);
    chip.write_layout(&mut writer)?;

    Ok(())
}
