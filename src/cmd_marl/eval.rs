use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use itertools::Itertools;
use marl::libs::chip::Chip;
use marl::libs::conflict::ConflictModel;
use marl::libs::eval;
use std::io::Write;

pub fn make_subcommand() -> Command {
    Command::new("eval")
        .about("Border length / conflict index of a layout")
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
                .help("Conflict model for the conflict index"),
        )
        .arg(
            Arg::new("per_step")
                .long("per-step")
                .action(clap::ArgAction::SetTrue)
                .help("Also report the border length of every deposition step"),
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

    let chip = Chip::read_layout(&mut marl::reader(infile))?;
    let mut writer = marl::writer(outfile);

    let bl = eval::border_length(&chip);
    writeln!(writer, "border_length\t{}", bl)?;
    writeln!(
        writer,
        "normalized\t{:.4}",
        bl as f64 / chip.num_probes as f64
    )?;

    if !model.is_border_length() {
        writeln!(
            writer,
            "avg_conflict_index\t{:.4}",
            eval::average_conflict_index(&chip, &model)
        )?;
    }

    if args.get_flag("per_step") {
        let per_step = eval::border_length_per_step(&chip);
        writeln!(writer, "per_step\t{}", per_step.iter().join(","))?;
    }

    Ok(())
}
