extern crate clap;
use clap::*;

mod cmd_marl;

fn main() -> anyhow::Result<()> {
    let app = Command::new("marl")
        .version(crate_version!())
        .about("`marl` - MicroARray Layout refiner")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .subcommand(cmd_marl::make::make_subcommand())
        .subcommand(cmd_marl::reembed::make_subcommand())
        .subcommand(cmd_marl::eval::make_subcommand())
        .subcommand(cmd_marl::count::make_subcommand())
        .after_help(
            r###"Subcommands:

* make    - Generate a random chip layout
* reembed - Optimally re-embed probes in place (sequential OSPE passes)
* eval    - Border length / conflict index of a layout
* count   - Number of valid embeddings per probe, pivot candidates

Layout files are TAB-delimited, one line per spot, with `#` header lines
carrying the chip geometry and the deposition sequence. Gzipped inputs
(.gz) and "stdin"/"stdout" work everywhere.

"###,
        );

    // Check which subcomamnd the user ran...
    match app.get_matches().subcommand() {
        Some(("make", sub_matches)) => cmd_marl::make::execute(sub_matches),
        Some(("reembed", sub_matches)) => cmd_marl::reembed::execute(sub_matches),
        Some(("eval", sub_matches)) => cmd_marl::eval::execute(sub_matches),
        Some(("count", sub_matches)) => cmd_marl::count::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
