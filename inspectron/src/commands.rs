use crate::CLAP_STYLING;
use clap::{arg, command};

fn crawl_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-u --"url" <URL>)
            .required(true)
            .help("Seed URL; http:// is assumed when no scheme is given"),
    )
    .arg(
        arg!(-m --"max-pages" <NUM>)
            .required(false)
            .help("Stop after visiting this many pages (default: unlimited)")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(-t --"timeout" <SECONDS>)
            .required(false)
            .help("Navigation timeout per page in seconds (default: 40)")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json")
            .value_parser(["text", "json"])
            .default_value("text"),
    )
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("inspectron")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("inspectron")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress live job logs and the banner").required(false))
        .arg(arg!(-v --"verbose" "Show library tracing output at info level").required(false))
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .help("Config file (default: ~/.config/inspectron/config.json)")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .subcommand_required(true)
        .subcommand(
            crawl_args(
                command!("crawl")
                    .about("Crawl a site breadth-first from a seed URL, staying on the same site"),
            )
            .arg(
                arg!(--"label-elements")
                    .required(false)
                    .help("Number the links and buttons found on each page")
                    .action(clap::ArgAction::SetTrue),
            ),
        )
        .subcommand(crawl_args(command!("scan").about(
            "Crawl a site, then run passive vulnerability checks against every visited page",
        )))
}
