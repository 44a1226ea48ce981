use colored::Colorize;
use commands::command_argument_builder;
use inspectron::handlers::{GlobalOptions, handle_crawl, handle_scan, init_tracing};

mod commands;

const BANNER: &str = r#"
  _                           _
 (_)_ __  ___ _ __   ___  ___| |_ _ __ ___  _ __
 | | '_ \/ __| '_ \ / _ \/ __| __| '__/ _ \| '_ \
 | | | | \__ \ |_) |  __/ (__| |_| | | (_) | | | |
 |_|_| |_|___/ .__/ \___|\___|\__|_|  \___/|_| |_|
             |_|
"#;

fn print_banner() {
    eprintln!("{}", BANNER.bright_cyan());
    eprintln!(
        "  {} v{}\n",
        "single-flight crawler & passive scanner".bright_white(),
        env!("CARGO_PKG_VERSION")
    );
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let global = GlobalOptions::from_matches(&chosen_command);

    init_tracing(global.verbose);

    if !global.quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("crawl", sub_matches)) => handle_crawl(sub_matches, &global).await,
        Some(("scan", sub_matches)) => handle_scan(sub_matches, &global).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
