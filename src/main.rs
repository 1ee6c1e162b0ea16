mod cli;
mod execute;

use clap::Parser;
use colored::Colorize;
use crate::cli::CLI;

fn main() {
    let cli = CLI::parse();
    let code = match execute::execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            1
        }
    };
    std::process::exit(code);
}
