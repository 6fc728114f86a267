use std::process;

use crate::cascade::{CascadeResult, StageRow};
use crate::component::Component;
use crate::error::BudgetError;
use crate::file::{load_chain, LoadedChain};

pub struct Config {}

impl Config {
    pub fn run(args: &[String]) -> Result<Config, Box<dyn std::error::Error>> {
        if args.len() < 2 {
            return Err("not enough arguments".into());
        }

        if args.len() > 2 {
            return Err(
                "too many arguments, expecting only 2, such as `linkbudget filepath`".into(),
            );
        }

        // Check for special flags
        match args[1].as_str() {
            "--version" | "-v" => {
                print_version();
                process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            _ => {}
        }

        init_tracing();

        let file_path = args[1].clone();
        println!("Chain Config: {}", file_path);

        let loaded = load_chain(&file_path)?;
        let chain: Vec<&Component> = loaded.components.iter().collect();

        match crate::cascade::calculate(
            &chain,
            &loaded.frequency,
            loaded.direction,
            loaded.input_power_dbm,
        ) {
            Ok(result) => {
                print_report(&loaded, &result);
                Ok(Config {})
            }
            Err(error) => {
                // a compression abort still has a partial table to show
                if let BudgetError::Compression { rows, .. } = &error {
                    print_table(rows);
                }
                Err(Box::new(error))
            }
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

pub fn print_version() {
    println!("linkbudget {}", env!("CARGO_PKG_VERSION"));
}

pub fn print_error(error: &str) {
    const RED: &str = "\x1b[31m";
    const RESET: &str = "\x1b[0m";
    println!("{}Problem running linkbudget: {error}{}", RED, RESET);
}

pub fn print_help() {
    // ANSI color codes
    const BOLD: &str = "\x1b[1m";
    const CYAN: &str = "\x1b[36m";
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const RESET: &str = "\x1b[0m";

    println!(
        "📡 Link budget parser and calculator - https://github.com/iancleary/linkbudget{}",
        RESET
    );
    println!();
    println!("{}{}VERSION:{}", BOLD, YELLOW, RESET);
    println!("    {}{}{}", GREEN, env!("CARGO_PKG_VERSION"), RESET);
    println!();
    println!("{}{}USAGE:{}", BOLD, YELLOW, RESET);
    println!("    {} linkbudget <FILE_PATH>{}", GREEN, RESET);
    println!();
    println!("     FILE_PATH: path to a toml chain config");
    println!();
    println!("     The chain is cascaded at the config's frequency and direction;");
    println!("     the per-stage table and the chain summary print to stdout.");
    println!();
    println!("{}{}OPTIONS:{}", BOLD, YELLOW, RESET);
    println!(
        "    {}  -v, --version{}{}    Print version information",
        GREEN, RESET, RESET
    );
    println!(
        "    {}  -h, --help{}{}       Print help information",
        GREEN, RESET, RESET
    );
    println!();
    println!("{}{}EXAMPLES:{}", BOLD, YELLOW, RESET);
    println!("    {} # Single file (Relative path){}", CYAN, RESET);
    println!("    {} linkbudget files/chain.toml{}", GREEN, RESET);
    println!();
}

pub fn print_table(rows: &[StageRow]) {
    println!();
    println!(
        "{:<35} | {:>15} | {:>15} | {:>15}",
        "Stage", "Cum. Gain (dB)", "Cum. NF (dB)", "Cum. Pout (dBm)"
    );
    println!("{}", "-".repeat(35 + 3 * 18));
    for row in rows {
        println!(
            "{:<35} | {:>15.2} | {:>15.2} | {:>15.2}",
            row.label,
            row.cumulative_gain_db,
            row.cumulative_noise_figure_db,
            row.cumulative_power_dbm
        );
    }
}

pub fn print_report(loaded: &LoadedChain, result: &CascadeResult) {
    print_table(&result.rows);

    let totals = &result.totals;
    println!();
    println!(
        "Chain Summary ({} @ {} GHz)",
        loaded.direction, loaded.frequency
    );
    println!("--------------------------------");
    // the formatting `{:>8.2}` aligns positive and negative numbers on the decimal,
    // with two digits after the decimal (hundredths place)
    println!("Pin:\t\t\t{:>8.2} dBm", loaded.input_power_dbm);
    println!("Total Gain:\t\t{:>8.2} dB", totals.gain_db);
    println!("  (Active Gain):\t{:>8.2} dB", totals.partition.active_db);
    println!("  (Passive Loss):\t{:>8.2} dB", totals.partition.passive_db);
    println!("  (Antenna Gain):\t{:>8.2} dB", totals.partition.antenna_db);
    println!("Total NF:\t\t{:>8.2} dB", totals.noise_figure_db);
    match totals.output_p1db_dbm {
        Some(p1db_dbm) => println!("Chain OP1dB:\t\t{:>8.2} dBm", p1db_dbm),
        None => println!("Chain OP1dB:\t\t unbounded"),
    }
    println!("Pout/EIRP:\t\t{:>8.2} dBm", totals.output_power_dbm);

    if let Some(receive) = &totals.receive {
        println!();
        println!("Receive Figures of Merit");
        println!("------------------------");
        println!("G_ant:\t\t{:>8.2} dB", receive.antenna_gain_db);
        println!("T_ant:\t\t{:>8.2} K", receive.antenna_temperature_k);
        println!("T_rx:\t\t{:>8.2} K", receive.receiver_temperature_k);
        println!("T_sys:\t\t{:>8.2} K", receive.system_temperature_k);
        println!("G/T:\t\t{:>8.2} dB/K", receive.g_over_t_db_per_k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_over_fixture() {
        let args = vec![
            String::from("program_name"),
            String::from("tests/files/simple_chain.toml"),
        ];
        let _cli_run = Config::run(&args).unwrap();
    }

    #[test]
    fn test_config_build_not_enough_args() {
        let args = vec![String::from("program_name")];
        let result = Config::run(&args);
        assert!(result.is_err());
    }

    #[test]
    fn test_too_many_args() {
        let args = vec![
            String::from("program_name"),
            String::from("a.toml"),
            String::from("b.toml"),
        ];
        let result = Config::run(&args);
        assert!(result.is_err());
    }

    #[test]
    fn test_version_output_format() {
        // Version should be in format X.Y.Z
        let version = env!("CARGO_PKG_VERSION");
        let parts: Vec<&str> = version.split('.').collect();
        assert_eq!(parts.len(), 3, "Version should be in X.Y.Z format");
    }
}
