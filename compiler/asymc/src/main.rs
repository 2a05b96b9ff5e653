//! Asym CLI
//!
//! Reads a parser AST from disk and prints the cost analysis as JSON.

use asymc::commands::{analyze_file, init_tracing, parse_analyze_options};

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "analyze" => {
            if args.len() < 3 {
                eprintln!("Usage: asym analyze <ast.json> [options]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --mode=<mode>         worst, best, avg, all (default: worst)");
                eprintln!("  --avg-model=<file>    Probability model for the average case");
                eprintln!("  --method=<method>     master, iteration (default: automatic)");
                eprintln!("  --pretty              Indent the output");
                std::process::exit(1);
            }
            let options = parse_analyze_options(&args[3..]);
            let ok = analyze_file(&args[2], &options);
            if !ok {
                std::process::exit(1);
            }
        }
        "help" | "--help" | "-h" => print_usage(),
        "version" | "--version" | "-V" => {
            println!("asym {}", env!("CARGO_PKG_VERSION"));
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Asym (asymptotic cost analysis for pseudocode)");
    println!();
    println!("Usage: asym <command> [options]");
    println!();
    println!("Commands:");
    println!("  analyze <ast.json>   Derive the cost table and asymptotic classes");
    println!("  help                 Show this help message");
    println!("  version              Show version information");
    println!();
    println!("Analyze options:");
    println!("  --mode=<mode>        worst, best, avg, all (default: worst)");
    println!("  --avg-model=<file>   JSON probability model for the average case");
    println!("  --method=<method>    master, iteration (default: automatic)");
    println!("  --pretty             Indent the output");
    println!();
    println!("Set RUST_LOG (e.g. RUST_LOG=asym_analysis=debug) to trace the derivation.");
}
