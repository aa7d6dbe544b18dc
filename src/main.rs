use clap::{App, Arg, ArgMatches, SubCommand};
use std::fs;
use std::io::{self, Read, Write};
use std::process::exit;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use eadtools::{ConversionConfig, Converter, Profile, RecordGraph, VERSION};

const HELP_INPUT: &'static str =
    "Input file containing an EAD finding aid. Set value to - for standard input. Multiple are allowed, each is converted on its own.";

const SUBCOMMANDS: [&'static str; 2] = ["convert", "check"];

fn common_arguments<'a>() -> Vec<clap::Arg<'a>> {
    let mut args: Vec<Arg> = Vec::new();
    args.push(
        Arg::with_name("config")
            .long("config")
            .short('c')
            .help("Conversion configuration (TOML): profile, vocabulary, source, skipped paths and extra note mappings")
            .takes_value(true),
    );
    args.push(
        Arg::with_name("profile")
            .long("profile")
            .short('p')
            .help("Rule profile, overrides the one from the configuration. 'stock' uses the plain rules, 'extended' (default) adds list flattening, merged index entries, physical description decomposition and title synthesis for digital objects.")
            .takes_value(true)
            .possible_values(["stock", "extended"]),
    );
    args.push(
        Arg::with_name("debug")
            .long("debug")
            .short('d')
            .help("Log every dispatched rule and built record to standard error"),
    );
    args.push(
        Arg::with_name("ignore-errors")
            .long("ignore-errors")
            .short('i')
            .help("Continue with the next input file when a conversion fails"),
    );
    args.push(
        Arg::with_name("input")
            .help(HELP_INPUT)
            .takes_value(true)
            .multiple(true)
            .required(true),
    );
    args
}

fn output_arguments<'a>() -> Vec<clap::Arg<'a>> {
    let mut args: Vec<Arg> = Vec::new();
    args.push(
        Arg::with_name("output")
            .long("output")
            .short('o')
            .help("Write the record graph(s) to this file instead of standard output")
            .takes_value(true),
    );
    args.push(
        Arg::with_name("pretty")
            .long("pretty")
            .help("Pretty-print the JSON output"),
    );
    args
}

fn app<'a>() -> App<'a> {
    App::new("EAD Tools")
        .version(VERSION)
        .about("Converts EAD finding aids into archival record graphs")
        .subcommand(
            SubCommand::with_name("convert")
                .about("Convert finding aids and output their record graphs as JSON. A single input produces one graph, multiple inputs an array of graphs.")
                .args(&common_arguments())
                .args(&output_arguments()),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("Convert finding aids without output, reporting for each input whether it converts and which references are left unresolved.")
                .args(&common_arguments()),
        )
}

fn init_logging(args: &ArgMatches) {
    let filter = if args.is_present("debug") {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn config_from_args(args: &ArgMatches) -> Result<ConversionConfig, String> {
    let mut config = match args.value_of("config") {
        Some(filename) => {
            let tomlstr = fs::read_to_string(filename)
                .map_err(|e| format!("Unable to read configuration {}: {}", filename, e))?;
            ConversionConfig::from_toml_str(&tomlstr).map_err(|e| format!("{}: {}", filename, e))?
        }
        None => ConversionConfig::default(),
    };
    match args.value_of("profile") {
        Some("stock") => config = config.with_profile(Profile::Stock),
        Some("extended") => config = config.with_profile(Profile::Extended),
        _ => {}
    }
    Ok(config)
}

fn read_input(filename: &str) -> Result<String, String> {
    if filename == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Unable to read standard input: {}", e))?;
        Ok(buffer)
    } else {
        fs::read_to_string(filename).map_err(|e| format!("Unable to read {}: {}", filename, e))
    }
}

fn convert_file(converter: &Converter, filename: &str) -> Result<RecordGraph, String> {
    let markup = read_input(filename)?;
    debug!(filename, "converting");
    converter
        .convert(&markup)
        .map_err(|e| format!("{}: {}", filename, e))
}

fn convert<W: Write>(converter: &Converter, args: &ArgMatches, writer: &mut W) -> Result<(), String> {
    let ignore_errors = args.is_present("ignore-errors");
    let mut graphs: Vec<RecordGraph> = Vec::new();
    for filename in args.values_of("input").into_iter().flatten() {
        match convert_file(converter, filename) {
            Ok(graph) => graphs.push(graph),
            Err(err) if ignore_errors => eprintln!("[error] {}", err),
            Err(err) => return Err(err),
        }
    }
    let json = if graphs.len() == 1 {
        to_json(&graphs[0], args.is_present("pretty"))
    } else {
        to_json(&graphs, args.is_present("pretty"))
    }?;
    writeln!(writer, "{}", json).map_err(|e| format!("Unable to write output: {}", e))
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| format!("Unable to serialize record graph: {}", e))
}

fn check(converter: &Converter, args: &ArgMatches) -> Result<(), String> {
    let ignore_errors = args.is_present("ignore-errors");
    let mut failed = 0;
    for filename in args.values_of("input").into_iter().flatten() {
        match convert_file(converter, filename) {
            Ok(graph) => {
                println!(
                    "{}\tOK\t{} records\t{} unresolved references",
                    filename,
                    graph.records.len() + 1,
                    graph.dangling_references.len()
                );
                for reference in graph.dangling_references.iter() {
                    println!(
                        "{}\tUNRESOLVED\t{:?}\t{}\t{}",
                        filename, reference.kind, reference.identifier, reference.path
                    );
                }
            }
            Err(err) if ignore_errors => {
                println!("{}\tFAILED\t{}", filename, err);
                failed += 1;
            }
            Err(err) => return Err(err),
        }
    }
    if failed > 0 {
        Err(format!("{} input file(s) failed to convert", failed))
    } else {
        Ok(())
    }
}

fn main() {
    let rootargs = app().get_matches();

    let mut args: Option<(&str, &ArgMatches)> = None;
    for subcommand in SUBCOMMANDS.iter() {
        if let Some(matchedargs) = rootargs.subcommand_matches(subcommand) {
            args = Some((*subcommand, matchedargs));
        }
    }
    let Some((subcommand, args)) = args else {
        eprintln!("[error] No command specified, please see 'ead help'");
        exit(2);
    };

    init_logging(args);
    let config = config_from_args(args).unwrap_or_else(|err| {
        eprintln!("[error] {}", err);
        exit(1);
    });
    info!(profile = ?config.profile(), "loaded configuration");
    let converter = Converter::new(config);

    let result = match subcommand {
        "convert" => match args.value_of("output") {
            Some(filename) => fs::File::create(filename)
                .map_err(|e| format!("Unable to create {}: {}", filename, e))
                .and_then(|mut file| convert(&converter, args, &mut file)),
            None => convert(&converter, args, &mut io::stdout()),
        },
        _ => check(&converter, args),
    };
    if let Err(err) = result {
        eprintln!("[error] {}", err);
        exit(1);
    }
}
