use anise_lang::CompilerMode;
use anise_lang::cli::{self, CliError, EvalOptions, EvalOutcome};
use clap::{Parser as ClapParser, Subcommand};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "anise")]
#[command(about = "Anise - an embeddable expression language")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Eval {
        /// The expression to evaluate
        expression: String,

        /// JSON root object (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Set a variable, as name=value
        #[arg(short, long = "var")]
        vars: Vec<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't evaluate
        #[arg(long)]
        syntax_only: bool,

        /// off, immediate or mixed (defaults to ANISE_COMPILER_MODE)
        #[arg(long)]
        compiler_mode: Option<CompilerMode>,

        /// Evaluate this many times and print the last result
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },

    /// Print the parsed syntax tree
    Ast {
        /// The expression to parse
        expression: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ANISE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval {
            expression,
            input,
            vars,
            pretty,
            syntax_only,
            compiler_mode,
            repeat,
        } => run_eval(
            EvalOptions {
                expression,
                input,
                vars,
                syntax_only,
                compiler_mode,
                repeat,
            },
            pretty,
        ),
        Commands::Ast { expression } => cli::execute_ast(&expression).map(|ast| println!("{}", ast)),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_eval(mut options: EvalOptions, pretty: bool) -> Result<(), CliError> {
    if options.input.is_none() && !options.syntax_only && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        options.input = Some(buffer);
    }

    match cli::execute_eval(&options)? {
        EvalOutcome::SyntaxValid => println!("Syntax is valid"),
        EvalOutcome::Success { value, compiled } => {
            tracing::info!(compiled, "done");
            let json = if pretty {
                serde_json::to_string_pretty(&value)?
            } else {
                serde_json::to_string(&value)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}
