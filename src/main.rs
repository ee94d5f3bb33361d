mod repl;

use std::io::{self, Read};
use std::process;

use clap::Parser;

use quill::ast::SourceFile;
use quill::driver::{self, Config};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Compile and run a Quill program", long_about = None)]
struct Cli {
    /// Source file; `-` reads standard input. Starts a REPL when omitted.
    file: Option<String>,

    /// Print the token list.
    #[arg(long)]
    tokens: bool,

    /// Print the syntax tree.
    #[arg(long)]
    ast: bool,

    /// Print the memory scope layout.
    #[arg(long)]
    scopes: bool,

    /// Print the generated IR.
    #[arg(long)]
    ir: bool,

    /// Print the final memory image.
    #[arg(long)]
    state: bool,

    /// Stop after IR generation.
    #[arg(long)]
    no_run: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            dump_tokens: self.tokens,
            dump_ast: self.ast,
            dump_scopes: self.scopes,
            dump_ir: self.ir,
            dump_state: self.state,
            no_run: self.no_run,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let config = cli.config();
    match cli.file {
        Some(ref file) => run_file(file, &config),
        None => repl::start(),
    }
}

fn run_file(path: &str, config: &Config) {
    let text = match read_source(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path, e);
            process::exit(1);
        }
    };

    let source = SourceFile::new(path, text);
    let compilation = match driver::compile(source.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", quill::error::format_error(&e, &source.text, path));
            process::exit(1);
        }
    };

    print!("{}", compilation.dumps(config));
    if config.no_run {
        return;
    }

    let vm = match driver::execute(&compilation, Box::new(io::stdout())) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("{}", quill::error::format_error(&e, &source.text, path));
            process::exit(1);
        }
    };

    if config.dump_state {
        match driver::format_state(&vm, &compilation.module) {
            Ok(state) => print!("{}", state),
            Err(e) => {
                eprintln!("{}", quill::error::format_error(&e, &source.text, path));
                process::exit(1);
            }
        }
    }
}

fn read_source(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
    }
}
