use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser as ClapParser;
use clap::Subcommand;

use rox::error::Diagnostics;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::Scanner;
use rox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Executes a Lox script from a given valid filepath
    Run { filename: PathBuf },

    /// Tokenizes the provided input and prints the token stream
    Tokenize { filename: PathBuf },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{}", e);
            return Ok(());
        }

        Err(e) => {
            eprint!("{}", e);
            std::process::exit(64);
        }
    };

    match args.commands {
        Some(Commands::Run { filename }) => run_file(filename),

        Some(Commands::Tokenize { filename }) => tokenize_file(filename),

        None => repl(),
    }
}

fn run_file(filename: PathBuf) -> anyhow::Result<()> {
    let source = read_source(filename)?;

    let mut diagnostics = Diagnostics::new();
    let mut interpreter = Interpreter::new(io::stdout());

    run(&source, &mut interpreter, &mut diagnostics, 0);

    if diagnostics.had_error() {
        std::process::exit(65);
    }

    if diagnostics.had_runtime_error() {
        std::process::exit(70);
    }

    Ok(())
}

fn tokenize_file(filename: PathBuf) -> anyhow::Result<()> {
    let source = read_source(filename)?;

    let scanner = Scanner::new(&source);
    let mut tokenized = true;

    for result in scanner {
        match result {
            Ok(token) => println!("{}", token),

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        std::process::exit(65);
    }

    Ok(())
}

fn repl() -> anyhow::Result<()> {
    let mut diagnostics = Diagnostics::new();
    let mut interpreter = Interpreter::new(io::stdout());

    // Node ids must stay unique across lines sharing one interpreter.
    let mut next_id: usize = 0;

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        next_id = run(line.as_bytes(), &mut interpreter, &mut diagnostics, next_id);

        // A bad line doesn't kill the session; successful bindings persist.
        diagnostics.clear();
    }

    Ok(())
}

/// The full pipeline over one source buffer: scan, parse, resolve, evaluate.
/// Later passes are skipped once `had_error` is set. Returns the parser's
/// node-id watermark for the REPL to thread into the next line.
fn run<W: Write>(
    source: &[u8],
    interpreter: &mut Interpreter<W>,
    diagnostics: &mut Diagnostics,
    first_id: usize,
) -> usize {
    let scanner = Scanner::new(source);
    let mut tokens: Vec<Token> = Vec::new();

    for result in scanner {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => diagnostics.report(&e),
        }
    }

    let mut parser = Parser::new(tokens, first_id, diagnostics);
    let statements = parser.parse();
    let next_id = parser.next_id();

    if diagnostics.had_error() {
        return next_id;
    }

    let mut resolver = Resolver::new(interpreter, diagnostics);
    resolver.resolve(&statements);

    if diagnostics.had_error() {
        return next_id;
    }

    if let Err(e) = interpreter.interpret(&statements) {
        diagnostics.report(&e);
    }

    next_id
}

fn read_source(filename: PathBuf) -> anyhow::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    let mut reader: BufReader<File> = BufReader::new(File::open(filename)?);
    reader.read_to_end(&mut buf)?;

    Ok(buf)
}
