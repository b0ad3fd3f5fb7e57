use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{IsTerminal, Read};
use tracing_subscriber::EnvFilter;

use fish_syntax::parser::lexer::{tokenize, TokenType, TokenizerOptions};
use fish_syntax::{compute_line_indents, detect_errors, parse_with_flags, AnalysisOptions, ParseFlags, Symbol};

const INDENT_WIDTH: usize = 4;

#[derive(Parser)]
#[command(name = "fish-syntax")]
#[command(about = "Tokenize, parse, check and indent fish scripts")]
#[command(version)]
struct Cli {
    /// Output results as JSON
    #[arg(long = "json", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Input {
    /// Read the script from command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Script file to read
    #[arg()]
    script_file: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the token stream
    Tokenize {
        /// Emit comment tokens
        #[arg(long = "comments")]
        comments: bool,

        /// Emit one terminator per newline
        #[arg(long = "blank-lines")]
        blank_lines: bool,

        #[command(flatten)]
        input: Input,
    },
    /// Print the parse tree
    Parse {
        /// Keep going after errors and report all of them
        #[arg(long = "tolerant")]
        tolerant: bool,

        /// Attach comments to the tree
        #[arg(long = "comments")]
        comments: bool,

        #[command(flatten)]
        input: Input,
    },
    /// Report static errors
    Check {
        /// Treat unfinished input as incomplete rather than wrong
        #[arg(long = "allow-incomplete")]
        allow_incomplete: bool,

        #[command(flatten)]
        input: Input,
    },
    /// Reindent the script
    Indent {
        #[command(flatten)]
        input: Input,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("FISH_SYNTAX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Determine script source: -c, file, or stdin
fn read_input(input: &Input) -> String {
    if let Some(ref s) = input.script {
        return s.clone();
    }
    if let Some(ref file) = input.script_file {
        return match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error: Cannot read script file: {}: {}", file, e);
                std::process::exit(2);
            }
        };
    }
    if std::io::stdin().is_terminal() {
        eprintln!("Error: No script provided. Use -c 'script', provide a script file, or pipe via stdin.");
        std::process::exit(2);
    }
    let mut buf = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
        eprintln!("Error: Cannot read stdin: {}", e);
        std::process::exit(2);
    }
    buf
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: Cannot serialize output: {}", e);
            std::process::exit(2);
        }
    }
}

fn run_tokenize(src: &str, options: TokenizerOptions, json: bool) -> i32 {
    let tokens = tokenize(src, options);
    let failed = tokens.iter().any(|t| t.token_type == TokenType::Error);

    if json {
        let rows: Vec<serde_json::Value> = tokens
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": t.token_type.as_str(),
                    "offset": t.offset,
                    "length": t.length,
                    "text": t.text(src),
                    "error": t.error.map(|e| serde_json::json!({
                        "message": e.kind.message(),
                        "offset": e.offset,
                    })),
                })
            })
            .collect();
        print_json(&rows);
    } else {
        for token in &tokens {
            match token.error {
                Some(error) => println!("{}\t{}\t{}", token.offset, token.token_type.as_str(), error.kind.message()),
                None => println!("{}\t{}\t{:?}", token.offset, token.token_type.as_str(), token.text(src)),
            }
        }
    }
    i32::from(failed)
}

fn run_parse(src: &str, flags: ParseFlags, json: bool) -> i32 {
    let output = parse_with_flags(src, flags, Symbol::JobList);

    if json {
        print_json(&serde_json::json!({
            "tree": output.tree,
            "errors": output.errors,
        }));
    } else {
        print!("{}", output.tree.dump(src));
        for error in &output.errors {
            eprintln!("{}", error.describe(src));
        }
    }
    i32::from(output.has_errors())
}

fn run_check(src: &str, options: AnalysisOptions, json: bool) -> i32 {
    let analysis = detect_errors(src, options);

    if json {
        print_json(&analysis);
    } else {
        for error in &analysis.errors {
            println!("{}", error.describe(src));
        }
        if analysis.is_incomplete() {
            println!("incomplete");
        }
    }
    i32::from(analysis.has_error())
}

fn run_indent(src: &str, json: bool) -> i32 {
    let levels = compute_line_indents(src);

    if json {
        print_json(&serde_json::json!({ "lines": levels }));
        return 0;
    }

    let lines: Vec<String> = src
        .split('\n')
        .zip(levels)
        .map(|(line, level)| {
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{}{}", " ".repeat(level * INDENT_WIDTH), trimmed)
            }
        })
        .collect();
    print!("{}", lines.join("\n"));
    0
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = match cli.command {
        Command::Tokenize {
            comments,
            blank_lines,
            input,
        } => {
            let options = TokenizerOptions {
                show_comments: comments,
                show_blank_lines: blank_lines,
                ..Default::default()
            };
            run_tokenize(&read_input(&input), options, cli.json)
        }
        Command::Parse {
            tolerant,
            comments,
            input,
        } => {
            let flags = ParseFlags {
                continue_after_error: tolerant,
                include_comments: comments,
                ..Default::default()
            };
            run_parse(&read_input(&input), flags, cli.json)
        }
        Command::Check {
            allow_incomplete,
            input,
        } => run_check(&read_input(&input), AnalysisOptions { allow_incomplete }, cli.json),
        Command::Indent { input } => run_indent(&read_input(&input), cli.json),
    };

    std::process::exit(code);
}
