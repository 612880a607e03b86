use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser as ClapParser, Subcommand};
use serde::de::DeserializeOwned;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use liftscript::ast::*;
use liftscript::lexer::Lexer;
use liftscript::program::Program;
use liftscript::runtime::bindings::{Bindings, EvalMode, WorkoutEntry, FEEDBACK_BINDING};
use liftscript::runtime::stdlib::{FunctionLibrary, LibrarySettings};
use liftscript::runtime::value::{Unit, Value, Weight};
use liftscript::runtime::{evaluate, Evaluation, ProgramState};
use liftscript::script::{CompileError, Script, ScriptCache};
use liftscript::simulate::simulate;
use liftscript::trace::display::{render_changes, render_updates};

#[derive(ClapParser)]
#[command(name = "liftscript", version, about = "Run and preview finish-day progression scripts")]
struct Cli {
    /// Unit bare numbers are read in by weight functions
    #[arg(long, global = true, default_value = "lb", value_parser = parse_unit)]
    units: Unit,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the token stream (debug)
    Tokenize {
        /// Path to script file
        file: PathBuf,
    },
    /// Parse and display the statement outline
    Parse {
        /// Path to script file
        file: PathBuf,
    },
    /// Evaluate a script once
    Run {
        /// Path to script file
        file: PathBuf,
        /// JSON file with the initial state
        #[arg(long)]
        state: Option<PathBuf>,
        /// JSON file with a workout entry to bind
        #[arg(long)]
        entry: Option<PathBuf>,
        /// Extra bindings as name=value pairs
        #[arg(short, long, value_parser = parse_binding)]
        set: Vec<(String, Value)>,
        /// Evaluate in static (preview) mode
        #[arg(long = "static")]
        static_mode: bool,
        /// Print the evaluation as JSON
        #[arg(long)]
        json: bool,
    },
    /// Project a script over a schedule of planned entries
    Simulate {
        /// Path to script file
        file: PathBuf,
        /// JSON file with a list of workout entries, one per step
        #[arg(long)]
        schedule: PathBuf,
        /// JSON file with the starting state
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Finish the current day of a program
    Finish {
        /// JSON file with the program
        program: PathBuf,
        /// JSON file mapping exercise ids to workout entries
        #[arg(long)]
        entries: PathBuf,
    },
}

fn parse_unit(s: &str) -> Result<Unit, String> {
    Unit::from_name(s).ok_or_else(|| format!("Unknown unit '{}', expected lb or kg", s))
}

fn parse_binding(s: &str) -> Result<(String, Value), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid binding format '{}', expected name=value", s));
    }
    Ok((parts[0].to_string(), parts[1].parse()?))
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "liftscript=warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let functions = FunctionLibrary::new(LibrarySettings {
        units: cli.units,
        ..LibrarySettings::default()
    });
    let exit_code = match cli.command {
        Commands::Tokenize { file } => cmd_tokenize(&file),
        Commands::Parse { file } => cmd_parse(&file),
        Commands::Run {
            file,
            state,
            entry,
            set,
            static_mode,
            json,
        } => cmd_run(&file, state.as_ref(), entry.as_ref(), set, static_mode, json, &functions),
        Commands::Simulate {
            file,
            schedule,
            state,
        } => cmd_simulate(&file, &schedule, state.as_ref(), &functions),
        Commands::Finish { program, entries } => cmd_finish(&program, &entries, &functions),
    };
    process::exit(exit_code);
}

const MAX_SOURCE_SIZE: u64 = 1024 * 1024; // 1 MB

fn read_source(path: &PathBuf) -> Result<String, i32> {
    let filename = path.to_string_lossy().to_string();

    match std::fs::metadata(path) {
        Ok(meta) => {
            if meta.len() > MAX_SOURCE_SIZE {
                eprintln!(
                    "Error: file {} is too large ({} bytes, max {} bytes)",
                    filename,
                    meta.len(),
                    MAX_SOURCE_SIZE
                );
                return Err(1);
            }
        }
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            return Err(1);
        }
    }

    std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: cannot read file {}: {}", filename, e);
        1
    })
}

fn read_json<T: DeserializeOwned>(path: &PathBuf) -> Result<T, i32> {
    let text = read_source(path)?;
    serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error: invalid JSON in {}: {}", path.to_string_lossy(), e);
        1
    })
}

fn read_state(path: Option<&PathBuf>) -> Result<ProgramState, i32> {
    match path {
        Some(p) => read_json(p),
        None => Ok(ProgramState::new()),
    }
}

fn compile(path: &PathBuf) -> Result<Script, i32> {
    let source = read_source(path)?;
    Script::compile(&source).map_err(|e: CompileError| {
        eprintln!("{}", e);
        1
    })
}

fn cmd_tokenize(path: &PathBuf) -> i32 {
    let source = match read_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let tokens = match Lexer::new(&source).tokenize() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Syntax Error at {}", e);
            return 1;
        }
    };

    for tok in &tokens {
        println!("{}", tok);
    }
    0
}

fn cmd_parse(path: &PathBuf) -> i32 {
    let script = match compile(path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    println!("fingerprint: {}", script.fingerprint());
    print_statements(script.statements(), 0);
    0
}

fn cmd_run(
    path: &PathBuf,
    state: Option<&PathBuf>,
    entry: Option<&PathBuf>,
    set: Vec<(String, Value)>,
    static_mode: bool,
    json: bool,
    functions: &FunctionLibrary,
) -> i32 {
    let script = match compile(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let initial = match read_state(state) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let mut bindings = match entry {
        Some(p) => match read_json::<WorkoutEntry>(p) {
            Ok(e) => Bindings::from_entry(&e),
            Err(code) => return code,
        },
        None => Bindings::new(),
    };
    for (name, value) in set {
        bindings.insert(&name, value);
    }

    let mode = if static_mode { EvalMode::Static } else { EvalMode::Live };
    match evaluate(&script, &initial, &bindings, functions, mode) {
        Ok(evaluation) => {
            if json {
                return print_json(&evaluation);
            }
            let previous_rm1 = bound_weight(bindings.get(FEEDBACK_BINDING, mode));
            print_evaluation(&initial, previous_rm1, &evaluation, functions);
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn cmd_simulate(
    path: &PathBuf,
    schedule: &PathBuf,
    state: Option<&PathBuf>,
    functions: &FunctionLibrary,
) -> i32 {
    let script = match compile(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let mut current = match read_state(state) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let entries: Vec<WorkoutEntry> = match read_json(schedule) {
        Ok(e) => e,
        Err(code) => return code,
    };

    let steps = simulate(&script, &current, entries.iter().map(Bindings::from_entry), functions);
    for (step, (entry, result)) in entries.iter().zip(steps).enumerate() {
        match result {
            Ok(evaluation) => {
                println!("Step {} (week {}, day {}):", step + 1, entry.week, entry.day);
                print_evaluation(&current, entry.rm1, &evaluation, functions);
                current = evaluation.state;
                println!();
            }
            Err(e) => {
                eprintln!("Step {}: {}", step + 1, e);
                return 1;
            }
        }
    }
    0
}

fn cmd_finish(program: &PathBuf, entries: &PathBuf, functions: &FunctionLibrary) -> i32 {
    let program: Program = match read_json(program) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let entries: BTreeMap<String, WorkoutEntry> = match read_json(entries) {
        Ok(e) => e,
        Err(code) => return code,
    };

    let mut cache = ScriptCache::new();
    match program.finish_day(&entries, &mut cache, functions) {
        Ok(finished) => {
            for (id, evaluation) in &finished.exercises {
                println!("{}:", id);
                let exercise = program.exercise(id);
                let before = exercise.map(|e| e.state.clone()).unwrap_or_default();
                let previous_rm1 = entries
                    .get(id)
                    .and_then(|entry| entry.rm1)
                    .or_else(|| exercise.and_then(|e| e.rm1));
                print_evaluation(&before, previous_rm1, evaluation, functions);
            }
            println!("{}:", program.name);
            print_evaluation(&program.state, None, &finished.program_evaluation, functions);
            println!("  next day: {}", finished.program.next_day);
            println!();
            print_json(&finished.program)
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn bound_weight(value: Option<&Value>) -> Option<Weight> {
    match value {
        Some(Value::Weight(w)) => Some(*w),
        _ => None,
    }
}

fn print_evaluation(
    before: &ProgramState,
    previous_rm1: Option<Weight>,
    evaluation: &Evaluation,
    functions: &FunctionLibrary,
) {
    for line in render_updates(&evaluation.updates) {
        println!("  update  {}", line);
    }
    let units = Some(functions.settings().units);
    for line in render_changes(before, previous_rm1, evaluation, units) {
        println!("  state   {}", line);
    }
}

fn print_statements(stmts: &[Statement], depth: usize) {
    let indent = "  ".repeat(depth);
    for stmt in stmts {
        match stmt {
            Statement::Assignment {
                target,
                op,
                value,
                loc,
            } => println!(
                "{}[{}] {} {} {}",
                indent,
                loc,
                describe_target(target),
                op,
                describe_expr(value)
            ),
            Statement::If {
                condition,
                then_body,
                else_body,
                loc,
            } => {
                println!("{}[{}] if {}", indent, loc, describe_expr(condition));
                print_statements(then_body, depth + 1);
                if !else_body.is_empty() {
                    println!("{}else", indent);
                    print_statements(else_body, depth + 1);
                }
            }
            Statement::For {
                var,
                iterable,
                body,
                loc,
            } => {
                println!("{}[{}] for {} in {}", indent, loc, var, describe_expr(iterable));
                print_statements(body, depth + 1);
            }
        }
    }
}

fn describe_target(target: &Target) -> String {
    let name = if target.qualified {
        format!("state.{}", target.name)
    } else {
        target.name.clone()
    };
    if target.path.is_empty() {
        return name;
    }
    let parts: Vec<String> = target
        .path
        .iter()
        .map(|c| match c {
            PathComponent::Index(e) => describe_expr(e),
            PathComponent::Wildcard => "*".to_string(),
        })
        .collect();
    format!("{}[{}]", name, parts.join(":"))
}

fn describe_expr(expr: &Expr) -> String {
    match expr {
        Expr::Number { value, .. } => Value::Number(*value).to_string(),
        Expr::Weight { value, unit, .. } => Weight::new(*value, *unit).to_string(),
        Expr::Bool { value, .. } => value.to_string(),
        Expr::Str { value, .. } => format!("{:?}", value),
        Expr::Identifier { name, .. } => name.clone(),
        Expr::StateVar { name, .. } => format!("state.{}", name),
        Expr::Binary {
            left, op, right, ..
        } => format!("({} {} {})", describe_expr(left), op, describe_expr(right)),
        Expr::Unary { op, operand, .. } => match op {
            UnaryOp::Neg => format!("-{}", describe_expr(operand)),
            UnaryOp::Not => format!("!{}", describe_expr(operand)),
        },
        Expr::Ternary {
            condition,
            then_value,
            else_value,
            ..
        } => format!(
            "({} ? {} : {})",
            describe_expr(condition),
            describe_expr(then_value),
            describe_expr(else_value)
        ),
        Expr::Call {
            name, arguments, ..
        } => {
            let args: Vec<String> = arguments.iter().map(describe_expr).collect();
            format!("{}({})", name, args.join(", "))
        }
        Expr::Index { object, index, .. } => {
            format!("{}[{}]", describe_expr(object), describe_expr(index))
        }
    }
}
