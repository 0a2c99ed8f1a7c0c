//! pcode-cli — bibliothèque interne du binaire `pcode`
//!
//! Keeps the pipeline testable without argument parsing (left to `main.rs`):
//! - program loading: `PCBC` chunk (sniffed by magic) or JSON AST
//! - `compile` : AST → chunk file
//! - `run` : machine execution with `name=value` input bindings
//! - `disasm` / `inputs` : inspection of a program
//! - logger init (`feature = "trace"`) and colored status tags (`feature = "color"`)

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

use std::{
    fs,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;
use tempfile::NamedTempFile;

use pcode_ast::Block;
use pcode_core::{disasm, helpers::validate_code, Chunk, Instruction, Value};
use pcode_vm::{Vm, VmOptions};

#[cfg(feature = "color")]
use owo_colors::OwoColorize;

// ───────────────────────────── Types publics ─────────────────────────────

/// High-level command, already parsed.
#[derive(Clone, Debug)]
pub enum Command {
    /// AST (JSON) → chunk file.
    Compile(CompileTask),
    /// Executes a program on the machine.
    Run(RunTask),
    /// Textual listing of a program.
    Disasm(DisasmTask),
    /// Lists the inputs a program requires.
    Inputs(InputsTask),
}

/// `compile` options.
#[derive(Clone, Debug, Default)]
pub struct CompileTask {
    /// AST file or stdin.
    pub input: Input,
    /// Path, stdout, or same stem + `.pcbc`.
    pub output: Output,
    /// Create missing parent directories.
    pub auto_mkdir: bool,
    /// Allow replacing an existing file.
    pub overwrite: bool,
    /// Report the generation time.
    pub time: bool,
}

/// `run` options.
#[derive(Clone, Debug, Default)]
pub struct RunTask {
    /// Chunk or AST.
    pub program: Input,
    /// `name=value` bindings, in command-line order.
    pub bindings: Vec<(String, Value)>,
    /// Step ceiling.
    pub max_steps: Option<u64>,
    /// Print the final variable store.
    pub dump_vars: bool,
    /// Print the report as JSON.
    pub json: bool,
    /// Report the execution time.
    pub time: bool,
}

/// `disasm` options.
#[derive(Clone, Debug, Default)]
pub struct DisasmTask {
    /// Chunk or AST.
    pub input: Input,
    /// File or stdout.
    pub output: Output,
    /// Header and jump annotations.
    pub full: bool,
}

/// `inputs` options.
#[derive(Clone, Debug, Default)]
pub struct InputsTask {
    /// Chunk or AST.
    pub input: Input,
    /// JSON array instead of one name per line.
    pub json: bool,
}

/// Input file, or `-` (= stdin).
#[derive(Clone, Debug, Default)]
pub enum Input {
    /// File on disk.
    Path(PathBuf),
    /// Standard input.
    #[default]
    Stdin,
}

/// Output destination.
#[derive(Clone, Debug, Default)]
pub enum Output {
    /// File on disk.
    Path(PathBuf),
    /// Standard output.
    #[default]
    Stdout,
    /// `compile` only: input stem + `.pcbc`.
    Auto,
}

/// What a loaded file contained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramKind {
    /// Serialized chunk.
    Chunk,
    /// JSON AST, generated on load.
    Ast,
}

/// A program ready to run.
#[derive(Clone, Debug)]
pub struct Program {
    /// Source format.
    pub kind: ProgramKind,
    /// Instructions.
    pub code: Vec<Instruction>,
}

/// Outcome of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Return slot.
    pub result: Option<Value>,
    /// Final variable store.
    pub variables: IndexMap<String, Value>,
    /// Executed instructions.
    pub steps: u64,
    /// Required inputs left unbound (read as 0).
    pub unbound: Vec<String>,
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger (feature `trace`) : `RUST_LOG` prime sur `default_level`.
pub fn init_logger(default_level: &str) {
    #[cfg(feature = "trace")]
    {
        let env = env_logger::Env::default().default_filter_or(default_level);
        let _ = env_logger::Builder::from_env(env).format_timestamp_secs().format_target(false).try_init();
    }
    #[cfg(not(feature = "trace"))]
    let _ = default_level;
}

// ───────────────────────────── Pipeline ─────────────────────────────

/// Parses a JSON AST (a block: `{"stmts": [...]}`).
pub fn parse_ast(bytes: &[u8]) -> Result<Block> {
    serde_json::from_slice(bytes).context("AST JSON invalide")
}

/// Loads a program from a chunk or a JSON AST, sniffing the `PCBC` magic.
/// Decoded chunks are structurally validated.
pub fn load_program(bytes: &[u8]) -> Result<Program> {
    if Chunk::sniff(bytes) {
        let chunk = Chunk::from_bytes(bytes).context("décodage du chunk")?;
        validate_code(&chunk.code).context("chunk invalide")?;
        debug!("loaded chunk v{} ({} instructions)", chunk.version(), chunk.len());
        return Ok(Program { kind: ProgramKind::Chunk, code: chunk.code });
    }

    let ast = parse_ast(bytes)?;
    let code = pcode_compiler::generate(&ast).context("génération de code")?;
    debug!("generated {} instructions from AST", code.len());
    Ok(Program { kind: ProgramKind::Ast, code })
}

/// Runs `code` with the given bindings. Bindings for names the program does
/// not read as inputs are reported and ignored.
pub fn run_program(code: Vec<Instruction>, bindings: &[(String, Value)], max_steps: Option<u64>) -> Result<RunReport> {
    let mut vm = Vm::with_options(code, VmOptions { step_limit: max_steps });

    for (name, value) in bindings {
        if !vm.set_input(name, value.clone()) {
            warn!("`{name}` n'est pas une entrée du programme : ignorée");
        }
    }
    let unbound: Vec<String> =
        vm.inputs().iter().filter(|(_, v)| v.is_none()).map(|(name, _)| name.clone()).collect();
    for name in &unbound {
        warn!("entrée `{name}` non fournie : lue comme 0");
    }

    let result = vm.run(&[]).context("échec d'exécution")?;
    Ok(RunReport { result, variables: vm.variables().clone(), steps: vm.steps(), unbound })
}

/// Parses a `name=value` binding (`value`: integer, `true`/`false`, `[a, b]`).
pub fn parse_binding(s: &str) -> Result<(String, Value), String> {
    let (name, value) = s.split_once('=').ok_or_else(|| format!("`{s}`: attendu name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("`{s}`: nom vide"));
    }
    let value = value.trim().parse::<Value>().map_err(|e| e.to_string())?;
    Ok((name.to_owned(), value))
}

// ───────────────────────────── Exécution ─────────────────────────────

/// Executes a command. Returns the process exit code.
pub fn execute(cmd: Command) -> Result<i32> {
    match cmd {
        Command::Compile(t) => compile_entry(t),
        Command::Run(t) => run_entry(t),
        Command::Disasm(t) => disasm_entry(t),
        Command::Inputs(t) => inputs_entry(t),
    }
}

fn compile_entry(task: CompileTask) -> Result<i32> {
    let CompileTask { input, output, auto_mkdir, overwrite, time } = task;
    let bytes = read_input(&input).context("lecture de l'entrée")?;

    let start = Instant::now();
    let program = load_program(&bytes)?;
    let elapsed = start.elapsed();
    if program.kind == ProgramKind::Chunk {
        info!("l'entrée est déjà un chunk : ré-encodage");
    }
    let chunk = Chunk::new(program.code);
    let bc = chunk.to_bytes();

    let out_path = match (&output, &input) {
        (Output::Auto, Input::Path(p)) => default_chunk_path(p),
        (Output::Auto, Input::Stdin) => PathBuf::from("out.pcbc"),
        (Output::Path(p), _) => p.clone(),
        (Output::Stdout, _) => PathBuf::new(),
    };

    if let Output::Stdout = output {
        write_stdout(&bc)?;
    } else {
        if auto_mkdir {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        if out_path.exists() && !overwrite {
            bail!("fichier de sortie existe déjà: {}", display(&out_path));
        }
        write_bytes_atomic(&out_path, &bc).with_context(|| format!("écriture de {}", display(&out_path)))?;
        status(Tone::Done, "COMPILE", &format!("{} ({} instructions)", display(&out_path), chunk.len()));
    }

    if time {
        status(Tone::Note, "TIME", &format!("compile: {} ms", elapsed.as_millis()));
    }
    Ok(0)
}

fn run_entry(task: RunTask) -> Result<i32> {
    let bytes = read_input(&task.program).context("lecture du programme")?;
    let program = load_program(&bytes)?;

    let start = Instant::now();
    let report = run_program(program.code, &task.bindings, task.max_steps)?;
    let elapsed = start.elapsed();

    if task.json {
        let text = serde_json::to_string_pretty(&report)?;
        write_stdout(format!("{text}\n").as_bytes())?;
    } else {
        write_stdout(render_report(&report, task.dump_vars).as_bytes())?;
    }

    if task.time {
        status(Tone::Note, "TIME", &format!("run: {} ms, {} steps", elapsed.as_millis(), report.steps));
    }
    Ok(0)
}

fn disasm_entry(task: DisasmTask) -> Result<i32> {
    let bytes = read_input(&task.input).context("lecture de l'entrée")?;
    let program = load_program(&bytes)?;

    let text = if task.full {
        let title = match &task.input {
            Input::Path(p) => p.file_name().map_or_else(|| display(p), |n| n.to_string_lossy().into_owned()),
            Input::Stdin => "<stdin>".to_owned(),
        };
        disasm::disassemble_full(&Chunk::new(program.code), &title)
    } else {
        disasm::disassemble(&program.code)
    };

    match task.output {
        Output::Stdout => write_stdout(text.as_bytes())?,
        Output::Path(ref p) => {
            write_bytes_atomic(p, text.as_bytes()).with_context(|| format!("écriture de {}", display(p)))?;
            status(Tone::Done, "DISASM", &display(p));
        }
        Output::Auto => bail!("Output::Auto n'est pas valide pour disasm"),
    }
    Ok(0)
}

fn inputs_entry(task: InputsTask) -> Result<i32> {
    let bytes = read_input(&task.input).context("lecture de l'entrée")?;
    let program = load_program(&bytes)?;
    let names = pcode_vm::infer_inputs(&program.code);

    let text = if task.json {
        format!("{}\n", serde_json::to_string(&names)?)
    } else {
        names.iter().map(|n| format!("{n}\n")).collect()
    };
    write_stdout(text.as_bytes())?;
    Ok(0)
}

/// Text rendering of a run: optional `name = value` lines, then the result.
pub fn render_report(report: &RunReport, dump_vars: bool) -> String {
    let mut out = String::new();
    if dump_vars {
        for (name, value) in &report.variables {
            out.push_str(&format!("{name} = {value}\n"));
        }
    }
    match &report.result {
        Some(value) => out.push_str(&format!("{value}\n")),
        None => out.push_str("(none)\n"),
    }
    out
}

// ───────────────────────────── Utilitaires E/S ─────────────────────────────

fn read_input(input: &Input) -> Result<Vec<u8>> {
    match input {
        Input::Stdin => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
        Input::Path(p) => fs::read(p).with_context(|| format!("ouverture: {}", display(p))),
    }
}

fn write_stdout(bytes: &[u8]) -> Result<()> {
    let mut w = BufWriter::new(io::stdout().lock());
    w.write_all(bytes)?;
    w.flush()?;
    Ok(())
}

/// Temp file in the destination directory, then rename over `path`.
fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => return Err(anyhow!("chemin de sortie sans parent: {}", display(path))),
    };
    let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("fichier temporaire dans {}", display(dir)))?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `dir/name.json` → `dir/name.pcbc`.
pub fn default_chunk_path(src: &Path) -> PathBuf {
    let stem = src.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let mut p = src.with_file_name(stem);
    p.set_extension("pcbc");
    p
}

fn display(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

// ───────────────────────────── Sorties jolies ─────────────────────────────

#[derive(Clone, Copy)]
enum Tone {
    Done,
    Note,
}

/// Tag + message on stderr; stdout stays reserved for program output.
fn status(tone: Tone, tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    {
        match tone {
            Tone::Done => eprintln!("{:>8} {msg}", tag.green().bold()),
            Tone::Note => eprintln!("{:>8} {msg}", tag.cyan().bold()),
        }
    }
    #[cfg(not(feature = "color"))]
    {
        let _ = tone;
        eprintln!("{tag:>8} {msg}");
    }
}

// ───────────────────────────── Tests ─────────────────────────────
