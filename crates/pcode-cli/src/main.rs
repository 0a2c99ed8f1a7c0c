//! `pcode` — CLI principal
//!
//! Ici on fait uniquement : parsing d'arguments, initialisation (logger,
//! couleur), et délégation à `pcode_cli` (lib).

#![forbid(unsafe_code)]

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use pcode_cli as cli;
use pcode_core::Value;

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "pcode", version, about = "pcode CLI — générer, exécuter, désassembler du pseudocode", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    /// Force la couleur (si la feature `color` est compilée)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    /// Sous-commandes
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Générer un chunk PCBC depuis un AST JSON
    Compile {
        /// AST JSON (ou - pour stdin)
        input: Option<PathBuf>,
        /// Fichier de sortie (.pcbc) (stdout si omis et pas --auto)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Sortie auto : même nom + .pcbc
        #[arg(long)]
        auto: bool,
        /// Créer les dossiers parents si nécessaire
        #[arg(long = "mkdir")]
        auto_mkdir: bool,
        /// Écraser le fichier de sortie
        #[arg(long)]
        overwrite: bool,
        /// Afficher le temps de génération
        #[arg(long)]
        time: bool,
    },

    /// Exécuter un programme (chunk PCBC ou AST JSON)
    Run {
        /// Programme (ou - pour stdin)
        program: Option<PathBuf>,
        /// Entrée `name=value` (répétable)
        #[arg(short = 'i', long = "input", value_parser = cli::parse_binding)]
        inputs: Vec<(String, Value)>,
        /// Plafond d'instructions exécutées
        #[arg(long = "max-steps")]
        max_steps: Option<u64>,
        /// Afficher les variables finales
        #[arg(long = "dump-vars")]
        dump_vars: bool,
        /// Rapport JSON
        #[arg(long)]
        json: bool,
        /// Afficher le temps d'exécution
        #[arg(long)]
        time: bool,
    },

    /// Désassembler un programme vers du texte
    Disasm {
        /// Programme (ou - pour stdin)
        input: Option<PathBuf>,
        /// Sortie texte (stdout si omis)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// En-tête et annotations de saut
        #[arg(long)]
        full: bool,
    },

    /// Lister les entrées requises par un programme
    Inputs {
        /// Programme (ou - pour stdin)
        input: Option<PathBuf>,
        /// Tableau JSON
        #[arg(long)]
        json: bool,
    },
}

// ──────────────────────────── Entrée / Sortie ────────────────────────────

fn input_from_opt(p: Option<PathBuf>) -> cli::Input {
    match p {
        Some(path) if path.as_os_str() == "-" => cli::Input::Stdin,
        Some(path) => cli::Input::Path(path),
        None => cli::Input::Stdin,
    }
}

fn output_from_opt(output: Option<PathBuf>, auto: bool) -> cli::Output {
    if auto {
        return cli::Output::Auto;
    }
    output.map_or(cli::Output::Stdout, cli::Output::Path)
}

// ──────────────────────────── Logger / Verbosité ────────────────────────────

fn init_telemetry(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    cli::init_logger(level);
}

fn init_color(choice: ColorChoice) {
    // `owo-colors` détecte le TTY ; on ne force que sur demande
    match choice {
        ColorChoice::Auto => {}
        ColorChoice::Always => {
            std::env::set_var("CLICOLOR_FORCE", "1");
            std::env::remove_var("NO_COLOR");
        }
        ColorChoice::Never => {
            std::env::set_var("NO_COLOR", "1");
            std::env::remove_var("CLICOLOR_FORCE");
        }
    }
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    match real_main() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<i32> {
    let opt = Opt::parse();

    init_color(opt.color);
    init_telemetry(opt.verbose, opt.quiet);

    use cli::{Command as C, CompileTask, DisasmTask, InputsTask, RunTask};

    let command = match opt.cmd {
        Command::Compile { input, output, auto, auto_mkdir, overwrite, time } => C::Compile(CompileTask {
            input: input_from_opt(input),
            output: output_from_opt(output, auto),
            auto_mkdir,
            overwrite,
            time,
        }),
        Command::Run { program, inputs, max_steps, dump_vars, json, time } => C::Run(RunTask {
            program: input_from_opt(program),
            bindings: inputs,
            max_steps,
            dump_vars,
            json,
            time,
        }),
        Command::Disasm { input, output, full } => C::Disasm(DisasmTask {
            input: input_from_opt(input),
            output: output_from_opt(output, false),
            full,
        }),
        Command::Inputs { input, json } => C::Inputs(InputsTask { input: input_from_opt(input), json }),
    };

    cli::execute(command).context("échec d'exécution de la commande")
}
