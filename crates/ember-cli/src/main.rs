//! `ember`: CLI principal d'Ember
//!
//! Ici on fait uniquement : parsing d'arguments, initialisation (logger,
//! couleur), et délégation à `ember_cli` (lib).

#![forbid(unsafe_code)]

use std::{io, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use ember_vm::{VmOptions, DEFAULT_STACK_LIMIT};

use ember_cli as cli; // notre lib interne (src/lib.rs)

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "ember", version, about = "Ember CLI : exécuter, désassembler, inspecter des chunks de bytecode", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    /// Couleur des statuts (si la feature `color` est compilée)
    #[arg(long = "color", value_enum, default_value_t = cli::ColorChoice::Auto, global = true)]
    color: cli::ColorChoice,

    /// Sous-commandes
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Construire, désassembler et exécuter le programme de démonstration
    Demo {
        /// Afficher la pile et l'instruction avant chaque pas
        #[arg(long)]
        trace: bool,
        /// Écrire aussi l'image du programme dans ce fichier
        #[arg(long)]
        emit: Option<PathBuf>,
    },

    /// Exécuter une image de chunk
    Run {
        /// Image (ou - pour stdin)
        input: Option<PathBuf>,
        /// Afficher la pile et l'instruction avant chaque pas
        #[arg(long)]
        trace: bool,
        /// Arrêter après N instructions
        #[arg(long = "step-limit", value_name = "N")]
        step_limit: Option<u64>,
        /// Nombre maximal de valeurs sur la pile
        #[arg(long = "stack-limit", value_name = "N", default_value_t = DEFAULT_STACK_LIMIT)]
        stack_limit: usize,
    },

    /// Désassembler une image vers du texte
    Disasm {
        /// Image (ou - pour stdin)
        input: Option<PathBuf>,
        /// Sortie texte (stdout si omis)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Une ligne courte par instruction
        #[arg(long)]
        compact: bool,
    },

    /// Inspecter une image (pool de constantes, table des lignes, vérification)
    Inspect {
        /// Image (ou - pour stdin)
        input: Option<PathBuf>,
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

fn output_from_opt(p: Option<PathBuf>) -> cli::Output {
    p.map_or(cli::Output::Stdout, cli::Output::Path)
}

// ──────────────────────────── Logger / Verbosité ────────────────────────────

fn init_telemetry(verbose: u8, quiet: bool) {
    #[cfg(feature = "trace")]
    {
        let level = if quiet {
            "error"
        } else {
            match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        };
        std::env::set_var(
            "RUST_LOG",
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()),
        );
        cli::init_logger();
    }
    #[cfg(not(feature = "trace"))]
    let _ = (verbose, quiet);
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<i32> {
    let opt = Opt::parse();
    cli::init_color(opt.color);
    init_telemetry(opt.verbose, opt.quiet);

    use cli::{Command as C, DemoTask, DisasmTask, InspectTask, RunTask};

    let command = match opt.cmd {
        Command::Demo { trace, emit } => C::Demo(DemoTask { trace, emit }),
        Command::Run { input, trace, step_limit, stack_limit } => {
            let options = VmOptions::default()
                .with_trace(trace)
                .with_step_limit(step_limit)
                .with_stack_limit(stack_limit);
            C::Run(RunTask { input: input_from_opt(input), options })
        }
        Command::Disasm { input, output, compact } => C::Disasm(DisasmTask {
            input: input_from_opt(input),
            output: output_from_opt(output),
            compact,
        }),
        Command::Inspect { input } => C::Inspect(InspectTask { input: input_from_opt(input) }),
    };

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let code = cli::execute(command, &mut out).context("échec d'exécution de la commande")?;
    io::Write::flush(&mut out)?;
    Ok(code)
}
