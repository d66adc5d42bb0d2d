//! ember-cli: bibliothèque interne du binaire `ember`
//!
//! Le parsing d'arguments reste dans `main.rs` ; ici on trouve :
//! - les tâches (`Command`) : démo, exécution, désassemblage, inspection
//! - le chargement d'images de chunk (décodage + vérification)
//! - les utilitaires d'E/S (stdin/stdout, écriture atomique)
//! - la correspondance résultat → code de sortie (0 / 65 / 70)
//! - des statuts colorés sur stderr (`feature = "color"`)

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

use std::{
    fs,
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use ember_core::{
    disasm::{disassemble, disassemble_compact},
    format_value,
    verify::verify_chunk,
    Chunk, CoreError, CoreResult, OpCode,
};
use ember_vm::{InterpretResult, Vm, VmOptions};

/// Exit code for an image that fails to decode or verify (sysexits `EX_DATAERR`).
pub const EXIT_MALFORMED: i32 = 65;

// ───────────────────────────── Types publics ─────────────────────────────

/// Commande haut-niveau (sans parsing CLI, réservé à main.rs).
#[derive(Clone, Debug)]
pub enum Command {
    /// Construit, désassemble et exécute le programme de démonstration.
    Demo(DemoTask),
    /// Exécute une image de chunk.
    Run(RunTask),
    /// Désassemble une image de chunk.
    Disasm(DisasmTask),
    /// Résume le contenu d'une image (pool, table des lignes, taille du code).
    Inspect(InspectTask),
}

#[derive(Clone, Debug, Default)]
pub struct DemoTask {
    pub trace: bool,
    pub emit: Option<PathBuf>, // écrit aussi l'image du programme
}

#[derive(Clone, Debug, Default)]
pub struct RunTask {
    pub input: Input,
    pub options: VmOptions,
}

#[derive(Clone, Debug, Default)]
pub struct DisasmTask {
    pub input: Input,
    pub output: Output,
    pub compact: bool,
}

#[derive(Clone, Debug, Default)]
pub struct InspectTask {
    pub input: Input,
}

/// Entrée binaire : fichier ou `-` (=stdin).
#[derive(Clone, Debug)]
pub enum Input {
    Path(PathBuf),
    Stdin,
}
impl Default for Input {
    fn default() -> Self {
        Self::Stdin
    }
}

/// Choix de couleur pour les statuts sur stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorChoice {
    /// Couleur si stderr est un terminal (et `NO_COLOR` absent).
    #[default]
    Auto,
    Always,
    Never,
}

/// Sortie texte.
#[derive(Clone, Debug)]
pub enum Output {
    Path(PathBuf),
    Stdout,
}
impl Default for Output {
    fn default() -> Self {
        Self::Stdout
    }
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger selon la feature `trace`.
///
/// Les événements `tracing` des crates ember passent par le pont `log`.
pub fn init_logger() {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format_timestamp_secs()
            .try_init();
    }
}

/// Applique le choix de couleur (override global d'`owo-colors`).
pub fn init_color(choice: ColorChoice) {
    #[cfg(feature = "color")]
    {
        match choice {
            ColorChoice::Auto => owo_colors::unset_override(),
            ColorChoice::Always => owo_colors::set_override(true),
            ColorChoice::Never => owo_colors::set_override(false),
        }
    }
    #[cfg(not(feature = "color"))]
    let _ = choice;
}

// ───────────────────────────── Exécution ─────────────────────────────

/// Exécute une commande ; le texte produit va dans `out`, les statuts sur stderr.
/// Retourne le code de sortie du processus.
pub fn execute(cmd: Command, out: &mut dyn Write) -> Result<i32> {
    match cmd {
        Command::Demo(t) => demo_entry(t, out),
        Command::Run(t) => run_entry(t, out),
        Command::Disasm(t) => disasm_entry(t, out),
        Command::Inspect(t) => inspect_entry(t, out),
    }
}

fn demo_entry(task: DemoTask, out: &mut dyn Write) -> Result<i32> {
    let listing = listing_chunk().context("construction du listing de démonstration")?;
    out.write_all(disassemble(&listing, "test chunk").as_bytes())?;
    writeln!(out)?;

    let chunk = demo_chunk().context("construction du programme de démonstration")?;
    out.write_all(disassemble(&chunk, "demo").as_bytes())?;
    writeln!(out)?;

    if let Some(path) = &task.emit {
        write_bytes_atomic(path, &chunk.to_bytes())
            .with_context(|| format!("écriture de {}", display(path)))?;
        status_ok("EMIT", &display(path));
    }

    let options = VmOptions::default().with_trace(task.trace);
    interpret_and_report(&chunk, options, out)
}

fn run_entry(task: RunTask, out: &mut dyn Write) -> Result<i32> {
    let bytes = read_input(&task.input)?;
    let chunk = match load_image(&bytes) {
        Ok(chunk) => chunk,
        Err(e) => return Ok(report_malformed(&task.input, &e)),
    };
    interpret_and_report(&chunk, task.options, out)
}

fn disasm_entry(task: DisasmTask, out: &mut dyn Write) -> Result<i32> {
    let bytes = read_input(&task.input)?;
    // Pas de vérification ici : le listing doit aussi montrer le bytecode invalide.
    let chunk = match Chunk::from_bytes(&bytes) {
        Ok(chunk) => chunk,
        Err(e) => return Ok(report_malformed(&task.input, &e)),
    };
    let text = if task.compact {
        disassemble_compact(&chunk)
    } else {
        disassemble(&chunk, &input_title(&task.input))
    };
    match task.output {
        Output::Stdout => out.write_all(text.as_bytes())?,
        Output::Path(ref p) => {
            write_bytes_atomic(p, text.as_bytes())
                .with_context(|| format!("écriture de {}", display(p)))?;
            status_ok("DISASM", &display(p));
        }
    }
    Ok(0)
}

fn inspect_entry(task: InspectTask, out: &mut dyn Write) -> Result<i32> {
    let bytes = read_input(&task.input)?;
    let chunk = match Chunk::from_bytes(&bytes) {
        Ok(chunk) => chunk,
        Err(e) => return Ok(report_malformed(&task.input, &e)),
    };
    out.write_all(summarize(&chunk, bytes.len()).as_bytes())?;
    if let Err(e) = verify_chunk(&chunk) {
        writeln!(out, "verify:    FAILED ({e})")?;
        return Ok(EXIT_MALFORMED);
    }
    writeln!(out, "verify:    ok")?;
    Ok(0)
}

fn interpret_and_report(chunk: &Chunk, options: VmOptions, out: &mut dyn Write) -> Result<i32> {
    let traced = options.trace;
    let mut vm = Vm::with_options(options);
    let result = if traced {
        let mut trace = String::new();
        let result = vm.interpret_traced(chunk, &mut trace);
        out.write_all(trace.as_bytes())?;
        result
    } else {
        vm.interpret(chunk)
    };

    let status = InterpretResult::from(&result);
    match result {
        Ok(value) => writeln!(out, "{}", format_value(value))?,
        Err(e) => status_err("RUNTIME", &e.to_string()),
    }
    Ok(i32::from(status.exit_code()))
}

// ───────────────────────────── Programmes ─────────────────────────────

/// `-((1.2 + 3.4) / 5.6)`, every instruction on line 123.
pub fn demo_chunk() -> CoreResult<Chunk> {
    let mut chunk = Chunk::new();
    let line = 123;
    chunk.write_constant(1.2, line)?;
    chunk.write_constant(3.4, line)?;
    chunk.write_op(OpCode::Add, line);
    chunk.write_constant(5.6, line)?;
    chunk.write_op(OpCode::Divide, line);
    chunk.write_op(OpCode::Negate, line);
    chunk.write_op(OpCode::Return, line);
    Ok(chunk)
}

/// Three loads spread over lines 123-124 followed by a return on 125.
pub fn listing_chunk() -> CoreResult<Chunk> {
    let mut chunk = Chunk::new();
    for (value, line) in [(1.2, 123), (3.4, 124), (5.6, 124)] {
        chunk.write_constant(value, line)?;
    }
    chunk.write_op(OpCode::Return, 125);
    Ok(chunk)
}

// ───────────────────────────── Images ─────────────────────────────

/// Décode une image et vérifie que tout le code se décode proprement.
pub fn load_image(bytes: &[u8]) -> Result<Chunk, CoreError> {
    let chunk = Chunk::from_bytes(bytes)?;
    verify_chunk(&chunk)?;
    #[cfg(feature = "trace")]
    log::debug!(
        "image chargée : {} octets de code, {} constantes, {} plages de lignes",
        chunk.len(),
        chunk.constants().len(),
        chunk.lines().len()
    );
    Ok(chunk)
}

fn summarize(chunk: &Chunk, image_len: usize) -> String {
    use std::fmt::Write as _;

    let mut s = String::new();
    let _ = writeln!(s, "image:     {image_len} bytes");
    let _ = writeln!(s, "code:      {} bytes", chunk.len());
    let _ = writeln!(s, "constants: {}", chunk.constants().len());
    for (ix, value) in chunk.constants().iter().enumerate() {
        let _ = writeln!(s, "  [{ix:4}] {}", format_value(*value));
    }
    let _ = writeln!(s, "lines:     {} run(s)", chunk.lines().len());
    for (range, line) in chunk.lines().runs(chunk.len()) {
        let _ = writeln!(s, "  {:06}..{:06}  line {line}", range.start, range.end);
    }
    s
}

fn report_malformed(input: &Input, err: &CoreError) -> i32 {
    status_err("MALFORMED", &format!("{}: {err}", input_title(input)));
    EXIT_MALFORMED
}

// ───────────────────────────── Utilitaires E/S ─────────────────────────────

fn read_input(input: &Input) -> Result<Vec<u8>> {
    match input {
        Input::Stdin => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).context("lecture de stdin")?;
            Ok(buf)
        }
        Input::Path(p) => fs::read(p).with_context(|| format!("lecture image: {}", display(p))),
    }
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => return Err(anyhow!("chemin de sortie sans parent: {}", display(path))),
    };
    let base = path
        .file_name()
        .ok_or_else(|| anyhow!("chemin de sortie sans nom de fichier: {}", display(path)))?;
    let tmp = unique_tmp_path(parent, base);
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        w.write_all(bytes)?;
        w.flush()?;
    }
    if path.exists() {
        // Windows : rename sur cible existante peut échouer
        let _ = fs::remove_file(path);
    }
    fs::rename(&tmp, path).or_else(|_| {
        fs::copy(&tmp, path).map(|_| ()).and_then(|()| fs::remove_file(&tmp))
    })?;
    Ok(())
}

fn unique_tmp_path(dir: &Path, base: &std::ffi::OsStr) -> PathBuf {
    let mut i = 0u32;
    loop {
        let candidate = dir.join(format!("{}.tmp{}", base.to_string_lossy(), i));
        if !candidate.exists() {
            return candidate;
        }
        i = i.wrapping_add(1);
    }
}

fn input_title(input: &Input) -> String {
    match input {
        Input::Path(p) => display(p),
        Input::Stdin => "<stdin>".into(),
    }
}

fn display(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

// ───────────────────────────── Statuts ─────────────────────────────

#[derive(Clone, Copy, Debug)]
enum Tone {
    Ok,
    Err,
}

fn paint_tag(tag: &str, tone: Tone) -> String {
    #[cfg(feature = "color")]
    {
        use owo_colors::{OwoColorize, Stream, Style};

        let style = match tone {
            Tone::Ok => Style::new().green().bold(),
            Tone::Err => Style::new().red().bold(),
        };
        tag.if_supports_color(Stream::Stderr, |t| t.style(style)).to_string()
    }
    #[cfg(not(feature = "color"))]
    {
        let _ = tone;
        tag.to_string()
    }
}

fn status_ok(tag: &str, msg: &str) {
    eprintln!("{} {msg}", paint_tag(tag, Tone::Ok));
}

fn status_err(tag: &str, msg: &str) {
    eprintln!("{} {msg}", paint_tag(tag, Tone::Err));
}

// ───────────────────────────── Tests ─────────────────────────────
