use std::{fs, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind};
use colored::Colorize;
use cruxc::{
    backend::{
        CodegenOptions,
        targets::{CodeGenerator, Target},
    },
    error::CompileError,
    middle::lir::pretty_print::pretty_print_program,
    samples::Sample,
};
use log::info;
use strum::IntoEnumIterator;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the bundled sample programs
    List,
    /// Compile one of the bundled sample programs
    Build {
        sample: Sample,

        /// What to produce
        #[arg(long, value_enum, default_value_t = Emit::Asm)]
        emit: Emit,

        #[arg(long, value_enum, default_value_t)]
        target: Target,

        /// Echo every IR instruction as a comment in the assembly
        #[arg(long)]
        debug_info: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// The lowered control-flow graph
    Ir,
    /// Assembly text
    Asm,
    /// An object file, assembled with the system assembler
    Obj,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let result = match args.command {
        Command::List => {
            list_samples();
            Ok(())
        }
        Command::Build {
            sample,
            emit,
            target,
            debug_info,
            output,
        } => {
            if emit == Emit::Obj && output.is_none() {
                Args::command()
                    .error(
                        ErrorKind::MissingRequiredArgument,
                        "--emit obj needs an output file (-o)",
                    )
                    .exit();
            }

            let options = CodegenOptions {
                emit_debug_info: debug_info,
            };

            build(sample, emit, target, &options, output)
        }
    };

    if let Err(err) = result {
        eprintln!("{} {err}", "error:".red().bold());

        if let CompileError::Semantic(errors) = &err {
            for error in errors {
                eprintln!("  {error}");
            }
        }

        std::process::exit(1);
    }
}

fn list_samples() {
    for sample in Sample::iter() {
        println!("{:>14}  {}", sample.to_string().blue(), sample.description());
    }
}

fn build(
    sample: Sample,
    emit: Emit,
    target: Target,
    options: &CodegenOptions,
    output: Option<PathBuf>,
) -> Result<(), CompileError> {
    info!("building sample `{sample}` for {target:?}");

    let program = sample.build();

    match emit {
        Emit::Ir => {
            let lir = cruxc::lower(&program.ast, &program.diagnostics)?;
            let text = pretty_print_program(&lir);

            match output {
                Some(path) => fs::write(path, strip_ansi_escapes::strip_str(&text))?,
                None => print!("{text}"),
            }
        }
        Emit::Asm => {
            let listing = cruxc::compile(&program.ast, &program.diagnostics, target, options)?;

            match output {
                Some(path) => fs::write(path, listing)?,
                None => print!("{listing}"),
            }
        }
        Emit::Obj => {
            let listing = cruxc::compile(&program.ast, &program.diagnostics, target, options)?;

            let Some(object_file) = output else {
                return Ok(());
            };
            let asm_file = object_file.with_extension("s");
            fs::write(&asm_file, listing)?;

            let status = target
                .get_code_generator()
                .create_assembler_command(&asm_file, &object_file)
                .status()?;

            if !status.success() {
                return Err(CompileError::Assembler(status));
            }

            info!("wrote {}", object_file.display());
        }
    }

    Ok(())
}
