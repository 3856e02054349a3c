use std::{path::Path, process::Command};

use crate::{backend::CodegenOptions, error::InternalError, middle::lir};

mod x86_64_linux_gnu;

pub use x86_64_linux_gnu::{CodeGeneratorX86_64LinuxGnu, assembly_name};

pub trait CodeGenerator {
    /// Produces the complete assembly listing, or nothing at all
    fn translate_to_asm(
        &self,
        program: &lir::Program,
        options: &CodegenOptions,
    ) -> Result<String, InternalError>;
    fn create_assembler_command(&self, input_file: &Path, output_file: &Path) -> Command;
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Target {
    #[default]
    #[value(name = "x86_64-linux-gnu")]
    x86_64LinuxGnu,
}

impl Target {
    pub fn get_code_generator(self) -> impl CodeGenerator {
        match self {
            Target::x86_64LinuxGnu => CodeGeneratorX86_64LinuxGnu,
        }
    }
}
