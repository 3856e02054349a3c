use crate::{
    backend::layout::StackFrame,
    error::InternalError,
    middle::lir::{self, Variable},
};

/// Accumulates the text of one function. Every temporary lives in its stack
/// slot, so operands are always moved through scratch registers.
pub struct Assembler<'a> {
    output: String,
    frame: &'a StackFrame,
}

impl<'a> Assembler<'a> {
    pub fn new(frame: &'a StackFrame) -> Self {
        Self {
            output: String::new(),
            frame,
        }
    }

    pub fn into_output(self) -> String {
        self.output
    }

    fn push_line(&mut self, string: impl AsRef<str>) {
        self.output.push_str(string.as_ref());
        self.output.push('\n');
    }

    pub fn emit(&mut self, string: impl AsRef<str>) {
        self.output.push_str("    ");
        self.push_line(string);
    }

    pub fn global_label(&mut self, name: &str) {
        self.emit(format!(".globl {name}"));
        self.push_line(format!("{name}:"));
    }

    pub fn label(&mut self, name: impl AsRef<str>) {
        self.push_line(format!("{}:", name.as_ref()));
    }

    pub fn comment(&mut self, comment: impl AsRef<str>) {
        self.emit(format!("# {}", comment.as_ref()));
    }

    pub fn function_prologue(&mut self, stack_frame_size: u64) {
        self.emit("push rbp");
        self.emit("mov rbp, rsp");
        self.emit(format!("sub rsp, {stack_frame_size}"));
    }

    pub fn function_epilogue(&mut self) {
        self.emit("mov rsp, rbp");
        self.emit("pop rbp");
        self.emit("ret");
    }

    pub fn load_variable(
        &mut self,
        destination: X86FullRegister,
        source: impl Into<Variable>,
    ) -> Result<(), InternalError> {
        let offset = self.frame.offset_of(source)?;
        self.emit(format!("mov {destination}, [rbp - {offset}]"));

        Ok(())
    }

    pub fn load_value(
        &mut self,
        destination: X86FullRegister,
        source: lir::Value,
    ) -> Result<(), InternalError> {
        match source {
            lir::Value::Constant(constant) => {
                self.emit(format!("mov {destination}, {}", constant.as_i64()));
                Ok(())
            }
            lir::Value::Local(id) => self.load_variable(destination, id),
            lir::Value::Address(id) => self.load_variable(destination, id),
        }
    }

    pub fn store_variable(
        &mut self,
        destination: impl Into<Variable>,
        source: X86FullRegister,
    ) -> Result<(), InternalError> {
        let offset = self.frame.offset_of(destination)?;
        self.emit(format!("mov [rbp - {offset}], {source}"));

        Ok(())
    }
}

/// General Purpose Register 64-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum X86FullRegister {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
}

impl X86FullRegister {
    pub fn as_8_bit(self) -> X86ByteRegister {
        match self {
            Self::Rax => X86ByteRegister::Al,
            Self::Rbx => X86ByteRegister::Bl,
            Self::Rcx => X86ByteRegister::Cl,
            Self::Rdx => X86ByteRegister::Dl,
            Self::Rsi => X86ByteRegister::Sil,
            Self::Rdi => X86ByteRegister::Dil,
            Self::Rbp => X86ByteRegister::Bpl,
            Self::Rsp => X86ByteRegister::Spl,
            Self::R8 => X86ByteRegister::R8b,
            Self::R9 => X86ByteRegister::R9b,
        }
    }
}

/// Low byte of a general purpose register
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[rustfmt::skip]
pub enum X86ByteRegister {
    Al, Bl, Cl, Dl,
    Sil, Dil, Bpl, Spl,
    R8b, R9b,
}
