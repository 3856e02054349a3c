//! A tiny interpreter for the Intel-syntax x86-64 subset produced by the code
//! generator. It runs a listing the way the hardware would (including the
//! built-in runtime functions) so tests can check what generated code does
//! rather than how it is spelled.

#![allow(dead_code)]

use std::collections::VecDeque;

use cruxc::backend::targets::assembly_name;
use hashbrown::HashMap;

const STACK_TOP: i64 = 0x7fff_0000;
const GLOBALS_BASE: i64 = 0x1000_0000;
const RETURN_TO_HOST: i64 = -1;
const STEP_LIMIT: usize = 1_000_000;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Register(&'static str),
    /// Low byte of a full register
    ByteRegister(&'static str),
    Immediate(i64),
    Memory {
        base: Option<&'static str>,
        index: Option<(&'static str, i64)>,
        displacement: i64,
        symbol: Option<String>,
    },
    Label(String),
}

#[derive(Debug, Clone)]
struct Instruction {
    mnemonic: String,
    operands: Vec<Operand>,
    text: String,
}

const REGISTERS: &[&str] = &[
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "r8", "r9", "r10", "r11",
];

const ARG_REGS: &[&str] = &["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

fn full_register(name: &str) -> Option<&'static str> {
    REGISTERS.iter().copied().find(|r| *r == name)
}

fn byte_register(name: &str) -> Option<&'static str> {
    match name {
        "al" => Some("rax"),
        "bl" => Some("rbx"),
        "cl" => Some("rcx"),
        "dl" => Some("rdx"),
        _ => None,
    }
}

fn parse_memory(inner: &str) -> Operand {
    let mut base = None;
    let mut index = None;
    let mut displacement = 0;
    let mut symbol = None;

    for term in inner.replace(" - ", " + -").split('+') {
        let term = term.trim();

        if let Some((register, scale)) = term.split_once('*') {
            let register = full_register(register.trim())
                .unwrap_or_else(|| panic!("bad index register in [{inner}]"));
            index = Some((register, scale.trim().parse().unwrap()));
        } else if term == "rip" {
            base = Some("rip");
        } else if let Some(register) = full_register(term) {
            base = Some(register);
        } else if let Ok(value) = term.parse::<i64>() {
            displacement += value;
        } else {
            symbol = Some(term.to_owned());
        }
    }

    Operand::Memory {
        base,
        index,
        displacement,
        symbol,
    }
}

fn parse_operand(text: &str) -> Operand {
    let text = text.trim();

    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        parse_memory(inner)
    } else if let Some(register) = full_register(text) {
        Operand::Register(register)
    } else if let Some(register) = byte_register(text) {
        Operand::ByteRegister(register)
    } else if let Ok(value) = text.parse::<i64>() {
        Operand::Immediate(value)
    } else {
        Operand::Label(text.to_owned())
    }
}

pub struct Machine {
    program: Vec<Instruction>,
    labels: HashMap<String, usize>,
    globals: HashMap<String, i64>,
    registers: HashMap<&'static str, i64>,
    memory: HashMap<i64, i64>,
    /// Operands of the last `cmp` (or `test` as `(a & b, 0)`)
    flags: (i64, i64),
    input: VecDeque<i64>,
    output: Vec<String>,
    jumps: HashMap<String, usize>,
    visits: HashMap<String, usize>,
    calls: HashMap<String, usize>,
}

impl Machine {
    pub fn load(listing: &str) -> Self {
        let mut machine = Self {
            program: Vec::new(),
            labels: HashMap::new(),
            globals: HashMap::new(),
            registers: REGISTERS.iter().map(|r| (*r, 0)).collect(),
            memory: HashMap::new(),
            flags: (0, 0),
            input: VecDeque::new(),
            output: Vec::new(),
            jumps: HashMap::new(),
            visits: HashMap::new(),
            calls: HashMap::new(),
        };

        let mut next_global = GLOBALS_BASE;

        for line in listing.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(label) = line.strip_suffix(':') {
                machine.labels.insert(label.to_owned(), machine.program.len());
                continue;
            }

            if let Some(directive) = line.strip_prefix(".comm ") {
                let parts = directive.split(',').map(str::trim).collect::<Vec<_>>();
                let size: i64 = parts[1].parse().unwrap();
                machine.globals.insert(parts[0].to_owned(), next_global);
                next_global += (size + 15) / 16 * 16;
                continue;
            }

            if line.starts_with('.') {
                // .intel_syntax, .text, .globl, .section
                continue;
            }

            let (mnemonic, rest) = line.split_once(' ').unwrap_or((line, ""));
            let operands = if rest.is_empty() {
                Vec::new()
            } else {
                rest.split(',').map(parse_operand).collect()
            };

            machine.program.push(Instruction {
                mnemonic: mnemonic.to_owned(),
                operands,
                text: line.to_owned(),
            });
        }

        machine
    }

    pub fn with_input(mut self, input: impl IntoIterator<Item = i64>) -> Self {
        self.input.extend(input);
        self
    }

    /// Everything written by the print built-ins, one entry per call
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// How many times control was transferred to `label` by a jump
    pub fn jumps_to(&self, label: &str) -> usize {
        self.jumps.get(label).copied().unwrap_or(0)
    }

    /// How many times execution passed `label`, by jumping or falling through
    pub fn visits(&self, label: &str) -> usize {
        self.visits.get(label).copied().unwrap_or(0)
    }

    /// `function` and `name` below are Crux names, not assembly symbols
    pub fn calls_to(&self, function: &str) -> usize {
        self.calls
            .get(assembly_name(function).as_ref())
            .copied()
            .unwrap_or(0)
    }

    pub fn global(&self, name: &str, index: i64) -> i64 {
        let base = self.globals[assembly_name(name).as_ref()];
        self.read(base + 8 * index)
    }

    pub fn run_main(&mut self) -> i64 {
        self.call("main", &[])
    }

    /// Calls `function` following the System V convention and returns `rax`
    pub fn call(&mut self, function: &str, arguments: &[i64]) -> i64 {
        let entry = self.labels[assembly_name(function).as_ref()];

        self.set("rsp", STACK_TOP);

        for (register, value) in ARG_REGS.iter().copied().zip(arguments) {
            self.set(register, *value);
        }

        let stack_arguments = arguments.get(ARG_REGS.len()..).unwrap_or_default();
        if stack_arguments.len() % 2 == 1 {
            self.push(0);
        }
        for value in stack_arguments.iter().rev() {
            self.push(*value);
        }

        self.push(RETURN_TO_HOST);
        self.run(entry);

        self.get("rax")
    }

    fn get(&self, register: &str) -> i64 {
        self.registers[register]
    }

    fn set(&mut self, register: &'static str, value: i64) {
        self.registers.insert(register, value);
    }

    fn read(&self, address: i64) -> i64 {
        assert_eq!(address % 8, 0, "misaligned read at {address:#x}");
        self.memory.get(&address).copied().unwrap_or(0)
    }

    fn write(&mut self, address: i64, value: i64) {
        assert_eq!(address % 8, 0, "misaligned write at {address:#x}");
        self.memory.insert(address, value);
    }

    fn push(&mut self, value: i64) {
        let rsp = self.get("rsp") - 8;
        self.set("rsp", rsp);
        self.write(rsp, value);
    }

    fn pop(&mut self) -> i64 {
        let rsp = self.get("rsp");
        let value = self.read(rsp);
        self.set("rsp", rsp + 8);
        value
    }

    fn address(&self, operand: &Operand) -> i64 {
        let Operand::Memory {
            base,
            index,
            displacement,
            symbol,
        } = operand
        else {
            panic!("{operand:?} is not a memory operand");
        };

        let mut address = *displacement;

        match (base, symbol) {
            (Some("rip"), Some(symbol)) => {
                address += *self
                    .globals
                    .get(symbol)
                    .unwrap_or_else(|| panic!("unknown global `{symbol}`"));
            }
            (Some(register), None) => address += self.get(register),
            other => panic!("unsupported addressing {other:?}"),
        }

        if let Some((register, scale)) = index {
            address += self.get(register) * scale;
        }

        address
    }

    fn value(&self, operand: &Operand) -> i64 {
        match operand {
            Operand::Register(register) => self.get(register),
            Operand::ByteRegister(register) => self.get(register) & 0xff,
            Operand::Immediate(value) => *value,
            Operand::Memory { .. } => self.read(self.address(operand)),
            Operand::Label(label) => panic!("label `{label}` used as a value"),
        }
    }

    fn store(&mut self, operand: &Operand, value: i64) {
        match operand {
            Operand::Register(register) => self.set(register, value),
            Operand::ByteRegister(register) => {
                let full = (self.get(register) & !0xff) | (value & 0xff);
                self.set(register, full);
            }
            Operand::Memory { .. } => {
                let address = self.address(operand);
                self.write(address, value);
            }
            other => panic!("cannot write to {other:?}"),
        }
    }

    fn condition(&self, code: &str) -> bool {
        let (lhs, rhs) = self.flags;

        match code {
            "e" | "z" => lhs == rhs,
            "ne" | "nz" => lhs != rhs,
            "l" => lhs < rhs,
            "le" => lhs <= rhs,
            "g" => lhs > rhs,
            "ge" => lhs >= rhs,
            _ => panic!("unknown condition code `{code}`"),
        }
    }

    fn jump(&mut self, label: &str) -> usize {
        *self.jumps.entry(label.to_owned()).or_default() += 1;

        *self
            .labels
            .get(label)
            .unwrap_or_else(|| panic!("jump to unknown label `{label}`"))
    }

    fn builtin(&mut self, name: &str) {
        let rdi = self.get("rdi");

        match name {
            "readInt" | "readChar" => {
                let value = self.input.pop_front().unwrap_or(0);
                self.set("rax", value);
            }
            "printInt" => self.output.push(rdi.to_string()),
            "printBool" => self.output.push((rdi != 0).to_string()),
            "printChar" => self.output.push(char::from(rdi as u8).to_string()),
            "println" => self.output.push("\n".to_owned()),
            other => panic!("call to undefined function `{other}`"),
        }
    }

    fn run(&mut self, entry: usize) {
        let label_at = self
            .labels
            .iter()
            .map(|(label, index)| (*index, label.clone()))
            .fold(HashMap::<usize, Vec<String>>::new(), |mut map, (index, label)| {
                map.entry(index).or_default().push(label);
                map
            });

        let mut pc = entry;

        for _ in 0..STEP_LIMIT {
            for label in label_at.get(&pc).into_iter().flatten() {
                *self.visits.entry(label.clone()).or_default() += 1;
            }

            let instruction = self
                .program
                .get(pc)
                .unwrap_or_else(|| panic!("ran off the end of the program at {pc}"))
                .clone();
            let ops = &instruction.operands;
            let mut next = pc + 1;

            match instruction.mnemonic.as_str() {
                "mov" => {
                    let value = self.value(&ops[1]);
                    self.store(&ops[0], value);
                }
                "lea" => {
                    let address = self.address(&ops[1]);
                    self.store(&ops[0], address);
                }
                "push" => {
                    let value = self.value(&ops[0]);
                    self.push(value);
                }
                "pop" => {
                    let value = self.pop();
                    self.store(&ops[0], value);
                }
                "add" => {
                    let value = self.value(&ops[0]).wrapping_add(self.value(&ops[1]));
                    self.store(&ops[0], value);
                }
                "sub" => {
                    let value = self.value(&ops[0]).wrapping_sub(self.value(&ops[1]));
                    self.store(&ops[0], value);
                }
                "imul" => {
                    let value = self.value(&ops[0]).wrapping_mul(self.value(&ops[1]));
                    self.store(&ops[0], value);
                }
                "xor" => {
                    let value = self.value(&ops[0]) ^ self.value(&ops[1]);
                    self.store(&ops[0], value);
                }
                "cqo" => {
                    let sign = if self.get("rax") < 0 { -1 } else { 0 };
                    self.set("rdx", sign);
                }
                "idiv" => {
                    let divisor = self.value(&ops[0]);
                    assert_ne!(divisor, 0, "division by zero");
                    let dividend = self.get("rax");
                    self.set("rax", dividend.wrapping_div(divisor));
                    self.set("rdx", dividend.wrapping_rem(divisor));
                }
                "cmp" => self.flags = (self.value(&ops[0]), self.value(&ops[1])),
                "test" => self.flags = (self.value(&ops[0]) & self.value(&ops[1]), 0),
                "jmp" => {
                    let Operand::Label(label) = &ops[0] else {
                        panic!("indirect jump `{}`", instruction.text)
                    };
                    next = self.jump(label);
                }
                "call" => {
                    let Operand::Label(function) = &ops[0] else {
                        panic!("indirect call `{}`", instruction.text)
                    };
                    assert_eq!(
                        self.get("rsp") % 16,
                        0,
                        "stack misaligned at `{}`",
                        instruction.text
                    );
                    *self.calls.entry(function.clone()).or_default() += 1;

                    match self.labels.get(function) {
                        Some(&target) => {
                            self.push(next as i64);
                            next = target;
                        }
                        None => self.builtin(function),
                    }
                }
                "ret" => {
                    let address = self.pop();
                    if address == RETURN_TO_HOST {
                        return;
                    }
                    next = address as usize;
                }
                mnemonic => {
                    if let Some(code) = mnemonic.strip_prefix("cmov") {
                        if self.condition(code) {
                            let value = self.value(&ops[1]);
                            self.store(&ops[0], value);
                        }
                    } else if let Some(code) = mnemonic.strip_prefix("set") {
                        let value = self.condition(code) as i64;
                        self.store(&ops[0], value);
                    } else if let Some(code) = mnemonic.strip_prefix('j') {
                        if self.condition(code) {
                            let Operand::Label(label) = &ops[0] else {
                                panic!("indirect jump `{}`", instruction.text)
                            };
                            next = self.jump(label);
                        }
                    } else {
                        panic!("unsupported instruction `{}`", instruction.text);
                    }
                }
            }

            pc = next;
        }

        panic!("step limit exceeded, the program probably loops forever");
    }
}
