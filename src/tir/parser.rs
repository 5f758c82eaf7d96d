//! TIR parser implementation.

use std::cell::Cell;

use hashbrown::HashMap;

use super::RawOperand;
use crate::core::error::ParseError;
use crate::ir::{BlockId, Function, InstrInfo, Instruction, Module, Operand, TerminatorKind, VReg};

/// Parse a whole module. Mnemonics are looked up in `info`.
pub fn parse_module<I: InstrInfo + ?Sized>(text: &str, info: &I) -> Result<Module, ParseError> {
    Parser::new(text, info).parse()
}

/// Parse text holding exactly one function.
pub fn parse_function<I: InstrInfo + ?Sized>(
    text: &str,
    info: &I,
) -> Result<Function, ParseError> {
    let mut module = parse_module(text, info)?;
    match module.functions.len() {
        1 => Ok(module.functions.remove(0)),
        n => Err(ParseError { line: 1, message: format!("expected one function, found {n}") }),
    }
}

struct RawInst<'a> {
    line: usize,
    mnemonic: &'a str,
    operands: Vec<RawOperand<'a>>,
}

struct RawBlock<'a> {
    name: &'a str,
    insts: Vec<RawInst<'a>>,
}

struct Parser<'a, 'i, I: InstrInfo + ?Sized> {
    text: &'a str,
    pos: usize,
    info: &'i I,
    /// Last `(pos, line)` pair computed, so line lookups only scan forward.
    line_cache: Cell<(usize, usize)>,
}

impl<'a, 'i, I: InstrInfo + ?Sized> Parser<'a, 'i, I> {
    fn new(text: &'a str, info: &'i I) -> Self {
        Self { text, pos: 0, info, line_cache: Cell::new((0, 1)) }
    }

    fn parse(mut self) -> Result<Module, ParseError> {
        let mut module = Module::new();
        self.skip_whitespace();
        while !self.is_eof() {
            let func = self.parse_function()?;
            if module.function(&func.name).is_some() {
                return Err(self.error(format!("duplicate function '{}'", func.name)));
            }
            module.functions.push(func);
            self.skip_whitespace();
        }
        Ok(module)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.line(), message)
    }

    fn error_at(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError { line, message: message.into() }
    }

    fn line(&self) -> usize {
        let (mut from, mut line) = self.line_cache.get();
        if from > self.pos {
            (from, line) = (0, 1);
        }
        line += self.text.as_bytes()[from..self.pos].iter().filter(|&&b| b == b'\n').count();
        self.line_cache.set((self.pos, line));
        line
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch == b';' {
                // Comment runs to the end of the line.
                while let Some(ch) = self.current() {
                    if ch == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else if ch.is_ascii_whitespace() || ch == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn try_read(&mut self, ch: u8) -> bool {
        self.skip_whitespace();
        if self.current() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: u8) -> Result<(), ParseError> {
        if self.try_read(ch) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", ch as char, self.describe_current())))
        }
    }

    fn describe_current(&self) -> String {
        match self.current() {
            Some(ch) => format!("'{}'", ch as char),
            None => "end of input".to_string(),
        }
    }

    fn is_ident_byte(ch: u8) -> bool {
        ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'.'
    }

    fn read_identifier(&mut self) -> Result<&'a str, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.current().is_some_and(Self::is_ident_byte) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!("expected identifier, found {}", self.describe_current())));
        }
        Ok(&self.text[start..self.pos])
    }

    fn read_immediate(&mut self) -> Result<u32, ParseError> {
        let negative = self.current() == Some(b'-');
        if negative {
            self.pos += 1;
        }
        let start = self.pos;
        while self.current().is_some_and(|ch| ch.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let digits = &self.text[start..self.pos];
        let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => digits.parse::<u64>(),
        };
        let magnitude =
            parsed.map_err(|_| self.error(format!("invalid immediate '{digits}'")))?;

        if negative {
            if magnitude > 1 << 31 {
                return Err(self.error(format!("immediate -{digits} does not fit in 32 bits")));
            }
            Ok((magnitude as i64).wrapping_neg() as i32 as u32)
        } else {
            u32::try_from(magnitude)
                .map_err(|_| self.error(format!("immediate {digits} does not fit in 32 bits")))
        }
    }

    fn parse_operand(&mut self) -> Result<Option<RawOperand<'a>>, ParseError> {
        self.skip_whitespace();
        let operand = match self.current() {
            Some(b'%') => {
                self.pos += 1;
                RawOperand::Reg(self.read_identifier()?)
            }
            Some(b'^') => {
                self.pos += 1;
                RawOperand::Block(self.read_identifier()?)
            }
            Some(b'#') => {
                self.pos += 1;
                RawOperand::Imm(self.read_immediate()?)
            }
            _ => return Ok(None),
        };
        Ok(Some(operand))
    }

    /// Operands up to the end of the line.
    fn parse_operands(&mut self) -> Result<Vec<RawOperand<'a>>, ParseError> {
        let mut operands = Vec::new();
        loop {
            while matches!(self.current(), Some(b' ' | b'\t' | b'\r' | b',')) {
                self.pos += 1;
            }
            if matches!(self.current(), None | Some(b'\n' | b';')) {
                break;
            }
            match self.parse_operand()? {
                Some(op) => operands.push(op),
                None => break,
            }
        }
        Ok(operands)
    }

    fn parse_function(&mut self) -> Result<Function, ParseError> {
        let keyword = self.read_identifier()?;
        if keyword != "func" {
            return Err(self.error(format!("expected 'func', found '{keyword}'")));
        }
        let name = self.read_identifier()?;
        self.expect(b'{')?;

        let mut blocks: Vec<RawBlock<'a>> = Vec::new();
        while !self.try_read(b'}') {
            if self.is_eof() {
                return Err(self.error(format!("function '{name}' is missing its closing brace")));
            }
            let line = self.line();

            if self.current() == Some(b'%') {
                self.pos += 1;
                let result = self.read_identifier()?;
                self.expect(b'=')?;
                let mnemonic = self.read_identifier()?;
                let mut operands = vec![RawOperand::Reg(result)];
                operands.extend(self.parse_operands()?);
                self.push_inst(&mut blocks, RawInst { line, mnemonic, operands })?;
                continue;
            }

            let word = self.read_identifier()?;
            if self.current() == Some(b':') {
                self.pos += 1;
                if blocks.iter().any(|b| b.name == word) {
                    return Err(self.error_at(line, format!("duplicate block '{word}'")));
                }
                blocks.push(RawBlock { name: word, insts: Vec::new() });
            } else {
                let operands = self.parse_operands()?;
                self.push_inst(&mut blocks, RawInst { line, mnemonic: word, operands })?;
            }
        }

        self.build_function(name, blocks)
    }

    fn push_inst(&self, blocks: &mut [RawBlock<'a>], inst: RawInst<'a>) -> Result<(), ParseError> {
        match blocks.last_mut() {
            Some(block) => {
                block.insts.push(inst);
                Ok(())
            }
            None => Err(self.error_at(inst.line, "instruction outside of a block")),
        }
    }

    /// Resolve names. Label registers are numbered first, in block order,
    /// then every other register in order of first appearance.
    fn build_function(&self, name: &str, blocks: Vec<RawBlock<'a>>) -> Result<Function, ParseError> {
        let mut func = Function::new(name);
        let mut block_ids: HashMap<&str, BlockId> = HashMap::with_capacity(blocks.len());
        for block in &blocks {
            block_ids.insert(block.name, func.add_block(block.name));
        }

        let mut regs: HashMap<&str, VReg> = HashMap::new();
        for (idx, block) in blocks.iter().enumerate() {
            let id = BlockId(idx as u32);
            let mut terminated = false;
            for inst in &block.insts {
                if terminated {
                    return Err(self.error_at(
                        inst.line,
                        format!("instruction after the terminator of block '{}'", block.name),
                    ));
                }
                let desc = self.info.desc_by_name(inst.mnemonic).ok_or_else(|| {
                    self.error_at(inst.line, format!("unknown instruction '{}'", inst.mnemonic))
                })?;
                terminated = TerminatorKind::classify(desc.opcode).is_some();
                let mut operands = Vec::with_capacity(inst.operands.len());
                for op in &inst.operands {
                    let resolved = match *op {
                        RawOperand::Reg(reg) => {
                            Operand::Reg(*regs.entry(reg).or_insert_with(|| func.new_vreg()))
                        }
                        RawOperand::Block(target) => {
                            Operand::Block(*block_ids.get(target).ok_or_else(|| {
                                self.error_at(inst.line, format!("unknown block '{target}'"))
                            })?)
                        }
                        RawOperand::Imm(value) => Operand::Imm(value),
                    };
                    operands.push(resolved);
                }
                func.push(id, Instruction::new(desc.opcode, operands));
            }
        }
        Ok(func)
    }
}
