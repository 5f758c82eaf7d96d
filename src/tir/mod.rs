//! TIR: a small textual form of [`Module`](crate::ir::Module) for tests and
//! the command line tool.
//!
//! # Format
//!
//! ```text
//! ; Comments start with a semicolon
//! func name {
//! entry:
//!     %c = OpConstantTrue %bool
//!     OpBranchConditional %c, ^then, ^join
//! then:
//!     OpBranch ^join
//! join:
//!     OpReturn
//! }
//! ```
//!
//! One instruction per line. `%name` is a register, `^name` a block and
//! `#value` an immediate (decimal, `0x` hex, or negative). A leading
//! `%r =` becomes operand 0. Commas between operands are optional. Block
//! labels get the first registers of a function, in block order.

pub mod parser;
pub mod printer;

pub use parser::{parse_function, parse_module};
pub use printer::{print_function, print_module};

/// Operand before name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawOperand<'a> {
    Reg(&'a str),
    Block(&'a str),
    Imm(u32),
}
