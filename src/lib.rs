#![crate_name = "lantern"]

pub mod dictionary;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod opcode_tables;
mod opcodes_io;
mod opcodes_math;
mod opcodes_memory;
mod opcodes_object;
pub mod test_utils;
pub mod text;
pub mod version;
pub mod vm;
pub mod zobject;
pub mod zrand;
