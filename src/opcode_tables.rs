//! Opcode tables.
//!
//! Each opcode carries the flags the decoder needs: whether a store variable,
//! branch descriptor or literal text follows the operands. Several slots mean
//! different things in different versions (0OP:9 is pop before v5 and catch
//! after), so lookup takes the version.

use crate::instruction::OperandCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub name: &'static str,
    pub store: bool,
    pub branch: bool,
    pub text: bool,
    /// Reads a line or key from the player before completing.
    pub input: bool,
}

impl Opcode {
    const fn new(name: &'static str) -> Opcode {
        Opcode {
            name,
            store: false,
            branch: false,
            text: false,
            input: false,
        }
    }

    const fn store(mut self) -> Opcode {
        self.store = true;
        self
    }

    const fn branch(mut self) -> Opcode {
        self.branch = true;
        self
    }

    const fn text(mut self) -> Opcode {
        self.text = true;
        self
    }

    const fn input(mut self) -> Opcode {
        self.input = true;
        self
    }
}

pub fn lookup(version: u8, count: OperandCount, code: u8) -> Option<Opcode> {
    match count {
        OperandCount::OP0 => lookup_0op(version, code),
        OperandCount::OP1 => lookup_1op(version, code),
        OperandCount::OP2 => lookup_2op(version, code),
        OperandCount::VAR => lookup_var(version, code),
        OperandCount::EXT => lookup_ext(version, code),
    }
}

fn lookup_0op(version: u8, code: u8) -> Option<Opcode> {
    let op = match code {
        0x0 => Opcode::new("rtrue"),
        0x1 => Opcode::new("rfalse"),
        0x2 => Opcode::new("print").text(),
        0x3 => Opcode::new("print_ret").text(),
        0x4 => Opcode::new("nop"),
        0x5 if version <= 3 => Opcode::new("save").branch(),
        0x5 if version == 4 => Opcode::new("save").store(),
        0x6 if version <= 3 => Opcode::new("restore").branch(),
        0x6 if version == 4 => Opcode::new("restore").store(),
        0x7 => Opcode::new("restart"),
        0x8 => Opcode::new("ret_popped"),
        0x9 if version <= 4 => Opcode::new("pop"),
        0x9 => Opcode::new("catch").store(),
        0xA => Opcode::new("quit"),
        0xB => Opcode::new("new_line"),
        0xC if version == 3 => Opcode::new("show_status"),
        0xD if version >= 3 => Opcode::new("verify").branch(),
        0xF if version >= 5 => Opcode::new("piracy").branch(),
        _ => return None,
    };
    Some(op)
}

fn lookup_1op(version: u8, code: u8) -> Option<Opcode> {
    let op = match code {
        0x0 => Opcode::new("jz").branch(),
        0x1 => Opcode::new("get_sibling").store().branch(),
        0x2 => Opcode::new("get_child").store().branch(),
        0x3 => Opcode::new("get_parent").store(),
        0x4 => Opcode::new("get_prop_len").store(),
        0x5 => Opcode::new("inc"),
        0x6 => Opcode::new("dec"),
        0x7 => Opcode::new("print_addr"),
        0x8 if version >= 4 => Opcode::new("call_1s").store(),
        0x9 => Opcode::new("remove_obj"),
        0xA => Opcode::new("print_obj"),
        0xB => Opcode::new("ret"),
        0xC => Opcode::new("jump"),
        0xD => Opcode::new("print_paddr"),
        0xE => Opcode::new("load").store(),
        0xF if version <= 4 => Opcode::new("not").store(),
        0xF => Opcode::new("call_1n"),
        _ => return None,
    };
    Some(op)
}

fn lookup_2op(version: u8, code: u8) -> Option<Opcode> {
    let op = match code {
        0x01 => Opcode::new("je").branch(),
        0x02 => Opcode::new("jl").branch(),
        0x03 => Opcode::new("jg").branch(),
        0x04 => Opcode::new("dec_chk").branch(),
        0x05 => Opcode::new("inc_chk").branch(),
        0x06 => Opcode::new("jin").branch(),
        0x07 => Opcode::new("test").branch(),
        0x08 => Opcode::new("or").store(),
        0x09 => Opcode::new("and").store(),
        0x0A => Opcode::new("test_attr").branch(),
        0x0B => Opcode::new("set_attr"),
        0x0C => Opcode::new("clear_attr"),
        0x0D => Opcode::new("store"),
        0x0E => Opcode::new("insert_obj"),
        0x0F => Opcode::new("loadw").store(),
        0x10 => Opcode::new("loadb").store(),
        0x11 => Opcode::new("get_prop").store(),
        0x12 => Opcode::new("get_prop_addr").store(),
        0x13 => Opcode::new("get_next_prop").store(),
        0x14 => Opcode::new("add").store(),
        0x15 => Opcode::new("sub").store(),
        0x16 => Opcode::new("mul").store(),
        0x17 => Opcode::new("div").store(),
        0x18 => Opcode::new("mod").store(),
        0x19 if version >= 4 => Opcode::new("call_2s").store(),
        0x1A if version >= 5 => Opcode::new("call_2n"),
        0x1B if version >= 5 => Opcode::new("set_colour"),
        0x1C if version >= 5 => Opcode::new("throw"),
        _ => return None,
    };
    Some(op)
}

fn lookup_var(version: u8, code: u8) -> Option<Opcode> {
    let op = match code {
        0x00 => Opcode::new("call_vs").store(),
        0x01 => Opcode::new("storew"),
        0x02 => Opcode::new("storeb"),
        0x03 => Opcode::new("put_prop"),
        0x04 if version <= 4 => Opcode::new("sread").input(),
        0x04 => Opcode::new("aread").store().input(),
        0x05 => Opcode::new("print_char"),
        0x06 => Opcode::new("print_num"),
        0x07 => Opcode::new("random").store(),
        0x08 => Opcode::new("push"),
        0x09 => Opcode::new("pull"),
        0x0A if version >= 3 => Opcode::new("split_window"),
        0x0B if version >= 3 => Opcode::new("set_window"),
        0x0C if version >= 4 => Opcode::new("call_vs2").store(),
        0x0D if version >= 4 => Opcode::new("erase_window"),
        0x0E if version >= 4 => Opcode::new("erase_line"),
        0x0F if version >= 4 => Opcode::new("set_cursor"),
        0x10 if version >= 4 => Opcode::new("get_cursor"),
        0x11 if version >= 4 => Opcode::new("set_text_style"),
        0x12 if version >= 4 => Opcode::new("buffer_mode"),
        0x13 if version >= 3 => Opcode::new("output_stream"),
        0x14 if version >= 3 => Opcode::new("input_stream"),
        0x15 if version >= 3 => Opcode::new("sound_effect"),
        0x16 if version >= 4 => Opcode::new("read_char").store().input(),
        0x17 if version >= 4 => Opcode::new("scan_table").store().branch(),
        0x18 if version >= 5 => Opcode::new("not").store(),
        0x19 if version >= 5 => Opcode::new("call_vn"),
        0x1A if version >= 5 => Opcode::new("call_vn2"),
        0x1B if version >= 5 => Opcode::new("tokenise"),
        0x1C if version >= 5 => Opcode::new("encode_text"),
        0x1D if version >= 5 => Opcode::new("copy_table"),
        0x1E if version >= 5 => Opcode::new("print_table"),
        0x1F if version >= 5 => Opcode::new("check_arg_count").branch(),
        _ => return None,
    };
    Some(op)
}

fn lookup_ext(version: u8, code: u8) -> Option<Opcode> {
    if version < 5 {
        return None;
    }
    let op = match code {
        0x00 => Opcode::new("save").store(),
        0x01 => Opcode::new("restore").store(),
        0x02 => Opcode::new("log_shift").store(),
        0x03 => Opcode::new("art_shift").store(),
        0x04 => Opcode::new("set_font").store(),
        0x09 => Opcode::new("save_undo").store(),
        0x0A => Opcode::new("restore_undo").store(),
        0x0B => Opcode::new("print_unicode"),
        0x0C => Opcode::new("check_unicode").store(),
        0x0D => Opcode::new("set_true_colour"),
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_splits() {
        assert_eq!(lookup(3, OperandCount::OP0, 0x9).unwrap().name, "pop");
        assert_eq!(lookup(5, OperandCount::OP0, 0x9).unwrap().name, "catch");
        assert!(lookup(5, OperandCount::OP0, 0x9).unwrap().store);

        assert_eq!(lookup(4, OperandCount::OP1, 0xF).unwrap().name, "not");
        assert_eq!(lookup(5, OperandCount::OP1, 0xF).unwrap().name, "call_1n");

        assert_eq!(lookup(3, OperandCount::VAR, 0x04).unwrap().name, "sread");
        let aread = lookup(5, OperandCount::VAR, 0x04).unwrap();
        assert_eq!(aread.name, "aread");
        assert!(aread.store && aread.input);
    }

    #[test]
    fn test_save_forms_across_versions() {
        assert!(lookup(3, OperandCount::OP0, 0x5).unwrap().branch);
        assert!(lookup(4, OperandCount::OP0, 0x5).unwrap().store);
        assert!(lookup(5, OperandCount::OP0, 0x5).is_none());
        assert!(lookup(5, OperandCount::EXT, 0x00).unwrap().store);
    }

    #[test]
    fn test_gated_slots_absent() {
        assert!(lookup(3, OperandCount::OP2, 0x19).is_none());
        assert!(lookup(3, OperandCount::VAR, 0x1F).is_none());
        assert!(lookup(4, OperandCount::EXT, 0x02).is_none());
        assert!(lookup(3, OperandCount::OP2, 0x00).is_none());
        assert!(lookup(3, OperandCount::OP0, 0xE).is_none());
    }

    #[test]
    fn test_flag_combinations() {
        let op = lookup(3, OperandCount::OP1, 0x1).unwrap();
        assert!(op.store && op.branch);
        let op = lookup(3, OperandCount::OP0, 0x2).unwrap();
        assert!(op.text && !op.store && !op.branch);
        let op = lookup(4, OperandCount::VAR, 0x17).unwrap();
        assert!(op.store && op.branch);
    }
}
