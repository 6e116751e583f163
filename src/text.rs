use crate::memory::Memory;
use bitreader::BitReader;
use log::trace;

/// The three Z-string alphabets. A2 differs in version 1 only.
const ALPHABET_A0: &str = "abcdefghijklmnopqrstuvwxyz";
const ALPHABET_A1: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHABET_A2: &str = " \n0123456789.,!?_#'\"/\\-:()";
const ALPHABET_A2_V1: &str = " 0123456789.,!?_#'\"/\\<-:()";

fn alphabets(version: u8) -> [&'static str; 3] {
    [
        ALPHABET_A0,
        ALPHABET_A1,
        if version == 1 { ALPHABET_A2_V1 } else { ALPHABET_A2 },
    ]
}

/// Split one packed word into its end flag and three 5-bit Z-characters.
fn split_zword(word: [u8; 2]) -> Result<(bool, [u8; 3]), String> {
    let mut reader = BitReader::new(&word);
    let last = reader.read_u8(1).map_err(|e| e.to_string())? == 1;
    let mut zchars = [0u8; 3];
    for zc in zchars.iter_mut() {
        *zc = reader.read_u8(5).map_err(|e| e.to_string())?;
    }
    Ok((last, zchars))
}

/// Pending state of the decoder between Z-characters.
enum Pending {
    Idle,
    /// An abbreviation code was seen; holds the block base (0, 32 or 64).
    Abbreviation(u8),
    /// Alphabet 2 code 6: the next two Z-characters form a ZSCII code.
    ZsciiHigh,
    ZsciiLow(u8),
}

/// Decode a packed Z-string starting at `addr`.
///
/// Returns the text and the address immediately after the final word (the one
/// with its top bit set).
pub fn decode_string(mem: &Memory, addr: usize) -> Result<(String, usize), String> {
    decode_inner(mem, addr, false)
}

fn decode_inner(mem: &Memory, addr: usize, in_abbreviation: bool) -> Result<(String, usize), String> {
    let version = mem.version();
    let alphabets = alphabets(version);

    let mut text = String::new();
    let mut offset = addr;
    let mut alphabet = 0usize;
    let mut shift: Option<usize> = None;
    let mut pending = Pending::Idle;

    loop {
        let word = mem.read_word(offset)?;
        offset += 2;
        let (last, zchars) = split_zword(word.to_be_bytes())?;
        trace!("z-word {:04x} -> {:?}, last={}", word, zchars, last);

        for &c in &zchars {
            match pending {
                Pending::Abbreviation(base) => {
                    let entry = mem.abbrev_table_addr() as usize + 2 * (base as usize + c as usize);
                    let string_addr = 2 * mem.read_word(entry)? as usize;
                    let (expansion, _) = decode_inner(mem, string_addr, true)?;
                    text.push_str(&expansion);
                    pending = Pending::Idle;
                }
                Pending::ZsciiHigh => {
                    pending = Pending::ZsciiLow(c);
                }
                Pending::ZsciiLow(high) => {
                    let code = ((high as u16) << 5) | c as u16;
                    text.push(char::from_u32(code as u32).unwrap_or('?'));
                    pending = Pending::Idle;
                }
                Pending::Idle => match c {
                    0 => text.push(' '),
                    1 if version == 1 => text.push('\n'),
                    1 if version == 2 => {
                        if in_abbreviation {
                            return Err("abbreviation used from inside abbreviation".to_string());
                        }
                        pending = Pending::Abbreviation(0);
                    }
                    1..=3 if version >= 3 => {
                        if in_abbreviation {
                            return Err("abbreviation used from inside abbreviation".to_string());
                        }
                        pending = Pending::Abbreviation(32 * (c - 1));
                    }
                    2 if version <= 2 => shift = Some((alphabet + 1) % 3),
                    3 if version <= 2 => shift = Some((alphabet + 2) % 3),
                    4 if version <= 2 => alphabet = (alphabet + 1) % 3,
                    5 if version <= 2 => alphabet = (alphabet + 2) % 3,
                    4 => shift = Some(1),
                    5 => shift = Some(2),
                    _ => {
                        let a = shift.take().unwrap_or(alphabet);
                        if a == 2 && c == 6 {
                            pending = Pending::ZsciiHigh;
                        } else if version <= 4 || mem.alphabet_table_addr() == 0 {
                            text.push(alphabets[a].as_bytes()[(c - 6) as usize] as char);
                        } else {
                            let index = 26 * a + (c as usize - 6);
                            let table = mem.alphabet_table_addr() as usize;
                            text.push(mem.read_byte(table + index)? as char);
                        }
                    }
                },
            }
        }

        if last {
            break;
        }
    }

    Ok((text, offset))
}

/// Encode text into packed dictionary form.
///
/// NUL characters pad as Z-character 5, matching the dictionary's fixed
/// comparable length. Returns None for characters absent from all three
/// alphabets; dictionary lookup then simply fails to match.
pub fn encode_string(version: u8, text: &str) -> Option<Vec<u8>> {
    let alphabets = alphabets(version);

    let mut zchars: Vec<u8> = Vec::new();
    for ch in text.chars() {
        if ch == ' ' {
            zchars.push(0);
        } else if ch == '\0' {
            zchars.push(5);
        } else if let Some(index) = alphabets[0].find(ch) {
            zchars.push(6 + index as u8);
        } else if let Some(index) = alphabets[1].find(ch) {
            zchars.push(if version <= 2 { 2 } else { 4 });
            zchars.push(6 + index as u8);
        } else if let Some(index) = alphabets[2].find(ch) {
            zchars.push(if version <= 2 { 3 } else { 5 });
            zchars.push(6 + index as u8);
        } else {
            return None;
        }
    }

    let mut result = Vec::with_capacity(zchars.len() / 3 * 2 + 2);
    for group in (0..zchars.len()).step_by(3) {
        let get = |i: usize| zchars.get(i).copied().unwrap_or(5) as u16;
        let mut word = (get(group) << 10) | (get(group + 1) << 5) | get(group + 2);
        if group + 3 >= zchars.len() {
            word |= 0x8000;
        }
        result.push((word >> 8) as u8);
        result.push((word & 0xFF) as u8);
    }

    Some(result)
}
