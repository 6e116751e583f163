//! Dictionary table and command tokenization.
//!
//! The parser splits an input line on whitespace and the dictionary's
//! declared separator characters (each separator is itself a token), encodes
//! each token and writes dictionary address / length / position records into
//! the parse buffer, exactly as programs inspecting the buffer expect.

use crate::memory::Memory;
use crate::text;
use crate::version::VersionProfile;
use log::debug;

/// Decoded dictionary table layout.
#[derive(Debug, Clone)]
pub struct Dictionary {
    pub separators: Vec<u8>,
    pub entry_length: u8,
    pub entry_count: u16,
    pub entries_addr: usize,
    /// Bytes of encoded text per entry (4 for v1-3, 6 for v4+).
    pub encoded_len: usize,
    /// Characters of input comparable against an entry (6 or 9).
    pub text_len: usize,
}

impl Dictionary {
    pub fn decode(mem: &Memory) -> Result<Dictionary, String> {
        let profile = VersionProfile::new(mem.version());
        let mut addr = mem.dictionary_addr() as usize;

        let separator_count = mem.read_byte(addr)? as usize;
        addr += 1;
        let mut separators = Vec::with_capacity(separator_count);
        for _ in 0..separator_count {
            separators.push(mem.read_byte(addr)?);
            addr += 1;
        }

        let entry_length = mem.read_byte(addr)?;
        addr += 1;
        let entry_count = mem.read_word(addr)?;
        addr += 2;

        if (entry_length as usize) < profile.dict_encoded_len {
            return Err(format!(
                "dictionary entry length {} shorter than encoded text",
                entry_length
            ));
        }

        Ok(Dictionary {
            separators,
            entry_length,
            entry_count,
            entries_addr: addr,
            encoded_len: profile.dict_encoded_len,
            text_len: profile.dict_text_len,
        })
    }

    /// Find the entry whose encoded text matches, returning its byte address
    /// or 0. Unmatched words are not an error.
    pub fn lookup(&self, mem: &Memory, encoded: &[u8]) -> Result<u16, String> {
        if encoded.len() < self.encoded_len {
            return Ok(0);
        }
        for i in 0..self.entry_count as usize {
            let addr = self.entries_addr + i * self.entry_length as usize;
            let mut matches = true;
            for j in 0..self.encoded_len {
                if mem.read_byte(addr + j)? != encoded[j] {
                    matches = false;
                    break;
                }
            }
            if matches {
                return Ok(addr as u16);
            }
        }
        Ok(0)
    }
}

struct Token {
    text: String,
    /// Character count of the original token.
    length: usize,
    /// 0-based character offset into the input line.
    offset: usize,
}

fn split_tokens(dict: &Dictionary, input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (i, ch) in input.chars().enumerate() {
        if ch == ' ' || dict.separators.contains(&(ch as u8)) {
            if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    length: i - start,
                    offset: start,
                });
            }
            if ch != ' ' {
                tokens.push(Token {
                    text: ch.to_string(),
                    length: 1,
                    offset: i,
                });
            }
        } else {
            if current.is_empty() {
                start = i;
            }
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(Token {
            text: current,
            length: input.chars().count() - start,
            offset: start,
        });
    }
    tokens
}

/// Tokenize `input` into the parse buffer. `position_base` is the byte
/// offset of the first text character within the text buffer (1 for v1-4,
/// 2 for v5+), so positions match what the program reads back.
fn write_parse_buffer(
    mem: &mut Memory,
    input: &str,
    parse_buffer: usize,
    position_base: usize,
) -> Result<(), String> {
    let dict = Dictionary::decode(mem)?;
    let mut tokens = split_tokens(&dict, input);

    let mut addr = parse_buffer;
    let max_words = mem.read_byte(addr)? as usize;
    addr += 1;
    tokens.truncate(max_words);

    mem.write_byte(addr, tokens.len() as u8)?;
    addr += 1;

    for token in &tokens {
        let mut comparable: String = token.text.chars().take(dict.text_len).collect();
        while comparable.chars().count() < dict.text_len {
            comparable.push('\0');
        }
        let entry_addr = match text::encode_string(mem.version(), &comparable) {
            Some(encoded) => dict.lookup(mem, &encoded)?,
            None => 0,
        };
        debug!(
            "token {:?} at {} -> entry {:#06x}",
            token.text,
            token.offset + position_base,
            entry_addr
        );

        mem.write_word(addr, entry_addr)?;
        addr += 2;
        mem.write_byte(addr, token.length as u8)?;
        addr += 1;
        mem.write_byte(addr, (token.offset + position_base) as u8)?;
        addr += 1;
    }

    Ok(())
}

/// Store an input line into the text buffer and run lexical analysis into the
/// parse buffer, as the read opcode requires. A parse buffer of 0 stores the
/// text without analysing it.
pub fn parse_input(
    mem: &mut Memory,
    input: &str,
    text_buffer: usize,
    parse_buffer: usize,
) -> Result<(), String> {
    let version = mem.version();
    let mut addr = text_buffer;

    let declared = mem.read_byte(addr)? as usize;
    let max_len = if version <= 4 {
        declared.saturating_sub(1)
    } else {
        declared
    };
    addr += 1;

    let text: String = input.chars().take(max_len).collect();

    if version >= 5 {
        mem.write_byte(addr, text.chars().count() as u8)?;
        addr += 1;
    }
    for ch in text.chars() {
        mem.write_byte(addr, (ch as u32 & 0xFF) as u8)?;
        addr += 1;
    }
    if version <= 4 {
        mem.write_byte(addr, 0)?;
    }

    if parse_buffer != 0 {
        let position_base = if version <= 4 { 1 } else { 2 };
        write_parse_buffer(mem, &text, parse_buffer, position_base)?;
    }
    Ok(())
}

/// The tokenise opcode: analyse text already present in the text buffer.
pub fn tokenise_buffer(
    mem: &mut Memory,
    text_buffer: usize,
    parse_buffer: usize,
) -> Result<(), String> {
    let version = mem.version();
    let mut text = String::new();
    if version <= 4 {
        let mut addr = text_buffer + 1;
        loop {
            let byte = mem.read_byte(addr)?;
            if byte == 0 {
                break;
            }
            text.push(byte as char);
            addr += 1;
        }
    } else {
        let len = mem.read_byte(text_buffer + 1)? as usize;
        for i in 0..len {
            text.push(mem.read_byte(text_buffer + 2 + i)? as char);
        }
    }
    let position_base = if version <= 4 { 1 } else { 2 };
    write_parse_buffer(mem, &text, parse_buffer, position_base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StoryBuilder;

    fn story_with_words(version: u8) -> Memory {
        let mut b = StoryBuilder::new(version);
        b.dictionary(&["look", "go", "north", "lantern"], b",.");
        b.build()
    }

    #[test]
    fn test_decode_layout() {
        let mem = story_with_words(3);
        let dict = Dictionary::decode(&mem).unwrap();
        assert_eq!(dict.separators, vec![b',', b'.']);
        assert_eq!(dict.entry_count, 4);
        assert_eq!(dict.encoded_len, 4);
        assert_eq!(dict.text_len, 6);
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let mem = story_with_words(3);
        let dict = Dictionary::decode(&mem).unwrap();

        let encoded = text::encode_string(3, "go\0\0\0\0").unwrap();
        assert_ne!(dict.lookup(&mem, &encoded).unwrap(), 0);

        let encoded = text::encode_string(3, "xyzzy\0").unwrap();
        assert_eq!(dict.lookup(&mem, &encoded).unwrap(), 0);
    }

    #[test]
    fn test_parse_input_v3_buffers() {
        let mut mem = story_with_words(3);
        // text buffer at 0x700 (max 40), parse buffer at 0x740 (max 10)
        mem.write_byte(0x700, 40).unwrap();
        mem.write_byte(0x740, 10).unwrap();

        parse_input(&mut mem, "go north", 0x700, 0x740).unwrap();

        // v3 text buffer: chars from byte 1, zero terminated
        assert_eq!(mem.read_byte(0x701).unwrap(), b'g');
        assert_eq!(mem.read_byte(0x702).unwrap(), b'o');
        assert_eq!(mem.read_byte(0x709).unwrap(), 0);

        // two words parsed
        assert_eq!(mem.read_byte(0x741).unwrap(), 2);
        let go_addr = mem.read_word(0x742).unwrap();
        assert_ne!(go_addr, 0);
        assert_eq!(mem.read_byte(0x744).unwrap(), 2); // "go" length
        assert_eq!(mem.read_byte(0x745).unwrap(), 1); // position
        let north_addr = mem.read_word(0x746).unwrap();
        assert_ne!(north_addr, 0);
        assert_ne!(north_addr, go_addr);
        assert_eq!(mem.read_byte(0x748).unwrap(), 5); // "north" length
        assert_eq!(mem.read_byte(0x749).unwrap(), 4); // position
    }

    #[test]
    fn test_separators_are_tokens() {
        let mut mem = story_with_words(3);
        mem.write_byte(0x700, 40).unwrap();
        mem.write_byte(0x740, 10).unwrap();

        parse_input(&mut mem, "look,go", 0x700, 0x740).unwrap();

        assert_eq!(mem.read_byte(0x741).unwrap(), 3);
        // the comma is its own token at position 5
        assert_ne!(mem.read_word(0x746).unwrap(), 0);
        assert_eq!(mem.read_byte(0x748).unwrap(), 1);
        assert_eq!(mem.read_byte(0x749).unwrap(), 5);
    }

    #[test]
    fn test_unmatched_word_stores_zero() {
        let mut mem = story_with_words(3);
        mem.write_byte(0x700, 40).unwrap();
        mem.write_byte(0x740, 10).unwrap();

        parse_input(&mut mem, "plugh", 0x700, 0x740).unwrap();

        assert_eq!(mem.read_byte(0x741).unwrap(), 1);
        assert_eq!(mem.read_word(0x742).unwrap(), 0);
        assert_eq!(mem.read_byte(0x744).unwrap(), 5);
    }

    #[test]
    fn test_token_cap_and_truncation() {
        let mut mem = story_with_words(3);
        mem.write_byte(0x700, 6).unwrap(); // room for 5 chars
        mem.write_byte(0x740, 1).unwrap(); // one token max

        parse_input(&mut mem, "go north go", 0x700, 0x740).unwrap();

        // input truncated to "go no"
        assert_eq!(mem.read_byte(0x705).unwrap(), b'o');
        assert_eq!(mem.read_byte(0x706).unwrap(), 0);
        // parse capped at one token
        assert_eq!(mem.read_byte(0x741).unwrap(), 1);
    }

    #[test]
    fn test_parse_input_v5_layout() {
        let mut mem = story_with_words(5);
        mem.write_byte(0x700, 40).unwrap();
        mem.write_byte(0x740, 10).unwrap();

        parse_input(&mut mem, "go", 0x700, 0x740).unwrap();

        assert_eq!(mem.read_byte(0x701).unwrap(), 2); // stored length
        assert_eq!(mem.read_byte(0x702).unwrap(), b'g');
        assert_eq!(mem.read_byte(0x741).unwrap(), 1);
        assert_eq!(mem.read_byte(0x745).unwrap(), 2); // position base 2
    }

    #[test]
    fn test_tokenise_buffer_reuses_stored_text() {
        let mut mem = story_with_words(3);
        mem.write_byte(0x700, 40).unwrap();
        mem.write_byte(0x740, 10).unwrap();

        // store text without analysing, then tokenise separately
        parse_input(&mut mem, "look", 0x700, 0).unwrap();
        assert_eq!(mem.read_byte(0x741).unwrap(), 0);

        tokenise_buffer(&mut mem, 0x700, 0x740).unwrap();
        assert_eq!(mem.read_byte(0x741).unwrap(), 1);
        assert_ne!(mem.read_word(0x742).unwrap(), 0);
        assert_eq!(mem.read_byte(0x744).unwrap(), 4);
    }
}
