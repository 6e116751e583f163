//! Builder for small in-memory story files.
//!
//! Hand-assembling a header, object table, dictionary and code region is
//! tedious and error-prone, so tests describe what they need and the builder
//! lays it out. The whole image is placed below the static memory mark so
//! tests can freely poke at buffers.

use crate::memory::Memory;
use crate::text;
use crate::version::VersionProfile;

const IMAGE_SIZE: usize = 0x2000;
const GLOBALS: usize = 0x100;
const OBJECTS: usize = 0x300;
const PROPS: usize = 0x1400;
const DICTIONARY: usize = 0x1800;
const CODE: usize = 0x1C00;

struct ObjectDef {
    id: u16,
    parent: u16,
    sibling: u16,
    child: u16,
    properties: Vec<(u8, Vec<u8>)>,
}

pub struct StoryBuilder {
    version: u8,
    objects: Vec<ObjectDef>,
    defaults: Vec<(u8, u16)>,
    globals: Vec<(u8, u16)>,
    words: Vec<String>,
    separators: Vec<u8>,
    code: Vec<u8>,
    patches: Vec<(usize, Vec<u8>)>,
}

impl StoryBuilder {
    pub fn new(version: u8) -> StoryBuilder {
        StoryBuilder {
            version,
            objects: Vec::new(),
            defaults: Vec::new(),
            globals: Vec::new(),
            words: Vec::new(),
            separators: Vec::new(),
            code: Vec::new(),
            patches: Vec::new(),
        }
    }

    /// Declare an object with its tree relations.
    pub fn object(&mut self, id: u16, parent: u16, sibling: u16, child: u16) -> &mut Self {
        self.objects.push(ObjectDef {
            id,
            parent,
            sibling,
            child,
            properties: Vec::new(),
        });
        self
    }

    /// Attach properties to a declared object. Records are written in the
    /// order given, which must be descending by number.
    pub fn properties(&mut self, id: u16, props: &[(u8, &[u8])]) -> &mut Self {
        let def = self
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .expect("properties for undeclared object");
        for (num, data) in props {
            def.properties.push((*num, data.to_vec()));
        }
        self
    }

    pub fn default_prop(&mut self, num: u8, value: u16) -> &mut Self {
        self.defaults.push((num, value));
        self
    }

    pub fn global(&mut self, index: u8, value: u16) -> &mut Self {
        self.globals.push((index, value));
        self
    }

    pub fn dictionary(&mut self, words: &[&str], separators: &[u8]) -> &mut Self {
        self.words = words.iter().map(|w| w.to_string()).collect();
        self.separators = separators.to_vec();
        self
    }

    /// Place instruction bytes at the initial program counter.
    pub fn code(&mut self, bytes: &[u8]) -> &mut Self {
        self.code = bytes.to_vec();
        self
    }

    /// Raw bytes anywhere in the image, applied last.
    pub fn write_bytes(&mut self, addr: usize, bytes: &[u8]) -> &mut Self {
        self.patches.push((addr, bytes.to_vec()));
        self
    }

    pub fn build(&self) -> Memory {
        let profile = VersionProfile::new(self.version);
        let mut image = vec![0u8; IMAGE_SIZE];

        image[0] = self.version;
        put_word(&mut image, 0x04, CODE as u16); // high memory base
        put_word(&mut image, 0x06, CODE as u16); // initial program counter
        put_word(&mut image, 0x08, DICTIONARY as u16);
        put_word(&mut image, 0x0A, OBJECTS as u16);
        put_word(&mut image, 0x0C, GLOBALS as u16);
        put_word(&mut image, 0x0E, IMAGE_SIZE as u16); // everything writable

        let scale = match self.version {
            1..=3 => 2,
            4..=7 => 4,
            _ => 8,
        };
        put_word(&mut image, 0x1A, (IMAGE_SIZE / scale) as u16);

        for (index, value) in &self.globals {
            put_word(&mut image, GLOBALS + 2 * *index as usize, *value);
        }

        for (num, value) in &self.defaults {
            put_word(&mut image, OBJECTS + 2 * (*num as usize - 1), *value);
        }

        // shared empty property table: zero-length name, terminator
        let mut prop_cursor = PROPS;
        let empty_props = prop_cursor;
        prop_cursor += 2;

        let entries = OBJECTS + profile.defaults_table_size();
        for def in &self.objects {
            let base = entries + profile.object_entry_size * (def.id as usize - 1);
            let rel = base + profile.relations_offset;
            if profile.relation_bytes == 1 {
                image[rel] = def.parent as u8;
                image[rel + 1] = def.sibling as u8;
                image[rel + 2] = def.child as u8;
            } else {
                put_word(&mut image, rel, def.parent);
                put_word(&mut image, rel + 2, def.sibling);
                put_word(&mut image, rel + 4, def.child);
            }

            let table = if def.properties.is_empty() {
                empty_props
            } else {
                let table = prop_cursor;
                image[prop_cursor] = 0; // empty short name
                prop_cursor += 1;
                for (num, data) in &def.properties {
                    prop_cursor = put_property(&mut image, prop_cursor, self.version, *num, data);
                }
                image[prop_cursor] = 0;
                prop_cursor += 1;
                table
            };
            put_word(&mut image, base + profile.properties_offset, table as u16);
        }

        self.put_dictionary(&mut image, &profile);

        image[CODE..CODE + self.code.len()].copy_from_slice(&self.code);

        for (addr, bytes) in &self.patches {
            image[*addr..*addr + bytes.len()].copy_from_slice(bytes);
        }

        let checksum: u32 = image[0x40..].iter().map(|b| *b as u32).sum();
        put_word(&mut image, 0x1C, (checksum & 0xFFFF) as u16);

        Memory::from_bytes(image).unwrap()
    }

    fn put_dictionary(&self, image: &mut [u8], profile: &VersionProfile) {
        let mut addr = DICTIONARY;
        image[addr] = self.separators.len() as u8;
        addr += 1;
        for sep in &self.separators {
            image[addr] = *sep;
            addr += 1;
        }

        let entry_length = (profile.dict_encoded_len + 3) as u8;
        image[addr] = entry_length;
        addr += 1;
        put_word(image, addr, self.words.len() as u16);
        addr += 2;

        for word in &self.words {
            let mut comparable: String = word.chars().take(profile.dict_text_len).collect();
            while comparable.chars().count() < profile.dict_text_len {
                comparable.push('\0');
            }
            let encoded = text::encode_string(self.version, &comparable)
                .expect("dictionary word not encodable");
            image[addr..addr + encoded.len()].copy_from_slice(&encoded);
            addr += entry_length as usize;
        }
    }
}

fn put_word(image: &mut [u8], addr: usize, value: u16) {
    image[addr] = (value >> 8) as u8;
    image[addr + 1] = (value & 0xFF) as u8;
}

fn put_property(image: &mut [u8], mut addr: usize, version: u8, num: u8, data: &[u8]) -> usize {
    if version <= 3 {
        assert!((1..=8).contains(&data.len()), "v1-3 property length");
        image[addr] = (((data.len() - 1) as u8) << 5) | num;
        addr += 1;
    } else if data.len() == 1 {
        image[addr] = num;
        addr += 1;
    } else if data.len() == 2 {
        image[addr] = 0x40 | num;
        addr += 1;
    } else {
        image[addr] = 0x80 | num;
        image[addr + 1] = 0x80 | (data.len() as u8 & 0x3F);
        addr += 2;
    }
    image[addr..addr + data.len()].copy_from_slice(data);
    addr + data.len()
}
