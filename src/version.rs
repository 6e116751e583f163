/// Version-dependent layout constants, resolved once instead of branching on
/// `version <= 3` at every call site.
///
/// Versions 1-3 use the compact object format (255 objects, 32 attributes,
/// byte-wide tree relations); versions 4-8 use the wide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionProfile {
    pub version: u8,
    /// Highest legal object id.
    pub max_objects: u16,
    /// Number of attribute bits per object.
    pub max_attributes: u16,
    /// Highest legal property number.
    pub max_properties: u8,
    /// Bytes of attribute flags at the start of an object entry.
    pub attribute_bytes: usize,
    /// Stride of one object entry.
    pub object_entry_size: usize,
    /// Width of each parent/sibling/child field.
    pub relation_bytes: usize,
    /// Offset of the relations within an object entry.
    pub relations_offset: usize,
    /// Offset of the property-table pointer within an object entry.
    pub properties_offset: usize,
    /// Bytes of encoded text at the start of a dictionary entry.
    pub dict_encoded_len: usize,
    /// Characters of input text comparable against a dictionary entry.
    pub dict_text_len: usize,
}

impl VersionProfile {
    pub fn new(version: u8) -> VersionProfile {
        if version <= 3 {
            VersionProfile {
                version,
                max_objects: 255,
                max_attributes: 32,
                max_properties: 31,
                attribute_bytes: 4,
                object_entry_size: 9,
                relation_bytes: 1,
                relations_offset: 4,
                properties_offset: 7,
                dict_encoded_len: 4,
                dict_text_len: 6,
            }
        } else {
            VersionProfile {
                version,
                max_objects: 65535,
                max_attributes: 48,
                max_properties: 63,
                attribute_bytes: 6,
                object_entry_size: 14,
                relation_bytes: 2,
                relations_offset: 6,
                properties_offset: 12,
                dict_encoded_len: 6,
                dict_text_len: 9,
            }
        }
    }

    /// Size of the property defaults table preceding the object entries.
    pub fn defaults_table_size(&self) -> usize {
        2 * self.max_properties as usize
    }
}
