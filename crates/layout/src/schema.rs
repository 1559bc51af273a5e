//! Field descriptors and record schemas

use crate::error::LayoutError;

/// Widest integer a single `UnsignedLE` field may hold
pub const MAX_INT_WIDTH: usize = 16;

/// Bit numbering used when packing a flag set into its container integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// Flag `i` lives at bit `bits - 1 - i`: the first declared flag takes
    /// the most significant bit of the container.
    Msb0,
    /// Flag `i` lives at bit `i`: the first declared flag takes the least
    /// significant bit of the container.
    Lsb0,
}

impl BitOrder {
    /// Bit position of logical flag `index` inside a `bits`-wide container
    #[inline]
    pub fn position(self, index: usize, bits: usize) -> usize {
        match self {
            BitOrder::Msb0 => bits - 1 - index,
            BitOrder::Lsb0 => index,
        }
    }
}

/// How one slice of the buffer is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDescriptor {
    /// Unsigned little-endian integer, 1..=16 bytes
    UnsignedLE(usize),
    /// Opaque bytes copied verbatim (addresses are 32-byte blobs)
    Blob(usize),
    /// Booleans packed into a little-endian container of `bits` bits
    BitFlags {
        bits: usize,
        order: BitOrder,
        flags: Vec<&'static str>,
    },
    /// Consumed on decode, zero-filled on encode, never surfaced
    Padding(usize),
}

impl FieldDescriptor {
    /// Number of buffer bytes this descriptor consumes
    pub fn width(&self) -> usize {
        match self {
            FieldDescriptor::UnsignedLE(w)
            | FieldDescriptor::Blob(w)
            | FieldDescriptor::Padding(w) => *w,
            FieldDescriptor::BitFlags { bits, .. } => bits / 8,
        }
    }

    pub fn is_padding(&self) -> bool {
        matches!(self, FieldDescriptor::Padding(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub descriptor: FieldDescriptor,
}

/// Ordered field list with a validated total length
///
/// Built through [`Schema::builder`]; `build` rejects a schema whose
/// descriptor widths do not add up to the declared record length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    version: &'static str,
    fields: Vec<Field>,
    len: usize,
}

impl Schema {
    pub fn builder(version: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            version,
            fields: Vec::new(),
        }
    }

    /// Version tag, e.g. `"pool-v4"`
    pub fn version(&self) -> &'static str {
        self.version
    }

    /// Total record length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Whether a non-padding field with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.named_fields().any(|f| f.name == name)
    }

    /// Byte offset of a named field
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for field in &self.fields {
            if !field.descriptor.is_padding() && field.name == name {
                return Some(offset);
            }
            offset += field.descriptor.width();
        }
        None
    }

    /// Fields that produce a value (everything except padding)
    pub fn named_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.descriptor.is_padding())
    }
}

/// Accumulates descriptors in wire order
pub struct SchemaBuilder {
    version: &'static str,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    fn push(mut self, name: &'static str, descriptor: FieldDescriptor) -> Self {
        self.fields.push(Field { name, descriptor });
        self
    }

    pub fn unsigned(self, name: &'static str, width: usize) -> Self {
        self.push(name, FieldDescriptor::UnsignedLE(width))
    }

    pub fn u8(self, name: &'static str) -> Self {
        self.unsigned(name, 1)
    }

    pub fn u64(self, name: &'static str) -> Self {
        self.unsigned(name, 8)
    }

    pub fn u128(self, name: &'static str) -> Self {
        self.unsigned(name, 16)
    }

    pub fn blob(self, name: &'static str, width: usize) -> Self {
        self.push(name, FieldDescriptor::Blob(width))
    }

    /// 32-byte account address
    pub fn address(self, name: &'static str) -> Self {
        self.blob(name, 32)
    }

    pub fn flags(
        self,
        name: &'static str,
        bits: usize,
        order: BitOrder,
        flags: &[&'static str],
    ) -> Self {
        self.push(
            name,
            FieldDescriptor::BitFlags {
                bits,
                order,
                flags: flags.to_vec(),
            },
        )
    }

    pub fn padding(self, width: usize) -> Self {
        self.push("", FieldDescriptor::Padding(width))
    }

    /// Validate descriptors and check they cover exactly `declared_len` bytes
    pub fn build(self, declared_len: usize) -> Result<Schema, LayoutError> {
        let version = self.version;
        let invalid = |field: &str, reason| LayoutError::InvalidDescriptor {
            schema: version,
            field: field.to_string(),
            reason,
        };

        let mut seen: Vec<&str> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match &field.descriptor {
                FieldDescriptor::UnsignedLE(w) if *w == 0 || *w > MAX_INT_WIDTH => {
                    return Err(invalid(field.name, "integer width must be 1..=16 bytes"));
                }
                FieldDescriptor::Blob(0) => {
                    return Err(invalid(field.name, "blob width must be non-zero"));
                }
                FieldDescriptor::BitFlags { bits, flags, .. } => {
                    if *bits == 0 || bits % 8 != 0 || *bits > MAX_INT_WIDTH * 8 {
                        return Err(invalid(field.name, "flag container must be 8..=128 bits, byte aligned"));
                    }
                    if flags.len() > *bits {
                        return Err(invalid(field.name, "more flags than container bits"));
                    }
                    for (i, flag) in flags.iter().enumerate() {
                        if flags[..i].contains(flag) {
                            return Err(invalid(field.name, "duplicate flag name"));
                        }
                    }
                }
                _ => {}
            }

            if !field.descriptor.is_padding() {
                if seen.contains(&field.name) {
                    return Err(invalid(field.name, "duplicate field name"));
                }
                seen.push(field.name);
            }
        }

        let actual: usize = self.fields.iter().map(|f| f.descriptor.width()).sum();
        if actual != declared_len {
            return Err(LayoutError::DeclaredLength {
                schema: version,
                declared: declared_len,
                actual,
            });
        }

        Ok(Schema {
            version,
            fields: self.fields,
            len: actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_checks_declared_length() {
        let err = Schema::builder("t")
            .u64("a")
            .address("b")
            .build(41)
            .unwrap_err();
        assert_eq!(
            err,
            LayoutError::DeclaredLength {
                schema: "t",
                declared: 41,
                actual: 40
            }
        );
    }

    #[test]
    fn test_offsets_skip_padding() {
        let schema = Schema::builder("t")
            .padding(5)
            .flags("f", 64, BitOrder::Lsb0, &["x", "y"])
            .address("owner")
            .u64("n")
            .build(53)
            .unwrap();

        assert_eq!(schema.offset_of("f"), Some(5));
        assert_eq!(schema.offset_of("owner"), Some(13));
        assert_eq!(schema.offset_of("n"), Some(45));
        assert_eq!(schema.offset_of(""), None);
        assert_eq!(schema.named_fields().count(), 3);
    }

    #[test]
    fn test_rejects_bad_descriptors() {
        assert!(Schema::builder("t").unsigned("wide", 17).build(17).is_err());
        assert!(Schema::builder("t")
            .flags("f", 12, BitOrder::Msb0, &["a"])
            .build(1)
            .is_err());
        assert!(Schema::builder("t")
            .flags("f", 8, BitOrder::Msb0, &["a", "a"])
            .build(1)
            .is_err());
        assert!(Schema::builder("t").u8("a").u8("a").build(2).is_err());
    }

    #[test]
    fn test_bit_positions() {
        assert_eq!(BitOrder::Msb0.position(0, 64), 63);
        assert_eq!(BitOrder::Msb0.position(6, 64), 57);
        assert_eq!(BitOrder::Lsb0.position(0, 64), 0);
        assert_eq!(BitOrder::Lsb0.position(6, 8), 6);
    }
}
