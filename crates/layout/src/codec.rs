//! Decode and encode byte records against a [`Schema`]

use std::collections::BTreeMap;

use crate::error::LayoutError;
use crate::schema::{FieldDescriptor, Schema};

/// Decoded value of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Unsigned(u128),
    Bytes(Vec<u8>),
    Flags(FlagSet),
}

/// Named booleans in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: Vec<(&'static str, bool)>,
}

impl FlagSet {
    pub fn get(&self, name: &str) -> Option<bool> {
        self.flags.iter().find(|(n, _)| *n == name).map(|(_, on)| *on)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        self.flags.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl FromIterator<(&'static str, bool)> for FlagSet {
    fn from_iter<I: IntoIterator<Item = (&'static str, bool)>>(iter: I) -> Self {
        Self {
            flags: iter.into_iter().collect(),
        }
    }
}

/// Field name to value map produced by [`decode`]
///
/// Never mutated after decoding; decoding again yields a fresh record.
/// Callers assembling a record for [`encode`] use [`Record::with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used to assemble values for encoding
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn value(&self, name: &str) -> Result<&Value, LayoutError> {
        self.values
            .get(name)
            .ok_or_else(|| LayoutError::MissingField(name.to_string()))
    }

    pub fn unsigned(&self, name: &str) -> Result<u128, LayoutError> {
        match self.value(name)? {
            Value::Unsigned(v) => Ok(*v),
            _ => Err(mismatch(name, "an unsigned integer")),
        }
    }

    /// Unsigned field narrowed to `u64`
    pub fn u64(&self, name: &str) -> Result<u64, LayoutError> {
        let value = self.unsigned(name)?;
        u64::try_from(value).map_err(|_| LayoutError::ValueOutOfRange {
            field: name.to_string(),
            width: 8,
        })
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8], LayoutError> {
        match self.value(name)? {
            Value::Bytes(b) => Ok(b),
            _ => Err(mismatch(name, "a byte blob")),
        }
    }

    /// 32-byte address field
    pub fn address(&self, name: &str) -> Result<[u8; 32], LayoutError> {
        let bytes = self.bytes(name)?;
        bytes.try_into().map_err(|_| LayoutError::BlobWidth {
            field: name.to_string(),
            expected: 32,
            actual: bytes.len(),
        })
    }

    pub fn flags(&self, name: &str) -> Result<&FlagSet, LayoutError> {
        match self.value(name)? {
            Value::Flags(set) => Ok(set),
            _ => Err(mismatch(name, "a flag set")),
        }
    }

    /// One flag out of a flag-set field
    pub fn flag(&self, group: &str, name: &str) -> Result<bool, LayoutError> {
        self.flags(group)?
            .get(name)
            .ok_or_else(|| LayoutError::MissingField(format!("{group}.{name}")))
    }
}

fn mismatch(field: &str, expected: &'static str) -> LayoutError {
    LayoutError::TypeMismatch {
        field: field.to_string(),
        expected,
    }
}

#[inline]
fn read_unsigned(chunk: &[u8]) -> u128 {
    chunk
        .iter()
        .rev()
        .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte))
}

#[inline]
fn write_unsigned(value: u128, out: &mut [u8]) {
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (value >> (8 * i)) as u8;
    }
}

#[inline]
fn fits(value: u128, width: usize) -> bool {
    width >= 16 || value >> (8 * width) == 0
}

/// Decode `data` into a [`Record`]
///
/// The buffer must be exactly `schema.len()` bytes; there is no trailing
/// slack. Fields are consumed strictly in schema order.
pub fn decode(schema: &Schema, data: &[u8]) -> Result<Record, LayoutError> {
    if data.len() != schema.len() {
        return Err(LayoutError::BufferLength {
            schema: schema.version(),
            expected: schema.len(),
            actual: data.len(),
        });
    }

    let mut values = BTreeMap::new();
    let mut offset = 0;

    for field in schema.fields() {
        let width = field.descriptor.width();
        let chunk = &data[offset..offset + width];
        offset += width;

        let value = match &field.descriptor {
            FieldDescriptor::UnsignedLE(_) => Value::Unsigned(read_unsigned(chunk)),
            FieldDescriptor::Blob(_) => Value::Bytes(chunk.to_vec()),
            FieldDescriptor::BitFlags { bits, order, flags } => {
                let container = read_unsigned(chunk);
                Value::Flags(
                    flags
                        .iter()
                        .enumerate()
                        .map(|(i, name)| (*name, (container >> order.position(i, *bits)) & 1 == 1))
                        .collect(),
                )
            }
            FieldDescriptor::Padding(_) => continue,
        };
        values.insert(field.name.to_string(), value);
    }

    Ok(Record { values })
}

/// Encode `record` into a buffer of exactly `schema.len()` bytes
///
/// Every non-padding field must be supplied and nothing else; padding is
/// zero-filled. Flag sets must list the schema's flags in declaration order.
pub fn encode(schema: &Schema, record: &Record) -> Result<Vec<u8>, LayoutError> {
    if let Some(extra) = record.names().find(|name| !schema.contains(name)) {
        return Err(LayoutError::UnexpectedField {
            schema: schema.version(),
            field: extra.to_string(),
        });
    }

    let mut out = vec![0u8; schema.len()];
    let mut offset = 0;

    for field in schema.fields() {
        let width = field.descriptor.width();
        let slot = &mut out[offset..offset + width];
        offset += width;

        match &field.descriptor {
            FieldDescriptor::Padding(_) => {}
            FieldDescriptor::UnsignedLE(w) => {
                let value = record.unsigned(field.name)?;
                if !fits(value, *w) {
                    return Err(LayoutError::ValueOutOfRange {
                        field: field.name.to_string(),
                        width: *w,
                    });
                }
                write_unsigned(value, slot);
            }
            FieldDescriptor::Blob(w) => {
                let bytes = record.bytes(field.name)?;
                if bytes.len() != *w {
                    return Err(LayoutError::BlobWidth {
                        field: field.name.to_string(),
                        expected: *w,
                        actual: bytes.len(),
                    });
                }
                slot.copy_from_slice(bytes);
            }
            FieldDescriptor::BitFlags { bits, order, flags } => {
                let set = record.flags(field.name)?;
                if set.len() != flags.len() {
                    return Err(mismatch(field.name, "the declared flag list"));
                }
                let mut container = 0u128;
                for (i, (declared, (given, on))) in flags.iter().zip(set.iter()).enumerate() {
                    if *declared != given {
                        return Err(LayoutError::MissingField(format!("{}.{declared}", field.name)));
                    }
                    if on {
                        container |= 1u128 << order.position(i, *bits);
                    }
                }
                write_unsigned(container, slot);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BitOrder;
    use proptest::prelude::*;

    fn small_schema(order: BitOrder) -> Schema {
        Schema::builder("small")
            .u8("tag")
            .padding(2)
            .flags("flags", 8, order, &["a", "b", "c"])
            .u64("amount")
            .blob("key", 4)
            .u128("big")
            .build(32)
            .unwrap()
    }

    fn small_record(flags: [bool; 3]) -> Record {
        Record::new()
            .with("tag", Value::Unsigned(9))
            .with(
                "flags",
                Value::Flags(["a", "b", "c"].into_iter().zip(flags).collect()),
            )
            .with("amount", Value::Unsigned(0x0102_0304_0506_0708))
            .with("key", Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]))
            .with("big", Value::Unsigned(u128::MAX))
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let schema = small_schema(BitOrder::Msb0);
        let err = decode(&schema, &[0u8; 31]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::BufferLength {
                schema: "small",
                expected: 32,
                actual: 31
            }
        );
        assert!(decode(&schema, &[0u8; 33]).is_err());
    }

    #[test]
    fn test_encode_layout_bytes() {
        let schema = small_schema(BitOrder::Msb0);
        let bytes = encode(&schema, &small_record([true, false, true])).unwrap();

        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 9);
        assert_eq!(&bytes[1..3], &[0, 0]);
        // a -> bit 7, c -> bit 5
        assert_eq!(bytes[3], 0b1010_0000);
        assert_eq!(&bytes[4..12], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&bytes[12..16], &[0xde, 0xad, 0xbe, 0xef]);
        assert!(bytes[16..].iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_three_flags_in_byte_round_trip() {
        for order in [BitOrder::Msb0, BitOrder::Lsb0] {
            let schema = small_schema(order);
            let record = small_record([true, false, true]);
            let decoded = decode(&schema, &encode(&schema, &record).unwrap()).unwrap();

            let flags: Vec<bool> = decoded.flags("flags").unwrap().iter().map(|(_, on)| on).collect();
            assert_eq!(flags, vec![true, false, true]);
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn test_lsb0_packs_from_low_bit() {
        let schema = small_schema(BitOrder::Lsb0);
        let bytes = encode(&schema, &small_record([true, true, false])).unwrap();
        assert_eq!(bytes[3], 0b0000_0011);
    }

    #[test]
    fn test_padding_is_zero_filled_and_skipped() {
        let schema = small_schema(BitOrder::Msb0);
        let mut bytes = encode(&schema, &small_record([false; 3])).unwrap();
        bytes[1] = 0xaa;
        bytes[2] = 0x55;

        let decoded = decode(&schema, &bytes).unwrap();
        assert_eq!(decoded.len(), 5);
        assert_eq!(decoded, small_record([false; 3]));
    }

    #[test]
    fn test_encode_missing_field() {
        let schema = small_schema(BitOrder::Msb0);
        let record = Record::new().with("tag", Value::Unsigned(1));
        assert!(matches!(
            encode(&schema, &record),
            Err(LayoutError::MissingField(_))
        ));
    }

    #[test]
    fn test_encode_rejects_extra_and_oversized() {
        let schema = small_schema(BitOrder::Msb0);

        let extra = small_record([false; 3]).with("bogus", Value::Unsigned(0));
        assert!(matches!(
            encode(&schema, &extra),
            Err(LayoutError::UnexpectedField { .. })
        ));

        let wide = small_record([false; 3]).with("tag", Value::Unsigned(256));
        assert_eq!(
            encode(&schema, &wide),
            Err(LayoutError::ValueOutOfRange {
                field: "tag".to_string(),
                width: 1
            })
        );

        let short = small_record([false; 3]).with("key", Value::Bytes(vec![1, 2]));
        assert!(matches!(
            encode(&schema, &short),
            Err(LayoutError::BlobWidth { .. })
        ));
    }

    #[test]
    fn test_accessors() {
        let record = small_record([true, false, false]);
        assert_eq!(record.u64("amount").unwrap(), 0x0102_0304_0506_0708);
        assert!(record.u64("big").is_err());
        assert!(record.flag("flags", "a").unwrap());
        assert!(record.flag("flags", "z").is_err());
        assert!(record.bytes("amount").is_err());
        assert!(record.address("key").is_err());
    }

    fn value_strategy(descriptor: &FieldDescriptor) -> BoxedStrategy<Value> {
        match descriptor.clone() {
            FieldDescriptor::UnsignedLE(w) => any::<u128>()
                .prop_map(move |v| Value::Unsigned(if w >= 16 { v } else { v & ((1u128 << (8 * w)) - 1) }))
                .boxed(),
            FieldDescriptor::Blob(w) => proptest::collection::vec(any::<u8>(), w)
                .prop_map(Value::Bytes)
                .boxed(),
            FieldDescriptor::BitFlags { flags, .. } => {
                proptest::collection::vec(any::<bool>(), flags.len())
                    .prop_map(move |bits| Value::Flags(flags.iter().copied().zip(bits).collect()))
                    .boxed()
            }
            FieldDescriptor::Padding(_) => unreachable!("padding carries no value"),
        }
    }

    fn record_strategy(schema: &Schema) -> impl Strategy<Value = Record> {
        let (names, strategies): (Vec<&'static str>, Vec<BoxedStrategy<Value>>) = schema
            .named_fields()
            .map(|f| (f.name, value_strategy(&f.descriptor)))
            .unzip();
        strategies.prop_map(move |values| {
            names
                .iter()
                .zip(values)
                .fold(Record::new(), |record, (name, value)| record.with(name, value))
        })
    }

    proptest! {
        #[test]
        fn prop_pool_round_trip(record in record_strategy(&crate::schemas::POOL_V4)) {
            let bytes = encode(&crate::schemas::POOL_V4, &record).unwrap();
            prop_assert_eq!(decode(&crate::schemas::POOL_V4, &bytes).unwrap(), record);
        }

        #[test]
        fn prop_market_round_trip(record in record_strategy(&crate::schemas::MARKET_V2)) {
            let bytes = encode(&crate::schemas::MARKET_V2, &record).unwrap();
            prop_assert_eq!(decode(&crate::schemas::MARKET_V2, &bytes).unwrap(), record);
        }

        #[test]
        fn prop_msb0_round_trip(record in record_strategy(&small_schema(BitOrder::Msb0))) {
            let schema = small_schema(BitOrder::Msb0);
            let bytes = encode(&schema, &record).unwrap();
            prop_assert_eq!(decode(&schema, &bytes).unwrap(), record);
        }
    }
}
