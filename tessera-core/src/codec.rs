//! Body codec.
//!
//! A request payload is a flat list of [`BodyItem`]s. Each item names a
//! field by path (`Filter[2].Dates.From`), carries a type tag describing how
//! the browser produced the text, and the text itself. [`decode`] applies
//! the items one by one to a value implementing [`Field`]; an item whose
//! path or text cannot be used is logged and skipped without touching
//! anything else.
//!
//! [`Field`] is the per-type field tree the codec walks. Records get it from
//! `#[derive(Field)]`; scalars, `Option`, `Vec` and `Box` are covered here.

use crate::DecodeError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Sequences never grow past this many elements from a single item.
pub const MAX_SEQUENCE_LEN: usize = 10_000;

/// Elements a whole decode may add to sequences, across every item.
pub const MAX_DECODE_GROWTH: usize = 10_000;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";
const TIME_SECONDS_FORMAT: &str = "%H:%M:%S%.f";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DATETIME_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIMESTAMP_FALLBACK_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// One wire-encoded field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyItem {
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub value: String,
}

impl BodyItem {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            value: value.into(),
        }
    }
}

// `select` and `textarea` elements have no type attribute and send null.
fn nullable<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// How the text of a [`BodyItem`] is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// No tag at all.
    Empty,
    Text,
    Bool,
    Int,
    Uint,
    Float,
    /// An HTML number input: integer when it parses as one, float otherwise.
    Number,
    Date,
    Time,
    DateTime,
    Timestamp,
    /// Any tag this codec does not know.
    Other,
}

impl TypeTag {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "" => TypeTag::Empty,
            "string" | "radio" => TypeTag::Text,
            "bool" | "checkbox" => TypeTag::Bool,
            "int" | "int8" | "int16" | "int32" | "int64" => TypeTag::Int,
            "uint" | "uint8" | "uint16" | "uint32" | "uint64" => TypeTag::Uint,
            "float" | "float32" | "float64" => TypeTag::Float,
            "number" => TypeTag::Number,
            "date" => TypeTag::Date,
            "time" => TypeTag::Time,
            "datetime-local" | "datetime" => TypeTag::DateTime,
            "timestamp" | "Time" => TypeTag::Timestamp,
            _ => TypeTag::Other,
        }
    }

    /// Canonical wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Empty => "",
            TypeTag::Text => "string",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Uint => "uint",
            TypeTag::Float => "float",
            TypeTag::Number => "number",
            TypeTag::Date => "date",
            TypeTag::Time => "time",
            TypeTag::DateTime => "datetime-local",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Other => "other",
        }
    }
}

/// A wire value after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
}

/// Coerce `raw` according to `tag`.
///
/// `Ok(None)` means the tag carries no value (empty or unknown tag).
pub fn coerce(tag: TypeTag, raw: &str) -> Result<Option<Value>, DecodeError> {
    let unparseable = |expected| DecodeError::Unparseable {
        value: raw.to_string(),
        expected,
    };

    let value = match tag {
        TypeTag::Empty | TypeTag::Other => return Ok(None),
        TypeTag::Text => Value::Text(raw.to_string()),
        TypeTag::Bool => Value::Bool(raw == "true"),
        TypeTag::Int => Value::Int(digits(raw).parse().map_err(|_| unparseable("int"))?),
        TypeTag::Uint => Value::Uint(digits(raw).parse().map_err(|_| unparseable("uint"))?),
        TypeTag::Float => Value::Float(digits(raw).parse().map_err(|_| unparseable("float"))?),
        TypeTag::Number => {
            let cleaned = digits(raw);
            if let Ok(n) = cleaned.parse::<i64>() {
                Value::Int(n)
            } else if let Ok(n) = cleaned.parse::<u64>() {
                Value::Uint(n)
            } else {
                Value::Float(cleaned.parse().map_err(|_| unparseable("number"))?)
            }
        }
        TypeTag::Date => Value::Date(
            NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| unparseable("date"))?,
        ),
        TypeTag::Time => Value::Time(
            NaiveTime::parse_from_str(raw, TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(raw, TIME_SECONDS_FORMAT))
                .map_err(|_| unparseable("time"))?,
        ),
        TypeTag::DateTime => Value::DateTime(
            NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(raw, DATETIME_SECONDS_FORMAT))
                .map_err(|_| unparseable("datetime"))?,
        ),
        TypeTag::Timestamp => {
            Value::Timestamp(parse_timestamp(raw).ok_or_else(|| unparseable("timestamp"))?)
        }
    };

    Ok(Some(value))
}

// `_` is accepted as a digit-group separator.
fn digits(raw: &str) -> String {
    raw.trim().replace('_', "")
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    if let Ok(ts) = DateTime::parse_from_str(raw, TIMESTAMP_FALLBACK_FORMAT) {
        return Some(ts.with_timezone(&Utc));
    }

    // Trailing zone abbreviation, e.g. "2024-03-01 10:00:00 +0000 UTC".
    let (head, zone) = raw.rsplit_once(' ')?;
    if !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    DateTime::parse_from_str(head, TIMESTAMP_FALLBACK_FORMAT)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// A node of a decodable field tree.
///
/// Leaves override [`assign`](Field::assign), records override
/// [`child`](Field::child), sequences override [`element`](Field::element).
pub trait Field {
    /// Store a wire value.
    ///
    /// Returns `Ok(false)` when the tag carries nothing for this field.
    fn assign(&mut self, tag: TypeTag, raw: &str) -> Result<bool, DecodeError> {
        let _ = (tag, raw);
        Err(DecodeError::NotAssignable)
    }

    /// Named sub-field of a record.
    fn child(&mut self, name: &str) -> Option<&mut dyn Field> {
        let _ = name;
        None
    }

    /// Element `index` of a sequence, growing it as needed.
    fn element(&mut self, index: usize) -> Option<&mut dyn Field> {
        let _ = index;
        None
    }

    /// Current length, for sequences.
    fn sequence_len(&self) -> Option<usize> {
        None
    }

    /// Append this field's wire items, named relative to `path`.
    fn encode(&self, path: &str, out: &mut Vec<BodyItem>);
}

/// Join a record path and a field name.
pub fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// Outcome of a decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Items written into the target
    pub applied: usize,
    /// Items whose tag carried no value
    pub ignored: usize,
    /// Items dropped because of a bad path or unparseable text
    pub skipped: usize,
}

/// Apply `items` to `target`, in order, each independently of the others.
///
/// Sequences grow by at most [`MAX_DECODE_GROWTH`] elements in total; items
/// that would grow them further are skipped.
pub fn decode(items: &[BodyItem], target: &mut dyn Field) -> DecodeReport {
    let mut report = DecodeReport::default();
    let mut budget = MAX_DECODE_GROWTH;

    for item in items {
        match apply(item, target, &mut budget) {
            Ok(true) => report.applied += 1,
            Ok(false) => {
                tracing::debug!(field = %item.name, tag = %item.kind, "Ignoring body item without usable type");
                report.ignored += 1;
            }
            Err(err) => {
                tracing::warn!(field = %item.name, tag = %item.kind, error = %err, "Skipping body item");
                report.skipped += 1;
            }
        }
    }

    report
}

fn apply(item: &BodyItem, target: &mut dyn Field, budget: &mut usize) -> Result<bool, DecodeError> {
    let segments = parse_path(&item.name)?;
    let field = resolve(target, &segments, budget)?;
    field.assign(TypeTag::parse(&item.kind), &item.value)
}

/// Flatten `value` into wire items.
pub fn encode(value: &dyn Field) -> Vec<BodyItem> {
    let mut out = Vec::new();
    value.encode("", &mut out);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Field(&'a str),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment<'_>>, DecodeError> {
    let mut segments = Vec::new();

    for part in path.split('.') {
        let malformed = || DecodeError::MalformedSegment(part.to_string());

        let (name, mut rest) = match part.find('[') {
            Some(at) => (&part[..at], &part[at..]),
            None => (part, ""),
        };

        if name.is_empty() && rest.is_empty() {
            return Err(malformed());
        }

        if !name.is_empty() {
            segments.push(Segment::Field(name));
        }

        while !rest.is_empty() {
            let inner = rest.strip_prefix('[').ok_or_else(malformed)?;
            let (index, tail) = inner.split_once(']').ok_or_else(malformed)?;
            let index: usize = index.trim().parse().map_err(|_| malformed())?;
            segments.push(Segment::Index(index));
            rest = tail;
        }
    }

    Ok(segments)
}

fn resolve<'a>(
    target: &'a mut dyn Field,
    segments: &[Segment<'_>],
    budget: &mut usize,
) -> Result<&'a mut dyn Field, DecodeError> {
    let mut current = target;

    for segment in segments {
        current = match *segment {
            Segment::Field(name) => current
                .child(name)
                .ok_or_else(|| DecodeError::UnknownField(name.to_string()))?,
            Segment::Index(index) => {
                let growth = current
                    .sequence_len()
                    .map_or(0, |len| (index + 1).saturating_sub(len));
                if growth > *budget {
                    return Err(DecodeError::GrowthLimit(MAX_DECODE_GROWTH));
                }

                let element = current
                    .element(index)
                    .ok_or_else(|| DecodeError::NotASequence(format!("[{index}]")))?;
                *budget -= growth;
                element
            }
        };
    }

    Ok(current)
}

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

impl Field for String {
    fn assign(&mut self, _tag: TypeTag, raw: &str) -> Result<bool, DecodeError> {
        // Text passes through whatever input produced it.
        raw.clone_into(self);
        Ok(true)
    }

    fn encode(&self, path: &str, out: &mut Vec<BodyItem>) {
        out.push(BodyItem::new(path, TypeTag::Text.as_str(), self.as_str()));
    }
}

/// A leaf that is produced from a coerced [`Value`].
pub trait Scalar: Sized {
    /// Tag written when encoding.
    const TAG: TypeTag;

    fn from_value(value: Value) -> Option<Self>;

    fn to_wire(&self) -> String;
}

fn assign_scalar<T: Scalar>(slot: &mut T, tag: TypeTag, raw: &str) -> Result<bool, DecodeError> {
    match coerce(tag, raw)? {
        None => Ok(false),
        Some(value) => {
            *slot = T::from_value(value).ok_or(DecodeError::Incompatible { tag: tag.as_str() })?;
            Ok(true)
        }
    }
}

macro_rules! scalar_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Field for $ty {
                fn assign(&mut self, tag: TypeTag, raw: &str) -> Result<bool, DecodeError> {
                    assign_scalar(self, tag, raw)
                }

                fn encode(&self, path: &str, out: &mut Vec<BodyItem>) {
                    out.push(BodyItem::new(path, <$ty as Scalar>::TAG.as_str(), self.to_wire()));
                }
            }
        )*
    };
}

macro_rules! signed_scalar {
    ($($ty:ty),*) => {
        $(
            impl Scalar for $ty {
                const TAG: TypeTag = TypeTag::Int;

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::Int(n) => <$ty>::try_from(n).ok(),
                        Value::Uint(n) => <$ty>::try_from(n).ok(),
                        _ => None,
                    }
                }

                fn to_wire(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

macro_rules! unsigned_scalar {
    ($($ty:ty),*) => {
        $(
            impl Scalar for $ty {
                const TAG: TypeTag = TypeTag::Uint;

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::Uint(n) => <$ty>::try_from(n).ok(),
                        Value::Int(n) => <$ty>::try_from(n).ok(),
                        _ => None,
                    }
                }

                fn to_wire(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

signed_scalar!(i8, i16, i32, i64, isize);
unsigned_scalar!(u8, u16, u32, u64, usize);

impl Scalar for f64 {
    const TAG: TypeTag = TypeTag::Float;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f),
            Value::Int(n) => Some(n as f64),
            Value::Uint(n) => Some(n as f64),
            _ => None,
        }
    }

    fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl Scalar for f32 {
    const TAG: TypeTag = TypeTag::Float;

    fn from_value(value: Value) -> Option<Self> {
        f64::from_value(value).map(|f| f as f32)
    }

    fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl Scalar for bool {
    const TAG: TypeTag = TypeTag::Bool;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl Scalar for NaiveDate {
    const TAG: TypeTag = TypeTag::Date;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(d),
            Value::DateTime(dt) => Some(dt.date()),
            Value::Timestamp(ts) => Some(ts.date_naive()),
            _ => None,
        }
    }

    fn to_wire(&self) -> String {
        self.format(DATE_FORMAT).to_string()
    }
}

impl Scalar for NaiveTime {
    const TAG: TypeTag = TypeTag::Time;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Time(t) => Some(t),
            Value::DateTime(dt) => Some(dt.time()),
            _ => None,
        }
    }

    fn to_wire(&self) -> String {
        if self.second() == 0 && self.nanosecond() == 0 {
            self.format(TIME_FORMAT).to_string()
        } else {
            self.format(TIME_SECONDS_FORMAT).to_string()
        }
    }
}

impl Scalar for NaiveDateTime {
    const TAG: TypeTag = TypeTag::DateTime;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::DateTime(dt) => Some(dt),
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::Timestamp(ts) => Some(ts.naive_utc()),
            _ => None,
        }
    }

    fn to_wire(&self) -> String {
        if self.second() == 0 && self.nanosecond() == 0 {
            self.format(DATETIME_FORMAT).to_string()
        } else {
            self.format(DATETIME_SECONDS_FORMAT).to_string()
        }
    }
}

impl Scalar for DateTime<Utc> {
    const TAG: TypeTag = TypeTag::Timestamp;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Timestamp(ts) => Some(ts),
            Value::DateTime(dt) => Some(dt.and_utc()),
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN).and_utc()),
            _ => None,
        }
    }

    fn to_wire(&self) -> String {
        self.to_rfc3339()
    }
}

scalar_field!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, NaiveDate, NaiveTime,
    NaiveDateTime, DateTime<Utc>,
);

// ---------------------------------------------------------------------------
// Wrappers
// ---------------------------------------------------------------------------

impl<T: Field + Default> Field for Option<T> {
    fn assign(&mut self, tag: TypeTag, raw: &str) -> Result<bool, DecodeError> {
        match self {
            Some(inner) => inner.assign(tag, raw),
            None => {
                let mut inner = T::default();
                let assigned = inner.assign(tag, raw)?;
                if assigned {
                    *self = Some(inner);
                }
                Ok(assigned)
            }
        }
    }

    fn child(&mut self, name: &str) -> Option<&mut dyn Field> {
        if self.is_none() {
            let mut fresh = T::default();
            fresh.child(name)?;
            *self = Some(fresh);
        }
        self.as_mut()?.child(name)
    }

    fn element(&mut self, index: usize) -> Option<&mut dyn Field> {
        if self.is_none() {
            let mut fresh = T::default();
            fresh.element(index)?;
            *self = Some(fresh);
        }
        self.as_mut()?.element(index)
    }

    fn sequence_len(&self) -> Option<usize> {
        match self {
            Some(inner) => inner.sequence_len(),
            None => T::default().sequence_len(),
        }
    }

    fn encode(&self, path: &str, out: &mut Vec<BodyItem>) {
        if let Some(inner) = self {
            inner.encode(path, out);
        }
    }
}

impl<T: Field + Default> Field for Vec<T> {
    fn element(&mut self, index: usize) -> Option<&mut dyn Field> {
        if index >= MAX_SEQUENCE_LEN {
            return None;
        }

        if self.len() <= index {
            self.resize_with(index + 1, T::default);
        }

        Some(&mut self[index])
    }

    fn sequence_len(&self) -> Option<usize> {
        Some(self.len())
    }

    fn encode(&self, path: &str, out: &mut Vec<BodyItem>) {
        for (index, element) in self.iter().enumerate() {
            element.encode(&format!("{path}[{index}]"), out);
        }
    }
}

impl<T: Field + ?Sized> Field for Box<T> {
    fn assign(&mut self, tag: TypeTag, raw: &str) -> Result<bool, DecodeError> {
        (**self).assign(tag, raw)
    }

    fn child(&mut self, name: &str) -> Option<&mut dyn Field> {
        (**self).child(name)
    }

    fn element(&mut self, index: usize) -> Option<&mut dyn Field> {
        (**self).element(index)
    }

    fn sequence_len(&self) -> Option<usize> {
        (**self).sequence_len()
    }

    fn encode(&self, path: &str, out: &mut Vec<BodyItem>) {
        (**self).encode(path, out)
    }
}
