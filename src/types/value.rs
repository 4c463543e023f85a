use std::{cmp::Ordering, fmt};

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::types::{
    MAX_TEXT_LENGTH, TEXT_TYPE_CODE,
    error::{DatabaseError, Result},
};

const YEAR_EPOCH: i16 = 2000;
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Year,
    Time,
    DateTime,
    Date,
    Text,
}

impl DataType {
    /// Type code written into a cell payload. TEXT adds its byte length on top.
    pub fn base_type_code(&self) -> u8 {
        match self {
            DataType::Null => 0x00,
            DataType::TinyInt => 0x01,
            DataType::SmallInt => 0x02,
            DataType::Int => 0x03,
            DataType::BigInt => 0x04,
            DataType::Float => 0x05,
            DataType::Double => 0x06,
            DataType::Year => 0x08,
            DataType::Time => 0x09,
            DataType::DateTime => 0x0A,
            DataType::Date => 0x0B,
            DataType::Text => TEXT_TYPE_CODE,
        }
    }

    pub fn from_type_code(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(DataType::Null),
            0x01 => Ok(DataType::TinyInt),
            0x02 => Ok(DataType::SmallInt),
            0x03 => Ok(DataType::Int),
            0x04 => Ok(DataType::BigInt),
            0x05 => Ok(DataType::Float),
            0x06 => Ok(DataType::Double),
            0x08 => Ok(DataType::Year),
            0x09 => Ok(DataType::Time),
            0x0A => Ok(DataType::DateTime),
            0x0B => Ok(DataType::Date),
            code if code >= TEXT_TYPE_CODE => Ok(DataType::Text),
            _ => Err(DatabaseError::UnknownTypeCode(code)),
        }
    }

    /// Byte width of a fixed-width type, `None` for TEXT.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            DataType::Null => Some(0),
            DataType::TinyInt | DataType::Year => Some(1),
            DataType::SmallInt => Some(2),
            DataType::Int | DataType::Float | DataType::Time => Some(4),
            DataType::BigInt | DataType::Double | DataType::DateTime | DataType::Date => Some(8),
            DataType::Text => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::TinyInt => "TINYINT",
            DataType::SmallInt => "SMALLINT",
            DataType::Int => "INT",
            DataType::BigInt => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Year => "YEAR",
            DataType::Time => "TIME",
            DataType::DateTime => "DATETIME",
            DataType::Date => "DATE",
            DataType::Text => "TEXT",
        }
    }

    pub fn from_string(name: &str) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "NULL" => Ok(DataType::Null),
            "TINYINT" => Ok(DataType::TinyInt),
            "SMALLINT" => Ok(DataType::SmallInt),
            "INT" | "INTEGER" => Ok(DataType::Int),
            "BIGINT" | "LONG" => Ok(DataType::BigInt),
            "FLOAT" | "REAL" => Ok(DataType::Float),
            "DOUBLE" => Ok(DataType::Double),
            "YEAR" => Ok(DataType::Year),
            "TIME" => Ok(DataType::Time),
            "DATETIME" => Ok(DataType::DateTime),
            "DATE" => Ok(DataType::Date),
            "TEXT" => Ok(DataType::Text),
            other => Err(DatabaseError::SerializationError {
                details: format!("Unknown data type name: {}", other),
            }),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of body bytes a value with this type code occupies.
pub fn type_code_width(code: u8) -> Result<usize> {
    if code >= TEXT_TYPE_CODE {
        return Ok((code - TEXT_TYPE_CODE) as usize);
    }
    let data_type = DataType::from_type_code(code)?;
    Ok(data_type.fixed_width().unwrap_or(0))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Year(i16),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::TinyInt(_) => DataType::TinyInt,
            Value::SmallInt(_) => DataType::SmallInt,
            Value::Int(_) => DataType::Int,
            Value::BigInt(_) => DataType::BigInt,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Year(_) => DataType::Year,
            Value::Time(_) => DataType::Time,
            Value::DateTime(_) => DataType::DateTime,
            Value::Date(_) => DataType::Date,
            Value::Text(_) => DataType::Text,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Body width in bytes.
    pub fn size(&self) -> usize {
        match self {
            Value::Text(s) => s.len(),
            other => other.data_type().fixed_width().unwrap_or(0),
        }
    }

    pub fn type_code(&self) -> Result<u8> {
        match self {
            Value::Text(s) => {
                if s.len() > MAX_TEXT_LENGTH {
                    return Err(DatabaseError::InvalidData {
                        details: format!(
                            "Text of {} bytes exceeds the {} byte limit",
                            s.len(),
                            MAX_TEXT_LENGTH
                        ),
                    });
                }
                Ok(TEXT_TYPE_CODE + s.len() as u8)
            }
            other => Ok(other.data_type().base_type_code()),
        }
    }

    /// Big-endian body bytes; NULL produces nothing.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.size()];
        match self {
            Value::Null => {}
            Value::TinyInt(v) => buffer[0] = *v as u8,
            Value::SmallInt(v) => BigEndian::write_i16(&mut buffer, *v),
            Value::Int(v) => BigEndian::write_i32(&mut buffer, *v),
            Value::BigInt(v) => BigEndian::write_i64(&mut buffer, *v),
            Value::Float(v) => BigEndian::write_f32(&mut buffer, *v),
            Value::Double(v) => BigEndian::write_f64(&mut buffer, *v),
            Value::Year(year) => buffer[0] = Self::year_offset(*year)? as u8,
            Value::Time(time) => BigEndian::write_i32(&mut buffer, Self::time_to_millis(time)),
            Value::DateTime(dt) => BigEndian::write_i64(&mut buffer, dt.and_utc().timestamp_millis()),
            Value::Date(date) => BigEndian::write_i64(&mut buffer, Self::date_to_millis(date)?),
            Value::Text(s) => {
                self.type_code()?;
                buffer.copy_from_slice(s.as_bytes());
            }
        }
        Ok(buffer)
    }

    /// Decode exactly one value body. `bytes` must be as wide as the code says.
    pub fn from_bytes(type_code: u8, bytes: &[u8]) -> Result<Self> {
        let expected = type_code_width(type_code)?;
        if bytes.len() != expected {
            return Err(DatabaseError::InvalidLength {
                what: "value",
                expected,
                actual: bytes.len(),
            });
        }

        let value = match DataType::from_type_code(type_code)? {
            DataType::Null => Value::Null,
            DataType::TinyInt => Value::TinyInt(bytes[0] as i8),
            DataType::SmallInt => Value::SmallInt(BigEndian::read_i16(bytes)),
            DataType::Int => Value::Int(BigEndian::read_i32(bytes)),
            DataType::BigInt => Value::BigInt(BigEndian::read_i64(bytes)),
            DataType::Float => Value::Float(BigEndian::read_f32(bytes)),
            DataType::Double => Value::Double(BigEndian::read_f64(bytes)),
            DataType::Year => Value::Year(YEAR_EPOCH + (bytes[0] as i8) as i16),
            DataType::Time => Value::Time(Self::time_from_millis(BigEndian::read_i32(bytes))?),
            DataType::DateTime => {
                let millis = BigEndian::read_i64(bytes);
                let dt = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    DatabaseError::SerializationError {
                        details: format!("DATETIME out of range: {}", millis),
                    }
                })?;
                Value::DateTime(dt.naive_utc())
            }
            DataType::Date => {
                let millis = BigEndian::read_i64(bytes);
                let dt = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    DatabaseError::SerializationError {
                        details: format!("DATE out of range: {}", millis),
                    }
                })?;
                Value::Date(dt.date_naive())
            }
            DataType::Text => {
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    DatabaseError::SerializationError {
                        details: "Invalid UTF-8 in TEXT value".to_string(),
                    }
                })?;
                Value::Text(text)
            }
        };
        Ok(value)
    }

    /// Convert a literal into the representation a column of `target` stores.
    pub fn coerce_to(self, target: DataType) -> Result<Value> {
        if self.is_null() || self.data_type() == target {
            return Ok(self);
        }

        let mismatch = |value: &Value| DatabaseError::TypeMismatch {
            expected: target.to_string(),
            actual: format!("{} ({})", value.data_type(), value),
        };

        let coerced = match (target, &self) {
            (DataType::TinyInt, _) => self
                .as_integer()
                .and_then(|i| i8::try_from(i).ok())
                .map(Value::TinyInt),
            (DataType::SmallInt, _) => self
                .as_integer()
                .and_then(|i| i16::try_from(i).ok())
                .map(Value::SmallInt),
            (DataType::Int, _) => self
                .as_integer()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Int),
            (DataType::BigInt, _) => self.as_integer().map(Value::BigInt),
            (DataType::Float, _) => self.as_real().map(|r| Value::Float(r as f32)),
            (DataType::Double, _) => self.as_real().map(Value::Double),
            (DataType::Year, _) => self
                .as_integer()
                .and_then(|i| i16::try_from(i).ok())
                .filter(|year| Self::year_offset(*year).is_ok())
                .map(Value::Year),
            (DataType::Date, Value::Text(s)) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .ok()
                .map(Value::Date),
            (DataType::Date, Value::DateTime(dt)) => Some(Value::Date(dt.date())),
            (DataType::Time, Value::Text(s)) => NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
                .ok()
                .map(Value::Time),
            (DataType::DateTime, Value::Text(s)) => DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s.trim(), format).ok())
                .map(Value::DateTime),
            (DataType::DateTime, Value::Date(date)) => {
                date.and_hms_opt(0, 0, 0).map(Value::DateTime)
            }
            _ => None,
        };

        coerced.ok_or_else(|| mismatch(&self))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            Value::Year(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            other => other.as_integer().map(|i| i as f64),
        }
    }

    /// Total order used for index keys: NULL first, then numbers, times,
    /// datetimes, dates and text. Values of different families compare by family.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ if self.family() == 1 && other.family() == 1 => {
                match (self.as_integer(), other.as_integer()) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => {
                        let a = self.as_real().unwrap_or(f64::NAN);
                        let b = other.as_real().unwrap_or(f64::NAN);
                        a.total_cmp(&b)
                    }
                }
            }
            _ => self.family().cmp(&other.family()),
        }
    }

    fn family(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::TinyInt(_)
            | Value::SmallInt(_)
            | Value::Int(_)
            | Value::BigInt(_)
            | Value::Float(_)
            | Value::Double(_)
            | Value::Year(_) => 1,
            Value::Time(_) => 2,
            Value::DateTime(_) => 3,
            Value::Date(_) => 4,
            Value::Text(_) => 5,
        }
    }

    fn year_offset(year: i16) -> Result<i8> {
        i8::try_from(year - YEAR_EPOCH).map_err(|_| DatabaseError::InvalidData {
            details: format!("YEAR {} outside the storable range 1872..=2127", year),
        })
    }

    fn time_to_millis(time: &NaiveTime) -> i32 {
        // Leap-second nanos (>= 1s) are clamped into the same second.
        let millis = (time.nanosecond() / 1_000_000).min(999);
        time.num_seconds_from_midnight() as i32 * 1000 + millis as i32
    }

    fn time_from_millis(millis: i32) -> Result<NaiveTime> {
        let secs = u32::try_from(millis / 1000).ok();
        let nanos = u32::try_from(millis % 1000).ok().map(|ms| ms * 1_000_000);
        secs.zip(nanos)
            .and_then(|(secs, nanos)| NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos))
            .ok_or_else(|| DatabaseError::SerializationError {
                details: format!("TIME out of range: {}", millis),
            })
    }

    fn date_to_millis(date: &NaiveDate) -> Result<i64> {
        date.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .ok_or_else(|| DatabaseError::SerializationError {
                details: format!("DATE out of range: {}", date),
            })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Year(v) => write!(f, "{}", v),
            Value::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMATS[0])),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Text(s) => f.write_str(s),
        }
    }
}
