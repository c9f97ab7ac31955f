//! Typed metadata attributes
//!
//! Every scanned record carries an ordered set of typed attributes, keyed by
//! a closed, versioned type-code enumeration. Each attribute category is a
//! tagged variant (GRIB1/GRIB2/BUFR styles where the formats differ), with a
//! fixed payload layout per style so the binary codec stays deterministic.

mod value;

pub use value::{Value, ValueBag};

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::codec::{CodecError, CodecResult, Decoder, Encoder};

/// Closed type-code enumeration.
///
/// The numeric values are part of the on-disk format and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Code {
    /// Generating centre/process
    Origin = 1,
    /// Physical variable
    Product = 2,
    /// Vertical level or layer
    Level = 3,
    /// Forecast step / statistical processing interval
    Timerange = 4,
    /// Reference time
    Reftime = 5,
    /// Free-form annotation
    Note = 6,
    /// Location of the raw bytes
    Source = 7,
    /// Geographical area
    Area = 9,
    /// Product definition details (ensemble members and similar)
    Proddef = 10,
    /// Model run within a day
    Run = 15,
    /// Acquisition task name
    Task = 16,
    /// Set of measured quantities
    Quantity = 17,
}

impl Code {
    /// All codes, in canonical (numeric) order
    pub const ALL: [Code; 12] = [
        Code::Origin,
        Code::Product,
        Code::Level,
        Code::Timerange,
        Code::Reftime,
        Code::Note,
        Code::Source,
        Code::Area,
        Code::Proddef,
        Code::Run,
        Code::Task,
        Code::Quantity,
    ];

    /// The lowercase tag used in matcher expressions and config lists
    pub fn name(&self) -> &'static str {
        match self {
            Code::Origin => "origin",
            Code::Product => "product",
            Code::Level => "level",
            Code::Timerange => "timerange",
            Code::Reftime => "reftime",
            Code::Note => "note",
            Code::Source => "source",
            Code::Area => "area",
            Code::Proddef => "proddef",
            Code::Run => "run",
            Code::Task => "task",
            Code::Quantity => "quantity",
        }
    }

    /// Parse a lowercase tag back into a code
    pub fn from_name(name: &str) -> Option<Code> {
        Code::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Decode a wire type-code
    pub fn from_u16(raw: u16) -> CodecResult<Code> {
        Code::ALL
            .iter()
            .copied()
            .find(|c| *c as u16 == raw)
            .ok_or(CodecError::UnknownTypeCode(raw))
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Generating centre/process, styled per source format
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    /// GRIB edition 1 origin
    Grib1 {
        /// Originating centre
        centre: u8,
        /// Originating subcentre
        subcentre: u8,
        /// Generating process
        process: u8,
    },
    /// GRIB edition 2 origin
    Grib2 {
        /// Originating centre
        centre: u16,
        /// Originating subcentre
        subcentre: u16,
        /// Type of generating process
        process_type: u8,
        /// Background process identifier
        background_id: u8,
        /// Generating process identifier
        process_id: u8,
    },
    /// BUFR origin
    Bufr {
        /// Originating centre
        centre: u8,
        /// Originating subcentre
        subcentre: u8,
    },
}

/// Physical variable, styled per source format
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Product {
    /// GRIB edition 1 product
    Grib1 {
        /// Identification of originating centre
        origin: u8,
        /// Parameter table version
        table: u8,
        /// Parameter number
        product: u8,
    },
    /// GRIB edition 2 product
    Grib2 {
        /// Originating centre
        centre: u16,
        /// Parameter discipline
        discipline: u8,
        /// Parameter category
        category: u8,
        /// Parameter number
        number: u8,
    },
    /// BUFR product
    Bufr {
        /// Data category
        kind: u8,
        /// Data subcategory
        subtype: u8,
        /// Local subcategory
        local_subtype: u8,
    },
}

/// Vertical level or layer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// GRIB edition 1 level
    Grib1 {
        /// Level type
        level_type: u8,
        /// First level value
        l1: u16,
        /// Second level value (layers)
        l2: u16,
    },
    /// GRIB edition 2 single level
    Grib2Single {
        /// Level type
        level_type: u8,
        /// Decimal scale factor
        scale: u8,
        /// Scaled level value
        value: u32,
    },
}

/// Forecast step / statistical processing interval
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timerange {
    /// GRIB edition 1 time range
    Grib1 {
        /// Time range indicator
        range_type: u8,
        /// Time unit
        unit: u8,
        /// First period
        p1: i32,
        /// Second period
        p2: i32,
    },
    /// GRIB edition 2 time range
    Grib2 {
        /// Time range indicator
        range_type: u8,
        /// Time unit
        unit: u8,
        /// First period
        p1: i32,
        /// Second period
        p2: i32,
    },
}

/// One typed metadata attribute.
///
/// At most one attribute per `Code` exists in a metadata item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Attribute {
    /// Generating centre/process
    Origin(Origin),
    /// Physical variable
    Product(Product),
    /// Vertical level or layer
    Level(Level),
    /// Forecast step
    Timerange(Timerange),
    /// Reference time
    Reftime(NaiveDateTime),
    /// Geographical area
    Area(ValueBag),
    /// Product definition details
    Proddef(ValueBag),
    /// Model run, as minutes from midnight
    Run {
        /// Minutes from midnight
        minute: u32,
    },
    /// Acquisition task name
    Task(String),
    /// Measured quantities, kept sorted
    Quantity(std::collections::BTreeSet<String>),
    /// Free-form annotation
    Note(String),
}

impl Attribute {
    /// The type code of this attribute
    pub fn code(&self) -> Code {
        match self {
            Attribute::Origin(_) => Code::Origin,
            Attribute::Product(_) => Code::Product,
            Attribute::Level(_) => Code::Level,
            Attribute::Timerange(_) => Code::Timerange,
            Attribute::Reftime(_) => Code::Reftime,
            Attribute::Area(_) => Code::Area,
            Attribute::Proddef(_) => Code::Proddef,
            Attribute::Run { .. } => Code::Run,
            Attribute::Task(_) => Code::Task,
            Attribute::Quantity(_) => Code::Quantity,
            Attribute::Note(_) => Code::Note,
        }
    }

    /// Encode the attribute payload (without the envelope)
    pub fn encode_payload(&self, enc: &mut Encoder) {
        match self {
            Attribute::Origin(Origin::Grib1 {
                centre,
                subcentre,
                process,
            }) => {
                enc.add_u8(1).add_u8(*centre).add_u8(*subcentre).add_u8(*process);
            }
            Attribute::Origin(Origin::Grib2 {
                centre,
                subcentre,
                process_type,
                background_id,
                process_id,
            }) => {
                enc.add_u8(2)
                    .add_u16(*centre)
                    .add_u16(*subcentre)
                    .add_u8(*process_type)
                    .add_u8(*background_id)
                    .add_u8(*process_id);
            }
            Attribute::Origin(Origin::Bufr { centre, subcentre }) => {
                enc.add_u8(3).add_u8(*centre).add_u8(*subcentre);
            }
            Attribute::Product(Product::Grib1 {
                origin,
                table,
                product,
            }) => {
                enc.add_u8(1).add_u8(*origin).add_u8(*table).add_u8(*product);
            }
            Attribute::Product(Product::Grib2 {
                centre,
                discipline,
                category,
                number,
            }) => {
                enc.add_u8(2)
                    .add_u16(*centre)
                    .add_u8(*discipline)
                    .add_u8(*category)
                    .add_u8(*number);
            }
            Attribute::Product(Product::Bufr {
                kind,
                subtype,
                local_subtype,
            }) => {
                enc.add_u8(3).add_u8(*kind).add_u8(*subtype).add_u8(*local_subtype);
            }
            Attribute::Level(Level::Grib1 { level_type, l1, l2 }) => {
                enc.add_u8(1).add_u8(*level_type).add_u16(*l1).add_u16(*l2);
            }
            Attribute::Level(Level::Grib2Single {
                level_type,
                scale,
                value,
            }) => {
                enc.add_u8(2).add_u8(*level_type).add_u8(*scale).add_u32(*value);
            }
            Attribute::Timerange(Timerange::Grib1 {
                range_type,
                unit,
                p1,
                p2,
            }) => {
                enc.add_u8(1)
                    .add_u8(*range_type)
                    .add_u8(*unit)
                    .add_u32(*p1 as u32)
                    .add_u32(*p2 as u32);
            }
            Attribute::Timerange(Timerange::Grib2 {
                range_type,
                unit,
                p1,
                p2,
            }) => {
                enc.add_u8(2)
                    .add_u8(*range_type)
                    .add_u8(*unit)
                    .add_u32(*p1 as u32)
                    .add_u32(*p2 as u32);
            }
            Attribute::Reftime(time) => {
                encode_time(enc, time);
            }
            Attribute::Area(bag) => bag.encode(enc),
            Attribute::Proddef(bag) => bag.encode(enc),
            Attribute::Run { minute } => {
                enc.add_u32(*minute);
            }
            Attribute::Task(name) => {
                enc.add_bytes(name.as_bytes());
            }
            Attribute::Quantity(values) => {
                enc.add_varint(values.len() as u64);
                for value in values {
                    enc.add_string(value);
                }
            }
            Attribute::Note(text) => {
                enc.add_bytes(text.as_bytes());
            }
        }
    }

    /// Decode an attribute payload for the given code
    pub fn decode_payload(code: Code, payload: &[u8]) -> CodecResult<Attribute> {
        let mut dec = Decoder::new(payload);
        let attr = match code {
            Code::Origin => match dec.pop_u8("origin style")? {
                1 => Attribute::Origin(Origin::Grib1 {
                    centre: dec.pop_u8("origin centre")?,
                    subcentre: dec.pop_u8("origin subcentre")?,
                    process: dec.pop_u8("origin process")?,
                }),
                2 => Attribute::Origin(Origin::Grib2 {
                    centre: dec.pop_u16("origin centre")?,
                    subcentre: dec.pop_u16("origin subcentre")?,
                    process_type: dec.pop_u8("origin process type")?,
                    background_id: dec.pop_u8("origin background id")?,
                    process_id: dec.pop_u8("origin process id")?,
                }),
                3 => Attribute::Origin(Origin::Bufr {
                    centre: dec.pop_u8("origin centre")?,
                    subcentre: dec.pop_u8("origin subcentre")?,
                }),
                style => {
                    return Err(CodecError::UnknownStyle {
                        attribute: "origin",
                        style,
                    })
                }
            },
            Code::Product => match dec.pop_u8("product style")? {
                1 => Attribute::Product(Product::Grib1 {
                    origin: dec.pop_u8("product origin")?,
                    table: dec.pop_u8("product table")?,
                    product: dec.pop_u8("product number")?,
                }),
                2 => Attribute::Product(Product::Grib2 {
                    centre: dec.pop_u16("product centre")?,
                    discipline: dec.pop_u8("product discipline")?,
                    category: dec.pop_u8("product category")?,
                    number: dec.pop_u8("product number")?,
                }),
                3 => Attribute::Product(Product::Bufr {
                    kind: dec.pop_u8("product type")?,
                    subtype: dec.pop_u8("product subtype")?,
                    local_subtype: dec.pop_u8("product local subtype")?,
                }),
                style => {
                    return Err(CodecError::UnknownStyle {
                        attribute: "product",
                        style,
                    })
                }
            },
            Code::Level => match dec.pop_u8("level style")? {
                1 => Attribute::Level(Level::Grib1 {
                    level_type: dec.pop_u8("level type")?,
                    l1: dec.pop_u16("level l1")?,
                    l2: dec.pop_u16("level l2")?,
                }),
                2 => Attribute::Level(Level::Grib2Single {
                    level_type: dec.pop_u8("level type")?,
                    scale: dec.pop_u8("level scale")?,
                    value: dec.pop_u32("level value")?,
                }),
                style => {
                    return Err(CodecError::UnknownStyle {
                        attribute: "level",
                        style,
                    })
                }
            },
            Code::Timerange => {
                let style = dec.pop_u8("timerange style")?;
                let range_type = dec.pop_u8("timerange type")?;
                let unit = dec.pop_u8("timerange unit")?;
                let p1 = dec.pop_u32("timerange p1")? as i32;
                let p2 = dec.pop_u32("timerange p2")? as i32;
                match style {
                    1 => Attribute::Timerange(Timerange::Grib1 {
                        range_type,
                        unit,
                        p1,
                        p2,
                    }),
                    2 => Attribute::Timerange(Timerange::Grib2 {
                        range_type,
                        unit,
                        p1,
                        p2,
                    }),
                    style => {
                        return Err(CodecError::UnknownStyle {
                            attribute: "timerange",
                            style,
                        })
                    }
                }
            }
            Code::Reftime => Attribute::Reftime(decode_time(&mut dec)?),
            Code::Area => Attribute::Area(ValueBag::decode(&mut dec)?),
            Code::Proddef => Attribute::Proddef(ValueBag::decode(&mut dec)?),
            Code::Run => Attribute::Run {
                minute: dec.pop_u32("run minute")?,
            },
            Code::Task => {
                let raw = dec.pop_bytes(dec.remaining(), "task name")?;
                let name = String::from_utf8(raw.to_vec())
                    .map_err(|_| CodecError::malformed("task name is not valid UTF-8"))?;
                Attribute::Task(name)
            }
            Code::Quantity => {
                let count = dec.pop_varint("quantity count")?;
                let mut values = std::collections::BTreeSet::new();
                for _ in 0..count {
                    values.insert(dec.pop_string("quantity value")?);
                }
                Attribute::Quantity(values)
            }
            Code::Note => {
                let raw = dec.pop_bytes(dec.remaining(), "note text")?;
                let text = String::from_utf8(raw.to_vec())
                    .map_err(|_| CodecError::malformed("note text is not valid UTF-8"))?;
                Attribute::Note(text)
            }
            Code::Source => {
                return Err(CodecError::malformed(
                    "source must be decoded through Source::decode_payload",
                ))
            }
        };
        if dec.remaining() > 0 {
            return Err(CodecError::malformed(format!(
                "{} payload has {} trailing bytes",
                code,
                dec.remaining()
            )));
        }
        Ok(attr)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Origin(Origin::Grib1 {
                centre,
                subcentre,
                process,
            }) => write!(f, "GRIB1({}, {}, {})", centre, subcentre, process),
            Attribute::Origin(Origin::Grib2 {
                centre,
                subcentre,
                process_type,
                background_id,
                process_id,
            }) => write!(
                f,
                "GRIB2({}, {}, {}, {}, {})",
                centre, subcentre, process_type, background_id, process_id
            ),
            Attribute::Origin(Origin::Bufr { centre, subcentre }) => {
                write!(f, "BUFR({}, {})", centre, subcentre)
            }
            Attribute::Product(Product::Grib1 {
                origin,
                table,
                product,
            }) => write!(f, "GRIB1({}, {}, {})", origin, table, product),
            Attribute::Product(Product::Grib2 {
                centre,
                discipline,
                category,
                number,
            }) => write!(f, "GRIB2({}, {}, {}, {})", centre, discipline, category, number),
            Attribute::Product(Product::Bufr {
                kind,
                subtype,
                local_subtype,
            }) => write!(f, "BUFR({}, {}, {})", kind, subtype, local_subtype),
            Attribute::Level(Level::Grib1 { level_type, l1, l2 }) => {
                write!(f, "GRIB1({}, {}, {})", level_type, l1, l2)
            }
            Attribute::Level(Level::Grib2Single {
                level_type,
                scale,
                value,
            }) => write!(f, "GRIB2S({}, {}, {})", level_type, scale, value),
            Attribute::Timerange(Timerange::Grib1 {
                range_type,
                unit,
                p1,
                p2,
            }) => write!(f, "GRIB1({}, {}, {}, {})", range_type, unit, p1, p2),
            Attribute::Timerange(Timerange::Grib2 {
                range_type,
                unit,
                p1,
                p2,
            }) => write!(f, "GRIB2({}, {}, {}, {})", range_type, unit, p1, p2),
            Attribute::Reftime(time) => write!(f, "{}", time.format("%Y-%m-%d %H:%M:%S")),
            Attribute::Area(bag) => write!(f, "GRIB({})", bag),
            Attribute::Proddef(bag) => write!(f, "GRIB({})", bag),
            Attribute::Run { minute } => {
                write!(f, "MINUTE({:02}:{:02})", minute / 60, minute % 60)
            }
            Attribute::Task(name) => write!(f, "{}", name),
            Attribute::Quantity(values) => {
                let joined: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
                write!(f, "{}", joined.join(","))
            }
            Attribute::Note(text) => write!(f, "{}", text),
        }
    }
}

/// Encode a reference time as year/month/day/hour/minute/second fields
pub fn encode_time(enc: &mut Encoder, time: &NaiveDateTime) {
    use chrono::{Datelike, Timelike};
    enc.add_u16(time.year() as u16)
        .add_u8(time.month() as u8)
        .add_u8(time.day() as u8)
        .add_u8(time.hour() as u8)
        .add_u8(time.minute() as u8)
        .add_u8(time.second() as u8);
}

/// Decode a reference time encoded by [`encode_time`]
pub fn decode_time(dec: &mut Decoder) -> CodecResult<NaiveDateTime> {
    let year = dec.pop_u16("reftime year")? as i32;
    let month = dec.pop_u8("reftime month")? as u32;
    let day = dec.pop_u8("reftime day")? as u32;
    let hour = dec.pop_u8("reftime hour")? as u32;
    let minute = dec.pop_u8("reftime minute")? as u32;
    let second = dec.pop_u8("reftime second")? as u32;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            CodecError::malformed(format!(
                "invalid reference time {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ))
        })
}
