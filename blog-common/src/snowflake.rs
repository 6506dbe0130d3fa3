//! Module for working with snowflake IDs.
//!
//! A snowflake packs 42 bits of milliseconds since an [`Epoch`], a 5 bit
//! worker id, a 5 bit process id and a 12 bit increment into a `u64`.
//!
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{
    fmt::{Debug, Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;

pub const WORKER_ID_OFFSET: u32 = 17;
pub const WORKER_ID_LENGTH: u32 = 5;

pub const PROCESS_ID_OFFSET: u32 = 12;
pub const PROCESS_ID_LENGTH: u32 = 5;

pub const INCREMENT_OFFSET: u32 = 0;
pub const INCREMENT_LENGTH: u32 = 12;

const fn mask(length: u32) -> u64 {
    (1 << length) - 1
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimestampFromDateTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake part was out of range: {0}")]
pub struct SnowflakePartOutOfRangeError(u64);

macro_rules! snowflake_part {
    ($name:ident: $repr:ty, len = $length:ident) => {
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
        pub struct $name($repr);

        impl $name {
            #[must_use]
            pub fn new(value: $repr) -> Option<Self> {
                (u64::from(value) <= mask($length)).then_some(Self(value))
            }

            #[must_use]
            pub fn new_unchecked(value: $repr) -> Self {
                Self::new(value).expect(concat!(stringify!($name), " out of range."))
            }

            #[must_use]
            pub fn get(self) -> $repr {
                self.0
            }
        }

        impl TryFrom<$repr> for $name {
            type Error = SnowflakePartOutOfRangeError;

            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(SnowflakePartOutOfRangeError(value.into()))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = <$repr as Deserialize<'de>>::deserialize(deserializer)?;
                Self::new(inner).ok_or_else(|| {
                    Error::invalid_value(Unexpected::Unsigned(inner.into()), &stringify!($name))
                })
            }
        }
    };
}

snowflake_part!(WorkerId: u8, len = WORKER_ID_LENGTH);
snowflake_part!(ProcessId: u8, len = PROCESS_ID_LENGTH);
snowflake_part!(SnowflakeIncrement: u16, len = INCREMENT_LENGTH);

impl SnowflakeIncrement {
    #[must_use]
    pub fn next(self) -> Self {
        Self((self.0 + 1) & 0x0FFF)
    }

    pub fn increment(&mut self) {
        *self = self.next();
    }
}

/// Milliseconds since `SnowflakeEpoch`, guaranteed to fit into [`TIMESTAMP_LENGTH`] bits.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SnowflakeTimestamp<SnowflakeEpoch>(u64, PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> SnowflakeTimestamp<SnowflakeEpoch> {
    #[must_use]
    pub fn new(millis: u64) -> Option<Self> {
        (millis <= mask(TIMESTAMP_LENGTH)).then_some(Self(millis, PhantomData))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl<SnowflakeEpoch: Epoch> TryFrom<UtcDateTime> for SnowflakeTimestamp<SnowflakeEpoch> {
    type Error = SnowflakeTimestampFromDateTimeError;

    fn try_from(value: UtcDateTime) -> Result<Self, Self::Error> {
        let millis = (value - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
        let millis = u64::try_from(millis).map_err(|_| {
            if millis < 0 {
                Self::Error::TimeBeforeEpoch
            } else {
                Self::Error::TimestampTooLarge
            }
        })?;

        Self::new(millis).ok_or(Self::Error::TimestampTooLarge)
    }
}

impl<SnowflakeEpoch: Epoch> From<SnowflakeTimestamp<SnowflakeEpoch>> for UtcDateTime {
    fn from(value: SnowflakeTimestamp<SnowflakeEpoch>) -> Self {
        // 42 bits always fit into an i64.
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(value.0.cast_signed())
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn from_parts(
        timestamp: SnowflakeTimestamp<SnowflakeEpoch>,
        worker_id: WorkerId,
        process_id: ProcessId,
        increment: SnowflakeIncrement,
    ) -> Self {
        let snowflake = timestamp.get() << TIMESTAMP_OFFSET
            | u64::from(worker_id.get()) << WORKER_ID_OFFSET
            | u64::from(process_id.get()) << PROCESS_ID_OFFSET
            | u64::from(increment.get()) << INCREMENT_OFFSET;

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    fn part(self, offset: u32, length: u32) -> u64 {
        (self.0 >> offset) & mask(length)
    }

    #[must_use]
    pub fn timestamp(self) -> SnowflakeTimestamp<SnowflakeEpoch> {
        SnowflakeTimestamp(self.part(TIMESTAMP_OFFSET, TIMESTAMP_LENGTH), PhantomData)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn worker_id(self) -> WorkerId {
        WorkerId(self.part(WORKER_ID_OFFSET, WORKER_ID_LENGTH) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn process_id(self) -> ProcessId {
        ProcessId(self.part(PROCESS_ID_OFFSET, PROCESS_ID_LENGTH) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn increment(self) -> SnowflakeIncrement {
        SnowflakeIncrement(self.part(INCREMENT_OFFSET, INCREMENT_LENGTH) as u16)
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    next_increment: SnowflakeIncrement,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch: Epoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            next_increment: SnowflakeIncrement::default(),
            phantom_data: PhantomData,
        }
    }

    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampFromDateTimeError> {
        let timestamp = SnowflakeTimestamp::try_from(time)?;
        let increment = self.next_increment;
        self.next_increment.increment();

        Ok(Snowflake::from_parts(
            timestamp,
            self.worker_id,
            self.process_id,
            increment,
        ))
    }

    pub fn generate(
        &mut self,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampFromDateTimeError> {
        self.generate_at(UtcDateTime::now())
    }
}
