//! Core model of the legacy series-pattern grammar.

use chrono::{DateTime, Utc, Weekday};

/// Pattern kind codes as stored in the `t` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Every `interval` days.
    Daily,
    /// Every `interval` weeks on the days in the weekday mask.
    Weekly,
    /// Every `interval` months on a fixed day of the month.
    MonthlyDate,
    /// Every `interval` years on a fixed day of a fixed month.
    YearlyDate,
    /// Every `interval` months on the n-th weekday (5 = last).
    MonthlyWeekday,
    /// Every `interval` years on the n-th weekday of a fixed month.
    YearlyWeekday,
}

impl PatternKind {
    /// Resolves a stored `t` code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Daily),
            2 => Some(Self::Weekly),
            3 => Some(Self::MonthlyDate),
            4 => Some(Self::YearlyDate),
            5 => Some(Self::MonthlyWeekday),
            6 => Some(Self::YearlyWeekday),
            _ => None,
        }
    }

    /// The stored `t` code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 2,
            Self::MonthlyDate => 3,
            Self::YearlyDate => 4,
            Self::MonthlyWeekday => 5,
            Self::YearlyWeekday => 6,
        }
    }

    /// Whether the kind addresses occurrences by weekday.
    #[must_use]
    pub const fn is_weekday_based(self) -> bool {
        matches!(self, Self::Weekly | Self::MonthlyWeekday | Self::YearlyWeekday)
    }

    /// Whether the kind is bound to a fixed month.
    #[must_use]
    pub const fn is_yearly(self) -> bool {
        matches!(self, Self::YearlyDate | Self::YearlyWeekday)
    }
}

/// Bitmask of weekdays as stored in the `a` field.
///
/// Bit values: SU=1, MO=2, TU=4, WE=8, TH=16, FR=32, SA=64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeekdayMask(u8);

impl WeekdayMask {
    pub const EMPTY: Self = Self(0);
    const ALL: u8 = 0x7f;

    /// Builds a mask from stored bits. Bits outside the seven weekday bits
    /// are rejected.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    const fn bit_for(weekday: Weekday) -> u8 {
        match weekday {
            Weekday::Sun => 1,
            Weekday::Mon => 2,
            Weekday::Tue => 4,
            Weekday::Wed => 8,
            Weekday::Thu => 16,
            Weekday::Fri => 32,
            Weekday::Sat => 64,
        }
    }

    #[must_use]
    pub const fn contains(self, weekday: Weekday) -> bool {
        self.0 & Self::bit_for(weekday) != 0
    }

    #[must_use]
    pub const fn with(self, weekday: Weekday) -> Self {
        Self(self.0 | Self::bit_for(weekday))
    }

    /// Weekdays in the mask, Sunday first (storage bit order).
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        [
            Weekday::Sun,
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
        ]
        .into_iter()
        .filter(move |weekday| self.contains(*weekday))
    }

    /// Number of weekdays set.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// The single weekday in the mask, if exactly one bit is set.
    #[must_use]
    pub fn single(self) -> Option<Weekday> {
        if self.len() == 1 {
            self.iter().next()
        } else {
            None
        }
    }
}

impl FromIterator<Weekday> for WeekdayMask {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// How the series ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesEnd {
    /// Effectively infinite series.
    #[default]
    Never,
    /// Fixed number of occurrences (`o` field).
    Count(u32),
    /// Last instant an occurrence may start at (`e` field, UTC).
    Until(DateTime<Utc>),
}

/// Parsed legacy series pattern (the body of the stored column, without the
/// absolute-duration prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesPattern {
    pub kind: PatternKind,
    /// Recurrence interval, at least 1.
    pub interval: u32,
    /// Weekday mask for weekday-based kinds.
    pub weekdays: WeekdayMask,
    /// Day of month for date-based monthly/yearly kinds.
    pub day_of_month: Option<u8>,
    /// Weekday ordinal 1..=5 for weekday-based monthly/yearly kinds, 5 = last.
    pub ordinal: Option<u8>,
    /// Month 1..=12 for yearly kinds.
    pub month: Option<u8>,
    pub end: SeriesEnd,
    /// Series start carried in the `s` field. Informational; tolerated on
    /// decode and re-emitted on encode.
    pub series_start: Option<DateTime<Utc>>,
}

impl SeriesPattern {
    /// A daily pattern with the given interval, the smallest valid pattern.
    #[must_use]
    pub const fn daily(interval: u32) -> Self {
        Self {
            kind: PatternKind::Daily,
            interval,
            weekdays: WeekdayMask::EMPTY,
            day_of_month: None,
            ordinal: None,
            month: None,
            end: SeriesEnd::Never,
            series_start: None,
        }
    }
}
