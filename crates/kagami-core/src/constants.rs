/// Upper bound on occurrence-sequence walks over a potentially unbounded
/// series. Guarantees termination of the series-span scan.
pub const MAX_OCCURRENCES: usize = 999;

/// Separator between the absolute-duration prefix and the body of a stored
/// legacy series pattern (`"<days>~<body>"`).
pub const DURATION_SEPARATOR: char = '~';

/// Separator between stored recurrence date positions in a legacy
/// exception-date column.
pub const DATE_POSITION_SEPARATOR: char = ',';
