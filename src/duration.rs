//! Jira-style duration strings (`1w 2d 4h 30m`) and their value in minutes.
//!
//! Jira counts a day as 8 hours and a week as 5 days, regardless of the
//! calendar, so `1w` is 2400 minutes.

const MINUTE: u64 = 1;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 8 * HOUR;
const WEEK: u64 = 5 * DAY;

fn unit_minutes(unit: char) -> Option<u64> {
  match unit {
    'w' => Some(WEEK),
    'd' => Some(DAY),
    'h' => Some(HOUR),
    'm' => Some(MINUTE),
    _ => None,
  }
}

/// Parse one `<digits><unit>` token.
fn parse_token(token: &str) -> Option<u64> {
  let unit = token.chars().last()?;
  let multiplier = unit_minutes(unit)?;
  let digits = &token[..token.len() - unit.len_utf8()];
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  digits.parse::<u64>().ok()?.checked_mul(multiplier)
}

/// Total minutes in a duration string.
///
/// Tokens that don't match `<digits><w|d|h|m>` are skipped, so garbage input
/// yields 0 rather than an error.
pub fn parse(text: &str) -> u64 {
  text
    .split_whitespace()
    .filter_map(parse_token)
    .fold(0, u64::saturating_add)
}

/// Canonical duration string for `minutes`, largest unit first.
pub fn format(minutes: u64) -> String {
  let mut rest = minutes;
  let mut parts = Vec::with_capacity(4);

  for (size, unit) in [(WEEK, 'w'), (DAY, 'd'), (HOUR, 'h'), (MINUTE, 'm')] {
    let count = rest / size;
    rest %= size;
    if count > 0 {
      parts.push(format!("{}{}", count, unit));
    }
  }

  parts.join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_all_units() {
    assert_eq!(parse("1w 2d 4h 30m"), 2400 + 2 * 480 + 4 * 60 + 30);
  }

  #[test]
  fn test_parse_single_units() {
    assert_eq!(parse("1w"), 2400);
    assert_eq!(parse("1d"), 480);
    assert_eq!(parse("2h"), 120);
    assert_eq!(parse("45m"), 45);
  }

  #[test]
  fn test_parse_ignores_unknown_tokens() {
    assert_eq!(parse("1h junk 15m"), 75);
    assert_eq!(parse("1x 2h"), 120);
    assert_eq!(parse("h 3h"), 180);
    assert_eq!(parse("-1h 1h"), 60);
  }

  #[test]
  fn test_parse_empty_or_garbage_is_zero() {
    assert_eq!(parse(""), 0);
    assert_eq!(parse("   "), 0);
    assert_eq!(parse("soon"), 0);
  }

  #[test]
  fn test_parse_tolerates_extra_whitespace() {
    assert_eq!(parse("  1h   30m "), 90);
  }

  #[test]
  fn test_parse_sums_repeated_units() {
    assert_eq!(parse("1h 1h 90m"), 210);
  }

  #[test]
  fn test_format_examples() {
    assert_eq!(format(0), "");
    assert_eq!(format(90), "1h 30m");
    assert_eq!(format(2400), "1w");
    assert_eq!(format(2400 + 480 + 1), "1w 1d 1m");
  }

  #[test]
  fn test_format_normalizes_input() {
    assert_eq!(format(parse("90m")), "1h 30m");
    assert_eq!(format(parse("8h")), "1d");
  }

  #[test]
  fn test_format_then_parse_is_identity() {
    for minutes in (0..10_000).chain([59, 479, 2399, 123_456]) {
      assert_eq!(parse(&format(minutes)), minutes, "minutes = {}", minutes);
    }
  }
}
