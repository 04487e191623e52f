/*!
Archive schedule expressions.

Policies carry an optional cron-like schedule string deciding when the
external trigger should next invoke the archive job. Two forms are accepted:

- shorthand: `@hourly`, `@daily`, `@weekly`, `@monthly`
- interval: `every <n> <hours|days|weeks>` (e.g. `every 12 hours`)

`next_run` is interval-based (`after + interval`) rather than calendar
aligned; the engine only needs a monotonically advancing trigger instant.
*/

use crate::{RetainError, Result};
use chrono::{DateTime, Duration, Utc};

/// Parse a schedule expression into its interval.
fn interval(expr: &str) -> Result<Duration> {
    let expr = expr.trim();
    match expr {
        "@hourly" => return Ok(Duration::hours(1)),
        "@daily" => return Ok(Duration::days(1)),
        "@weekly" => return Ok(Duration::weeks(1)),
        "@monthly" => return Ok(Duration::days(30)),
        _ => {}
    }

    let parts: Vec<&str> = expr.split_whitespace().collect();
    if let ["every", n, unit] = parts.as_slice() {
        let n: i64 = n
            .parse()
            .map_err(|_| RetainError::validation(format!("invalid schedule count: {expr}")))?;
        if n <= 0 {
            return Err(RetainError::validation(format!(
                "schedule interval must be positive: {expr}"
            )));
        }
        let duration = match *unit {
            "hour" | "hours" => Duration::hours(n),
            "day" | "days" => Duration::days(n),
            "week" | "weeks" => Duration::weeks(n),
            _ => {
                return Err(RetainError::validation(format!(
                    "invalid schedule unit '{unit}' in: {expr}"
                )))
            }
        };
        return Ok(duration);
    }

    Err(RetainError::validation(format!(
        "unrecognized schedule expression: {expr}"
    )))
}

/// Validate a schedule expression without computing anything.
pub fn validate(expr: &str) -> Result<()> {
    interval(expr).map(|_| ())
}

/// Next trigger instant strictly after `after`.
pub fn next_run(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    Ok(after + interval(expr)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_shorthand_expressions() {
        assert_eq!(next_run("@hourly", at()).unwrap(), at() + Duration::hours(1));
        assert_eq!(next_run("@daily", at()).unwrap(), at() + Duration::days(1));
        assert_eq!(next_run("@weekly", at()).unwrap(), at() + Duration::weeks(1));
        assert_eq!(next_run("@monthly", at()).unwrap(), at() + Duration::days(30));
    }

    #[test]
    fn test_interval_expressions() {
        assert_eq!(
            next_run("every 12 hours", at()).unwrap(),
            at() + Duration::hours(12)
        );
        assert_eq!(
            next_run("every 1 day", at()).unwrap(),
            at() + Duration::days(1)
        );
        assert_eq!(
            next_run("every 2 weeks", at()).unwrap(),
            at() + Duration::weeks(2)
        );
    }

    #[test]
    fn test_invalid_expressions() {
        for expr in [
            "",
            "daily",
            "@yearly",
            "every day",
            "every 0 days",
            "every -3 days",
            "every 5 months",
            "every five days",
        ] {
            assert!(validate(expr).is_err(), "expected rejection of: {expr}");
        }
    }

    #[test]
    fn test_whitespace_tolerated() {
        assert!(validate("  @daily  ").is_ok());
        assert!(validate(" every  3   days ").is_ok());
    }
}
