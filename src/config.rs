// System
use std::{path::Path, time::Duration};

// Third Party
use clap::Parser;

/// Fraction digits beyond this many are below nanosecond precision for every unit and are ignored.
const MAX_FRACTION_DIGITS: usize = 19;

/// Nanoseconds per unit, for every unit accepted in a duration flag.
const DURATION_UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 60 * 60 * 1_000_000_000),
];

/// Routes Kubernetes events from the cluster's event resource to stdout.
#[derive(Parser, Debug, Clone)]
#[command(name = "eventrouter", version)]
pub struct Args {
    /// absolute path to the kubeconfig file, in-cluster configuration is used when empty
    #[arg(long, value_name = "PATH", default_value = "")]
    kubeconfig: String,

    /// default resync interval
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "30m",
        value_parser = parse_resync_interval
    )]
    pub resync_interval: Duration,

    /// how long to wait for background activities to stop once shutdown is requested
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "30s",
        value_parser = parse_duration
    )]
    pub shutdown_grace_period: Duration,
}

impl Args {
    /// The kubeconfig to load credentials from, or `None` for in-cluster discovery.
    pub fn kubeconfig(&self) -> Option<&Path> {
        (!self.kubeconfig.is_empty()).then(|| Path::new(self.kubeconfig.as_str()))
    }
}

/// Parses a duration written the way Go's `time.ParseDuration` accepts it, e.g. `30m`, `+1h15m`,
/// `1.5s` or `250ms`. A bare `0` is the only value allowed without a unit. Negative durations are
/// refused since no flag has a use for them.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let unsigned = match input.strip_prefix('-') {
        Some(magnitude) => {
            if parse_duration(magnitude)?.is_zero() {
                return Ok(Duration::ZERO);
            }
            return Err(format!("negative duration {:?}", input));
        }
        None => input.strip_prefix('+').unwrap_or(input),
    };
    if unsigned == "0" {
        return Ok(Duration::ZERO);
    }
    if unsigned.is_empty() {
        return Err(format!("invalid duration {:?}", input));
    }

    let mut nanos: u128 = 0;
    let mut rest = unsigned;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        if number.is_empty() || number == "." {
            return Err(format!("invalid duration {:?}", input));
        }
        if unit.is_empty() {
            return Err(format!("missing unit in duration {:?}", input));
        }
        let scale = DURATION_UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| format!("unknown unit {:?} in duration {:?}", unit, input))?;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        let invalid = |_| format!("invalid duration {:?}", input);
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(invalid)?
        };
        let mut value = whole
            .checked_mul(scale)
            .ok_or_else(|| format!("duration {:?} out of range", input))?;
        if !fraction.is_empty() {
            if !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("invalid duration {:?}", input));
            }
            let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
            let digits: u128 = fraction.parse().map_err(invalid)?;
            let denominator = u32::try_from(fraction.len())
                .ok()
                .and_then(|len| 10u128.checked_pow(len))
                .ok_or_else(|| format!("invalid duration {:?}", input))?;
            value += digits.saturating_mul(scale) / denominator;
        }

        nanos = nanos
            .checked_add(value)
            .ok_or_else(|| format!("duration {:?} out of range", input))?;
        rest = tail;
    }

    u64::try_from(nanos)
        .map(Duration::from_nanos)
        .map_err(|_| format!("duration {:?} out of range", input))
}

/// A resync interval of zero would spin the informer, so it is refused at startup.
pub fn parse_resync_interval(input: &str) -> Result<Duration, String> {
    let interval = parse_duration(input)?;
    if interval.is_zero() {
        return Err("resync interval must be greater than zero".to_string());
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    // System
    use std::{path::Path, time::Duration};

    // Third Party
    use clap::Parser;

    // Local
    use super::{parse_duration, parse_resync_interval, Args};

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_signs() {
        assert_eq!(parse_duration("+30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("+0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("-0s").unwrap(), Duration::ZERO);
        let error = parse_duration("-30m").unwrap_err();
        assert!(error.contains("negative"), "{}", error);
        assert!(parse_duration("+").is_err());
        assert!(parse_duration("+-1s").is_err());
    }

    #[test]
    fn test_parse_duration_long_fraction_is_truncated() {
        let input = format!("1.{}s", "5".repeat(60));
        assert_eq!(
            parse_duration(&input).unwrap(),
            Duration::from_nanos(1_555_555_555)
        );
    }

    #[test]
    fn test_parse_duration_rejects_malformed_input() {
        for input in ["", "30", "5x", "m", "1.2.3s", "s30"] {
            assert!(parse_duration(input).is_err(), "accepted {:?}", input);
        }
        let error = parse_duration("30").unwrap_err();
        assert!(error.contains("missing unit"), "{}", error);
    }

    #[test]
    fn test_zero_resync_interval_is_rejected() {
        assert!(parse_resync_interval("0").is_err());
        assert!(parse_resync_interval("0s").is_err());
        assert_eq!(
            parse_resync_interval("1m").unwrap(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_default_flags() {
        let args = Args::try_parse_from(["eventrouter"]).unwrap();
        assert_eq!(args.kubeconfig(), None);
        assert_eq!(args.resync_interval, Duration::from_secs(30 * 60));
        assert_eq!(args.shutdown_grace_period, Duration::from_secs(30));
    }

    #[test]
    fn test_explicit_flags() {
        let args = Args::try_parse_from([
            "eventrouter",
            "--kubeconfig",
            "/etc/kubernetes/admin.conf",
            "--resync-interval",
            "1m",
            "--shutdown-grace-period",
            "5s",
        ])
        .unwrap();
        assert_eq!(
            args.kubeconfig(),
            Some(Path::new("/etc/kubernetes/admin.conf"))
        );
        assert_eq!(args.resync_interval, Duration::from_secs(60));
        assert_eq!(args.shutdown_grace_period, Duration::from_secs(5));
    }

    #[test]
    fn test_empty_kubeconfig_means_in_cluster() {
        let args = Args::try_parse_from(["eventrouter", "--kubeconfig", ""]).unwrap();
        assert_eq!(args.kubeconfig(), None);
    }

    #[test]
    fn test_invalid_resync_interval_is_a_usage_error() {
        assert!(Args::try_parse_from(["eventrouter", "--resync-interval", "0"]).is_err());
        assert!(Args::try_parse_from(["eventrouter", "--resync-interval", "soon"]).is_err());
    }
}
