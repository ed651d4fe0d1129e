//! `/joinchats` argument parsing.

use std::time::Duration;

use crate::{config::JoinDefaults, errors::Error, Result};

pub const JOIN_USAGE: &str =
    "/joinchats [min_interval] [max_interval] [limit]  or  /joinchats [interval] [limit]";

/// Settings of one join session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinSettings {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub limit: u32,
    pub max_flood_retries: u32,
}

impl JoinSettings {
    /// Build settings, swapping the interval bounds if given in reverse order.
    pub fn new(min_interval: Duration, max_interval: Duration, limit: u32) -> Self {
        Self {
            min_interval: min_interval.min(max_interval),
            max_interval: min_interval.max(max_interval),
            limit,
            max_flood_retries: JoinDefaults::default().max_flood_retries,
        }
    }

    pub fn with_max_flood_retries(mut self, retries: u32) -> Self {
        self.max_flood_retries = retries;
        self
    }
}

impl From<JoinDefaults> for JoinSettings {
    fn from(d: JoinDefaults) -> Self {
        Self::new(d.min_interval, d.max_interval, d.limit).with_max_flood_retries(d.max_flood_retries)
    }
}

/// Parse whitespace separated `/joinchats` arguments.
///
/// - no args: defaults
/// - `interval`: fixed pacing
/// - `interval limit`: legacy form, fixed pacing
/// - `min max limit`: randomized pacing
pub fn parse_join_args(args: &str, defaults: &JoinDefaults) -> Result<JoinSettings> {
    let nums = args
        .split_whitespace()
        .map(|a| {
            a.parse::<u64>()
                .map_err(|_| Error::InvalidArguments(format!("not a non-negative integer: {a}")))
        })
        .collect::<Result<Vec<u64>>>()?;

    let base = JoinSettings::from(*defaults);
    let settings = match nums.as_slice() {
        [] => base,
        [interval] => {
            let d = Duration::from_secs(*interval);
            JoinSettings::new(d, d, base.limit)
        }
        [interval, limit] => {
            let d = Duration::from_secs(*interval);
            JoinSettings::new(d, d, to_limit(*limit)?)
        }
        [min, max, limit] => JoinSettings::new(
            Duration::from_secs(*min),
            Duration::from_secs(*max),
            to_limit(*limit)?,
        ),
        _ => {
            return Err(Error::InvalidArguments(format!(
                "expected at most 3 arguments, got {}",
                nums.len()
            )))
        }
    };

    Ok(settings.with_max_flood_retries(defaults.max_flood_retries))
}

fn to_limit(v: u64) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::InvalidArguments(format!("limit too large: {v}")))
}
