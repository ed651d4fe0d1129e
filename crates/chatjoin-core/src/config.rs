use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Defaults applied to `/joinchats` arguments that are not given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinDefaults {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub limit: u32,
    /// Rate-limit retries allowed per candidate before it is reported as failed.
    pub max_flood_retries: u32,
}

impl Default for JoinDefaults {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(60),
            limit: 10,
            max_flood_retries: 5,
        }
    }
}

/// Typed configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_allowed_users: Vec<i64>,
    pub telegram_safe_limit: usize,

    // Join sessions
    pub chats_file: PathBuf,
    pub join_defaults: JoinDefaults,

    // Chat bridge (user-account side)
    pub bridge_url: String,
    pub bridge_token: Option<String>,
    pub bridge_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        if telegram_allowed_users.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_ALLOWED_USERS environment variable is required".to_string(),
            ));
        }

        let telegram_safe_limit = env_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000);

        let chats_file = env_str("CHATS_FILE")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("chats_list.txt"));

        let base = JoinDefaults::default();
        let min_interval = env_u64("JOIN_MIN_INTERVAL")
            .map(Duration::from_secs)
            .unwrap_or(base.min_interval);
        let max_interval = env_u64("JOIN_MAX_INTERVAL")
            .map(Duration::from_secs)
            .unwrap_or(base.max_interval);
        let join_defaults = JoinDefaults {
            min_interval: min_interval.min(max_interval),
            max_interval: min_interval.max(max_interval),
            limit: env_u32("JOIN_LIMIT").unwrap_or(base.limit),
            max_flood_retries: env_u32("JOIN_MAX_FLOOD_RETRIES").unwrap_or(base.max_flood_retries),
        };

        let bridge_url = env_str("CHAT_BRIDGE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "http://127.0.0.1:8081".to_string())
            .trim_end_matches('/')
            .to_string();
        if !(bridge_url.starts_with("http://") || bridge_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "CHAT_BRIDGE_URL must be an http(s) URL, got {bridge_url}"
            )));
        }
        let bridge_token = env_str("CHAT_BRIDGE_TOKEN").and_then(non_empty);
        let bridge_timeout =
            Duration::from_millis(env_u64("CHAT_BRIDGE_TIMEOUT_MS").unwrap_or(30_000));

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            telegram_safe_limit,
            chats_file,
            join_defaults,
            bridge_url,
            bridge_token,
            bridge_timeout,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_strips_quotes_and_comments() {
        let parsed = parse_dotenv(
            "# comment\nCHATS_FILE=\"lists/chats.txt\"\n\nJOIN_LIMIT = 5\nBROKEN\n=nokey\nTOKEN='a=b'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("CHATS_FILE".to_string(), "lists/chats.txt".to_string()),
                ("JOIN_LIMIT".to_string(), "5".to_string()),
                ("TOKEN".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn csv_user_ids_skip_garbage() {
        assert_eq!(
            parse_csv_i64(Some(" 1, x ,,-42".to_string())),
            vec![1, -42]
        );
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn join_defaults_match_command_defaults() {
        let d = JoinDefaults::default();
        assert_eq!(d.min_interval, Duration::from_secs(30));
        assert_eq!(d.max_interval, Duration::from_secs(60));
        assert_eq!(d.limit, 10);
    }
}
