//! Monitor configuration
//!
//! Parses the sectioned `key = value` file the monitor is started with:
//!
//! ```ini
//! [main]
//! poll = 60
//! port = /dev/ttyUSB0
//!
//! [radmon.org]
//! user = someone
//! password = secret
//!
//! [influxdb]
//! url = http://localhost:8086
//! database = radiation
//!
//! [watchdog]
//! interval = 300
//! ```
//!
//! Format rules:
//! - `[section]` headers; keys before the first header belong to section `""`
//! - `=` or `:` separates key and value; surrounding whitespace is trimmed
//! - values wrapped in matching `"` or `` ` `` quotes are unwrapped
//! - `#` and `;` start comment lines
//! - a repeated key overrides the earlier value

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    /// A line that is neither a section, a setting nor a comment
    #[error("Line {line}: {message}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// A setting that does not parse as its type
    #[error("Invalid value for [{section}] {key}: {value:?}")]
    InvalidValue {
        /// Section name
        section: String,
        /// Setting name
        key: String,
        /// Raw value from the file
        value: String,
    },

    /// A required setting is absent
    #[error("Missing required setting [{section}] {key}")]
    Missing {
        /// Section name
        section: String,
        /// Setting name
        key: String,
    },
}

/// A parsed INI file
#[derive(Debug, Clone, Default)]
pub struct IniFile {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl IniFile {
    /// Parse INI content from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut ini = IniFile::default();
        let mut section = String::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| ConfigError::Syntax {
                    line: idx + 1,
                    message: format!("unterminated section header {:?}", line),
                })?;
                section = name.trim().to_string();
                ini.sections.entry(section.clone()).or_default();
                continue;
            }

            let split = line.find(['=', ':']).ok_or_else(|| ConfigError::Syntax {
                line: idx + 1,
                message: format!("expected key = value, got {:?}", line),
            })?;
            let key = line[..split].trim();
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line: idx + 1,
                    message: "empty key".to_string(),
                });
            }
            let value = unquote(line[split + 1..].trim());

            ini.set(&section, key, value);
        }

        Ok(ini)
    }

    /// Load an INI file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Set a value
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Get a raw value
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    /// Get a value or an empty string
    pub fn get_string(&self, section: &str, key: &str) -> String {
        self.get(section, key).unwrap_or_default().to_string()
    }

    /// Parse a value, falling back to `default` when absent or empty
    pub fn get_parsed<T: FromStr>(
        &self,
        section: &str,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.get(section, key) {
            None | Some("") => Ok(default),
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                value: v.to_string(),
            }),
        }
    }

    /// Section names in sorted order
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '`'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Serial link settings (`[main]`)
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Serial device path
    pub port: String,
    /// Line speed; GMC units default to 115200
    pub baud_rate: u32,
    /// Response deadline per command
    pub timeout: Duration,
}

/// radmon.org credentials (`[radmon.org]`)
#[derive(Debug, Clone, PartialEq)]
pub struct RadmonConfig {
    /// Station user name
    pub user: String,
    /// Station password, sent in the query string
    pub password: String,
}

/// InfluxDB 1.x endpoint (`[influxdb]`)
#[derive(Debug, Clone, PartialEq)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://localhost:8086`
    pub url: String,
    /// Basic-auth user; empty for none
    pub username: String,
    /// Basic-auth password
    pub password: String,
    /// Target database
    pub database: String,
}

/// Complete monitor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Interval between polls
    pub poll_interval: Duration,
    /// Serial link
    pub device: DeviceConfig,
    /// `None` when no radmon.org user is configured
    pub radmon: Option<RadmonConfig>,
    /// `None` when no InfluxDB URL is configured
    pub influx: Option<InfluxConfig>,
    /// `None` when the watchdog is disabled (interval 0)
    pub watchdog_interval: Option<Duration>,
}

impl MonitorConfig {
    /// Default poll interval in seconds
    pub const DEFAULT_POLL_SECS: u64 = 60;
    /// Default watchdog interval in seconds
    pub const DEFAULT_WATCHDOG_SECS: u64 = 300;
    /// Default serial device
    pub const DEFAULT_PORT: &'static str = "/dev/ttyUSB0";

    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_ini(&IniFile::load(path)?)
    }

    /// Build typed settings from a parsed file
    pub fn from_ini(ini: &IniFile) -> Result<Self, ConfigError> {
        let poll: u64 = ini.get_parsed("main", "poll", Self::DEFAULT_POLL_SECS)?;
        if poll == 0 {
            return Err(ConfigError::InvalidValue {
                section: "main".into(),
                key: "poll".into(),
                value: "0".into(),
            });
        }

        let port = match ini.get("main", "port") {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => Self::DEFAULT_PORT.to_string(),
        };
        let device = DeviceConfig {
            port,
            baud_rate: ini.get_parsed("main", "baud", DEFAULT_BAUD_RATE)?,
            timeout: Duration::from_millis(ini.get_parsed(
                "main",
                "timeout_ms",
                DEFAULT_TIMEOUT_MS,
            )?),
        };

        let user = ini.get_string("radmon.org", "user");
        let radmon = (!user.is_empty()).then(|| RadmonConfig {
            user,
            password: ini.get_string("radmon.org", "password"),
        });

        let url = ini.get_string("influxdb", "url");
        let influx = if url.is_empty() {
            None
        } else {
            let database = ini.get_string("influxdb", "database");
            if database.is_empty() {
                return Err(ConfigError::Missing {
                    section: "influxdb".into(),
                    key: "database".into(),
                });
            }
            Some(InfluxConfig {
                url,
                username: ini.get_string("influxdb", "username"),
                password: ini.get_string("influxdb", "password"),
                database,
            })
        };

        let watchdog: u64 = ini.get_parsed("watchdog", "interval", Self::DEFAULT_WATCHDOG_SECS)?;

        Ok(Self {
            poll_interval: Duration::from_secs(poll),
            device,
            radmon,
            influx,
            watchdog_interval: (watchdog > 0).then(|| Duration::from_secs(watchdog)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_parsing() {
        let ini = IniFile::parse(
            "; top comment\n\
             [main]\n\
             poll = 30\n\
             port: /dev/ttyUSB1\n\
             \n\
             # another comment\n\
             [radmon.org]\n\
             user = \"alice\"\n\
             password = `p=a;ss`\n",
        )
        .unwrap();

        assert_eq!(ini.get("main", "poll"), Some("30"));
        assert_eq!(ini.get("main", "port"), Some("/dev/ttyUSB1"));
        assert_eq!(ini.get("radmon.org", "user"), Some("alice"));
        assert_eq!(ini.get("radmon.org", "password"), Some("p=a;ss"));
        assert_eq!(ini.get("radmon.org", "missing"), None);
        assert_eq!(ini.sections().collect::<Vec<_>>(), vec!["main", "radmon.org"]);
    }

    #[test]
    fn test_value_keeps_later_separators() {
        let ini = IniFile::parse("[influxdb]\nurl = http://db:8086/\n").unwrap();
        assert_eq!(ini.get("influxdb", "url"), Some("http://db:8086/"));
    }

    #[test]
    fn test_duplicate_overrides() {
        let ini = IniFile::parse("[main]\npoll=10\npoll=20\n").unwrap();
        assert_eq!(ini.get("main", "poll"), Some("20"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            IniFile::parse("[main\n"),
            Err(ConfigError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            IniFile::parse("[main]\njustakey\n"),
            Err(ConfigError::Syntax { line: 2, .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::from_ini(&IniFile::default()).unwrap();
        assert_eq!(
            config,
            MonitorConfig {
                poll_interval: Duration::from_secs(60),
                device: DeviceConfig {
                    port: "/dev/ttyUSB0".into(),
                    baud_rate: 115200,
                    timeout: Duration::from_millis(2000),
                },
                radmon: None,
                influx: None,
                watchdog_interval: Some(Duration::from_secs(300)),
            }
        );
    }

    #[test]
    fn test_full_config() {
        let ini = IniFile::parse(
            "[main]\npoll=15\nbaud=57600\n\
             [radmon.org]\nuser=bob\npassword=pw\n\
             [influxdb]\nurl=http://localhost:8086\nusername=u\npassword=p\ndatabase=rad\n\
             [watchdog]\ninterval=0\n",
        )
        .unwrap();
        let config = MonitorConfig::from_ini(&ini).unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.device.baud_rate, 57600);
        assert_eq!(
            config.radmon,
            Some(RadmonConfig {
                user: "bob".into(),
                password: "pw".into()
            })
        );
        assert_eq!(config.influx.as_ref().map(|i| i.database.as_str()), Some("rad"));
        assert_eq!(config.watchdog_interval, None);
    }

    #[test]
    fn test_invalid_values() {
        let bad_poll = IniFile::parse("[main]\npoll=soon\n").unwrap();
        assert!(matches!(
            MonitorConfig::from_ini(&bad_poll),
            Err(ConfigError::InvalidValue { .. })
        ));

        let zero_poll = IniFile::parse("[main]\npoll=0\n").unwrap();
        assert!(MonitorConfig::from_ini(&zero_poll).is_err());

        let no_db = IniFile::parse("[influxdb]\nurl=http://localhost:8086\n").unwrap();
        assert!(matches!(
            MonitorConfig::from_ini(&no_db),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_example_config() {
        let ini = IniFile::parse(include_str!("../../../config.example.ini")).unwrap();
        let config = MonitorConfig::from_ini(&ini).unwrap();
        assert_eq!(config.radmon, None);
        assert_eq!(
            config.influx,
            Some(InfluxConfig {
                url: "http://localhost:8086".into(),
                username: String::new(),
                password: String::new(),
                database: "radiation".into(),
            })
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gqgmc.ini");
        fs::write(&path, "[main]\npoll = 5\n").unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(5));

        assert!(matches!(
            MonitorConfig::load(dir.path().join("absent.ini")),
            Err(ConfigError::Io(_))
        ));
    }
}
