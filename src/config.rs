use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{EventError, EventResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Name used in log lines and listener error labels.
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// Warn when a single listener call takes longer than this. Microseconds in JSON.
    #[serde(default, with = "option_duration_us")]
    pub slow_listener_threshold: Option<Duration>,

    /// Report listener panics as `EventError::ListenerFailure` instead of
    /// unwinding through `dispatch`.
    #[serde(default)]
    pub catch_panics: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            label: None,
            initial_capacity: default_initial_capacity(),
            slow_listener_threshold: None,
            catch_panics: false,
        }
    }
}

impl BusConfig {
    // JSONファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> EventResult<Self> {
        let file = File::open(path).map_err(|e| EventError::Config {
            message: format!("Failed to open config file: {}", e),
        })?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| EventError::Config {
            message: format!("Failed to parse config file: {}", e),
        })
    }

    pub fn from_str(s: &str) -> EventResult<Self> {
        serde_json::from_str(s).map_err(|e| EventError::Config {
            message: format!("Failed to parse config: {}", e),
        })
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_LABEL)
    }
}

pub const DEFAULT_LABEL: &str = "event_bus";

fn default_initial_capacity() -> usize {
    4
}

// Option<Duration> をマイクロ秒で表現する
pub mod option_duration_us {
    use serde::{ser, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => {
                let micros = u64::try_from(d.as_micros()).map_err(|_| {
                    <S::Error as ser::Error>::custom(format!(
                        "duration {:?} does not fit in u64 microseconds",
                        d
                    ))
                })?;
                serializer.serialize_some(&micros)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = Option::<u64>::deserialize(deserializer)?;
        Ok(micros.map(Duration::from_micros))
    }
}
