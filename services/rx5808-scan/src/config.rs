//! Configuration loaded from environment variables

use std::time::Duration;

use crate::error::{Error, Result};
use crate::rx5808::{Band, RssiInput, SamplerTiming, TunerTiming, MAX_ENCODABLE_MHZ};
use crate::transport::Emitter;

/// GPIO pin assignment of the RX5808 wiring (BCM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    pub cs: u8,
    pub mosi: u8,
    pub miso: u8,
    pub sck: u8,
    pub rssi: u8,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            cs: 8,
            mosi: 10,
            miso: 9,
            sck: 11,
            rssi: 7,
        }
    }
}

/// Receiver and scan configuration, immutable for the whole run
#[derive(Debug, Clone)]
pub struct Config {
    /// Scannable band in MHz
    pub band: Band,

    /// Sweep step in MHz
    pub step_mhz: u16,

    /// Averaged RSSI (percent) above which a step counts as a signal
    pub rssi_threshold: f64,

    /// Reads per averaged RSSI sample
    pub sample_count: u32,

    /// Pause between RSSI reads
    pub sample_delay: Duration,

    /// Pause between tuning register writes
    pub write_delay: Duration,

    /// Wait after the synthesizer enable
    pub settle_time: Duration,

    /// Monitor polling interval
    pub poll_interval: Duration,

    /// Monitor change threshold in percentage points
    pub change_sensitivity: f64,

    /// Pause between sweeps in continuous mode
    pub sweep_pause: Duration,

    /// RSSI source
    pub rssi_input: RssiInput,

    /// Pin roles
    pub pins: PinMap,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            band: Band::default(),
            step_mhz: 1,
            rssi_threshold: 50.0,
            sample_count: 10,
            sample_delay: Duration::from_millis(10),
            write_delay: Duration::from_millis(10),
            settle_time: Duration::from_millis(50),
            poll_interval: Duration::from_millis(100),
            change_sensitivity: 5.0,
            sweep_pause: Duration::from_secs(5),
            rssi_input: RssiInput::default(),
            pins: PinMap::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_or(key, default.as_millis() as u64))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let pins = PinMap {
            cs: env_or("CS_PIN", defaults.pins.cs),
            mosi: env_or("MOSI_PIN", defaults.pins.mosi),
            miso: env_or("MISO_PIN", defaults.pins.miso),
            sck: env_or("SCK_PIN", defaults.pins.sck),
            rssi: env_or("RSSI_PIN", defaults.pins.rssi),
        };

        let rssi_input = match std::env::var("RSSI_INPUT").as_deref() {
            Ok("analog") | Ok("adc") => RssiInput::Analog {
                bits: env_or("RSSI_ADC_BITS", 8),
            },
            _ => RssiInput::Digital { pin: pins.rssi },
        };

        Self {
            band: Band::new(
                env_or("FREQ_MIN", defaults.band.min),
                env_or("FREQ_MAX", defaults.band.max),
            ),
            step_mhz: env_or("FREQ_STEP", defaults.step_mhz),
            rssi_threshold: env_or("RSSI_THRESHOLD", defaults.rssi_threshold),
            sample_count: env_or("RSSI_SAMPLES", defaults.sample_count),
            sample_delay: env_millis("SAMPLE_DELAY_MS", defaults.sample_delay),
            write_delay: env_millis("WRITE_DELAY_MS", defaults.write_delay),
            settle_time: env_millis("SETTLE_MS", defaults.settle_time),
            poll_interval: env_millis("POLL_INTERVAL_MS", defaults.poll_interval),
            change_sensitivity: env_or("CHANGE_SENSITIVITY", defaults.change_sensitivity),
            sweep_pause: env_millis("SWEEP_PAUSE_MS", defaults.sweep_pause),
            rssi_input,
            pins,
        }
    }

    /// Reject configurations the receiver cannot run with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Configuration(msg));

        if self.band.min > self.band.max {
            return fail(format!("band minimum {} above maximum {}", self.band.min, self.band.max));
        }
        if self.band.min <= 479 {
            return fail(format!("band minimum {} MHz at or below the 479 MHz IF offset", self.band.min));
        }
        if self.band.max > MAX_ENCODABLE_MHZ {
            return fail(format!(
                "band maximum {} MHz exceeds encodable {} MHz",
                self.band.max, MAX_ENCODABLE_MHZ
            ));
        }
        if self.step_mhz == 0 {
            return fail("scan step must be at least 1 MHz".to_string());
        }
        if !(0.0..=100.0).contains(&self.rssi_threshold) {
            return fail(format!("RSSI threshold {} outside 0-100", self.rssi_threshold));
        }
        if !(0.0..=100.0).contains(&self.change_sensitivity) {
            return fail(format!("change sensitivity {} outside 0-100", self.change_sensitivity));
        }
        if self.sample_count == 0 {
            return fail("sample count must be at least 1".to_string());
        }
        if let RssiInput::Analog { bits } = self.rssi_input {
            if !(1..=16).contains(&bits) {
                return fail(format!("ADC resolution {} bits outside 1-16", bits));
            }
        }
        Ok(())
    }

    pub fn tuner_timing(&self) -> TunerTiming {
        TunerTiming {
            write_delay: self.write_delay,
            settle_time: self.settle_time,
        }
    }

    pub fn sampler_timing(&self) -> SamplerTiming {
        SamplerTiming {
            sample_delay: self.sample_delay,
        }
    }
}

/// What the binary does once the receiver is up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One sweep over the band
    Full,
    /// Sweep the band until interrupted
    Continuous,
    /// One sweep over `start..=end`
    Range { start: u16, end: u16 },
    /// Watch one frequency, `secs` 0 = until interrupted
    Monitor { frequency: u16, secs: u64 },
    /// Tune once and read the RSSI
    Probe { frequency: u16 },
}

/// Per-invocation options of the binary
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Print detections and sweep summaries as JSON lines
    pub json: bool,
    /// Emitters for the simulated transport
    pub emitters: Vec<Emitter>,
}

impl RunOptions {
    /// Load run options from environment variables
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::from_lookup(config, |key| std::env::var(key).ok())
    }

    /// Build run options from any key/value source
    pub fn from_lookup<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };
        let freq = |key: &str, default: u16| -> u16 {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };

        let band = config.band;
        let mode = match lookup("SCAN_MODE").as_deref().unwrap_or("full") {
            "full" => RunMode::Full,
            "continuous" => RunMode::Continuous,
            "range" => RunMode::Range {
                start: freq("SCAN_START", band.min),
                end: freq("SCAN_END", band.max),
            },
            "monitor" => RunMode::Monitor {
                frequency: freq("MONITOR_FREQ", 5800),
                secs: get("MONITOR_SECS", 0),
            },
            "probe" => RunMode::Probe {
                frequency: freq("PROBE_FREQ", 5800),
            },
            other => {
                return Err(Error::Configuration(format!("unknown SCAN_MODE '{}'", other)));
            }
        };

        let emitters = match lookup("SIM_SIGNALS") {
            Some(list) => parse_emitters(&list)?,
            None => vec![Emitter::new(5800, 90.0).with_width(3)],
        };

        Ok(Self {
            mode,
            json: matches!(lookup("OUTPUT_JSON").as_deref(), Some("1") | Some("true")),
            emitters,
        })
    }
}

/// Parse a comma-separated `freq:strength[:width]` list
pub fn parse_emitters(list: &str) -> Result<Vec<Emitter>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Emitter>().map_err(Error::Configuration))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.band, Band::new(5725, 6000));
        assert_eq!(config.rssi_threshold, 50.0);
        assert_eq!(config.sample_count, 10);
        assert_eq!(config.pins.rssi, 7);
    }

    #[test]
    fn test_inverted_band_rejected() {
        let config = Config {
            band: Band::new(6000, 5725),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unencodable_band_rejected() {
        let low = Config {
            band: Band::new(400, 6000),
            ..Config::default()
        };
        assert!(low.validate().is_err());

        let high = Config {
            band: Band::new(5725, 9000),
            ..Config::default()
        };
        assert!(high.validate().is_err());
    }

    #[test]
    fn test_threshold_and_counts_rejected() {
        let bad_threshold = Config {
            rssi_threshold: 120.0,
            ..Config::default()
        };
        assert!(bad_threshold.validate().is_err());

        let zero_step = Config {
            step_mhz: 0,
            ..Config::default()
        };
        assert!(zero_step.validate().is_err());

        let zero_samples = Config {
            sample_count: 0,
            ..Config::default()
        };
        assert!(zero_samples.validate().is_err());

        let bad_adc = Config {
            rssi_input: RssiInput::Analog { bits: 24 },
            ..Config::default()
        };
        assert!(bad_adc.validate().is_err());
    }

    #[test]
    fn test_parse_emitters() {
        let emitters = parse_emitters("5800:90:3, 5865:70").unwrap();
        assert_eq!(emitters.len(), 2);
        assert_eq!(emitters[1].frequency, 5865);
        assert!(parse_emitters("5800:x").is_err());
        assert!(parse_emitters("").unwrap().is_empty());
    }

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_run_options_defaults() {
        let options = RunOptions::from_lookup(&Config::default(), lookup(&[])).unwrap();
        assert_eq!(options.mode, RunMode::Full);
        assert!(!options.json);
        assert_eq!(options.emitters.len(), 1);
        assert_eq!(options.emitters[0].frequency, 5800);
    }

    #[test]
    fn test_run_options_modes() {
        let config = Config::default();

        let probe_vars = [("SCAN_MODE", "probe"), ("PROBE_FREQ", "5865")];
        let probe = RunOptions::from_lookup(&config, lookup(&probe_vars)).unwrap();
        assert_eq!(probe.mode, RunMode::Probe { frequency: 5865 });

        let range_vars = [("SCAN_MODE", "range"), ("SCAN_START", "5800")];
        let range = RunOptions::from_lookup(&config, lookup(&range_vars)).unwrap();
        assert_eq!(range.mode, RunMode::Range { start: 5800, end: 6000 });

        let monitor = RunOptions::from_lookup(
            &config,
            lookup(&[
                ("SCAN_MODE", "monitor"),
                ("MONITOR_FREQ", "5745"),
                ("MONITOR_SECS", "30"),
                ("OUTPUT_JSON", "1"),
                ("SIM_SIGNALS", "5745:80"),
            ]),
        )
        .unwrap();
        assert_eq!(monitor.mode, RunMode::Monitor { frequency: 5745, secs: 30 });
        assert!(monitor.json);
        assert_eq!(monitor.emitters, vec![Emitter::new(5745, 80.0)]);
    }

    #[test]
    fn test_run_options_rejects_unknown_mode() {
        let result = RunOptions::from_lookup(&Config::default(), lookup(&[("SCAN_MODE", "sniff")]));
        assert!(matches!(result, Err(Error::Configuration(_))));

        let result = RunOptions::from_lookup(&Config::default(), lookup(&[("SIM_SIGNALS", "bogus")]));
        assert!(result.is_err());
    }
}
