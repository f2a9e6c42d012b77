/*!
Probe configuration.

Every field has a default matching the values the vendor firmware was observed to use,
so an empty file (or no file at all) replays the firmware trace unchanged.
A configuration file only needs to list what differs:

```toml
base = 0x38c00000
key = [0x05814102, 0x2abeb3df, 0x4862a7f2, 0x02f726e0]
status_start = 6

[key_control]
mode = "ecb"

[poll]
max_iterations = 5000
timeout_ms = 250
```
*/

use crate::regs::{self, KeyControl, KeySize, AES_BASE, AES_DUMP_LEN, AES_WINDOW_SIZE, IV_WORDS};

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use memprobe::error::{Error, ErrorKind, ErrorOrigin, Result};
use memprobe::poll::PollConfig;
use memprobe::types::{page_size, Address};
use memprobe::window::{DEV_MEM, REGISTER_SIZE};

/// The 128-bit test key used by the firmware trace, `02418105 dfb3be2a f2a76248 e026f702`.
pub const TEST_KEY: [u32; 4] = [0x0581_4102, 0x2abe_b3df, 0x4862_a7f2, 0x02f7_26e0];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Character device exposing physical memory.
    pub device: PathBuf,
    /// Physical base address of the register window.
    pub base: Address,
    pub window_size: usize,
    /// Bytes covered by each register dump.
    pub dump_len: usize,

    /// Key words, 4, 6 or 8 of them. The key size in `key_control` must match.
    pub key: Vec<u32>,
    pub iv: [u32; IV_WORDS],
    /// 0 selects the custom key, 1 the GID key.
    pub key_type: u32,
    pub operation: u32,
    pub key_control: KeyControl,

    /// Length of the input and output buffers handed to the engine.
    pub buffer_len: usize,
    /// Plaintext copied into the input buffer.
    pub message: String,

    /// Written to STATUS right before GO. The firmware writes 7, the bootrom 6.
    pub status_start: u32,
    pub poll: PollConfig,
    /// Pause after completion before CONTROL is cleared, in microseconds.
    pub settle_us: u64,

    /// Map anonymous memory instead of the device.
    pub dry_run: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEV_MEM),
            base: Address::from(AES_BASE),
            window_size: AES_WINDOW_SIZE,
            dump_len: AES_DUMP_LEN,

            key: TEST_KEY.to_vec(),
            iv: [0; IV_WORDS],
            key_type: 0b00,
            operation: 0b001,
            key_control: KeyControl::default(),

            buffer_len: 64,
            message: "Hello, world!".to_string(),

            status_start: 7,
            poll: PollConfig::default(),
            settle_us: 100,

            dry_run: false,
        }
    }
}

/// Values given on the command line. Set fields replace the ones from the file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub device: Option<PathBuf>,
    pub base: Option<Address>,
    pub window_size: Option<usize>,
    pub dry_run: bool,
    pub max_poll_iterations: Option<u64>,
    pub poll_timeout_ms: Option<u64>,
    pub poll_interval_us: Option<u64>,
}

impl ProbeConfig {
    /// Loads and validates a configuration from a [TOML](https://toml.io/) file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            Error(ErrorOrigin::Config, ErrorKind::UnableToReadFile)
                .log_error(format!("{}: {}", path.as_ref().display(), err))
        })?;
        let config = Self::from_toml(&contents)?;
        info!("loaded probe configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Parses and validates a configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|err| {
            Error(ErrorOrigin::Config, ErrorKind::Configuration).log_error(err)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command line overrides and validates the result.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(device) = overrides.device {
            self.device = device;
        }
        if let Some(base) = overrides.base {
            self.base = base;
        }
        if let Some(window_size) = overrides.window_size {
            self.window_size = window_size;
        }
        self.dry_run |= overrides.dry_run;
        if let Some(max_iterations) = overrides.max_poll_iterations {
            self.poll.max_iterations = Some(max_iterations);
        }
        if let Some(timeout_ms) = overrides.poll_timeout_ms {
            self.poll.timeout_ms = Some(timeout_ms);
        }
        if let Some(interval_us) = overrides.poll_interval_us {
            self.poll.interval_us = interval_us;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks the combination of values. Register accesses are validated by the window itself.
    pub fn validate(&self) -> Result<()> {
        let key_size = KeySize::from_words(self.key.len())?;
        if key_size != self.key_control.key_size {
            return Err(invalid(format!(
                "{} key words given but key control selects {:?}",
                self.key.len(),
                self.key_control.key_size
            )));
        }

        if self.dump_len > self.window_size || self.dump_len % REGISTER_SIZE != 0 {
            return Err(invalid(format!(
                "dump length {:#x} does not fit a window of {:#x} bytes",
                self.dump_len, self.window_size
            )));
        }

        // every register of the map must be reachable
        if self.window_size < regs::KEY_TYPE_AGAIN + REGISTER_SIZE {
            return Err(invalid(format!(
                "window of {:#x} bytes does not cover the register map",
                self.window_size
            )));
        }

        if self.buffer_len == 0 || self.buffer_len > page_size() {
            return Err(invalid(format!(
                "buffer length {} must be within a single page",
                self.buffer_len
            )));
        }

        if self.message.len() > self.buffer_len {
            return Err(invalid(format!(
                "message of {} bytes does not fit a {} byte buffer",
                self.message.len(),
                self.buffer_len
            )));
        }

        Ok(())
    }

    /// Key words together with the register they are written to.
    pub fn key_registers(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        let first = self.key_control.key_size.first_register();
        self.key
            .iter()
            .enumerate()
            .map(move |(i, word)| (first + i * REGISTER_SIZE, *word))
    }
}

fn invalid(msg: String) -> Error {
    Error(ErrorOrigin::Config, ErrorKind::Configuration).log_error(msg)
}
