use super::*;
use crate::config::{ConfigOverrides, TEST_KEY};

use memprobe::pagemap::entry::PFN_MASK;

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng as CurRng;

const BASE: u64 = 0x38c0_0000;

/// Reports the same raw entry for every page.
struct FixedPagemap(u64);

impl PagemapSource for FixedPagemap {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let bytes = self.0.to_le_bytes();
        for (pos, byte) in (offset..).zip(buf.iter_mut()) {
            *byte = bytes[(pos % 8) as usize];
        }
        Ok(buf.len())
    }
}

struct BrokenSink;

impl io::Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn bootrom_config() -> ProbeConfig {
    ProbeConfig {
        status_start: 6,
        settle_us: 0,
        ..Default::default()
    }
}

fn ram_window() -> RegisterWindow {
    RegisterWindow::anonymous(Address::from(BASE), regs::AES_WINDOW_SIZE).unwrap()
}

fn folded() -> AddressTranslator<FoldedPagemap> {
    AddressTranslator::with_source(FoldedPagemap::new(page_size()), page_size())
}

fn reg(window: &RegisterWindow, offset: usize) -> u32 {
    window.read32(window.base() + offset).unwrap()
}

#[test]
fn test_sequence() {
    let config = bootrom_config();
    let mut window = ram_window();
    let buffers = ProbeBuffers::new(config.message.as_bytes(), config.buffer_len).unwrap();
    let mut out = Vec::new();

    let report = Probe::new(&config, &mut out)
        .run(&mut window, &buffers, &mut folded())
        .unwrap();

    let input = report.input_phys.to_umem() as u32;
    let output = report.output_phys.to_umem() as u32;
    assert_ne!(input, output);

    assert_eq!(reg(&window, regs::CONTROL), 0);
    assert_eq!(reg(&window, regs::GO), 1);
    assert_eq!(reg(&window, regs::STATUS), 6);
    assert_eq!(reg(&window, regs::KEY_CONTROL), 0xffff_ffcb);
    assert_eq!(reg(&window, regs::OPERATION), 0b001);
    assert_eq!(reg(&window, regs::KEY_TYPE), 0);
    assert_eq!(reg(&window, regs::KEY_TYPE_AGAIN), !0);
    assert_eq!(reg(&window, regs::UNUSED_1), 0);

    for size in [regs::OUT_SIZE, regs::IN_SIZE, regs::AUX_SIZE, regs::ADDITIONAL_SIZE] {
        assert_eq!(reg(&window, size), 64);
    }
    assert_eq!(reg(&window, regs::OUT_ADDRESS), output);
    assert_eq!(reg(&window, regs::IN_ADDRESS), input);
    assert_eq!(reg(&window, regs::AUX_ADDRESS), input);
    assert_eq!(reg(&window, regs::OUT_UNUSED), 0);

    // a 128-bit key leaves the upper key registers alone
    for n in 0..4 {
        assert_eq!(reg(&window, regs::key(n)), 0);
    }
    for (n, word) in TEST_KEY.iter().enumerate() {
        assert_eq!(reg(&window, regs::key(n + 4)), *word);
    }
    for n in 0..regs::IV_WORDS {
        assert_eq!(reg(&window, regs::iv(n)), 0);
    }

    assert_eq!(report.key_type, 0);
    assert_eq!(report.status, 6);
    assert_eq!(report.prepared.len(), 0x90 / 4);
    assert!(report.prepared.iter().all(|(_, v)| *v == 0));
    assert!(report
        .armed
        .contains(&(Address::from(BASE + 0x14), 0xffff_ffcb)));
    assert!(report.armed.contains(&(Address::from(BASE), 1)));
    assert!(report.finished.contains(&(Address::from(BASE), 0)));
    assert_eq!(report.output, vec![0; 64]);

    let out = String::from_utf8(out).unwrap();
    let stages = [
        "Prior to preparation:\nDumping:\n38c00000 => 00000000",
        "Key type: 00000000 (00000000 00000000 00000000 00000000)\n",
        "About to encrypt...\nDumping:\n",
        "38c00014 => ffffffcb (11111111 11111111 11111111 11001011)\n",
        "Current status: 00000006 (00000000 00000000 00000000 00000110)\n",
        "Finished encrypting!\nDumping:\n",
        "input buf:\n  0000  48 65 6c 6c 6f 2c 20 77 6f 72 6c 64 21 00 00 00  Hello, world!...\n",
        "output buf:\n  0000  00 00",
    ];
    let mut rest = out.as_str();
    for stage in stages.iter() {
        let pos = rest
            .find(stage)
            .unwrap_or_else(|| panic!("missing {:?} in:\n{}", stage, out));
        rest = &rest[pos + stage.len()..];
    }
    assert_eq!(out.matches("Dumping:\n").count(), 3);
    assert_eq!(out.matches("Current status: ").count(), 1);
}

#[test]
fn test_decrypt_and_larger_key() {
    let mut config = ProbeConfig::from_toml(
        "
key = [1, 2, 3, 4, 5, 6, 7, 8]
iv = [9, 10, 11, 12]
status_start = 6
settle_us = 0

[key_control]
key_size = \"aes256\"
encrypt = false
",
    )
    .unwrap();
    config.key_type = 0b01;

    let mut window = ram_window();
    let buffers = ProbeBuffers::new(b"", 16).unwrap();
    let mut out = Vec::new();
    let report = Probe::new(&config, &mut out)
        .run(&mut window, &buffers, &mut folded())
        .unwrap();

    assert_eq!(report.key_type, 0b01);
    assert_eq!(reg(&window, regs::KEY_TYPE_AGAIN), !0b01);
    assert_eq!(reg(&window, regs::KEY_CONTROL), 0xffff_ffea);
    assert_eq!(reg(&window, regs::IN_SIZE), 16);
    for n in 0..regs::KEY_WORDS {
        assert_eq!(reg(&window, regs::key(n)), n as u32 + 1);
    }
    for n in 0..regs::IV_WORDS {
        assert_eq!(reg(&window, regs::iv(n)), n as u32 + 9);
    }

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("About to decrypt...\n"));
    assert!(out.contains("Finished decrypting!\n"));
}

#[test]
fn test_random_keys() {
    let mut rng = CurRng::seed_from_u64(0);

    for words in [4, 6, 8].iter().cycle().take(24) {
        let mut config = bootrom_config();
        config.key = (0..*words).map(|_| rng.gen::<u32>()).collect();
        config.key_control.key_size = regs::KeySize::from_words(*words).unwrap();
        config.iv = rng.gen();
        config.validate().unwrap();

        let mut window = ram_window();
        let buffers = ProbeBuffers::new(b"Hello, world!", 64).unwrap();
        Probe::new(&config, io::sink())
            .run(&mut window, &buffers, &mut folded())
            .unwrap();

        let unused = regs::KEY_WORDS - words;
        for n in 0..unused {
            assert_eq!(reg(&window, regs::key(n)), 0);
        }
        for (n, word) in config.key.iter().enumerate() {
            assert_eq!(reg(&window, regs::key(unused + n)), *word);
        }
        for (n, word) in config.iv.iter().enumerate() {
            assert_eq!(reg(&window, regs::iv(n)), *word);
        }
    }
}

#[test]
fn test_busy_engine_times_out() {
    let mut config = bootrom_config();
    config.status_start = 7;
    config.poll = PollConfig::unbounded().with_max_iterations(100);

    let mut window = ram_window();
    let buffers = ProbeBuffers::new(b"Hello, world!", 64).unwrap();
    let mut out = Vec::new();
    let err = Probe::new(&config, &mut out)
        .run(&mut window, &buffers, &mut folded())
        .unwrap_err();

    assert_eq!(err, Error(ErrorOrigin::Poll, ErrorKind::Timeout));
    // the engine is left armed
    assert_eq!(reg(&window, regs::CONTROL), 1);
    assert_eq!(reg(&window, regs::STATUS), 7);

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("About to encrypt...\n"));
    assert!(!out.contains("Finished"));
    // every read of the busy status reaches the sink
    assert_eq!(
        out.matches("Current status: 00000007 (00000000 00000000 00000000 00000111)\n")
            .count(),
        100
    );
}

#[test]
fn test_absent_buffer() {
    let config = bootrom_config();
    let mut window = ram_window();
    let buffers = ProbeBuffers::new(b"Hello, world!", 64).unwrap();
    let mut translator = AddressTranslator::with_source(FixedPagemap(0x1234), page_size());

    let err = Probe::new(&config, Vec::new())
        .run(&mut window, &buffers, &mut translator)
        .unwrap_err();
    assert_eq!(err, Error(ErrorOrigin::Pagemap, ErrorKind::AbsentPage));
    // no register was touched before the buffers were resolved
    assert!(window.dump(0x100).unwrap().iter().all(|(_, v)| *v == 0));
}

#[test]
fn test_buffer_above_4gb() {
    let config = bootrom_config();
    let mut window = ram_window();
    let buffers = ProbeBuffers::new(b"Hello, world!", 64).unwrap();
    let entry = PagemapFlags::PRESENT.bits() | (PFN_MASK & 0x10_0000_0000);
    let mut translator = AddressTranslator::with_source(FixedPagemap(entry), page_size());

    let err = Probe::new(&config, Vec::new())
        .run(&mut window, &buffers, &mut translator)
        .unwrap_err();
    assert_eq!(err, Error(ErrorOrigin::Other, ErrorKind::OutOfRangeAccess));
}

#[test]
fn test_small_window() {
    let config = bootrom_config();
    let mut window = RegisterWindow::anonymous(Address::from(BASE), 0x40).unwrap();
    let buffers = ProbeBuffers::new(b"Hello, world!", 64).unwrap();

    let err = Probe::new(&config, Vec::new())
        .run(&mut window, &buffers, &mut folded())
        .unwrap_err();
    assert_eq!(
        err,
        Error(ErrorOrigin::RegisterWindow, ErrorKind::OutOfRangeAccess)
    );
}

#[test]
fn test_broken_sink() {
    let config = bootrom_config();
    let mut window = ram_window();
    let buffers = ProbeBuffers::new(b"Hello, world!", 64).unwrap();

    let err = Probe::new(&config, BrokenSink)
        .run(&mut window, &buffers, &mut folded())
        .unwrap_err();
    assert_eq!(err, Error(ErrorOrigin::Other, ErrorKind::UnableToWriteFile));
}

#[test]
fn test_execute_dry_run() {
    let config = bootrom_config()
        .with_overrides(ConfigOverrides {
            dry_run: true,
            ..Default::default()
        })
        .unwrap();

    let mut out = Vec::new();
    let report = execute(&config, &mut out).unwrap();
    assert_eq!(report.status, 6);
    assert!(report.input_phys.to_umem() < 1 << 32);
    assert!(!out.is_empty());

    let config = ProbeConfig::default()
        .with_overrides(ConfigOverrides {
            dry_run: true,
            max_poll_iterations: Some(1000),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(
        execute(&config, io::sink()).unwrap_err().kind(),
        ErrorKind::Timeout
    );
}

#[test]
fn test_execute_missing_device() {
    let config = ProbeConfig {
        device: "/this/device/does/not/exist".into(),
        ..bootrom_config()
    };
    assert_eq!(
        execute(&config, io::sink()).unwrap_err(),
        Error(ErrorOrigin::RegisterWindow, ErrorKind::PermissionOrAvailability)
    );
}

#[test]
fn test_changes() {
    let before = [
        (Address::from(BASE), 1),
        (Address::from(BASE + 4), 0),
        (Address::from(BASE + 8), 7),
    ];
    let after = [
        (Address::from(BASE), 0),
        (Address::from(BASE + 4), 0),
        (Address::from(BASE + 8), 6),
    ];
    assert_eq!(
        changes(&before, &after).collect::<Vec<_>>(),
        vec![
            (Address::from(BASE), 1, 0),
            (Address::from(BASE + 8), 7, 6)
        ]
    );
    assert_eq!(changes(&before, &before).count(), 0);
}
