use super::*;
use crate::types::size;

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng as CurRng;

const BASE: u64 = 0x1000_0000;

fn ram_window(size: usize) -> RegisterWindow {
    RegisterWindow::anonymous(Address::from(BASE), size).unwrap()
}

#[test]
fn test_scenario() {
    let mut window = ram_window(0x100);

    window
        .write32(Address::from(0x1000_0020u64), 0xdead_beef)
        .unwrap();
    assert_eq!(
        window.read32(Address::from(0x1000_0020u64)).unwrap(),
        0xdead_beef
    );

    let err = window
        .write32(Address::from(0x1000_0120u64), 0x0)
        .unwrap_err();
    assert_eq!(
        err,
        Error(ErrorOrigin::RegisterWindow, ErrorKind::OutOfRangeAccess)
    );
}

#[test]
fn test_round_trip() {
    let mut rng = CurRng::seed_from_u64(0);
    let mut window = ram_window(size::kb(4));

    for _ in 0..4096 {
        let offset = rng.gen_range(0..window.size() / REGISTER_SIZE) * REGISTER_SIZE;
        let addr = window.base() + offset;
        let value = rng.gen::<u32>();

        window.write32(addr, value).unwrap();
        assert_eq!(window.read32(addr).unwrap(), value);
    }
}

#[test]
fn test_writes_do_not_bleed() {
    let mut window = ram_window(0x40);
    let base = window.base();

    for offset in (0..0x40).step_by(REGISTER_SIZE) {
        window.write32(base + offset, offset as u32).unwrap();
    }
    window.write32(base + 0x10, !0).unwrap();

    for offset in (0..0x40).step_by(REGISTER_SIZE) {
        let expected = if offset == 0x10 { !0 } else { offset as u32 };
        assert_eq!(window.read32(base + offset).unwrap(), expected);
    }
}

#[test]
fn test_bounds() {
    let mut rng = CurRng::seed_from_u64(1);
    let mut window = ram_window(0x100);
    let end = BASE + 0x100;

    let mut outside = vec![0, BASE - 4, BASE - 1, end, end + 4, u64::MAX - 3, u64::MAX];
    for _ in 0..1024 {
        let addr = rng.gen::<u64>();
        if !(BASE..end).contains(&addr) {
            outside.push(addr & !3);
        }
    }

    for addr in outside.into_iter().map(Address::from) {
        assert!(!window.contains(addr));
        assert_eq!(
            window.read32(addr).unwrap_err().kind(),
            ErrorKind::OutOfRangeAccess
        );
        assert_eq!(
            window.write32(addr, 0x1234_5678).unwrap_err().kind(),
            ErrorKind::OutOfRangeAccess
        );
    }

    // nothing leaked into the window
    assert!(window.dump(0x100).unwrap().iter().all(|(_, v)| *v == 0));
}

#[test]
fn test_last_register() {
    let mut window = ram_window(0x100);
    let last = Address::from(BASE + 0xfc);

    window.write32(last, 0xcafe_f00d).unwrap();
    assert_eq!(window.read32(last).unwrap(), 0xcafe_f00d);

    // a word straddling the end of the window is rejected as well
    let straddle = RegisterWindow::anonymous(Address::from(BASE), 0x102).unwrap();
    assert!(straddle.contains(Address::from(BASE + 0xfc)));
    assert!(!straddle.contains(Address::from(BASE + 0x100)));
}

#[test]
fn test_unaligned() {
    let mut window = ram_window(0x100);
    for misalign in 1..REGISTER_SIZE {
        let addr = Address::from(BASE + 0x20) + misalign;
        assert_eq!(
            window.write32(addr, 1).unwrap_err(),
            Error(ErrorOrigin::RegisterWindow, ErrorKind::UnalignedAccess)
        );
        assert_eq!(
            window.read32(addr).unwrap_err().kind(),
            ErrorKind::UnalignedAccess
        );
    }
}

#[test]
fn test_modify() {
    let mut window = ram_window(0x100);
    let addr = Address::from(BASE + 0x88);

    window.write32(addr, 0b0011).unwrap();
    let written = window.modify32(addr, |v| !v).unwrap();
    assert_eq!(written, !0b0011);
    assert_eq!(window.read32(addr).unwrap(), !0b0011);
}

#[test]
fn test_dump() {
    let mut window = ram_window(0x100);
    window.write32(Address::from(BASE + 0x8), 0x55).unwrap();

    let dump = window.dump(0x90).unwrap();
    assert_eq!(dump.len(), 0x90 / REGISTER_SIZE);
    assert_eq!(dump[0], (Address::from(BASE), 0));
    assert_eq!(dump[2], (Address::from(BASE + 0x8), 0x55));
    assert_eq!(dump.last().unwrap().0, Address::from(BASE + 0x8c));

    assert_eq!(
        window.dump(0x104).unwrap_err().kind(),
        ErrorKind::OutOfRangeAccess
    );
}

#[test]
fn test_close_idempotent() {
    let mut window = ram_window(0x100);
    assert!(window.is_open());

    window.close();
    assert!(!window.is_open());
    window.close();
    assert!(!window.is_open());

    assert_eq!(
        window.read32(Address::from(BASE)).unwrap_err(),
        Error(ErrorOrigin::RegisterWindow, ErrorKind::WindowClosed)
    );
    assert_eq!(
        window.write32(Address::from(BASE), 1).unwrap_err().kind(),
        ErrorKind::WindowClosed
    );
    // range violations are still reported as such
    assert_eq!(
        window.read32(Address::from(BASE + 0x100)).unwrap_err().kind(),
        ErrorKind::OutOfRangeAccess
    );

    // dropping a closed window must not unmap again
    drop(window);
}

#[test]
fn test_invalid_window() {
    for (base, size) in [(BASE, 0), (BASE, 3), (BASE + 2, 0x100), (u64::MAX - 0xf, 0x100)] {
        assert_eq!(
            RegisterWindow::anonymous(Address::from(base), size).unwrap_err(),
            Error(ErrorOrigin::RegisterWindow, ErrorKind::InvalidWindow)
        );
    }
}

#[test]
fn test_open_unaligned_base() {
    let err = RegisterWindow::open_path(
        "/this/device/does/not/exist",
        Address::from(BASE + 0x10),
        0x100,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidWindow);
}

#[test]
fn test_open_missing_device() {
    let err = RegisterWindow::open_path("/this/device/does/not/exist", Address::from(BASE), 0x100)
        .unwrap_err();
    assert_eq!(
        err,
        Error(ErrorOrigin::RegisterWindow, ErrorKind::PermissionOrAvailability)
    );
}

#[test]
fn test_poll_clear() {
    let mut window = ram_window(0x100);
    let status = Address::from(BASE + 0xc);
    let config = PollConfig::default().with_max_iterations(16);

    window.write32(status, 0b110).unwrap();
    assert_eq!(window.poll_clear(status, 0b1, &config).unwrap(), 0b110);

    window.write32(status, 0b111).unwrap();
    assert_eq!(
        window.poll_clear(status, 0b1, &config).unwrap_err(),
        Error(ErrorOrigin::Poll, ErrorKind::Timeout)
    );

    assert_eq!(
        window
            .poll_clear(Address::from(BASE + 0x200), 0b1, &config)
            .unwrap_err()
            .kind(),
        ErrorKind::OutOfRangeAccess
    );
}
