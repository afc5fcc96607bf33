#![cfg(test)]
use super::*;
use hex_literal::hex;

fn test_write(value: u64, width: usize, expected: &[u8]) {
    let mut buffer = [0u8; 16];
    let field = Field {
        value,
        index: 0,
        width,
    };
    let mut flags = Flags::default();
    let len = encode::write(&mut buffer, &field, &mut flags);
    assert!(flags.is_clear(), "unexpected flags {flags:?}");
    assert_eq!(&buffer[..len], expected);
}

#[test]
fn minimal_width() {
    test_write(0, 0, &[]);
    test_write(1, 0, &hex!("01"));
    test_write(0x7F, 0, &hex!("7f"));
    test_write(0x80, 0, &hex!("8100"));
    test_write(0xABC, 0, &hex!("953c"));
    test_write(0x7F0F0F0F, 0, &hex!("87f8bc9e0f"));
}

#[test]
fn fixed_width() {
    test_write(1, 4, &hex!("80808001"));
    test_write(0xABC, 2, &hex!("953c"));
    test_write(0, 1, &hex!("00"));
}

#[test]
fn fixed_width_overflow() {
    let mut buffer = [0u8; 4];
    let field = Field {
        value: 0xABC,
        index: 0,
        width: 1,
    };
    let mut flags = Flags::default();
    assert_eq!(encode::write(&mut buffer, &field, &mut flags), 1);
    assert!(flags.overflow);
}

#[test]
fn width_exceeds_buffer() {
    let mut buffer = [0u8; 2];
    let field = Field {
        value: 1,
        index: 0,
        width: 4,
    };
    let mut flags = Flags::default();
    assert_eq!(encode::write(&mut buffer, &field, &mut flags), 2);
    assert!(flags.incomplete);
}

#[test]
fn size_of_boundaries() {
    assert_eq!(encode::size_of(0), 0);
    assert_eq!(encode::size_of(1), 1);
    assert_eq!(encode::size_of(0x7F), 1);
    assert_eq!(encode::size_of(0x80), 2);
    assert_eq!(encode::size_of(u64::MAX), 10);
}

#[test]
fn round_trip() {
    // Every power-of-two boundary below 2^56 survives a write/read cycle at
    // both minimal and generous fixed widths.
    let mut buffer = [0u8; 16];
    for shift in 0..56 {
        for value in [1u64 << shift, (1u64 << shift) - 1] {
            for width in [0, 8] {
                if width == 0 && value == 0 {
                    continue;
                }
                let out = Field {
                    value,
                    index: 0,
                    width,
                };
                let mut flags = Flags::default();
                let written = encode::write(&mut buffer, &out, &mut flags);
                assert!(flags.is_clear());

                let mut back = Field::at(0);
                let read = decode::read(&buffer[..written], &mut back, &mut flags);
                assert!(flags.is_clear());
                assert_eq!(read, written);
                assert_eq!(back.value, value);
            }
        }
    }
}
