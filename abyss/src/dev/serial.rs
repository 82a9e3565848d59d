//! Serial device driver (COM1).
//!
//! Only compiled for bare-metal builds; hosted builds have no UART to talk
//! to.
use crate::spinlock::SpinLock;
use crate::x86_64::pio::Pio;

const COM1: u16 = 0x3f8;

/// Initialize a serial.
///
/// # Safety
/// Must be executed in ring 0, once, before the first print.
pub unsafe fn init() {
    Pio::new(COM1 + 1).write_u8(0);
    Pio::new(COM1 + 3).write_u8(0x80);
    Pio::new(COM1).write_u8((115200 / 9600) as u8);
    Pio::new(COM1 + 1).write_u8(0);
    Pio::new(COM1 + 3).write_u8(0x3 & !0x80);
    Pio::new(COM1 + 4).write_u8(0);
    Pio::new(COM1 + 1).write_u8(1);
    Pio::new(COM1 + 2).read_u8();
    Pio::new(COM1).read_u8();
}

const LSR_DATA_READY: u8 = 0x01;
const LSR_TX_EMPTY: u8 = 0x20;

fn line_status() -> u8 {
    Pio::new(COM1 + 5).read_u8()
}

pub(crate) fn write_str(s: &str) {
    for &b in s.as_bytes() {
        // Give up waiting after a bounded number of port delays.
        for _ in 0..12800 {
            if line_status() & LSR_TX_EMPTY != 0 {
                break;
            }
            for _ in 0..4 {
                Pio::new(0x84).read_u8();
            }
        }
        Pio::new(COM1).write_u8(b);
    }
}

static RB_SPINLOCK: SpinLock<()> = SpinLock::new(());

/// Reads bytes until the buffer is full, a newline arrives, or EOT (Ctrl+D).
///
/// Echoes every accepted byte and handles DEL as backspace. Returns `None`
/// if another reader holds the port.
pub fn read_bytes_busywait(buffer: &mut [u8]) -> Option<usize> {
    let rb_lock = RB_SPINLOCK.try_lock().ok()?;
    let mut count = 0;

    while count < buffer.len() {
        while line_status() & LSR_DATA_READY == 0 {
            core::hint::spin_loop();
        }

        let byte = Pio::new(COM1).read_u8();
        match byte {
            // EOT
            0x04 => break,
            0x7f => {
                if count > 0 {
                    count -= 1;
                    buffer[count] = 0;
                    write_str("\x08 \x08");
                }
            }
            _ => {
                if byte.is_ascii() {
                    write_str(core::str::from_utf8(&[byte]).unwrap_or_default());
                }
                buffer[count] = byte;
                count += 1;
                if byte == b'\n' || byte == b'\r' {
                    break;
                }
            }
        }
    }

    rb_lock.unlock();
    Some(count)
}
