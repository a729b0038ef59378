//! Legacy 8259 PIC pair

use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::instructions::port::Port;

use crate::interrupts::IRQ_BASE;

const PIC1_DATA: u16 = 0x21;
const PIC2_DATA: u16 = 0xA1;

// SAFETY: IRQ_BASE/IRQ_BASE+8 are above the CPU exception range, so the
// remapped vectors cannot collide with exceptions.
static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(IRQ_BASE, IRQ_BASE + 8) });

/// Remap the PIC pair to vectors 32..48.
pub fn init() {
    // SAFETY: Remapping the PICs happens exactly once during bring-up,
    // before interrupts are enabled.
    unsafe {
        PICS.lock().initialize();
    }
}

/// Signal end-of-interrupt for the given vector.
pub fn end_of_interrupt(vector: u8) {
    // SAFETY: Only called from the tail of an interrupt handler for a
    // vector the PIC actually raised.
    unsafe {
        PICS.lock().notify_end_of_interrupt(vector);
    }
}

fn mask_port(line: u8) -> (Port<u8>, u8) {
    if line < 8 {
        (Port::new(PIC1_DATA), line)
    } else {
        (Port::new(PIC2_DATA), line - 8)
    }
}

/// Unmask a single IRQ line (0..16).
pub fn unmask(line: u8) {
    let (mut port, bit) = mask_port(line);
    // SAFETY: Reading/writing the PIC data port only changes which IRQ
    // lines may deliver; it cannot violate memory safety.
    unsafe {
        let value = port.read() & !(1u8 << bit);
        port.write(value);
    }
}

/// Mask a single IRQ line (0..16).
pub fn mask(line: u8) {
    let (mut port, bit) = mask_port(line);
    // SAFETY: See `unmask`.
    unsafe {
        let value = port.read() | (1u8 << bit);
        port.write(value);
    }
}
