//! PIT programming for the kernel tick

use x86_64::instructions::port::Port;

use crate::time::TIMER_HZ;

const PIT_FREQUENCY: u32 = 1_193_182; // Hz

/// Program PIT channel 0 as a rate generator at [`TIMER_HZ`].
pub fn init() {
    let divisor = PIT_FREQUENCY / TIMER_HZ as u32;

    let mut cmd_port: Port<u8> = Port::new(0x43);
    let mut data_port: Port<u8> = Port::new(0x40);

    // SAFETY: Ports 0x40/0x43 are the PIT data/command registers; writing
    // the rate-generator setup cannot violate memory safety.
    unsafe {
        cmd_port.write(0x36); // channel 0, lobyte/hibyte, rate generator
        data_port.write((divisor & 0xFF) as u8);
        data_port.write((divisor >> 8) as u8);
    }

    log::info!("PIT configured for {} Hz tick", TIMER_HZ);
}
