//! x86_64 hardware support: serial console, IDT, PIC, PIT.

pub mod idt;
pub mod pic;
pub mod serial;
pub mod timer;
