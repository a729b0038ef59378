// Interrupt Descriptor Table

use lazy_static::lazy_static;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};

use crate::interrupts::{self, exception_name, IRQ_BASE};

macro_rules! irq_stub {
    ($name:ident, $vector:expr) => {
        extern "x86-interrupt" fn $name(_stack_frame: InterruptStackFrame) {
            interrupts::dispatch($vector);
            super::pic::end_of_interrupt($vector);
        }
    };
}

irq_stub!(irq0_handler, IRQ_BASE);
irq_stub!(irq1_handler, IRQ_BASE + 1);
irq_stub!(irq2_handler, IRQ_BASE + 2);
irq_stub!(irq3_handler, IRQ_BASE + 3);
irq_stub!(irq4_handler, IRQ_BASE + 4);
irq_stub!(irq5_handler, IRQ_BASE + 5);
irq_stub!(irq6_handler, IRQ_BASE + 6);
irq_stub!(irq7_handler, IRQ_BASE + 7);
irq_stub!(irq8_handler, IRQ_BASE + 8);
irq_stub!(irq9_handler, IRQ_BASE + 9);
irq_stub!(irq10_handler, IRQ_BASE + 10);
irq_stub!(irq11_handler, IRQ_BASE + 11);
irq_stub!(irq12_handler, IRQ_BASE + 12);
irq_stub!(irq13_handler, IRQ_BASE + 13);
irq_stub!(irq14_handler, IRQ_BASE + 14);
irq_stub!(irq15_handler, IRQ_BASE + 15);

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        idt.divide_error.set_handler_fn(divide_error_handler);
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.double_fault.set_handler_fn(double_fault_handler);
        idt.general_protection_fault
            .set_handler_fn(general_protection_fault_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);

        idt[IRQ_BASE].set_handler_fn(irq0_handler);
        idt[IRQ_BASE + 1].set_handler_fn(irq1_handler);
        idt[IRQ_BASE + 2].set_handler_fn(irq2_handler);
        idt[IRQ_BASE + 3].set_handler_fn(irq3_handler);
        idt[IRQ_BASE + 4].set_handler_fn(irq4_handler);
        idt[IRQ_BASE + 5].set_handler_fn(irq5_handler);
        idt[IRQ_BASE + 6].set_handler_fn(irq6_handler);
        idt[IRQ_BASE + 7].set_handler_fn(irq7_handler);
        idt[IRQ_BASE + 8].set_handler_fn(irq8_handler);
        idt[IRQ_BASE + 9].set_handler_fn(irq9_handler);
        idt[IRQ_BASE + 10].set_handler_fn(irq10_handler);
        idt[IRQ_BASE + 11].set_handler_fn(irq11_handler);
        idt[IRQ_BASE + 12].set_handler_fn(irq12_handler);
        idt[IRQ_BASE + 13].set_handler_fn(irq13_handler);
        idt[IRQ_BASE + 14].set_handler_fn(irq14_handler);
        idt[IRQ_BASE + 15].set_handler_fn(irq15_handler);
        idt
    };
}

/// Publish the IDT to the CPU.
pub fn init() {
    IDT.load();
}

extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    if !interrupts::dispatch(0) {
        println!("EXCEPTION: {}\n{:#?}", exception_name(0), stack_frame);
        panic!("{}", exception_name(0));
    }
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    if !interrupts::dispatch(3) {
        println!("EXCEPTION: BREAKPOINT\n{:#?}", stack_frame);
    }
}

extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    if !interrupts::dispatch(6) {
        println!("EXCEPTION: {}\n{:#?}", exception_name(6), stack_frame);
        panic!("{}", exception_name(6));
    }
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    println!("EXCEPTION: GENERAL PROTECTION FAULT");
    println!("Error Code: {:#x}", error_code);
    println!("{:#?}", stack_frame);
    panic!("general protection fault");
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    // No demand paging in this kernel: every page fault is fatal.
    println!("EXCEPTION: PAGE FAULT");
    println!("Accessed Address: {:?}", Cr2::read());
    println!("Error Code: {:?}", error_code);
    println!("{:#?}", stack_frame);
    panic!("page fault");
}
