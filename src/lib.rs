// Timeout kernel for microcontrollers with a narrow, wrapping clock

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod drivers;
pub mod kernel;
