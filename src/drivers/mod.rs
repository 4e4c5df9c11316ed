// Hardware glue: binds the kernel's Clock seam to embedded-hal.

pub mod clock;

pub use clock::HalClock;
