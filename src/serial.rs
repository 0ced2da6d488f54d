use core::fmt::{self, Write};
use spin::Mutex;
use uart_16550::SerialPort;

/// COM1
pub const DEFAULT_PORT: u16 = 0x3F8;

struct SerialSink {
    base: u16,
    port: Option<SerialPort>,
}

impl SerialSink {
    const fn new() -> Self {
        Self {
            base: DEFAULT_PORT,
            port: None,
        }
    }

    fn ensure_init(&mut self) {
        if self.port.is_none() {
            let mut port = unsafe { SerialPort::new(self.base) };
            port.init();
            self.port = Some(port);
        }
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.ensure_init();
        if let Some(ref mut port) = self.port {
            port.write_fmt(args).ok();
        }
    }
}

static SERIAL: Mutex<SerialSink> = Mutex::new(SerialSink::new());

pub fn init() {
    SERIAL.lock().ensure_init();
}

/// Switch to another UART base. Takes effect on the next write.
pub fn set_port(base: u16) {
    let mut sink = SERIAL.lock();
    if sink.base != base {
        sink.base = base;
        sink.port = None;
    }
}

pub(crate) fn _print(args: fmt::Arguments<'_>) {
    SERIAL.lock().write_fmt(args);
}

/// Write without waiting on the lock. Used on halt paths where the holder
/// may never release it; the line is dropped if the port is busy.
pub(crate) fn try_print(args: fmt::Arguments<'_>) -> bool {
    match SERIAL.try_lock() {
        Some(mut sink) => {
            sink.write_fmt(args);
            true
        }
        None => false,
    }
}
