#![no_main]
use libfuzzer_sys::fuzz_target;
use vehicle_core::obd::Reassembler;

fuzz_target!(|data: &[u8]| {
    // Byte 0 selects mode/pid/extended; the rest is interpreted as a stream
    // of 8-byte CAN frames fed into one reassembler instance.
    if data.is_empty() {
        return;
    }
    let header = data[0];
    let mode = header & 0x3F;
    let extended = header & 0x40 != 0;
    let pid: u16 = if extended { 0xF190 } else { u16::from(header) & 0xFF };

    let mut reassembler = Reassembler::new();
    for chunk in data[1..].chunks(8) {
        if chunk.len() < 8 {
            break;
        }
        let mut frame = [0u8; 8];
        frame.copy_from_slice(chunk);
        let _ = reassembler.feed(&frame, mode, pid, extended);
    }
});
