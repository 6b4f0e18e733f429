#![no_main]

use dataio::DataReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = DataReader::new(data);
    let mut idx = 0usize;

    // Input bytes pick a bounded sequence of reads.
    while idx < data.len() && idx < 1024 {
        let op = data[idx] % 7;
        let arg = usize::from(data[idx] / 7);
        idx += 1;

        match op {
            0 => {
                let _ = reader.read_u8();
            }
            1 => {
                let _ = reader.read_bool();
            }
            2 => {
                let _ = reader.read_uint(1 << (arg % 3));
            }
            3 => {
                let _ = reader.read_sint(1 << (arg % 3));
            }
            4 => {
                let _ = reader.read_string(arg.saturating_add(1));
            }
            5 => {
                let _ = reader.read_bitvector(arg);
            }
            _ => {
                let _ = reader.read_bytes(arg % 8);
            }
        }
    }
});
