#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use veritrace_analyze::parser::{encode_binary_record, write_text_record, Address, Observation, SizeTag};

pub const TRACE: &str = "veritracer.dat";
pub const BACKTRACE: &str = "backtrace.dat";

pub const DESCRIPTOR_A: &str = "\
./app(compute+0x2a)[0x401136]
./app(main+0x11)[0x401190]
00000000000000000011
./app(update+0x40)[0x401200]
00000000000000000012
";

pub const DESCRIPTOR_B: &str = "\
./app(solve+0x10)[0x401300]
00000000000000000021
";

/// One observation per value, alternating between the two call sites of
/// `DESCRIPTOR_A`, timestamps 1000, 1001, ...
pub fn observations(values: &[f64]) -> Vec<Observation> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            Observation::new(
                SizeTag::Binary64,
                1000 + i as u64,
                Address::NULL,
                11 + (i % 2) as u64,
                *v,
            )
        })
        .collect()
}

pub fn write_binary_trace(path: &Path, observations: &[Observation]) {
    let mut file = File::create(path).unwrap();
    for observation in observations {
        file.write_all(&encode_binary_record(observation)).unwrap();
    }
}

pub fn write_text_trace(path: &Path, observations: &[Observation]) {
    let mut file = File::create(path).unwrap();
    writeln!(file, "# veritracer text trace").unwrap();
    for observation in observations {
        write_text_record(&mut file, observation).unwrap();
    }
}

/// Create `<root>/<name>` holding a descriptor and a binary trace
pub fn binary_run(root: &Path, name: &str, descriptor: &str, observations: &[Observation]) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(BACKTRACE), descriptor).unwrap();
    write_binary_trace(&dir.join(TRACE), observations);
    dir
}

/// Create `<root>/<name>` holding a descriptor and a text trace
pub fn text_run(root: &Path, name: &str, descriptor: &str, observations: &[Observation]) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(BACKTRACE), descriptor).unwrap();
    write_text_trace(&dir.join(TRACE), observations);
    dir
}

/// Rows of a result file, header excluded
pub fn csv_rows(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}
