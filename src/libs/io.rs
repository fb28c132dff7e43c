use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Opens an input for reading: "stdin", a plain file, or a gzipped file
/// (detected by the `.gz` extension).
pub fn reader(input: &str) -> Box<dyn BufRead> {
    if input == "stdin" {
        return Box::new(BufReader::new(std::io::stdin()));
    }

    let path = Path::new(input);
    let file = match File::open(path) {
        Err(why) => panic!("could not open {}: {}", path.display(), why),
        Ok(file) => file,
    };

    if path.extension() == Some(std::ffi::OsStr::new("gz")) {
        Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    }
}

/// Opens an output for writing: "stdout" or a file (created/truncated).
pub fn writer(output: &str) -> Box<dyn Write> {
    if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        Box::new(BufWriter::new(File::create(output).unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn test_reader_plain_and_gz() {
        let dir = tempdir().unwrap();

        let plain = dir.path().join("layout.tsv");
        std::fs::write(&plain, "# marl layout\n").unwrap();
        let mut lines = reader(plain.to_str().unwrap()).lines();
        assert_eq!(lines.next().unwrap().unwrap(), "# marl layout");

        let gz = dir.path().join("layout.tsv.gz");
        {
            let file = File::create(&gz).unwrap();
            let mut enc = GzEncoder::new(file, flate2::Compression::default());
            writeln!(enc, "# marl layout").unwrap();
            enc.finish().unwrap();
        }
        let mut lines = reader(gz.to_str().unwrap()).lines();
        assert_eq!(lines.next().unwrap().unwrap(), "# marl layout");
    }
}
