use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Opens `path` for writing, or standard output when `path` is `"-"`.
pub(crate) fn open_sink(path: &str) -> io::Result<Box<dyn Write + Send>> {
    if path == "-" {
        Ok(Box::new(BufWriter::new(io::stdout())))
    } else {
        let file = File::create(Path::new(path))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn open_sink_writes_to_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.fasta");
        {
            let mut sink = open_sink(path.to_str().unwrap()).unwrap();
            sink.write_all(b">r0\nACGT\n").unwrap();
        }
        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, ">r0\nACGT\n");
    }
}
