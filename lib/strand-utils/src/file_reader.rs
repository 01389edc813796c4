use std::fs::File;
use std::io::{self, BufRead, BufReader};

use flate2::read::MultiGzDecoder;
use simple_error::{SimpleResult, bail};

/// Open a buffered text reader over stdin (`-`), a plain file, or a
/// gzip-compressed file (by `.gz` suffix)
///
pub fn open_text_reader(filename: &str) -> SimpleResult<Box<dyn BufRead>> {
    if filename == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = match File::open(filename) {
        Ok(x) => x,
        Err(e) => bail!("Can't open input file '{}': {}", filename, e),
    };
    if filename.ends_with(".gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        assert!(open_text_reader("/no/such/file.maf").is_err());
    }
}
