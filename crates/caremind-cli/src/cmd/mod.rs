pub mod ask;
pub mod completions;
pub mod drug;
pub mod index_guidelines;
pub mod load_drugs;
pub mod search;

use anyhow::{Context as _, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Open a JSON-lines input; `-` reads stdin.
pub fn open_jsonl(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}
