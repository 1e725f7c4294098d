//! Expands command line paths into the list of template sources.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SOURCE_EXTENSION: &str = "gxp";

/// Files are taken as given; directories contribute every `.gxp` file beneath them.
/// The result is sorted and free of repeats.
pub fn collect_sources<P: AsRef<Path>>(paths: &[P]) -> io::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            walk(path, &mut sources)?;
        } else {
            sources.push(path.to_path_buf());
        }
    }
    sources.sort();
    sources.dedup();
    Ok(sources)
}

fn walk(dir: &Path, sources: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, sources)?;
        } else if path.extension().is_some_and(|e| e == SOURCE_EXTENSION) {
            sources.push(path);
        }
    }
    Ok(())
}
