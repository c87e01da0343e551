//! Application defaults, mirroring the original `parseinitargs`'s literal
//! filenames (`main.c`) rather than deriving them from `CARGO_PKG_NAME` as
//! the teacher's `PackagePaths` does — spec.md §6 pins these exactly.

/// Default path to the JSON command-set config, relative to the current
/// working directory (not the search directory).
pub const DEFAULT_CONFIG_FILENAME: &str = "fsautoproc.json";

/// Default index filename, relative to the search directory.
pub const DEFAULT_INDEX_FILENAME: &str = "index.dat";

/// Default lockfile filename, relative to the search directory.
pub const DEFAULT_LOCKFILE_FILENAME: &str = "fsautoproc.lock";

/// Default worker thread count.
pub const DEFAULT_THREADS: usize = 4;
