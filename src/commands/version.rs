//! Command: print version information.

/// Version string baked in at build time.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTBACKUP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the dotbackup version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("dotbackup {}", version());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
