//! Minimal CLI parsing.

use std::env;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Perform the startup sync and exit instead of scheduling daily runs
    pub once: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = CliOptions::default();
        for arg in args {
            if arg.as_ref() == "--once" {
                options.once = true;
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(CliOptions::parse(Vec::<String>::new()), CliOptions { once: false });
        assert_eq!(CliOptions::parse(["--verbose", "--once"]), CliOptions { once: true });
    }
}
