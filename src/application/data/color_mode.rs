use clap::ValueEnum;

/// When to emit ANSI colors on the screen.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self) -> bool {
        match self {
            ColorMode::Auto => supports_color::on(supports_color::Stream::Stdout).is_some(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }

    /// Forces the `colored` crate to agree with this mode.
    pub fn apply(self) -> bool {
        let enabled = self.enabled();
        colored::control::set_override(enabled);
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_modes_ignore_the_terminal() {
        assert!(ColorMode::Always.enabled());
        assert!(!ColorMode::Never.enabled());
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(ColorMode::from_str("NEVER", true), Ok(ColorMode::Never));
    }
}
