use std::error::Error;

pub trait ErrorChainExt {
    /// The error and all of its sources on one line, separated by `: `.
    fn chain_display(&self) -> String;
}

impl<E: Error> ErrorChainExt for E {
    fn chain_display(&self) -> String {
        let mut text = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            text.push_str(": ");
            text.push_str(&err.to_string());
            source = err.source();
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snafu::prelude::*;

    #[derive(Debug, Snafu)]
    #[snafu(display("outer"))]
    struct Outer {
        source: std::io::Error,
    }

    #[test]
    fn joins_the_source_chain() {
        let err = Outer {
            source: std::io::Error::other("inner"),
        };
        assert_eq!(err.chain_display(), "outer: inner");
    }
}
