//! The sweep-driving loops shared by every chain controller.

use indicatif::{ProgressBar, ProgressStyle};

use crate::errors::Result;

pub trait MarkovChain {
    /// Performs one sweep of the chain.
    fn step(&mut self) -> Result<()>;

    /// Sweeps left before the chain is finished.
    fn remaining(&self) -> usize;
}

/// Steps `chain` until it has no sweeps left.
pub fn run_chain<M: MarkovChain + ?Sized>(chain: &mut M) -> Result<()> {
    while chain.remaining() > 0 {
        chain.step()?;
    }
    Ok(())
}

/// Like [`run_chain`], advancing `pb` once per sweep.
pub fn run_chain_progress<M: MarkovChain + ?Sized>(chain: &mut M, pb: &ProgressBar) -> Result<()> {
    pb.set_length(chain.remaining() as u64);
    while chain.remaining() > 0 {
        if let Err(e) = chain.step() {
            pb.abandon_with_message("Failed!");
            return Err(e);
        }
        pb.inc(1);
    }
    pb.finish_with_message("Done!");
    Ok(())
}

pub fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PgmError;

    struct Countdown {
        left: usize,
        fail_at: Option<usize>,
    }

    impl MarkovChain for Countdown {
        fn step(&mut self) -> Result<()> {
            if Some(self.left) == self.fail_at {
                return Err(PgmError::NumericInstability {
                    node: "c".to_string(),
                    detail: "boom".to_string(),
                });
            }
            self.left -= 1;
            Ok(())
        }

        fn remaining(&self) -> usize {
            self.left
        }
    }

    #[test]
    fn test_run_chain_exhausts_sweeps() {
        let mut chain = Countdown { left: 7, fail_at: None };
        run_chain(&mut chain).unwrap();
        assert_eq!(chain.remaining(), 0);
    }

    #[test]
    fn test_progress_stops_on_error() {
        let mut chain = Countdown {
            left: 5,
            fail_at: Some(2),
        };
        let pb = ProgressBar::hidden();
        assert!(run_chain_progress(&mut chain, &pb).is_err());
        assert_eq!(chain.remaining(), 2);
        assert_eq!(pb.position(), 3);
    }
}
