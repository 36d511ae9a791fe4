// SPDX-License-Identifier: MIT

mod types;

pub use types::{Finding, ReportDisplay, Severity, VerifyOptions, VerifyPhases, VerifyReport};

pub use crate::core::errors::{CheckerError, CheckerResult};

/// Structural verification of a mounted filesystem.
///
/// Each phase appends findings to the report; a phase only returns `Err` when
/// it could not run at all (device error, undecodable metadata).
pub trait FsChecker {
    fn check_with(&mut self, opt: &VerifyOptions) -> CheckerResult<VerifyReport>
    where
        Self: Sized,
    {
        let mut rep = VerifyReport::default();
        let phases: [(VerifyPhases, PhaseFn<Self>); 4] = [
            (VerifyPhases::SUPERBLOCK, Self::check_superblock),
            (VerifyPhases::CHAINS, Self::check_chains),
            (VerifyPhases::DIRECTORY, Self::check_directories),
            (VerifyPhases::CROSSREF, Self::check_cross_reference),
        ];
        for (phase, f) in phases {
            if !opt.phases.contains(phase) {
                continue;
            }
            f(self, &mut rep)?;
            if opt.fail_fast && rep.has_error() {
                break;
            }
        }
        Ok(rep)
    }

    fn check_all(&mut self) -> CheckerResult<VerifyReport>
    where
        Self: Sized,
    {
        self.check_with(&VerifyOptions::default())
    }

    fn check_superblock(&mut self, _rep: &mut VerifyReport) -> CheckerResult {
        Ok(())
    }

    fn check_chains(&mut self, _rep: &mut VerifyReport) -> CheckerResult {
        Ok(())
    }

    fn check_directories(&mut self, _rep: &mut VerifyReport) -> CheckerResult {
        Ok(())
    }

    fn check_cross_reference(&mut self, _rep: &mut VerifyReport) -> CheckerResult {
        Ok(())
    }
}

type PhaseFn<S> = fn(&mut S, &mut VerifyReport) -> CheckerResult;
