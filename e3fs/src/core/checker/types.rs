// SPDX-License-Identifier: MIT

use alloc::{string::String, vec::Vec};
use core::fmt;

use bitflags::bitflags;

/// Finding severity, ordered `Info < Warn < Error`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    fn tag(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERR ",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Finding {
    pub sev: Severity,
    pub code: &'static str,
    pub msg: String,
}

impl Finding {
    pub fn info(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, msg)
    }

    pub fn warn(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(Severity::Warn, code, msg)
    }

    pub fn err(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, msg)
    }

    fn new(sev: Severity, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            sev,
            code,
            msg: msg.into(),
        }
    }
}

/// Ordered list of everything a check pass noticed.
#[derive(Clone, Debug, Default)]
pub struct VerifyReport {
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    pub fn has_error(&self) -> bool {
        self.findings.iter().any(|f| f.sev == Severity::Error)
    }

    pub fn ok(&self) -> bool {
        !self.has_error()
    }

    pub fn first_error(&self) -> Option<&Finding> {
        self.findings.iter().find(|f| f.sev == Severity::Error)
    }

    /// True when a finding with this code was recorded.
    pub fn has_code(&self, code: &str) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }

    pub fn push(&mut self, f: Finding) {
        self.findings.push(f)
    }

    pub fn count(&self, s: Severity) -> usize {
        self.findings.iter().filter(|f| f.sev == s).count()
    }

    /// Display of findings at or above `min_level`, with a trailing summary.
    pub fn display_min(&self, min_level: Severity) -> ReportDisplay<'_> {
        ReportDisplay {
            rep: self,
            min_level,
        }
    }
}

pub struct ReportDisplay<'a> {
    rep: &'a VerifyReport,
    min_level: Severity,
}

impl fmt::Display for ReportDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for it in self.rep.findings.iter().filter(|it| it.sev >= self.min_level) {
            writeln!(f, "{}: {:<12} {}", it.sev.tag(), it.code, it.msg)?;
        }
        writeln!(
            f,
            "Summary: errors={}  warns={}  infos={}",
            self.rep.count(Severity::Error),
            self.rep.count(Severity::Warn),
            self.rep.count(Severity::Info)
        )
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display_min(Severity::Info).fmt(f)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VerifyPhases: u32 {
        const SUPERBLOCK = 1 << 0;
        const CHAINS     = 1 << 1;
        const DIRECTORY  = 1 << 2;
        const CROSSREF   = 1 << 3;
        const ALL        = u32::MAX;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VerifyOptions {
    pub phases: VerifyPhases,
    /// Stop after the first phase that recorded an error.
    pub fail_fast: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            phases: VerifyPhases::ALL,
            fail_fast: false,
        }
    }
}
