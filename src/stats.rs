//! Timing and resident-memory instrumentation for a conversion run.
//!
//! [`StatsRecorder`] takes a sample at run start and after each [`Phase`];
//! [`RunStats::report`] renders the summary block shown by `--stats`.
//! Memory figures are best-effort: if the process cannot be inspected they
//! are simply absent.

use serde::Serialize;
use std::fmt;
use std::time::Instant;
use sysinfo::{Pid, System};
use tracing::debug;

/// Human-readable size with binary (1024) steps and two decimals.
///
/// ```rust
/// use edgequake_doc2md::stats::format_bytes;
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}

/// [`format_bytes`] with an explicit sign.
pub fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { '-' } else { '+' };
    format!("{sign}{}", format_bytes(delta.unsigned_abs()))
}

/// Timed stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initialization,
    Conversion,
    Export,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Initialization => "initialization",
            Phase::Conversion => "conversion",
            Phase::Export => "export",
        })
    }
}

/// Reads the resident set size of the current process.
pub struct MemorySampler {
    system: System,
    pid: Option<Pid>,
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| debug!("Cannot determine current pid: {}", e))
            .ok();
        Self {
            system: System::new(),
            pid,
        }
    }

    /// Current RSS in bytes.
    pub fn sample(&mut self) -> Option<u64> {
        let pid = self.pid?;
        if !self.system.refresh_process(pid) {
            return None;
        }
        self.system.process(pid).map(|p| p.memory())
    }
}

/// State after one phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseSample {
    pub phase: Phase,
    /// Duration of the phase itself.
    pub elapsed_secs: f64,
    /// RSS at the end of the phase.
    pub memory: Option<u64>,
    /// RSS change since the run started.
    pub memory_delta: Option<i64>,
}

impl PhaseSample {
    /// `[Stats] After conversion: 210.00 MB (+80.00 MB, took 3.20s)`
    pub fn summary_line(&self) -> String {
        let Some(memory) = self.memory else {
            return format!("[Stats] After {}: took {:.2}s", self.phase, self.elapsed_secs);
        };
        match (self.phase, self.memory_delta) {
            (Phase::Export, _) | (_, None) => format!(
                "[Stats] After {}: {} (took {:.2}s)",
                self.phase,
                format_bytes(memory),
                self.elapsed_secs
            ),
            (_, Some(delta)) => format!(
                "[Stats] After {}: {} ({}, took {:.2}s)",
                self.phase,
                format_bytes(memory),
                format_delta(delta),
                self.elapsed_secs
            ),
        }
    }
}

/// Memory figures for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub initial: u64,
    #[serde(rename = "final")]
    pub final_: u64,
    pub peak: u64,
    pub increase: i64,
}

/// Timings and memory for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total_secs: f64,
    pub initialization_secs: f64,
    pub conversion_secs: f64,
    pub export_secs: f64,
    pub memory: Option<MemoryStats>,
    pub phases: Vec<PhaseSample>,
}

impl RunStats {
    /// The "Performance Statistics" block.
    pub fn report(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        out.push_str(&format!("\n{rule}\nPerformance Statistics:\n{rule}\n"));
        out.push_str(&format!("  Total time:          {:.2}s\n", self.total_secs));
        out.push_str(&format!("    - Initialization:  {:.2}s\n", self.initialization_secs));
        out.push_str(&format!("    - Conversion:      {:.2}s\n", self.conversion_secs));
        out.push_str(&format!("    - Export:          {:.2}s\n", self.export_secs));
        if let Some(m) = &self.memory {
            out.push_str("\n  Memory usage:\n");
            out.push_str(&format!("    - Initial:         {}\n", format_bytes(m.initial)));
            out.push_str(&format!("    - Final:           {}\n", format_bytes(m.final_)));
            out.push_str(&format!("    - Peak:            {}\n", format_bytes(m.peak)));
            out.push_str(&format!("    - Increase:        {}\n", format_delta(m.increase)));
        }
        out.push_str(&rule);
        out
    }
}

/// Collects [`RunStats`] while a run progresses.
pub struct StatsRecorder {
    sampler: Option<MemorySampler>,
    started: Instant,
    phase_started: Instant,
    initial_memory: Option<u64>,
    peak_memory: Option<u64>,
    phases: Vec<PhaseSample>,
}

impl StatsRecorder {
    /// Start the clock; memory is sampled only when `sample_memory` is set.
    pub fn start(sample_memory: bool) -> Self {
        let mut sampler = sample_memory.then(MemorySampler::new);
        let initial_memory = sampler.as_mut().and_then(MemorySampler::sample);
        let now = Instant::now();
        Self {
            sampler,
            started: now,
            phase_started: now,
            initial_memory,
            peak_memory: initial_memory,
            phases: Vec::new(),
        }
    }

    pub fn initial_memory(&self) -> Option<u64> {
        self.initial_memory
    }

    /// Restart the phase clock.
    pub fn begin(&mut self) {
        self.phase_started = Instant::now();
    }

    /// Close `phase` and sample memory.
    pub fn record(&mut self, phase: Phase) -> PhaseSample {
        let elapsed = self.phase_started.elapsed();
        let memory = self.sample_memory();
        let sample = PhaseSample {
            phase,
            elapsed_secs: elapsed.as_secs_f64(),
            memory,
            memory_delta: memory.zip(self.initial_memory).map(|(m, i)| m as i64 - i as i64),
        };
        debug!("Phase {} finished in {:?}", phase, elapsed);
        self.phases.push(sample);
        self.phase_started = Instant::now();
        sample
    }

    fn sample_memory(&mut self) -> Option<u64> {
        let memory = self.sampler.as_mut()?.sample()?;
        self.peak_memory = Some(self.peak_memory.map_or(memory, |p| p.max(memory)));
        Some(memory)
    }

    pub fn finish(mut self) -> RunStats {
        let final_memory = self.sample_memory();
        let secs = |phase| {
            self.phases
                .iter()
                .filter(|s| s.phase == phase)
                .map(|s| s.elapsed_secs)
                .sum::<f64>()
        };
        let memory = match (self.initial_memory, final_memory, self.peak_memory) {
            (Some(initial), Some(final_), Some(peak)) => Some(MemoryStats {
                initial,
                final_,
                peak,
                increase: final_ as i64 - initial as i64,
            }),
            _ => None,
        };
        RunStats {
            total_secs: self.started.elapsed().as_secs_f64(),
            initialization_secs: secs(Phase::Initialization),
            conversion_secs: secs(Phase::Conversion),
            export_secs: secs(Phase::Export),
            memory,
            phases: self.phases,
        }
    }
}
