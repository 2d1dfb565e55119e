//! Run recorder writing config, time series, audits and metadata.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::schema::{AuditReport, RunMetadata, SimulationConfig, StepRecord};

pub const CONFIG_FILE: &str = "config.json";
pub const TIMESERIES_FILE: &str = "timeseries.jsonl";
pub const AUDITS_FILE: &str = "audits.jsonl";
pub const AUDIT_LOG_FILE: &str = "physics_audit.txt";
pub const METADATA_FILE: &str = "metadata.json";

/// Configuration for run recording.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Write every Nth step record (1 = every tick).
    pub record_every: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { record_every: 1 }
    }
}

/// Writes one run folder.
///
/// Usage:
/// ```ignore
/// let mut recorder = RunRecorder::new("runs/run_001", "run_001", sim.config(), Default::default())?;
/// while sim.run(1) == 1 {
///     recorder.record_step(&sim.snapshot())?;
/// }
/// recorder.record_audit(&sim.audit_report())?;
/// recorder.finish(sim.seed(), &sim.snapshot())?;
/// ```
pub struct RunRecorder {
    dir: PathBuf,
    run_id: String,
    config: RecorderConfig,
    timeseries: BufWriter<File>,
    audits: BufWriter<File>,
    audit_log: BufWriter<File>,
    records_written: u64,
    audits_written: u64,
    max_population: usize,
}

impl RunRecorder {
    /// Create the run folder and write the configuration snapshot.
    pub fn new<P: AsRef<Path>>(
        dir: P,
        run_id: impl Into<String>,
        sim_config: &SimulationConfig,
        config: RecorderConfig,
    ) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        write_json(&dir.join(CONFIG_FILE), sim_config)?;

        let run_id = run_id.into();
        let mut audit_log = BufWriter::new(File::create(dir.join(AUDIT_LOG_FILE))?);
        writeln!(audit_log, "PHYSICS AUDIT LOG: {}", run_id)?;
        writeln!(audit_log, "{}", "=".repeat(60))?;

        Ok(Self {
            timeseries: BufWriter::new(File::create(dir.join(TIMESERIES_FILE))?),
            audits: BufWriter::new(File::create(dir.join(AUDITS_FILE))?),
            audit_log,
            dir,
            run_id,
            config,
            records_written: 0,
            audits_written: 0,
            max_population: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append a step record.
    ///
    /// Returns true if the record was written (ticks off the `record_every`
    /// cadence are skipped). Peak population is tracked either way.
    pub fn record_step(&mut self, record: &StepRecord) -> io::Result<bool> {
        self.max_population = self.max_population.max(record.total_population);

        let every = self.config.record_every.max(1);
        if record.tick % every != 0 {
            return Ok(false);
        }

        write_json_line(&mut self.timeseries, record)?;
        self.records_written += 1;
        Ok(true)
    }

    /// Append an audit report to both the JSON lines file and the text log.
    pub fn record_audit(&mut self, report: &AuditReport) -> io::Result<()> {
        write_json_line(&mut self.audits, report)?;

        let mass = &report.mass;
        let energy = &report.energy;
        let log = &mut self.audit_log;
        writeln!(log)?;
        writeln!(log, "[tick {}]", mass.tick)?;
        writeln!(log, "MASS   {:?}", mass.status)?;
        writeln!(log, "  error:      {:.6e}", mass.error)?;
        writeln!(log, "  correction: {:.6e}", mass.correction)?;
        writeln!(log, "  env mass:   {:.6}", mass.env_mass)?;
        writeln!(log, "  bio mass:   {:.6}", mass.bio_mass)?;
        writeln!(log, "  sourced:    {:.6}", mass.sourced)?;
        writeln!(log, "  decayed:    {:.6}", mass.decayed)?;
        writeln!(log, "ENERGY {:?}", energy.status)?;
        writeln!(log, "  error:      {:.6e}", energy.error)?;
        writeln!(log, "  heat field: {:.6}", energy.heat_field)?;
        writeln!(log, "  bio energy: {:.6}", energy.bio_energy)?;
        writeln!(log, "  generated:  {:.6}", energy.generated)?;
        writeln!(log, "  radiated:   {:.6}", energy.radiated)?;

        self.audits_written += 1;
        Ok(())
    }

    /// Flush all streams and write the run metadata.
    pub fn finish(mut self, seed: u64, last: &StepRecord) -> io::Result<RecordingStats> {
        self.max_population = self.max_population.max(last.total_population);
        self.timeseries.flush()?;
        self.audits.flush()?;
        self.audit_log.flush()?;

        let species_final_counts: BTreeMap<String, usize> = last
            .species
            .iter()
            .map(|(id, s)| (id.clone(), s.population))
            .collect();
        let metadata = RunMetadata {
            run_id: self.run_id,
            seed,
            total_ticks: last.tick,
            final_population: last.total_population,
            max_population: self.max_population,
            species_final_counts,
        };
        write_json(&self.dir.join(METADATA_FILE), &metadata)?;

        Ok(RecordingStats {
            records_written: self.records_written,
            audits_written: self.audits_written,
            metadata,
        })
    }
}

/// Summary of a finished recording.
#[derive(Debug, Clone)]
pub struct RecordingStats {
    pub records_written: u64,
    pub audits_written: u64,
    pub metadata: RunMetadata,
}

impl std::fmt::Display for RecordingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} step records, {} audits, {} ticks, peak population {}",
            self.records_written,
            self.audits_written,
            self.metadata.total_ticks,
            self.metadata.max_population
        )
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.flush()
}

fn write_json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer)
}
