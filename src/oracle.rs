//! Oracles answer queries with labels.
//!
//! [`TerminalOracle`] asks a human on a line-oriented terminal;
//! [`SimulatedOracle`] answers from the pool's withheld true labels.
use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};

use crate::error::SessionError;
use crate::session::{LabelSpace, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleAnswer {
    Label(i32),
    /// Stop labelling; the pending query stays open.
    Quit,
}

pub trait Oracle {
    fn ask(&mut self, query: &Query, label_space: &LabelSpace) -> Result<OracleAnswer>;

    /// The session rejected the last answer; the same query will be asked again.
    fn rejected(&mut self, _query: &Query, _error: &SessionError) {}
}

/// Answers with the true label of each pool sample, looked up by sample id.
pub struct SimulatedOracle {
    truth: Vec<i32>,
}

impl SimulatedOracle {
    pub fn new(truth: Vec<i32>) -> Self {
        SimulatedOracle { truth }
    }
}

impl Oracle for SimulatedOracle {
    fn ask(&mut self, query: &Query, _label_space: &LabelSpace) -> Result<OracleAnswer> {
        match self.truth.get(query.sample_id.0) {
            Some(&label) => Ok(OracleAnswer::Label(label)),
            None => bail!("no true label recorded for sample {}", query.sample_id),
        }
    }

    fn rejected(&mut self, query: &Query, error: &SessionError) {
        log::warn!("Simulated label for sample {} rejected: {}", query.sample_id, error);
    }
}

/// Prompts for labels on `output` and reads them line by line from `input`.
pub struct TerminalOracle<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalOracle<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalOracle { input, output }
    }

    fn render(&mut self, query: &Query) -> Result<()> {
        let features = query.sample.features();
        writeln!(
            self.output,
            "\nSample {} (pool index {}):",
            query.sample_id, query.index
        )?;
        let side = (features.len() as f64).sqrt() as usize;
        if side > 1 && side * side == features.len() {
            for row in features.chunks(side) {
                let cells: Vec<String> = row.iter().map(|v| format!("{:>5.1}", v)).collect();
                writeln!(self.output, "  {}", cells.join(" "))?;
            }
        } else {
            let cells: Vec<String> = features.iter().map(|v| format!("{:.3}", v)).collect();
            writeln!(self.output, "  [{}]", cells.join(", "))?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Oracle for TerminalOracle<R, W> {
    fn ask(&mut self, query: &Query, label_space: &LabelSpace) -> Result<OracleAnswer> {
        self.render(query)?;
        loop {
            write!(self.output, "Label {} (q to quit): ", label_space)?;
            self.output.flush()?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .context("Failed to read label")?;
            if read == 0 {
                return Ok(OracleAnswer::Quit);
            }
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("q") || answer.eq_ignore_ascii_case("quit") {
                return Ok(OracleAnswer::Quit);
            }
            match answer.parse::<i32>() {
                Ok(label) => return Ok(OracleAnswer::Label(label)),
                Err(_) => writeln!(self.output, "Please enter an integer label.")?,
            }
        }
    }

    fn rejected(&mut self, _query: &Query, error: &SessionError) {
        let _ = writeln!(self.output, "Error: {}", error);
    }
}
