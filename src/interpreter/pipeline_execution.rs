//! Pipeline Execution
//!
//! Handles execution of command pipelines (cmd1 | cmd2 | cmd3).
//!
//! Every stage runs on its own scoped thread with a child copy of the
//! interpreter state, so variable and directory changes inside a pipeline do
//! not reach the caller. Adjacent stages are joined by a bounded channel of
//! byte chunks. An external program with no redirections streams through the
//! channel as it runs; any other stage reads its whole input first.

use std::io::{self, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use tracing::{debug, warn};

use crate::ast::types::{CommandNode, SequenceNode};
use crate::interpreter::command_resolution::{resolve_command, ResolvedCommand};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::expansion::substitute_loop_vars;
use crate::interpreter::process::INTERRUPTED_EXIT_CODE;
use crate::interpreter::types::{ExecResult, InterpreterState};

/// Reading end of a pipe between two stages.
pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl ChannelReader {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            offset: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                // Writer gone: end of input
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Writing end of a pipe between two stages.
pub struct ChannelWriter {
    tx: SyncSender<Vec<u8>>,
}

impl ChannelWriter {
    pub fn new(tx: SyncSender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum StageInput {
    Text(String),
    Pipe(ChannelReader),
}

enum StageOutput {
    Pipe(ChannelWriter),
    Capture(Vec<u8>),
}

impl StageOutput {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            StageOutput::Pipe(writer) => writer,
            StageOutput::Capture(buf) => buf,
        }
    }
}

/// Outcome of one stage: captured stdout (last stage only), stderr, status.
struct StageResult {
    stdout: Vec<u8>,
    stderr: String,
    exit_code: i32,
}

/// Execute a pipe tree. The result carries the last stage's stdout and exit
/// status and the stderr of every stage in order.
pub fn execute_pipeline(
    engine: &ExecutionEngine<'_>,
    state: &InterpreterState,
    pipeline: &SequenceNode,
    stdin: &str,
) -> Result<ExecResult, InterpreterError> {
    let stages = pipeline.pipe_stages();
    debug!(stages = stages.len(), "pipeline");

    let mut inputs = vec![StageInput::Text(stdin.to_string())];
    let mut outputs = Vec::with_capacity(stages.len());
    for _ in 1..stages.len() {
        let (tx, rx) = sync_channel(engine.limits.pipe_buffer.max(1));
        outputs.push(StageOutput::Pipe(ChannelWriter::new(tx)));
        inputs.push(StageInput::Pipe(ChannelReader::new(rx)));
    }
    outputs.push(StageOutput::Capture(Vec::new()));

    let engine = *engine;
    let results: Vec<StageResult> = std::thread::scope(|scope| {
        let handles: Vec<_> = stages
            .iter()
            .zip(inputs.into_iter().zip(outputs))
            .map(|(stage, (input, output))| {
                let child = state.child_context();
                scope.spawn(move || run_stage(&engine, child, stage, input, output))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    warn!("pipeline stage panicked");
                    StageResult {
                        stdout: Vec::new(),
                        stderr: String::new(),
                        exit_code: 1,
                    }
                })
            })
            .collect()
    });

    let mut result = ExecResult::ok();
    for stage in results {
        result.stdout = String::from_utf8_lossy(&stage.stdout).into_owned();
        result.stderr.push_str(&stage.stderr);
        result.exit_code = stage.exit_code;
    }
    Ok(result)
}

fn run_stage(
    engine: &ExecutionEngine<'_>,
    mut state: InterpreterState,
    stage: &SequenceNode,
    input: StageInput,
    mut output: StageOutput,
) -> StageResult {
    let (stderr, exit_code) = match (streaming_program(&state, stage), input) {
        (Some((program, args)), StageInput::Pipe(mut reader)) => {
            engine.run_external_streaming(&state, &program, &args, &mut reader, output.writer())
        }
        (Some((program, args)), StageInput::Text(text)) => {
            let mut reader = io::Cursor::new(text.into_bytes());
            engine.run_external_streaming(&state, &program, &args, &mut reader, output.writer())
        }
        (None, input) => {
            let text = match input {
                StageInput::Text(text) => text,
                StageInput::Pipe(mut reader) => {
                    let mut bytes = Vec::new();
                    if let Err(e) = reader.read_to_end(&mut bytes) {
                        warn!(error = %e, "failed to read pipe");
                    }
                    String::from_utf8_lossy(&bytes).into_owned()
                }
            };
            let result = match engine.execute_sequence(&mut state, stage, &text) {
                Ok(result) => result,
                Err(e) => stage_error_result(e),
            };
            // The reader may have exited already
            let _ = output.writer().write_all(result.stdout.as_bytes());
            (result.stderr, result.exit_code)
        }
    };

    let stdout = match output {
        StageOutput::Capture(buf) => buf,
        // Dropping the writer closes the pipe for the next stage
        StageOutput::Pipe(_) => Vec::new(),
    };
    StageResult { stdout, stderr, exit_code }
}

/// The external program a stage runs directly, if it is nothing more than
/// that: one simple command without redirections.
fn streaming_program(
    state: &InterpreterState,
    stage: &SequenceNode,
) -> Option<(std::path::PathBuf, Vec<String>)> {
    let SequenceNode::Single(CommandNode::Simple(cmd)) = stage else {
        return None;
    };
    if !cmd.redirections.is_empty() {
        return None;
    }
    let name = substitute_loop_vars(&cmd.name, &state.loop_stack, &state.cwd);
    match resolve_command(&name, state) {
        ResolvedCommand::External(program) => {
            let args = cmd
                .args
                .iter()
                .map(|arg| substitute_loop_vars(arg, &state.loop_stack, &state.cwd))
                .collect();
            Some((program, args))
        }
        _ => None,
    }
}

/// A control-flow error cannot leave its stage; keep its output and status.
fn stage_error_result(mut error: InterpreterError) -> ExecResult {
    let (stdout, mut stderr) = error.take_output();
    let exit_code = match &error {
        InterpreterError::Exit(e) => e.exit_code,
        InterpreterError::Interrupted(_) => INTERRUPTED_EXIT_CODE,
        InterpreterError::LabelNotFound(e) => {
            stderr.push_str(&e.message());
            1
        }
        _ => 1,
    };
    ExecResult::new(stdout, stderr, exit_code)
}
