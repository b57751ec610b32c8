use std::io::{self, Read};
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};

const CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputSource {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputChunk {
    pub(crate) source: OutputSource,
    pub(crate) text: String,
}

/// A running child whose stdout and stderr are delivered as they arrive.
///
/// Iterating yields chunks until both pipes are closed; `wait` then reaps the
/// process. Progress bars that redraw with `\r` come through unbuffered.
pub(crate) struct StreamingChild {
    child: Child,
    rx: Receiver<OutputChunk>,
    readers: Vec<JoinHandle<()>>,
}

fn forward<R: Read + Send + 'static>(
    mut pipe: R,
    source: OutputSource,
    tx: mpsc::Sender<OutputChunk>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0_u8; CHUNK_SIZE];
        let mut pending = Vec::new();
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    pending.extend_from_slice(&buf[..read]);
                    let text = take_valid_utf8(&mut pending);
                    if !text.is_empty() && tx.send(OutputChunk { source, text }).is_err() {
                        return;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        if !pending.is_empty() {
            let text = String::from_utf8_lossy(&pending).into_owned();
            let _ = tx.send(OutputChunk { source, text });
        }
    })
}

/// Drains everything decodable, replacing invalid bytes and holding back a
/// split trailing sequence for the next read.
pub(crate) fn take_valid_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    let mut start = 0;
    while start < pending.len() {
        match std::str::from_utf8(&pending[start..]) {
            Ok(valid) => {
                text.push_str(valid);
                start = pending.len();
            }
            Err(err) => {
                let valid_end = start + err.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[start..valid_end]));
                match err.error_len() {
                    Some(invalid) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        start = valid_end + invalid;
                    }
                    None => {
                        start = valid_end;
                        break;
                    }
                }
            }
        }
    }
    pending.drain(..start);
    text
}

impl StreamingChild {
    pub(crate) fn spawn(mut cmd: ProcessCommand) -> Result<Self> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch {program}"))?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward(stdout, OutputSource::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward(stderr, OutputSource::Stderr, tx));
        }

        Ok(Self {
            child,
            rx,
            readers,
        })
    }

    pub(crate) fn wait(mut self) -> Result<ExitStatus> {
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
        self.child.wait().context("failed waiting on downloader")
    }
}

impl Iterator for StreamingChild {
    type Item = OutputChunk;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

#[cfg(unix)]
extern "C" fn shutdown_on_interrupt(_signum: libc::c_int) {
    const MESSAGE: &[u8] = b"\n\nCTRL-C detected, shutting down....\n";
    unsafe {
        let _ = libc::write(libc::STDERR_FILENO, MESSAGE.as_ptr().cast(), MESSAGE.len());
        libc::_exit(0);
    }
}

/// Installs a SIGINT handler that ends the whole run with a short notice.
#[cfg(unix)]
pub(crate) fn install_interrupt_handler() -> Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction =
            shutdown_on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error()).context("failed to install SIGINT handler");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn install_interrupt_handler() -> Result<()> {
    Ok(())
}
