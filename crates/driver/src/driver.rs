use std::env;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use conefor_common::{EventBus, InfoSection};
use tracing::{debug, info, warn};

use crate::{
    DriverError,
    merge::{created_files, merge_outputs, snapshot},
    options::ConeforOptions,
};

/// Executable names tried when looking Conefor up on the PATH
const EXECUTABLE_NAMES: [&str; 4] = ["coneforWin64.exe", "conefor", "Conefor", "conefor.exe"];

/// Inputs copied next to the executable; removed again on drop
struct StagedInputs(Vec<PathBuf>);

impl Drop for StagedInputs {
    fn drop(&mut self) {
        for path in &self.0 {
            if let Err(e) = fs::remove_file(path) {
                warn!("Could not remove staged input {}: {}", path.display(), e);
            }
        }
    }
}

/// Runs the Conefor command line tool.
///
/// Conefor reads its inputs from and writes its results to its own
/// directory, so every run is executed there and the results are moved out
/// afterwards.
#[derive(Debug, Clone)]
pub struct ConeforDriver {
    executable: PathBuf,
}

impl ConeforDriver {
    /// Look for Conefor on the PATH
    pub fn find() -> Result<Self, DriverError> {
        let path = Self::find_executable()?;
        Ok(Self { executable: path })
    }

    pub fn with_path(executable: impl Into<PathBuf>) -> Result<Self, DriverError> {
        let executable = executable.into();
        if !executable.is_file() {
            return Err(DriverError::Initialization(format!(
                "Conefor executable not found at: {}",
                executable.display()
            )));
        }
        Ok(Self { executable })
    }

    fn find_executable() -> Result<PathBuf, DriverError> {
        if let Some(path_var) = env::var_os("PATH") {
            for dir in env::split_paths(&path_var) {
                for name in EXECUTABLE_NAMES {
                    let candidate = dir.join(name);
                    if candidate.is_file() {
                        return Ok(candidate);
                    }
                }
            }
        }

        Err(DriverError::Initialization(
            "Conefor executable not found. Install it or specify the path.".to_string(),
        ))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Directory Conefor runs in
    pub fn working_dir(&self) -> Result<PathBuf, DriverError> {
        let dir = self
            .executable
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(dir.canonicalize()?)
    }

    pub fn build_command(&self, options: &ConeforOptions) -> Result<Command, DriverError> {
        options.validate()?;
        let mut cmd = Command::new(&self.executable);
        cmd.args(options.arguments())
            .current_dir(self.working_dir()?)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn stage(&self, dir: &Path, options: &ConeforOptions) -> Result<StagedInputs, DriverError> {
        let mut staged = StagedInputs(Vec::new());
        for input in [&options.node_file, &options.connection_file] {
            let name = input.file_name().ok_or_else(|| {
                DriverError::InvalidOptions(format!("'{}' is not a file", input.display()))
            })?;
            let target = dir.join(name);
            let already_there = input
                .canonicalize()
                .map(|source| source == target)
                .unwrap_or(false);
            if already_there {
                continue;
            }
            fs::copy(input, &target)?;
            staged.0.push(target);
        }
        Ok(staged)
    }

    /// Run Conefor and move its results into `output_dir`.
    ///
    /// Each stdout line is published as an external info event while the
    /// tool runs. Returns the merged result files.
    pub fn run(
        &self,
        options: &ConeforOptions,
        output_dir: &Path,
        bus: &EventBus,
    ) -> Result<Vec<PathBuf>, DriverError> {
        let mut cmd = self.build_command(options)?;
        let dir = self.working_dir()?;

        let staged = self.stage(&dir, options)?;
        let before = snapshot(&dir)?;

        info!("Executing Conefor command: {:?}", cmd);
        let mut child = cmd
            .spawn()
            .map_err(|e| DriverError::Execution(format!("could not start {}: {}", self.executable.display(), e)))?;

        // Drain stderr on the side so a chatty tool cannot block on a full pipe
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut bytes = Vec::new();
                if let Err(e) = pipe.read_to_end(&mut bytes) {
                    warn!("Could not read Conefor stderr: {}", e);
                }
                String::from_utf8_lossy(&bytes).into_owned()
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = line?;
                debug!("conefor: {}", line);
                bus.info(line, InfoSection::External);
            }
        }

        let status = child.wait()?;
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(DriverError::Execution(format!(
                "{}: {}",
                status,
                stderr.trim()
            )));
        }

        let after = snapshot(&dir)?;
        let created = created_files(&before, &after);
        drop(staged);

        let merged = merge_outputs(&created, output_dir)?;
        info!("Conefor produced {} result file(s)", merged.len());
        Ok(merged)
    }
}
