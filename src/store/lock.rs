use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::StoreError;

/// Exclusive advisory lock on a collection's sidecar `.lock` file.
///
/// The data file itself is replaced by rename on every write, so the lock lives
/// on a separate file that is never replaced. Released when dropped.
#[derive(Debug)]
pub struct CollectionLock {
    file: File,
    path: PathBuf,
}

impl CollectionLock {
    /// Sidecar lock path for a collection file: `employees.json` -> `employees.json.lock`
    pub fn lock_path_for(data_path: &Path) -> PathBuf {
        let mut os = data_path.as_os_str().to_owned();
        os.push(".lock");
        PathBuf::from(os)
    }

    /// Acquire the lock, blocking indefinitely when `timeout` is `None`, otherwise
    /// polling every `retry_interval` until the deadline passes.
    pub fn acquire(
        data_path: &Path,
        timeout: Option<Duration>,
        retry_interval: Duration,
    ) -> Result<Self, StoreError> {
        let path = Self::lock_path_for(data_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let started = Instant::now();
        match timeout {
            None => {
                try_flock(&file, true).map_err(|source| StoreError::Lock { path: path.clone(), source })?;
            }
            Some(timeout) => loop {
                match try_flock(&file, false) {
                    Ok(true) => break,
                    Ok(false) => {
                        if started.elapsed() >= timeout {
                            tracing::warn!("Timed out after {:?} waiting for lock {}", timeout, path.display());
                            return Err(StoreError::LockTimeout { path, waited: started.elapsed() });
                        }
                        std::thread::sleep(retry_interval);
                    }
                    Err(source) => return Err(StoreError::Lock { path, source }),
                }
            },
        }

        tracing::trace!("Acquired {} in {:?}", path.display(), started.elapsed());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        unlock(&self.file);
        tracing::trace!("Released {}", self.path.display());
    }
}

/// Returns Ok(false) when a non-blocking attempt would block
#[cfg(unix)]
fn try_flock(file: &File, blocking: bool) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let operation = if blocking { libc::LOCK_EX } else { libc::LOCK_EX | libc::LOCK_NB };

    loop {
        let result = unsafe { libc::flock(fd, operation) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EWOULDBLOCK => return Ok(false),
            Some(code) if code == libc::EINTR => continue,
            _ => return Err(err),
        }
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;
    // Closing the descriptor releases the lock as well; this just makes it prompt
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(windows)]
fn try_flock(file: &File, blocking: bool) -> io::Result<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY};
    use windows_sys::Win32::System::IO::OVERLAPPED;

    let handle = file.as_raw_handle() as HANDLE;
    let flags = LOCKFILE_EXCLUSIVE_LOCK | if blocking { 0 } else { LOCKFILE_FAIL_IMMEDIATELY };
    let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };

    let result = unsafe { LockFileEx(handle, flags, 0, 1, 0, &mut overlapped) };
    if result != 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == ERROR_LOCK_VIOLATION as i32 => Ok(false),
        _ => Err(err),
    }
}

#[cfg(windows)]
fn unlock(file: &File) {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::UnlockFileEx;
    use windows_sys::Win32::System::IO::OVERLAPPED;

    let handle = file.as_raw_handle() as HANDLE;
    let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
    unsafe {
        UnlockFileEx(handle, 0, 1, 0, &mut overlapped);
    }
}

/// No advisory locking primitive here; writers must not proceed unlocked
#[cfg(not(any(unix, windows)))]
fn try_flock(_file: &File, _blocking: bool) -> io::Result<bool> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "collection locking is not supported on this platform",
    ))
}

#[cfg(not(any(unix, windows)))]
fn unlock(_file: &File) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(any(unix, windows))]
    #[test]
    fn second_holder_times_out_until_first_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("empleados.json");

        let first = CollectionLock::acquire(&data, None, Duration::from_millis(5)).unwrap();
        assert!(first.path().ends_with("empleados.json.lock"));

        let err = CollectionLock::acquire(&data, Some(Duration::from_millis(30)), Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));

        drop(first);
        assert!(CollectionLock::acquire(&data, Some(Duration::from_millis(30)), Duration::from_millis(5)).is_ok());
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn blocking_acquire_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("oficinas.json");

        let first = CollectionLock::acquire(&data, None, Duration::from_millis(5)).unwrap();
        let waiter = {
            let data = data.clone();
            std::thread::spawn(move || CollectionLock::acquire(&data, None, Duration::from_millis(5)).map(|_| Instant::now()))
        };
        std::thread::sleep(Duration::from_millis(50));
        let released = Instant::now();
        drop(first);

        let acquired = waiter.join().unwrap().unwrap();
        assert!(acquired >= released);
    }

    #[cfg(not(any(unix, windows)))]
    #[test]
    fn unsupported_platforms_refuse_to_lock() {
        let dir = tempfile::tempdir().unwrap();
        let err = CollectionLock::acquire(&dir.path().join("empleados.json"), None, Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(err, StoreError::Lock { .. }));
    }
}
