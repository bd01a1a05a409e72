// Shared memory backends for the ring transport.
// Anonymous mappings serve sessions inside one process; named regions live
// under /dev/shm so that xApps in other processes can attach by name.

use std::fmt::Debug;
use std::io;

/// Shared memory backend trait for cross-platform memory mapping
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying handle of the mapping
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHandle {
    /// Unix file descriptor of a named region
    Fd(i32),
    /// Anonymous mapping; only reachable from this process
    Anonymous,
}

/// Create a new shared memory region with the specified size.
///
/// With `name` the region is backed by `/dev/shm/<name>` (created or
/// truncated) and can be attached from other processes. Without a name the
/// mapping is anonymous and private to this process and its threads.
#[cfg(target_os = "linux")]
pub fn create_shared_memory(
    size: usize,
    name: Option<&str>,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    match name {
        Some(name) => Ok(Box::new(LinuxSharedMemory::create_named(size, name)?)),
        None => Ok(Box::new(LinuxSharedMemory::create_anonymous(size)?)),
    }
}

/// Attach to an existing named shared memory region.
///
/// # Arguments
/// * `name` - Name of the region under /dev/shm
/// * `size` - Minimum expected size of the region (for validation)
#[cfg(target_os = "linux")]
pub fn attach_shared_memory(name: &str, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::attach(name, size)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(
    _size: usize,
    _name: Option<&str>,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn attach_shared_memory(_name: &str, _size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::fd::{AsRawFd, IntoRawFd};
#[cfg(target_os = "linux")]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(target_os = "linux")]
use std::path::PathBuf;
#[cfg(target_os = "linux")]
use std::ptr::{self, NonNull};

#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct LinuxSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: Option<i32>,
    /// Set for the creator of a named region; the file is unlinked on drop.
    owned_path: Option<PathBuf>,
}

#[cfg(target_os = "linux")]
unsafe impl Send for LinuxSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for LinuxSharedMemory {}

#[cfg(target_os = "linux")]
fn shm_path(name: &str) -> PathBuf {
    PathBuf::from(format!("/dev/shm/{name}"))
}

#[cfg(target_os = "linux")]
unsafe fn map_region(size: usize, fd: Option<i32>) -> io::Result<NonNull<u8>> {
    let (flags, fd) = match fd {
        Some(fd) => (libc::MAP_SHARED, fd),
        None => (libc::MAP_SHARED | libc::MAP_ANONYMOUS, -1),
    };

    let ptr = libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_READ | libc::PROT_WRITE,
        flags,
        fd,
        0,
    );
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    // mmap hands back page aligned memory, which covers the 128 byte layout alignment
    NonNull::new(ptr.cast::<u8>())
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"))
}

#[cfg(target_os = "linux")]
impl LinuxSharedMemory {
    /// Create an anonymous, process-local shared mapping.
    pub fn create_anonymous(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Shared memory size must be greater than zero",
            ));
        }

        let ptr = unsafe { map_region(size, None)? };
        Ok(Self {
            ptr,
            size,
            fd: None,
            owned_path: None,
        })
    }

    /// Create (or truncate) a named region in /dev/shm.
    pub fn create_named(size: usize, name: &str) -> io::Result<Self> {
        let path = shm_path(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to create shared memory file at {}: {e}", path.display()),
                )
            })?;

        file.set_len(size as u64)?;

        let fd = file.into_raw_fd();
        let ptr = match unsafe { map_region(size, Some(fd)) } {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        Ok(Self {
            ptr,
            size,
            fd: Some(fd),
            owned_path: Some(path),
        })
    }

    /// Map an existing named region created by another session.
    pub fn attach(name: &str, expected_size: usize) -> io::Result<Self> {
        let path = shm_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Failed to open shared memory at {}: {e}", path.display()),
                )
            })?;

        let file_size = file.metadata()?.len() as usize;
        if file_size < expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Shared memory size too small: expected at least {expected_size} bytes, got {file_size}"
                ),
            ));
        }

        let ptr = unsafe { map_region(file_size, Some(file.as_raw_fd()))? };

        Ok(Self {
            ptr,
            size: file_size,
            fd: Some(file.into_raw_fd()),
            owned_path: None,
        })
    }
}

#[cfg(target_os = "linux")]
impl Drop for LinuxSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast::<libc::c_void>(), self.size);
            if let Some(fd) = self.fd {
                libc::close(fd);
            }
        }
        if let Some(path) = self.owned_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for LinuxSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        match self.fd {
            Some(fd) => RawHandle::Fd(fd),
            None => RawHandle::Anonymous,
        }
    }
}
