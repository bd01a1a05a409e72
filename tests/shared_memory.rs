// Shared memory backend tests for Linux
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(target_os = "linux")]
mod linux_tests {
    use serial_test::serial;
    use std::path::Path;
    use xapp_frame::Core::{attach_shared_memory, create_shared_memory, RawHandle};

    fn unique(name: &str) -> String {
        format!("xapp_frame_{name}_{}", std::process::id())
    }

    #[test]
    fn test_anonymous_region() {
        let size = 4096;
        let shm = create_shared_memory(size, None).unwrap();

        assert_eq!(shm.size(), size);
        assert!(!shm.as_ptr().is_null());
        assert_eq!(shm.raw_handle(), RawHandle::Anonymous);

        unsafe {
            let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), size);
            assert!(slice.iter().all(|b| *b == 0), "mapping should be zero-initialized");
            slice[0] = 0x42;
            slice[size - 1] = 0x24;
            assert_eq!(slice[0], 0x42);
            assert_eq!(slice[size - 1], 0x24);
        }
    }

    #[test]
    fn test_zero_size_is_refused() {
        assert!(create_shared_memory(0, None).is_err());
    }

    #[test]
    #[serial]
    fn test_named_region_is_shared_and_removed() {
        let name = unique("named");
        let path = format!("/dev/shm/{name}");
        let size = 8192;

        {
            let owner = create_shared_memory(size, Some(name.as_str())).unwrap();
            assert!(matches!(owner.raw_handle(), RawHandle::Fd(fd) if fd > 0));
            assert!(Path::new(&path).exists());

            let peer = attach_shared_memory(&name, size).unwrap();
            assert_eq!(peer.size(), size);

            unsafe {
                let written = std::slice::from_raw_parts_mut(owner.as_ptr(), size);
                for (i, b) in written.iter_mut().enumerate().take(100) {
                    *b = (i % 256) as u8;
                }
                let seen = std::slice::from_raw_parts(peer.as_ptr(), size);
                for (i, b) in seen.iter().enumerate().take(100) {
                    assert_eq!(*b, (i % 256) as u8);
                }
            }
        }

        assert!(!Path::new(&path).exists(), "owner should unlink the region");
    }

    #[test]
    #[serial]
    fn test_attach_checks_size() {
        let name = unique("small");
        let _owner = create_shared_memory(4096, Some(name.as_str())).unwrap();

        let err = attach_shared_memory(&name, 1 << 20).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_attach_missing_region() {
        let err = attach_shared_memory("xapp_frame_no_such_region", 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}

#[cfg(not(target_os = "linux"))]
mod non_linux_tests {
    use xapp_frame::Core::{attach_shared_memory, create_shared_memory};

    #[test]
    fn test_unsupported_platform() {
        let err = create_shared_memory(4096, None).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_attach_unsupported_platform() {
        let err = attach_shared_memory("test", 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
    }
}
