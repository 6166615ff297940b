// Shared memory backend tests for Linux.
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(target_os = "linux")]
mod linux_tests {
    use shmring::core::{
        create_or_open_shared_memory, create_shared_memory, open_shared_memory,
        unlink_shared_memory, RawHandle,
    };

    fn region_name(tag: &str) -> String {
        format!("shmring-test-{}-{}", std::process::id(), tag)
    }

    fn shm_file_exists(name: &str) -> bool {
        std::path::Path::new(&format!("/dev/shm/{}", name)).exists()
    }

    #[test]
    fn create_maps_requested_size() {
        let name = region_name("create");
        let shm = create_shared_memory(&name, 4096).unwrap();

        assert_eq!(shm.size(), 4096);
        assert!(!shm.as_ptr().is_null());

        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd > 0, "File descriptor should be positive"),
        }
    }

    #[test]
    fn create_zero_initializes() {
        let name = region_name("zero");
        let shm = create_shared_memory(&name, 1024).unwrap();

        unsafe {
            let slice = std::slice::from_raw_parts(shm.as_ptr(), shm.size());
            assert!(
                slice.iter().all(|&b| b == 0),
                "fresh region should be zero-filled"
            );
        }
    }

    #[test]
    fn create_rejects_existing_name() {
        let name = region_name("exists");
        let _first = create_shared_memory(&name, 4096).unwrap();

        let second = create_shared_memory(&name, 4096);
        assert!(second.is_err());
        assert_eq!(
            second.unwrap_err().kind(),
            std::io::ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn open_sees_creator_writes() {
        let name = region_name("rw");
        let creator = create_shared_memory(&name, 8192).unwrap();

        unsafe {
            let slice = std::slice::from_raw_parts_mut(creator.as_ptr(), creator.size());
            for i in 0..100 {
                slice[i] = (i % 256) as u8;
            }
        }

        let attached = open_shared_memory(&name, 8192).unwrap();
        unsafe {
            let slice = std::slice::from_raw_parts(attached.as_ptr(), attached.size());
            for i in 0..100 {
                assert_eq!(slice[i], (i % 256) as u8);
            }
        }
    }

    #[test]
    fn open_rejects_size_mismatch() {
        let name = region_name("mismatch");
        let _creator = create_shared_memory(&name, 4096).unwrap();

        let result = open_shared_memory(&name, 8192);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn open_missing_name_fails() {
        let result = open_shared_memory(&region_name("missing"), 4096);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn create_or_open_reports_creator() {
        let name = region_name("race");
        let (_first, created_first) = create_or_open_shared_memory(&name, 4096).unwrap();
        let (_second, created_second) = create_or_open_shared_memory(&name, 4096).unwrap();

        assert!(created_first);
        assert!(!created_second);
    }

    #[test]
    fn creator_drop_unlinks_name() {
        let name = region_name("unlink");
        {
            let _shm = create_shared_memory(&name, 4096).unwrap();
            assert!(shm_file_exists(&name));
        }
        assert!(!shm_file_exists(&name), "creator drop should unlink");
    }

    #[test]
    fn attachment_drop_keeps_name() {
        let name = region_name("keep");
        let creator = create_shared_memory(&name, 4096).unwrap();
        {
            let _attached = open_shared_memory(&name, 4096).unwrap();
        }
        assert!(
            shm_file_exists(&name),
            "attachment drop must not unlink the name"
        );
        drop(creator);
    }

    #[test]
    fn explicit_unlink_removes_name() {
        let name = region_name("explicit");
        // Unlink by name works while mappings are still live; the creator's
        // own unlink at drop then finds nothing and is ignored.
        let _shm = create_shared_memory(&name, 4096).unwrap();
        unlink_shared_memory(&name).unwrap();
        assert!(!shm_file_exists(&name));
    }
}

#[cfg(not(target_os = "linux"))]
mod non_linux_tests {
    use shmring::core::{create_shared_memory, open_shared_memory};

    #[test]
    fn unsupported_platform() {
        let result = create_shared_memory("shmring-test", 4096);
        assert!(result.is_err());

        if let Err(err) = result {
            assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
        }
    }

    #[test]
    fn open_unsupported_platform() {
        let result = open_shared_memory("shmring-test", 4096);
        assert!(result.is_err());

        if let Err(err) = result {
            assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
        }
    }
}
