// Property-based tests for batch transfer invariants
// Caps, path mirroring, retry bound, consecutive-failure abort, mkdir idempotence

mod support;

use common::circuit_breaker::ABORT_MESSAGE;
use common::classify::{classify, ftp_reply};
use common::errors::{ErrorContext, ErrorKind, TransportError};
use common::path_mirror::{PathMirror, RelativePath};
use common::transfer::Connection;
use proptest::prelude::*;
use support::*;

fn relative_path_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z][a-z0-9_]{0,7}", 0..4),
        "[a-z][a-z0-9_]{0,7}",
    )
        .prop_map(|(dirs, name)| {
            let mut parts = dirs;
            parts.push(format!("{}.txt", name));
            parts.join("/")
        })
}

/// **Property 1: Transfer cap**
///
/// *For any* N matching remote files and cap M, exactly min(N, M) are attempted.
#[test]
fn property_get_attempts_at_most_maximum_transfer() {
    proptest!(ProptestConfig::with_cases(32), |(
        available in 1usize..20,
        cap in 1usize..10
    )| {
        let local = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        for i in 0..available {
            mock.add_file(&format!("readwrite_dir/f{:02}.txt", i), b"x");
        }

        let mut config = config(local.path());
        config.maximum_transfer = cap;
        let mut connection = Connection::open(config, mock.boxed()).unwrap();
        let result = connection.get_files(|_, _, _| {}).unwrap();

        prop_assert_eq!(result.attempted, available.min(cap));
        prop_assert_eq!(mock.file_count(), available - available.min(cap));
    });
}

/// **Property 1: Transfer cap (upload side)**
#[test]
fn property_put_attempts_at_most_maximum_transfer() {
    proptest!(ProptestConfig::with_cases(32), |(
        available in 1usize..20,
        cap in 1usize..10
    )| {
        let local = tempfile::tempdir().unwrap();
        for i in 0..available {
            write_local(local.path(), &format!("f{:02}.txt", i), b"x");
        }
        let mock = MockTransport::new();
        mock.add_dir("readwrite_dir");

        let mut config = config(local.path());
        config.maximum_transfer = cap;
        let mut connection = Connection::open(config, mock.boxed()).unwrap();
        let mut attempted = 0usize;
        connection.put_files(|_, _| attempted += 1).unwrap();

        prop_assert_eq!(attempted, available.min(cap));
        prop_assert_eq!(mock.file_count(), available.min(cap));
    });
}

/// **Property 2: Mirroring round trip**
///
/// *For any* relative path with K >= 0 directories, put then get through the
/// same connection reproduces the identical relative path and content.
#[test]
fn property_put_then_get_preserves_relative_path() {
    proptest!(ProptestConfig::with_cases(32), |(
        relative in relative_path_strategy(),
        content in prop::collection::vec(any::<u8>(), 0..64)
    )| {
        let local = tempfile::tempdir().unwrap();
        write_local(local.path(), &relative, &content);
        let mock = MockTransport::new();
        mock.add_dir("readwrite_dir");

        let mut config = config(local.path());
        config.filename_pattern = "**/*.txt".to_string();
        config.delete_on_put = true;
        let mut connection = Connection::open(config, mock.boxed()).unwrap();

        connection.put_files(|_, error| assert!(error.is_none())).unwrap();
        prop_assert_eq!(mock.files_under("readwrite_dir"), vec![relative.clone()]);
        prop_assert!(!local.path().join(&relative).exists());

        let result = connection.get_files(|_, _, _| {}).unwrap();
        prop_assert_eq!(result.collected, 1);
        prop_assert_eq!(std::fs::read(local.path().join(&relative)).unwrap(), content);
    });
}

/// **Property 2: Mirroring is symmetric**
#[test]
fn property_mirror_remote_local_symmetry() {
    proptest!(|(relative in relative_path_strategy())| {
        let mirror = PathMirror::new("/srv/inbound", "/work");
        let parsed = RelativePath::parse(&relative).unwrap();

        let remote = mirror.to_remote(&parsed);
        let local = mirror.to_local(&parsed);

        prop_assert_eq!(mirror.relative_of_remote(&remote), Some(parsed.clone()));
        prop_assert_eq!(mirror.relative_of_local(&local), Some(parsed.clone()));
        prop_assert_eq!(parsed.as_string(), relative);
    });
}

/// **Property 3: Retry bound**
///
/// *For any* number of injected failures F, a file is attempted min(F + 1, 3)
/// times and succeeds exactly when F < 3.
#[test]
fn property_retry_bound() {
    proptest!(ProptestConfig::with_cases(16), |(failures in 0u32..6)| {
        let local = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        mock.add_file("readwrite_dir/a.txt", b"a");
        mock.fail_get("readwrite_dir/a.txt", failures, SFTP_FAILURE);

        let mut connection = Connection::open(config(local.path()), mock.boxed()).unwrap();
        let result = connection.get_files(|_, _, _| {}).unwrap();

        prop_assert_eq!(mock.get_calls("readwrite_dir/a.txt"), (failures + 1).min(3));
        prop_assert_eq!(result.collected == 1, failures < 3);
    });
}

/// **Property 4: Consecutive-failure abort**
///
/// *For any* sequence of per-file outcomes, the batch aborts exactly at the
/// first run of three failures, and never otherwise.
#[test]
fn property_batch_aborts_on_third_consecutive_failure() {
    proptest!(ProptestConfig::with_cases(48), |(
        outcomes in prop::collection::vec(any::<bool>(), 1..12)
    )| {
        let local = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        for (i, succeeds) in outcomes.iter().enumerate() {
            let path = format!("readwrite_dir/f{:02}.txt", i);
            mock.add_file(&path, b"x");
            if !succeeds {
                mock.fail_get(&path, u32::MAX, SFTP_FAILURE);
            }
        }

        let mut expected_abort_at = None;
        let mut run = 0;
        for (i, succeeds) in outcomes.iter().enumerate() {
            run = if *succeeds { 0 } else { run + 1 };
            if run == 3 {
                expected_abort_at = Some(i);
                break;
            }
        }

        let mut connection = Connection::open(config(local.path()), mock.boxed()).unwrap();
        let mut reported = 0usize;
        let outcome = connection.get_files(|_, _, _| reported += 1);

        match expected_abort_at {
            Some(index) => {
                let error = outcome.err().unwrap();
                prop_assert_eq!(error.kind, ErrorKind::Protocol);
                prop_assert!(error.message.contains(ABORT_MESSAGE));
                prop_assert_eq!(reported, index + 1);
            }
            None => {
                let result = outcome.unwrap();
                prop_assert_eq!(result.attempted, outcomes.len());
                prop_assert_eq!(reported, outcomes.len());
            }
        }
    });
}

/// **Property 6: Idempotent directory creation**
#[test]
fn property_ensure_directory_twice_never_fails() {
    proptest!(ProptestConfig::with_cases(32), |(
        dirs in prop::collection::vec("[a-z]{1,6}", 1..5)
    )| {
        let local = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        let path = format!("readwrite_dir/{}", dirs.join("/"));

        let mut connection = Connection::open(config(local.path()), mock.boxed()).unwrap();
        prop_assert!(connection.ensure_directory(&path).is_ok());
        prop_assert!(connection.ensure_directory(&path).is_ok());
        prop_assert!(mock.has_dir(&path));
    });
}

/// Classification of FTP replies is total and stable
#[test]
fn property_ftp_reply_classification_is_total() {
    proptest!(|(code in 0u32..1000)| {
        let (kind, _) = ftp_reply(code);
        let context = ErrorContext::host("ftp.example.com").with_file("a.txt");
        let error = classify(
            &TransportError::FtpReply { code, message: "reply".to_string() },
            &context,
        );
        prop_assert_eq!(error.kind, kind);
        prop_assert!(error.message.starts_with("Error on host ftp.example.com: "));
        prop_assert_eq!(error.host.as_deref(), Some("ftp.example.com"));
        if (500..=504).contains(&code) || code >= 600 || code < 400 {
            prop_assert_eq!(kind, ErrorKind::Protocol);
        }
    });
}
