//! Tests for registry publishing.

use super::*;
use crate::command::EnvValue;
use crate::credential::Secret;
use crate::test_utils::{ExpectedCall, StubExecutor, exit_output};
use rstest::{fixture, rstest};

#[fixture]
fn credential() -> Credential {
    Credential::new("alice", Secret::new("hunter2")).expect("valid credential")
}

fn package(component: &str) -> PackageUpload {
    PackageUpload {
        component: component.to_owned(),
        package: format!("sqlean-{component}"),
        directory: Utf8PathBuf::from(format!("/out/{component}")),
    }
}

fn rejection(package: &PackageUpload, kind: UploadFailureKind) -> PackagerError {
    PackagerError::Upload {
        package: package.package.clone(),
        kind,
        message: "rejected".to_owned(),
    }
}

fn publish_quietly(
    uploader: &dyn Uploader,
    credential: &Credential,
    packages: &[PackageUpload],
    continue_on_error: bool,
) -> PublishSummary {
    let mut sink = Vec::new();
    let mut progress = Progress::new(&mut sink, true);
    publish_all(uploader, credential, packages, continue_on_error, &mut progress)
}

#[rstest]
fn external_uploader_passes_secret_to_child_only(credential: Credential) {
    let executor = StubExecutor::new(vec![ExpectedCall::ok(
        "store-manager",
        &["-u", "alice", "--config", "manifest.toml", "-p", "sqlean-math"],
    )]);
    let uploader =
        ExternalUploader::new(&executor, "store-manager", "ANYQUERY_PASSWORD", Duration::from_secs(9));

    uploader
        .upload(&credential, &package("math"))
        .expect("upload succeeds");

    executor.assert_finished();
    let spec = &executor.received()[0];
    assert_eq!(spec.current_dir, Some(Utf8PathBuf::from("/out/math")));
    assert_eq!(
        spec.envs,
        vec![(
            "ANYQUERY_PASSWORD".to_owned(),
            EnvValue::Secret(Secret::new("hunter2"))
        )]
    );
    assert_eq!(spec.timeout, Some(Duration::from_secs(9)));
    assert!(std::env::var_os("ANYQUERY_PASSWORD").is_none());
}

#[rstest]
#[case::auth(2, UploadFailureKind::AuthFailure)]
#[case::network(3, UploadFailureKind::NetworkFailure)]
#[case::rejected(4, UploadFailureKind::ServerRejection)]
#[case::other(1, UploadFailureKind::ServerRejection)]
fn external_uploader_classifies_exit_codes(
    credential: Credential,
    #[case] code: i32,
    #[case] expected: UploadFailureKind,
) {
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "store-manager",
        &["-u", "alice", "--config", "manifest.toml", "-p", "sqlean-math"],
        Ok(exit_output(code, "upload failed")),
    )]);
    let uploader =
        ExternalUploader::new(&executor, "store-manager", "ANYQUERY_PASSWORD", Duration::from_secs(1));

    let err = uploader
        .upload(&credential, &package("math"))
        .expect_err("upload fails");

    assert!(matches!(err, PackagerError::Upload { kind, .. } if kind == expected));
    assert!(!err.to_string().contains("hunter2"));
}

#[rstest]
fn uploader_timeout_is_network_failure(credential: Credential) {
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "store-manager",
        &["-u", "alice", "--config", "manifest.toml", "-p", "sqlean-math"],
        Err(PackagerError::CommandTimeout {
            program: "store-manager".to_owned(),
            timeout: Duration::from_secs(1),
        }),
    )]);
    let uploader =
        ExternalUploader::new(&executor, "store-manager", "ANYQUERY_PASSWORD", Duration::from_secs(1));

    let err = uploader
        .upload(&credential, &package("math"))
        .expect_err("timeout");

    assert!(matches!(
        err,
        PackagerError::Upload {
            kind: UploadFailureKind::NetworkFailure,
            ..
        }
    ));
}

#[rstest]
fn uploads_every_package_in_order(credential: Credential) {
    let packages = [package("crypto"), package("math"), package("vsv")];
    let mut uploader = MockUploader::new();
    let mut seq = mockall::Sequence::new();
    for name in ["sqlean-crypto", "sqlean-math", "sqlean-vsv"] {
        uploader
            .expect_upload()
            .withf(move |cred, pkg| cred.username() == "alice" && pkg.package == name)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
    }

    let summary = publish_quietly(&uploader, &credential, &packages, false);

    assert!(
        summary
            .outcomes
            .iter()
            .all(|(_, outcome)| *outcome == ComponentOutcome::Published)
    );
    summary.into_result().expect("all uploads succeed");
}

#[rstest]
fn first_failure_stops_remaining_uploads(credential: Credential) {
    let packages = [package("crypto"), package("math"), package("vsv")];
    let mut uploader = MockUploader::new();
    uploader
        .expect_upload()
        .withf(|_, pkg| pkg.component == "crypto")
        .times(1)
        .returning(|_, _| Ok(()));
    uploader
        .expect_upload()
        .withf(|_, pkg| pkg.component == "math")
        .times(1)
        .returning(|_, pkg| Err(rejection(pkg, UploadFailureKind::AuthFailure)));

    let summary = publish_quietly(&uploader, &credential, &packages, false);

    let outcomes: Vec<_> = summary.outcomes.iter().map(|(_, o)| o.clone()).collect();
    assert_eq!(outcomes[0], ComponentOutcome::Published);
    assert!(matches!(outcomes[1], ComponentOutcome::Failed { .. }));
    assert_eq!(outcomes[2], ComponentOutcome::NotAttempted);
    let err = summary.into_result().expect_err("aborted");
    assert!(matches!(
        err,
        PackagerError::Upload {
            kind: UploadFailureKind::AuthFailure,
            ..
        }
    ));
    assert_eq!(err.exit_code(), crate::error::EXIT_UPLOAD);
}

#[rstest]
fn continue_on_error_attempts_all_and_aggregates(credential: Credential) {
    let packages = [package("crypto"), package("math"), package("vsv")];
    let mut uploader = MockUploader::new();
    uploader
        .expect_upload()
        .withf(|_, pkg| pkg.component == "math")
        .times(1)
        .returning(|_, _| Ok(()));
    uploader
        .expect_upload()
        .times(2)
        .returning(|_, pkg| Err(rejection(pkg, UploadFailureKind::ServerRejection)));

    let summary = publish_quietly(&uploader, &credential, &packages, true);

    let failed: Vec<_> = summary
        .failures()
        .iter()
        .map(|f| f.package.as_str())
        .collect();
    assert_eq!(failed, ["sqlean-crypto", "sqlean-vsv"]);
    let err = summary.into_result().expect_err("aggregated failures");
    assert!(matches!(err, PackagerError::UploadFailures { ref failures } if failures.len() == 2));
    assert_eq!(err.exit_code(), crate::error::EXIT_UPLOAD);
}
