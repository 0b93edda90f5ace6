//! End-to-end runs of the provisioning procedure against a staging root.
//!
//! External tools, the version-source clone, and HTTP are scripted, so these
//! tests exercise step ordering, fallback, permissions and abort behavior.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use provisioner::core::steps::Step;
use provisioner::core::version::{KubectlVersion, VersionSource};
use provisioner::exit_codes;
use provisioner::io::process::CommandFailed;
use provisioner::provision::Provisioner;
use provisioner::test_support::{FixtureFetcher, RecordingRunner, Sandbox, ScriptedHttp};

const DOWNLOAD_1_2_3: &str = "https://dl.k8s.io/release/v1.2.3/bin/linux/amd64/kubectl";

fn mode(path: &Path) -> u32 {
    fs::metadata(path).expect("stat").permissions().mode() & 0o777
}

fn completion_runner() -> RecordingRunner {
    RecordingRunner::new().with_stdout("register-python-argcomplete", b"complete -F _sat sat\n")
}

#[test]
fn full_run_installs_everything_in_order() {
    let sandbox = Sandbox::new(&["sat.8", "sat-status.8", "sat-swap.3p"]).expect("sandbox");
    let cfg = &sandbox.config;
    let runner = completion_runner();
    let fetcher = FixtureFetcher::with_file(&cfg.kubectl.manifest_path, "kubectl=1.2.3-anything\n");
    let http = ScriptedHttp::new().with_body(DOWNLOAD_1_2_3, b"\x7fELF kubectl");

    let report = Provisioner::new(cfg, &sandbox.source, &runner, &fetcher, &http)
        .run()
        .expect("run");

    let steps: Vec<Step> = report.steps.iter().map(|record| record.step).collect();
    assert_eq!(steps, Step::ALL.to_vec());

    let resolved = report.kubectl.expect("resolved version");
    assert_eq!(resolved.version, KubectlVersion::new(1, 2, 3));
    assert_eq!(resolved.source, VersionSource::Manifest);

    let root = &sandbox.root;
    let kubectl = root.join("usr/bin/kubectl");
    assert_eq!(report.kubectl_path.as_deref(), Some(kubectl.as_path()));
    assert_eq!(fs::read(&kubectl).expect("read"), b"\x7fELF kubectl");
    assert_eq!(mode(&kubectl), 0o755);

    assert!(root.join("usr/share/man/man8/sat.8").is_file());
    assert!(root.join("usr/share/man/man8/sat-status.8").is_file());
    assert!(root.join("usr/share/man/man3/sat-swap.3p").is_file());
    assert_eq!(
        fs::read_to_string(root.join("etc/bash_completion.d/sat-completion.bash")).expect("read"),
        "complete -F _sat sat\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("etc/profile.d/sat-path.sh")).expect("read"),
        "export PATH=\"/sat/venv/bin:$PATH\"\n"
    );

    assert_eq!(
        runner.programs(),
        vec!["pip3", "make", "pip3", "register-python-argcomplete"]
    );
    let requests = runner.requests();
    assert_eq!(requests[0].args[0], "install");
    assert_eq!(requests[2].args[0], "uninstall");
    assert_eq!(
        requests[1].workdir.as_deref(),
        Some(sandbox.source.join("docs/man").as_path())
    );
    assert_eq!(http.requests(), vec![DOWNLOAD_1_2_3.to_string()]);
}

#[test]
fn every_created_directory_is_755() {
    let sandbox = Sandbox::new(&["sat.8"]).expect("sandbox");
    let cfg = &sandbox.config;
    let runner = completion_runner();
    let fetcher = FixtureFetcher::with_file(&cfg.kubectl.manifest_path, "kubectl=1.2.3-0\n");
    let http = ScriptedHttp::new().with_body(DOWNLOAD_1_2_3, b"bin");

    Provisioner::new(cfg, &sandbox.source, &runner, &fetcher, &http)
        .run()
        .expect("run");

    for dir in [
        "var",
        "var/log",
        "var/log/sat",
        "usr",
        "usr/share",
        "usr/share/man",
        "usr/share/man/man8",
        "etc",
        "etc/bash_completion.d",
        "etc/profile.d",
        "usr/bin",
    ] {
        assert_eq!(mode(&sandbox.root.join(dir)), 0o755, "{dir}");
    }
}

#[test]
fn manifest_without_version_uses_stable_endpoint() {
    let sandbox = Sandbox::new(&["sat.8"]).expect("sandbox");
    let cfg = &sandbox.config;
    let runner = completion_runner();
    let fetcher = FixtureFetcher::with_file(&cfg.kubectl.manifest_path, "kubelet=1.2.3-0\n");
    let download = "https://dl.k8s.io/release/v1.29.3/bin/linux/amd64/kubectl";
    let http = ScriptedHttp::new()
        .with_body(&cfg.kubectl.stable_url, b"v1.29.3\n")
        .with_body(download, b"bin");

    let report = Provisioner::new(cfg, &sandbox.source, &runner, &fetcher, &http)
        .run()
        .expect("run");

    let resolved = report.kubectl.expect("resolved version");
    assert_eq!(resolved.version, KubectlVersion::new(1, 29, 3));
    assert_eq!(resolved.source, VersionSource::StableEndpoint);
    assert_eq!(
        http.requests(),
        vec![cfg.kubectl.stable_url.clone(), download.to_string()]
    );
}

#[test]
fn empty_checkout_uses_stable_endpoint() {
    let sandbox = Sandbox::new(&["sat.8"]).expect("sandbox");
    let cfg = &sandbox.config;
    let runner = completion_runner();
    let download = "https://dl.k8s.io/release/v1.30.1/bin/linux/amd64/kubectl";
    let http = ScriptedHttp::new()
        .with_body(&cfg.kubectl.stable_url, b"v1.30.1")
        .with_body(download, b"bin");

    let report = Provisioner::new(cfg, &sandbox.source, &runner, &FixtureFetcher::empty(), &http)
        .run()
        .expect("run");
    assert_eq!(
        report.kubectl.map(|resolved| resolved.source),
        Some(VersionSource::StableEndpoint)
    );
}

#[test]
fn missing_man_source_aborts_before_later_steps() {
    let sandbox = Sandbox::new(&["sat.8"]).expect("sandbox");
    fs::remove_dir_all(sandbox.source.join("docs")).expect("remove docs");
    let cfg = &sandbox.config;
    let runner = completion_runner();
    let fetcher = FixtureFetcher::with_file(&cfg.kubectl.manifest_path, "kubectl=1.2.3-0\n");
    let http = ScriptedHttp::new().with_body(DOWNLOAD_1_2_3, b"bin");

    let err = Provisioner::new(cfg, &sandbox.source, &runner, &fetcher, &http)
        .run()
        .unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.contains("step 2/6 man-pages-build"), "{msg}");
    assert!(msg.contains("source directory"), "{msg}");
    assert_eq!(exit_codes::for_error(&err), exit_codes::FAILURE);

    assert!(sandbox.root.join("var/log/sat").is_dir());
    assert!(runner.requests().is_empty());
    assert!(fetcher.fetched().is_empty());
    assert!(http.requests().is_empty());
    assert!(!sandbox.root.join("usr").exists());
    assert!(!sandbox.root.join("etc").exists());
}

#[test]
fn failing_build_propagates_exit_code_and_keeps_generator() {
    let sandbox = Sandbox::new(&["sat.8"]).expect("sandbox");
    let cfg = &sandbox.config;
    let runner = completion_runner().failing("make", 2);
    let fetcher = FixtureFetcher::with_file(&cfg.kubectl.manifest_path, "kubectl=1.2.3-0\n");
    let http = ScriptedHttp::new();

    let err = Provisioner::new(cfg, &sandbox.source, &runner, &fetcher, &http)
        .run()
        .unwrap_err();

    let failed = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<CommandFailed>())
        .expect("command failure");
    assert_eq!(failed.program, "make");
    assert_eq!(exit_codes::for_error(&err), 2);
    assert_eq!(runner.programs(), vec!["pip3", "make"]);
    assert!(!sandbox.root.join("usr/share/man").exists());
}

#[test]
fn download_failure_leaves_no_binary() {
    let sandbox = Sandbox::new(&["sat.8"]).expect("sandbox");
    let cfg = &sandbox.config;
    let runner = completion_runner();
    let fetcher = FixtureFetcher::with_file(&cfg.kubectl.manifest_path, "kubectl=1.2.3-0\n");
    let http = ScriptedHttp::new();

    let err = Provisioner::new(cfg, &sandbox.source, &runner, &fetcher, &http)
        .run()
        .unwrap_err();

    assert!(format!("{err:#}").contains("step 6/6 kubectl-install"));
    assert!(!sandbox.root.join("usr/bin/kubectl").exists());
}

#[test]
fn clone_failure_is_fatal() {
    let sandbox = Sandbox::new(&["sat.8"]).expect("sandbox");
    let cfg = &sandbox.config;
    let runner = completion_runner();
    let http = ScriptedHttp::new().with_body(&cfg.kubectl.stable_url, b"v1.30.1");

    let err = Provisioner::new(cfg, &sandbox.source, &runner, &FixtureFetcher::failing(), &http)
        .run()
        .unwrap_err();

    assert!(format!("{err:#}").contains("step 5/6 kubectl-version"));
    assert_eq!(exit_codes::for_error(&err), 128);
    assert!(http.requests().is_empty());
}

#[test]
fn cli_name_drives_shell_integration_paths() {
    let sandbox = Sandbox::new(&["foo.1"]).expect("sandbox");
    let mut cfg = sandbox.config.clone();
    cfg.cli_name = "foo".to_string();
    let runner = RecordingRunner::new()
        .with_stdout("register-python-argcomplete", b"complete -F _foo foo\n");
    let fetcher = FixtureFetcher::with_file(&cfg.kubectl.manifest_path, "kubectl=1.2.3-0\n");
    let http = ScriptedHttp::new().with_body(DOWNLOAD_1_2_3, b"bin");

    Provisioner::new(&cfg, &sandbox.source, &runner, &fetcher, &http)
        .run()
        .expect("run");

    let root = &sandbox.root;
    assert!(root.join("var/log/foo").is_dir());
    assert!(root.join("etc/bash_completion.d/foo-completion.bash").is_file());
    assert_eq!(
        fs::read_to_string(root.join("etc/profile.d/foo-path.sh")).expect("read"),
        "export PATH=\"/foo/venv/bin:$PATH\"\n"
    );
    let generator = runner
        .requests()
        .into_iter()
        .find(|request| request.program == "register-python-argcomplete")
        .expect("generator ran");
    assert_eq!(generator.args, vec!["foo"]);
    assert!(!root.join("var/log/sat").exists());
}
