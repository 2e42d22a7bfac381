use std::{fs, time::Duration};

use nb_io::{LocalTransport, Transport};
use ntest::timeout;

#[test]
#[timeout(10000)]
fn test_copy_to_and_back() {
    let master = tempfile::tempdir().expect("Couldn't create master dir");
    let slave = tempfile::tempdir().expect("Couldn't create slave dir");

    let package = master.path().join("package.tar.bz2");
    fs::write(&package, "payload").expect("Couldn't write package");

    let transport = LocalTransport;
    let slave_dir = slave.path().to_string_lossy().to_string();
    let output = transport.copy_to(&package, &slave_dir);
    assert!(output.success(), "{:?}", output);
    assert_eq!(
        fs::read_to_string(slave.path().join("package.tar.bz2")).expect("Missing copy"),
        "payload"
    );

    let logs = slave.path().join("logs").join("slave1");
    fs::create_dir_all(&logs).expect("Couldn't create logs");
    fs::write(logs.join("report.csv"), "row").expect("Couldn't write report");

    let collected = master.path().join("collected");
    let output = transport.copy_from(&logs.to_string_lossy(), &collected);
    assert!(output.success(), "{:?}", output);
    assert_eq!(
        fs::read_to_string(collected.join("report.csv")).expect("Missing report"),
        "row"
    );
}

#[test]
#[timeout(10000)]
fn test_exec_reports_failure_and_timeout() {
    let transport = LocalTransport;
    let output = transport.exec("exit 7", None);
    assert_eq!(output.status, 7);

    let output = transport.exec("sleep 20", Some(Duration::from_millis(100)));
    assert!(output.timed_out());
}
